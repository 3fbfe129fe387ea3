//! Capability trait and descriptors.
//!
//! A capability is an audio operator class: mixer, splitter, meter and so on.
//! Each class is described once by a [`CapabilityDescriptor`] (identity,
//! endpoint layout, default configuration, factory) and instantiated any
//! number of times as a boxed [`Capability`].
//!
//! Lifecycle bookkeeping lives in [`CapabilityInstance`](crate::CapabilityInstance);
//! the trait only carries the per-class hooks. Every hook except
//! [`process`](Capability::process) has a default, so a minimal capability is
//! one method:
//!
//! ```rust
//! use kestrel_core::{Capability, CapabilityError, ProcessIo, ProcessOutcome};
//!
//! struct Silence;
//!
//! impl Capability for Silence {
//!     fn process(&mut self, _io: &mut ProcessIo<'_>) -> Result<ProcessOutcome, CapabilityError> {
//!         Ok(ProcessOutcome::idle())
//!     }
//! }
//! ```

#[cfg(not(feature = "std"))]
use alloc::{boxed::Box, string::String, vec::Vec};

use crate::buffer::{Buffer, BufferError, ReadWindow, SampleSize, WriteWindow};
use crate::instance::{InstanceId, InstanceState};

/// Operator class identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CapabilityId(pub u16);

impl core::fmt::Display for CapabilityId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "0x{:04X}", self.0)
    }
}

/// An input or output connection point, by index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Endpoint {
    /// Sink side: the capability reads from the bound buffer.
    Input(usize),
    /// Source side: the capability writes to the bound buffer.
    Output(usize),
}

impl Endpoint {
    /// Index within its direction.
    pub fn index(self) -> usize {
        match self {
            Self::Input(i) | Self::Output(i) => i,
        }
    }

    /// Returns `true` for input endpoints.
    pub fn is_input(self) -> bool {
        matches!(self, Self::Input(_))
    }
}

impl core::fmt::Display for Endpoint {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Input(i) => write!(f, "in{i}"),
            Self::Output(i) => write!(f, "out{i}"),
        }
    }
}

/// Endpoint counts of a capability class.
///
/// The first `mandatory_inputs` inputs and the first `mandatory_outputs`
/// outputs must be bound before an instance counts as connected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EndpointLayout {
    /// Number of input endpoints.
    pub inputs: usize,
    /// Number of output endpoints.
    pub outputs: usize,
    /// Leading inputs that must be bound.
    pub mandatory_inputs: usize,
    /// Leading outputs that must be bound.
    pub mandatory_outputs: usize,
}

impl EndpointLayout {
    /// Layout where every endpoint is mandatory.
    pub const fn fixed(inputs: usize, outputs: usize) -> Self {
        Self {
            inputs,
            outputs,
            mandatory_inputs: inputs,
            mandatory_outputs: outputs,
        }
    }

    /// Whether `endpoint` exists in this layout.
    pub fn contains(&self, endpoint: Endpoint) -> bool {
        match endpoint {
            Endpoint::Input(i) => i < self.inputs,
            Endpoint::Output(i) => i < self.outputs,
        }
    }

    /// Whether `endpoint` must be bound.
    pub fn is_mandatory(&self, endpoint: Endpoint) -> bool {
        match endpoint {
            Endpoint::Input(i) => i < self.mandatory_inputs,
            Endpoint::Output(i) => i < self.mandatory_outputs,
        }
    }
}

/// Errors from capability lifecycle operations and hooks.
#[derive(Debug, Clone, PartialEq)]
pub enum CapabilityError {
    /// No descriptor is registered under this id.
    UnknownCapability(CapabilityId),
    /// No live instance has this id.
    UnknownInstance(InstanceId),
    /// The operation is not legal in the instance's current state.
    InvalidState(InstanceState),
    /// The endpoint index exceeds the descriptor's endpoint count.
    EndpointOutOfRange(Endpoint),
    /// The instance still has this many bound endpoints.
    StillConnected(usize),
    /// `process` failed in a way that is not a buffer shortfall.
    ProcessingFault(String),
    /// Configuration words were rejected by the capability.
    InvalidConfig(String),
    /// The capability does not understand this operator message.
    UnsupportedMessage(u16),
    /// The live-instance limit has been reached.
    TooManyInstances(usize),
    /// A buffer operation inside a hook failed.
    Buffer(BufferError),
}

impl CapabilityError {
    /// Builds a [`ProcessingFault`](Self::ProcessingFault).
    pub fn fault(reason: impl Into<String>) -> Self {
        Self::ProcessingFault(reason.into())
    }

    /// Builds an [`InvalidConfig`](Self::InvalidConfig).
    pub fn config(reason: impl Into<String>) -> Self {
        Self::InvalidConfig(reason.into())
    }
}

impl From<BufferError> for CapabilityError {
    fn from(e: BufferError) -> Self {
        Self::Buffer(e)
    }
}

impl core::fmt::Display for CapabilityError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::UnknownCapability(id) => write!(f, "unknown capability {id}"),
            Self::UnknownInstance(id) => write!(f, "unknown instance {id}"),
            Self::InvalidState(state) => write!(f, "operation not legal in state {state:?}"),
            Self::EndpointOutOfRange(ep) => write!(f, "endpoint {ep} out of range"),
            Self::StillConnected(n) => write!(f, "instance still has {n} bound endpoint(s)"),
            Self::ProcessingFault(reason) => write!(f, "processing fault: {reason}"),
            Self::InvalidConfig(reason) => write!(f, "invalid configuration: {reason}"),
            Self::UnsupportedMessage(id) => write!(f, "unsupported operator message 0x{id:04X}"),
            Self::TooManyInstances(max) => write!(f, "instance limit of {max} reached"),
            Self::Buffer(e) => write!(f, "buffer error: {e}"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for CapabilityError {}

/// What one `process` call did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProcessOutcome {
    /// Bytes consumed across all inputs.
    pub consumed: usize,
    /// Bytes produced across all outputs.
    pub produced: usize,
}

impl ProcessOutcome {
    /// Nothing consumed, nothing produced.
    pub const fn idle() -> Self {
        Self {
            consumed: 0,
            produced: 0,
        }
    }

    /// Outcome with the given byte counts.
    pub const fn new(consumed: usize, produced: usize) -> Self {
        Self { consumed, produced }
    }
}

/// Read side of one bound input buffer.
#[derive(Debug)]
pub struct InputPort<'a> {
    buffer: &'a mut Buffer,
}

impl<'a> InputPort<'a> {
    /// Wraps the reader role of `buffer`.
    pub fn new(buffer: &'a mut Buffer) -> Self {
        Self { buffer }
    }

    /// Bytes waiting to be read.
    pub fn available(&self) -> usize {
        self.buffer.occupied()
    }

    /// Access granularity of the buffer.
    pub fn sample_size(&self) -> SampleSize {
        self.buffer.sample_size()
    }

    /// See [`Buffer::read_reserve`].
    pub fn read_reserve(&mut self, n: usize) -> Result<ReadWindow<'_>, BufferError> {
        self.buffer.read_reserve(n)
    }

    /// See [`Buffer::read`].
    pub fn read(&mut self, out: &mut [u8]) -> Result<(), BufferError> {
        self.buffer.read(out)
    }

    /// See [`Buffer::discard`].
    pub fn discard(&mut self, n: usize) -> Result<(), BufferError> {
        self.buffer.discard(n)
    }
}

/// Write side of one bound output buffer.
#[derive(Debug)]
pub struct OutputPort<'a> {
    buffer: &'a mut Buffer,
}

impl<'a> OutputPort<'a> {
    /// Wraps the writer role of `buffer`.
    pub fn new(buffer: &'a mut Buffer) -> Self {
        Self { buffer }
    }

    /// Bytes that can be written.
    pub fn space(&self) -> usize {
        self.buffer.space()
    }

    /// Access granularity of the buffer.
    pub fn sample_size(&self) -> SampleSize {
        self.buffer.sample_size()
    }

    /// See [`Buffer::write_reserve`].
    pub fn write_reserve(&mut self, n: usize) -> Result<WriteWindow<'_>, BufferError> {
        self.buffer.write_reserve(n)
    }

    /// See [`Buffer::write`].
    pub fn write(&mut self, data: &[u8]) -> Result<(), BufferError> {
        self.buffer.write(data)
    }
}

/// The input endpoints handed to one `process` call.
#[derive(Debug)]
pub struct Inputs<'a> {
    buffers: &'a mut [Option<Buffer>],
}

impl Inputs<'_> {
    /// Number of input endpoints (bound or not).
    pub fn len(&self) -> usize {
        self.buffers.len()
    }

    /// Returns `true` if the capability has no inputs.
    pub fn is_empty(&self) -> bool {
        self.buffers.is_empty()
    }

    /// Whether input `index` is bound.
    pub fn is_bound(&self, index: usize) -> bool {
        matches!(self.buffers.get(index), Some(Some(_)))
    }

    /// Bytes waiting on input `index`; zero when unbound.
    pub fn available(&self, index: usize) -> usize {
        match self.buffers.get(index) {
            Some(Some(buffer)) => buffer.occupied(),
            _ => 0,
        }
    }

    /// Reader for input `index`, if bound.
    pub fn port(&mut self, index: usize) -> Option<InputPort<'_>> {
        self.buffers
            .get_mut(index)
            .and_then(Option::as_mut)
            .map(InputPort::new)
    }
}

/// The output endpoints handed to one `process` call.
#[derive(Debug)]
pub struct Outputs<'a> {
    buffers: &'a mut [Option<Buffer>],
}

impl Outputs<'_> {
    /// Number of output endpoints (bound or not).
    pub fn len(&self) -> usize {
        self.buffers.len()
    }

    /// Returns `true` if the capability has no outputs.
    pub fn is_empty(&self) -> bool {
        self.buffers.is_empty()
    }

    /// Whether output `index` is bound.
    pub fn is_bound(&self, index: usize) -> bool {
        matches!(self.buffers.get(index), Some(Some(_)))
    }

    /// Free bytes on output `index`; zero when unbound.
    pub fn space(&self, index: usize) -> usize {
        match self.buffers.get(index) {
            Some(Some(buffer)) => buffer.space(),
            _ => 0,
        }
    }

    /// Writer for output `index`, if bound.
    pub fn port(&mut self, index: usize) -> Option<OutputPort<'_>> {
        self.buffers
            .get_mut(index)
            .and_then(Option::as_mut)
            .map(OutputPort::new)
    }
}

/// Buffers bound to an instance for the duration of one `process` call.
///
/// Inputs only expose the reader role and outputs only the writer role.
#[derive(Debug)]
pub struct ProcessIo<'a> {
    inputs: &'a mut [Option<Buffer>],
    outputs: &'a mut [Option<Buffer>],
}

impl<'a> ProcessIo<'a> {
    /// Wraps per-endpoint buffers; `None` marks an unbound endpoint.
    pub fn new(inputs: &'a mut [Option<Buffer>], outputs: &'a mut [Option<Buffer>]) -> Self {
        Self { inputs, outputs }
    }

    /// Reader for input `index`, if bound.
    pub fn input(&mut self, index: usize) -> Option<InputPort<'_>> {
        self.inputs
            .get_mut(index)
            .and_then(Option::as_mut)
            .map(InputPort::new)
    }

    /// Writer for output `index`, if bound.
    pub fn output(&mut self, index: usize) -> Option<OutputPort<'_>> {
        self.outputs
            .get_mut(index)
            .and_then(Option::as_mut)
            .map(OutputPort::new)
    }

    /// Splits into independent input and output sets so windows on both
    /// sides can be open at once.
    pub fn split(&mut self) -> (Inputs<'_>, Outputs<'_>) {
        (
            Inputs {
                buffers: &mut *self.inputs,
            },
            Outputs {
                buffers: &mut *self.outputs,
            },
        )
    }

    /// Number of input endpoints.
    pub fn num_inputs(&self) -> usize {
        self.inputs.len()
    }

    /// Number of output endpoints.
    pub fn num_outputs(&self) -> usize {
        self.outputs.len()
    }
}

/// Per-class operator hooks.
///
/// Hooks run inside a scheduler task handler and must not block. Absence of
/// input data or output space is reported as
/// [`CapabilityError::Buffer`] with a shortfall, which the graph treats as
/// "nothing to do this tick".
pub trait Capability: Send {
    /// An endpoint has been bound to a buffer with the given granularity.
    fn connect(&mut self, endpoint: Endpoint, sample_size: SampleSize) -> Result<(), CapabilityError> {
        let _ = (endpoint, sample_size);
        Ok(())
    }

    /// An endpoint is being unbound.
    fn disconnect(&mut self, endpoint: Endpoint) {
        let _ = endpoint;
    }

    /// Called on `Connected -> Started`. An error leaves the instance connected.
    fn start(&mut self) -> Result<(), CapabilityError> {
        Ok(())
    }

    /// Called on `Started/Running -> Stopped`.
    fn stop(&mut self) {}

    /// Called on `Stopped -> Connected` to drop state from the previous run.
    fn reset(&mut self) {}

    /// Moves data from inputs to outputs.
    fn process(&mut self, io: &mut ProcessIo<'_>) -> Result<ProcessOutcome, CapabilityError>;

    /// Handles a capability-specific operator message.
    fn handle_message(&mut self, id: u16, payload: &[u8]) -> Result<Vec<u8>, CapabilityError> {
        let _ = payload;
        Err(CapabilityError::UnsupportedMessage(id))
    }

    /// Called once before the instance is dropped.
    fn destroy(&mut self) {}
}

/// Creates a capability from its effective configuration words.
pub type CapabilityFactory = fn(config: &[u32]) -> Result<Box<dyn Capability>, CapabilityError>;

/// Static description of a capability class.
#[derive(Debug, Clone, Copy)]
pub struct CapabilityDescriptor {
    /// Class identifier.
    pub id: CapabilityId,
    /// Short lowercase name, unique within a registry.
    pub name: &'static str,
    /// Human-readable description.
    pub description: &'static str,
    /// Version as (major, minor).
    pub version: (u16, u16),
    /// Input/output counts.
    pub layout: EndpointLayout,
    /// Granularity of every endpoint.
    pub sample_size: SampleSize,
    /// Suggested buffer size in bytes for connections to this class.
    pub buffer_size_hint: usize,
    /// Configuration words before overrides.
    pub default_config: &'static [u32],
    /// Instance constructor.
    pub create: CapabilityFactory,
}

/// Operator message ids answered by the framework for every instance.
pub mod opmsg {
    /// Reply: `[major: u16 LE, minor: u16 LE]`.
    pub const GET_CAPABILITY_VERSION: u16 = 0x1000;
    /// Reply: effective configuration words, each `u32 LE`.
    pub const GET_CONFIG: u16 = 0x1001;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout_mandatory_prefix() {
        let layout = EndpointLayout {
            inputs: 3,
            outputs: 1,
            mandatory_inputs: 1,
            mandatory_outputs: 1,
        };
        assert!(layout.contains(Endpoint::Input(2)));
        assert!(!layout.contains(Endpoint::Input(3)));
        assert!(!layout.contains(Endpoint::Output(1)));
        assert!(layout.is_mandatory(Endpoint::Input(0)));
        assert!(!layout.is_mandatory(Endpoint::Input(1)));
        assert!(layout.is_mandatory(Endpoint::Output(0)));
    }

    #[test]
    fn process_io_respects_binding() {
        let mut inputs = vec![Some(Buffer::with_capacity(8)), None];
        let mut outputs = vec![Some(Buffer::with_capacity(8))];
        let mut io = ProcessIo::new(&mut inputs, &mut outputs);
        assert_eq!(io.num_inputs(), 2);
        assert!(io.input(0).is_some());
        assert!(io.input(1).is_none());
        assert!(io.input(5).is_none());

        io.output(0).unwrap().write(&[1, 2, 3]).unwrap();
        let (ins, outs) = io.split();
        assert!(ins.is_bound(0));
        assert!(!ins.is_bound(1));
        assert_eq!(outs.space(0), 5);
    }

    #[test]
    fn split_allows_simultaneous_windows() {
        let mut inputs = vec![Some(Buffer::with_capacity(8))];
        let mut outputs = vec![Some(Buffer::with_capacity(8))];
        inputs[0].as_mut().unwrap().write(&[4, 5]).unwrap();
        let mut io = ProcessIo::new(&mut inputs, &mut outputs);

        let (mut ins, mut outs) = io.split();
        let mut input = ins.port(0).unwrap();
        let mut output = outs.port(0).unwrap();
        let mut reader = input.read_reserve(2).unwrap();
        let mut writer = output.write_reserve(2).unwrap();
        writer.copy_from_window(&mut reader, 2);
        writer.commit(2).unwrap();
        reader.commit(2).unwrap();

        assert_eq!(outputs[0].as_ref().unwrap().occupied(), 2);
        assert!(inputs[0].as_ref().unwrap().is_empty());
    }

    #[test]
    fn display_formats() {
        assert_eq!(CapabilityId(0x000A).to_string(), "0x000A");
        assert_eq!(Endpoint::Output(1).to_string(), "out1");
        assert_eq!(
            CapabilityError::UnsupportedMessage(0x20).to_string(),
            "unsupported operator message 0x0020"
        );
    }
}
