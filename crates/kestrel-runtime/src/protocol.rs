//! Host control protocol.
//!
//! Commands travel from the host task to the audio task as scheduler
//! [`Message`]s; every command is answered by exactly one
//! [`RESPONSE`](msg::RESPONSE). Processing faults are pushed to the host
//! unsolicited as [`OPERATOR_FAULT`](msg::OPERATOR_FAULT).
//!
//! All integers are little-endian.
//!
//! | Command             | Payload                                                  |
//! |---------------------|----------------------------------------------------------|
//! | `CREATE_OPERATOR`   | `cap: u16, n: u16, n × (index: u16, value: u32)`         |
//! | `DESTROY_OPERATOR`  | `instance: u32`                                          |
//! | `CONNECT`           | `source: terminal, sink: terminal, capacity: u32`        |
//! | `DISCONNECT`        | `connection: u32`                                        |
//! | `START` / `STOP`    | `instance: u32`                                          |
//! | `OPERATOR_MESSAGE`  | `instance: u32, message: u16, body...`                   |
//! | others              | empty                                                    |
//!
//! A terminal is `instance: u32, endpoint: u16`, with instance
//! [`HOST_TERMINAL`] standing for the host side.
//!
//! Responses are `request: u16, status: u16, body...`.

use kestrel_core::{
    BufferError, CapabilityError, CapabilityId, ConnectionId, GraphError, InstanceId, TickReport,
};
use kestrel_sched::{Message, MessageId};

/// Message ids of the host protocol.
pub mod msg {
    use kestrel_sched::MessageId;

    /// Create an instance. Reply body: `instance: u32`.
    pub const CREATE_OPERATOR: MessageId = MessageId(0x0100);
    /// Destroy a disconnected instance.
    pub const DESTROY_OPERATOR: MessageId = MessageId(0x0101);
    /// Create a connection. Reply body: `connection: u32`.
    pub const CONNECT: MessageId = MessageId(0x0102);
    /// Remove a connection.
    pub const DISCONNECT: MessageId = MessageId(0x0103);
    /// Start one instance.
    pub const START: MessageId = MessageId(0x0104);
    /// Stop one instance.
    pub const STOP: MessageId = MessageId(0x0105);
    /// Start every connected instance. Reply body: started ids, `u32` each.
    pub const START_GRAPH: MessageId = MessageId(0x0106);
    /// Stop every active instance. Reply body: stopped ids, `u32` each.
    pub const STOP_GRAPH: MessageId = MessageId(0x0107);
    /// Deliver an operator message. Reply body: the operator's reply.
    pub const OPERATOR_MESSAGE: MessageId = MessageId(0x0108);
    /// Run one graph tick now. Reply body: [`TickSummary`](super::TickSummary).
    pub const TICK: MessageId = MessageId(0x0109);
    /// Stop, disconnect and destroy everything.
    pub const TEARDOWN: MessageId = MessageId(0x010A);
    /// Reply to any command.
    pub const RESPONSE: MessageId = MessageId(0x0200);
    /// Unsolicited fault notification.
    pub const OPERATOR_FAULT: MessageId = MessageId(0x0201);
}

/// Instance field value meaning "the host side of the connection".
pub const HOST_TERMINAL: u32 = u32::MAX;

/// Decoding failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProtocolError {
    /// The payload ended early.
    #[error("payload truncated: needed {needed} more byte(s) at offset {offset}")]
    Truncated {
        /// Offset of the field that did not fit.
        offset: usize,
        /// Bytes missing.
        needed: usize,
    },

    /// Bytes were left after the last field.
    #[error("{0} trailing byte(s) after payload")]
    TrailingBytes(usize),

    /// The message id is not a host command.
    #[error("unknown command {0}")]
    UnknownCommand(MessageId),

    /// The status code is not defined.
    #[error("unknown status code {0}")]
    UnknownStatus(u16),

    /// A connection must have an instance on at least one side.
    #[error("connection between two host terminals")]
    HostToHost,
}

/// One side of a connection on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WireTerminal {
    /// The host or hardware side.
    Host,
    /// An instance endpoint: an output when used as a source, an input when
    /// used as a sink.
    Instance {
        /// The instance.
        instance: InstanceId,
        /// Endpoint index.
        endpoint: u16,
    },
}

/// A decoded host command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostCommand {
    /// Instantiate `capability` with `(index, value)` config overrides.
    CreateOperator {
        /// Class to instantiate.
        capability: CapabilityId,
        /// Config word overrides.
        overrides: Vec<(usize, u32)>,
    },
    /// Destroy an instance.
    DestroyOperator {
        /// Target.
        instance: InstanceId,
    },
    /// Create a connection with a new buffer.
    Connect {
        /// Producer side.
        source: WireTerminal,
        /// Consumer side.
        sink: WireTerminal,
        /// Buffer capacity in bytes.
        capacity: u32,
    },
    /// Remove a connection.
    Disconnect {
        /// Target.
        connection: ConnectionId,
    },
    /// Start one instance.
    Start {
        /// Target.
        instance: InstanceId,
    },
    /// Stop one instance.
    Stop {
        /// Target.
        instance: InstanceId,
    },
    /// Start the whole graph.
    StartGraph,
    /// Stop the whole graph.
    StopGraph,
    /// Deliver an operator message.
    OperatorMessage {
        /// Target.
        instance: InstanceId,
        /// Operator message id.
        message: u16,
        /// Message body.
        payload: Vec<u8>,
    },
    /// Run one tick.
    Tick,
    /// Tear the graph down.
    Teardown,
}

impl HostCommand {
    /// Message id this command travels under.
    pub fn message_id(&self) -> MessageId {
        match self {
            Self::CreateOperator { .. } => msg::CREATE_OPERATOR,
            Self::DestroyOperator { .. } => msg::DESTROY_OPERATOR,
            Self::Connect { .. } => msg::CONNECT,
            Self::Disconnect { .. } => msg::DISCONNECT,
            Self::Start { .. } => msg::START,
            Self::Stop { .. } => msg::STOP,
            Self::StartGraph => msg::START_GRAPH,
            Self::StopGraph => msg::STOP_GRAPH,
            Self::OperatorMessage { .. } => msg::OPERATOR_MESSAGE,
            Self::Tick => msg::TICK,
            Self::Teardown => msg::TEARDOWN,
        }
    }

    /// Encodes the command as a scheduler message.
    pub fn encode(&self) -> Message {
        let mut out = Vec::new();
        match self {
            Self::CreateOperator {
                capability,
                overrides,
            } => {
                put_u16(&mut out, capability.0);
                put_u16(&mut out, overrides.len() as u16);
                for &(index, value) in overrides {
                    put_u16(&mut out, index as u16);
                    put_u32(&mut out, value);
                }
            }
            Self::DestroyOperator { instance }
            | Self::Start { instance }
            | Self::Stop { instance } => put_u32(&mut out, instance.raw()),
            Self::Connect {
                source,
                sink,
                capacity,
            } => {
                put_terminal(&mut out, *source);
                put_terminal(&mut out, *sink);
                put_u32(&mut out, *capacity);
            }
            Self::Disconnect { connection } => put_u32(&mut out, connection.raw()),
            Self::OperatorMessage {
                instance,
                message,
                payload,
            } => {
                put_u32(&mut out, instance.raw());
                put_u16(&mut out, *message);
                out.extend_from_slice(payload);
            }
            Self::StartGraph | Self::StopGraph | Self::Tick | Self::Teardown => {}
        }
        Message::new(self.message_id(), out)
    }

    /// Decodes a scheduler message.
    pub fn decode(message: &Message) -> Result<Self, ProtocolError> {
        let mut r = Reader::new(&message.payload);
        let command = match message.id {
            msg::CREATE_OPERATOR => {
                let capability = CapabilityId(r.u16()?);
                let count = r.u16()?;
                let mut overrides = Vec::with_capacity(count as usize);
                for _ in 0..count {
                    let index = r.u16()? as usize;
                    overrides.push((index, r.u32()?));
                }
                Self::CreateOperator {
                    capability,
                    overrides,
                }
            }
            msg::DESTROY_OPERATOR => Self::DestroyOperator {
                instance: r.instance()?,
            },
            msg::CONNECT => {
                let source = r.terminal()?;
                let sink = r.terminal()?;
                if source == WireTerminal::Host && sink == WireTerminal::Host {
                    return Err(ProtocolError::HostToHost);
                }
                Self::Connect {
                    source,
                    sink,
                    capacity: r.u32()?,
                }
            }
            msg::DISCONNECT => Self::Disconnect {
                connection: ConnectionId::from_raw(r.u32()?),
            },
            msg::START => Self::Start {
                instance: r.instance()?,
            },
            msg::STOP => Self::Stop {
                instance: r.instance()?,
            },
            msg::START_GRAPH => Self::StartGraph,
            msg::STOP_GRAPH => Self::StopGraph,
            msg::OPERATOR_MESSAGE => Self::OperatorMessage {
                instance: r.instance()?,
                message: r.u16()?,
                payload: r.rest().to_vec(),
            },
            msg::TICK => Self::Tick,
            msg::TEARDOWN => Self::Teardown,
            other => return Err(ProtocolError::UnknownCommand(other)),
        };
        r.finish()?;
        Ok(command)
    }
}

/// Result code carried by every response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum Status {
    /// Success.
    Ok = 0,
    /// [`CapabilityError::UnknownCapability`]
    UnknownCapability = 1,
    /// [`CapabilityError::UnknownInstance`]
    UnknownInstance = 2,
    /// [`CapabilityError::InvalidState`]
    InvalidState = 3,
    /// [`CapabilityError::EndpointOutOfRange`]
    EndpointOutOfRange = 4,
    /// [`CapabilityError::StillConnected`]
    StillConnected = 5,
    /// [`CapabilityError::ProcessingFault`]
    ProcessingFault = 6,
    /// [`CapabilityError::InvalidConfig`]
    InvalidConfig = 7,
    /// [`CapabilityError::UnsupportedMessage`]
    UnsupportedMessage = 8,
    /// [`CapabilityError::TooManyInstances`]
    TooManyInstances = 9,
    /// [`BufferError::InsufficientSpace`]
    InsufficientSpace = 10,
    /// [`BufferError::InsufficientData`]
    InsufficientData = 11,
    /// [`BufferError::WindowAlreadyOpen`]
    WindowAlreadyOpen = 12,
    /// [`BufferError::Misaligned`] or [`BufferError::InvalidCommit`]
    BufferMisuse = 13,
    /// [`GraphError::CycleDetected`]
    CycleDetected = 14,
    /// [`GraphError::EndpointAlreadyBound`]
    EndpointAlreadyBound = 15,
    /// [`GraphError::UnknownConnection`]
    UnknownConnection = 16,
    /// [`GraphError::FormatMismatch`]
    FormatMismatch = 17,
    /// [`GraphError::InvalidCapacity`]
    InvalidCapacity = 18,
    /// [`GraphError::OutOfMemory`]
    OutOfMemory = 19,
    /// [`GraphError::NotHostTerminal`]
    NotHostTerminal = 20,
    /// The command payload could not be decoded.
    MalformedCommand = 21,
    /// The message id is not a command.
    UnknownCommand = 22,
}

impl Status {
    const ALL: [Status; 23] = [
        Status::Ok,
        Status::UnknownCapability,
        Status::UnknownInstance,
        Status::InvalidState,
        Status::EndpointOutOfRange,
        Status::StillConnected,
        Status::ProcessingFault,
        Status::InvalidConfig,
        Status::UnsupportedMessage,
        Status::TooManyInstances,
        Status::InsufficientSpace,
        Status::InsufficientData,
        Status::WindowAlreadyOpen,
        Status::BufferMisuse,
        Status::CycleDetected,
        Status::EndpointAlreadyBound,
        Status::UnknownConnection,
        Status::FormatMismatch,
        Status::InvalidCapacity,
        Status::OutOfMemory,
        Status::NotHostTerminal,
        Status::MalformedCommand,
        Status::UnknownCommand,
    ];

    /// Wire code.
    pub fn code(self) -> u16 {
        self as u16
    }

    /// Status for a wire code.
    pub fn from_code(code: u16) -> Result<Self, ProtocolError> {
        Self::ALL
            .get(code as usize)
            .copied()
            .ok_or(ProtocolError::UnknownStatus(code))
    }

    /// Returns `true` for [`Status::Ok`].
    pub fn is_ok(self) -> bool {
        self == Self::Ok
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{self:?} ({})", self.code())
    }
}

impl From<&BufferError> for Status {
    fn from(e: &BufferError) -> Self {
        match e {
            BufferError::InsufficientSpace { .. } => Self::InsufficientSpace,
            BufferError::InsufficientData { .. } => Self::InsufficientData,
            BufferError::WindowAlreadyOpen => Self::WindowAlreadyOpen,
            BufferError::Misaligned { .. } | BufferError::InvalidCommit { .. } => {
                Self::BufferMisuse
            }
        }
    }
}

impl From<&CapabilityError> for Status {
    fn from(e: &CapabilityError) -> Self {
        match e {
            CapabilityError::UnknownCapability(_) => Self::UnknownCapability,
            CapabilityError::UnknownInstance(_) => Self::UnknownInstance,
            CapabilityError::InvalidState(_) => Self::InvalidState,
            CapabilityError::EndpointOutOfRange(_) => Self::EndpointOutOfRange,
            CapabilityError::StillConnected(_) => Self::StillConnected,
            CapabilityError::ProcessingFault(_) => Self::ProcessingFault,
            CapabilityError::InvalidConfig(_) => Self::InvalidConfig,
            CapabilityError::UnsupportedMessage(_) => Self::UnsupportedMessage,
            CapabilityError::TooManyInstances(_) => Self::TooManyInstances,
            CapabilityError::Buffer(b) => b.into(),
        }
    }
}

impl From<&GraphError> for Status {
    fn from(e: &GraphError) -> Self {
        match e {
            GraphError::CycleDetected { .. } => Self::CycleDetected,
            GraphError::EndpointAlreadyBound { .. } => Self::EndpointAlreadyBound,
            GraphError::UnknownConnection(_) => Self::UnknownConnection,
            GraphError::FormatMismatch { .. } => Self::FormatMismatch,
            GraphError::InvalidCapacity { .. } => Self::InvalidCapacity,
            GraphError::OutOfMemory { .. } => Self::OutOfMemory,
            GraphError::NotHostTerminal(_) => Self::NotHostTerminal,
            GraphError::Capability(c) => c.into(),
        }
    }
}

impl From<&ProtocolError> for Status {
    fn from(e: &ProtocolError) -> Self {
        match e {
            ProtocolError::UnknownCommand(_) => Self::UnknownCommand,
            _ => Self::MalformedCommand,
        }
    }
}

/// Reply to one command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostResponse {
    /// Id of the command being answered.
    pub request: MessageId,
    /// Outcome.
    pub status: Status,
    /// Result body; empty on error.
    pub payload: Vec<u8>,
}

impl HostResponse {
    /// Successful reply.
    pub fn ok(request: MessageId, payload: Vec<u8>) -> Self {
        Self {
            request,
            status: Status::Ok,
            payload,
        }
    }

    /// Failed reply.
    pub fn error(request: MessageId, status: Status) -> Self {
        Self {
            request,
            status,
            payload: Vec::new(),
        }
    }

    /// Encodes as a [`msg::RESPONSE`] message.
    pub fn encode(&self) -> Message {
        let mut out = Vec::with_capacity(4 + self.payload.len());
        put_u16(&mut out, self.request.0);
        put_u16(&mut out, self.status.code());
        out.extend_from_slice(&self.payload);
        Message::new(msg::RESPONSE, out)
    }

    /// Decodes the body of a [`msg::RESPONSE`] message.
    pub fn decode(payload: &[u8]) -> Result<Self, ProtocolError> {
        let mut r = Reader::new(payload);
        let request = MessageId(r.u16()?);
        let status = Status::from_code(r.u16()?)?;
        Ok(Self {
            request,
            status,
            payload: r.rest().to_vec(),
        })
    }

    /// Body read as a list of `u32` ids.
    pub fn ids(&self) -> Result<Vec<u32>, ProtocolError> {
        let mut r = Reader::new(&self.payload);
        let mut ids = Vec::with_capacity(self.payload.len() / 4);
        while !r.is_empty() {
            ids.push(r.u32()?);
        }
        Ok(ids)
    }
}

/// Unsolicited notice that an instance faulted during a tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FaultNotice {
    /// Instance whose `process` failed.
    pub instance: InstanceId,
    /// Error class.
    pub status: Status,
    /// Every instance stopped as a result, failing one first.
    pub stopped: Vec<InstanceId>,
}

impl FaultNotice {
    /// Encodes as a [`msg::OPERATOR_FAULT`] message.
    pub fn encode(&self) -> Message {
        let mut out = Vec::with_capacity(8 + 4 * self.stopped.len());
        put_u32(&mut out, self.instance.raw());
        put_u16(&mut out, self.status.code());
        put_u16(&mut out, self.stopped.len() as u16);
        for id in &self.stopped {
            put_u32(&mut out, id.raw());
        }
        Message::new(msg::OPERATOR_FAULT, out)
    }

    /// Decodes the body of a [`msg::OPERATOR_FAULT`] message.
    pub fn decode(payload: &[u8]) -> Result<Self, ProtocolError> {
        let mut r = Reader::new(payload);
        let instance = r.instance()?;
        let status = Status::from_code(r.u16()?)?;
        let count = r.u16()?;
        let mut stopped = Vec::with_capacity(count as usize);
        for _ in 0..count {
            stopped.push(r.instance()?);
        }
        r.finish()?;
        Ok(Self {
            instance,
            status,
            stopped,
        })
    }
}

/// Counters from one tick, as sent in the [`msg::TICK`] reply.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickSummary {
    /// Instances promoted to `Running`.
    pub promoted: u32,
    /// `process` calls that moved data.
    pub processed: u32,
    /// `process` calls with nothing to do.
    pub idle: u32,
    /// Bytes consumed.
    pub consumed: u32,
    /// Bytes produced.
    pub produced: u32,
    /// Faults isolated.
    pub faults: u32,
}

impl From<&TickReport> for TickSummary {
    fn from(report: &TickReport) -> Self {
        Self {
            promoted: report.promoted as u32,
            processed: report.processed as u32,
            idle: report.idle as u32,
            consumed: report.consumed as u32,
            produced: report.produced as u32,
            faults: report.faults.len() as u32,
        }
    }
}

impl TickSummary {
    /// Six `u32` fields in declaration order.
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(24);
        for v in [
            self.promoted,
            self.processed,
            self.idle,
            self.consumed,
            self.produced,
            self.faults,
        ] {
            put_u32(&mut out, v);
        }
        out
    }

    /// Inverse of [`encode`](Self::encode).
    pub fn decode(payload: &[u8]) -> Result<Self, ProtocolError> {
        let mut r = Reader::new(payload);
        let summary = Self {
            promoted: r.u32()?,
            processed: r.u32()?,
            idle: r.u32()?,
            consumed: r.u32()?,
            produced: r.u32()?,
            faults: r.u32()?,
        };
        r.finish()?;
        Ok(summary)
    }
}

/// Encodes a list of instance ids as `u32`s.
pub fn encode_ids(ids: &[InstanceId]) -> Vec<u8> {
    let mut out = Vec::with_capacity(4 * ids.len());
    for id in ids {
        put_u32(&mut out, id.raw());
    }
    out
}

fn put_u16(out: &mut Vec<u8>, v: u16) {
    out.extend_from_slice(&v.to_le_bytes());
}

fn put_u32(out: &mut Vec<u8>, v: u32) {
    out.extend_from_slice(&v.to_le_bytes());
}

fn put_terminal(out: &mut Vec<u8>, terminal: WireTerminal) {
    match terminal {
        WireTerminal::Host => {
            put_u32(out, HOST_TERMINAL);
            put_u16(out, 0);
        }
        WireTerminal::Instance { instance, endpoint } => {
            put_u32(out, instance.raw());
            put_u16(out, endpoint);
        }
    }
}

/// Little-endian field reader over a payload.
struct Reader<'a> {
    bytes: &'a [u8],
    offset: usize,
}

impl<'a> Reader<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, offset: 0 }
    }

    fn take<const N: usize>(&mut self) -> Result<[u8; N], ProtocolError> {
        let end = self.offset + N;
        let slice = self
            .bytes
            .get(self.offset..end)
            .ok_or(ProtocolError::Truncated {
                offset: self.offset,
                needed: end - self.bytes.len().max(self.offset),
            })?;
        let mut out = [0u8; N];
        out.copy_from_slice(slice);
        self.offset = end;
        Ok(out)
    }

    fn u16(&mut self) -> Result<u16, ProtocolError> {
        self.take::<2>().map(u16::from_le_bytes)
    }

    fn u32(&mut self) -> Result<u32, ProtocolError> {
        self.take::<4>().map(u32::from_le_bytes)
    }

    fn instance(&mut self) -> Result<InstanceId, ProtocolError> {
        self.u32().map(InstanceId::from_raw)
    }

    fn terminal(&mut self) -> Result<WireTerminal, ProtocolError> {
        let instance = self.u32()?;
        let endpoint = self.u16()?;
        Ok(if instance == HOST_TERMINAL {
            WireTerminal::Host
        } else {
            WireTerminal::Instance {
                instance: InstanceId::from_raw(instance),
                endpoint,
            }
        })
    }

    fn rest(&mut self) -> &'a [u8] {
        let rest = &self.bytes[self.offset.min(self.bytes.len())..];
        self.offset = self.bytes.len();
        rest
    }

    fn is_empty(&self) -> bool {
        self.offset >= self.bytes.len()
    }

    fn finish(self) -> Result<(), ProtocolError> {
        match self.bytes.len().saturating_sub(self.offset) {
            0 => Ok(()),
            n => Err(ProtocolError::TrailingBytes(n)),
        }
    }
}
