//! Capability instances and their lifecycle state machine.
//!
//! ```text
//!            bind (all mandatory)         start            first tick
//! Created ─────────────────────▶ Connected ─────▶ Started ──────────▶ Running
//!    │                              ▲   │            │                  │
//!    │ destroy                rearm │   │ destroy    └──── stop ────────┤
//!    ▼                              │   ▼                               ▼
//! Destroyed ◀────── destroy ─────── Stopped ◀───────────────────────────┘
//! ```
//!
//! Every transition method checks the current state first and returns
//! [`CapabilityError::InvalidState`] without touching anything when the
//! transition is illegal.
//!
//! Unbinding an endpoint never changes the state. A `Connected` instance that
//! lost a mandatory endpoint stays `Connected` but cannot start until it is
//! bound again.

#[cfg(not(feature = "std"))]
use alloc::{boxed::Box, vec, vec::Vec};

use crate::buffer::SampleSize;
use crate::capability::{
    Capability, CapabilityDescriptor, CapabilityError, Endpoint, ProcessIo, ProcessOutcome,
};
use crate::graph::ConnectionId;

/// Identifier of a live capability instance. Never reused within a graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct InstanceId(pub(crate) u32);

impl InstanceId {
    /// Raw id value, as carried on the host protocol.
    pub fn raw(self) -> u32 {
        self.0
    }

    /// Rebuilds an id received from the host.
    pub fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }
}

impl core::fmt::Display for InstanceId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "op{}", self.0)
    }
}

/// Lifecycle state of an instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InstanceState {
    /// Created; mandatory endpoints not all bound.
    Created,
    /// All mandatory endpoints bound; not processing.
    Connected,
    /// Started; becomes `Running` on the next tick.
    Started,
    /// Processing once per tick.
    Running,
    /// Stopped by request or by a fault.
    Stopped,
    /// Released; only observable while the destroy hook runs.
    Destroyed,
}

impl InstanceState {
    /// Whether `process` may be scheduled.
    pub fn is_active(self) -> bool {
        matches!(self, Self::Started | Self::Running)
    }

    /// Whether endpoints may be bound or unbound.
    pub fn accepts_binding(self) -> bool {
        matches!(self, Self::Created | Self::Connected | Self::Stopped)
    }
}

/// One node of the graph: a boxed capability plus lifecycle bookkeeping.
pub struct CapabilityInstance {
    id: InstanceId,
    descriptor: CapabilityDescriptor,
    state: InstanceState,
    config: Vec<u32>,
    capability: Box<dyn Capability>,
    inputs: Vec<Option<ConnectionId>>,
    outputs: Vec<Option<ConnectionId>>,
}

impl core::fmt::Debug for CapabilityInstance {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("CapabilityInstance")
            .field("id", &self.id)
            .field("capability", &self.descriptor.name)
            .field("state", &self.state)
            .field("config", &self.config)
            .field("inputs", &self.inputs)
            .field("outputs", &self.outputs)
            .finish_non_exhaustive()
    }
}

impl CapabilityInstance {
    /// Seeds the configuration from the descriptor defaults, applies
    /// `(index, value)` overrides and runs the factory.
    ///
    /// An override may extend the configuration by at most one word past its
    /// current end.
    pub fn create(
        id: InstanceId,
        descriptor: &CapabilityDescriptor,
        overrides: &[(usize, u32)],
    ) -> Result<Self, CapabilityError> {
        let mut config = descriptor.default_config.to_vec();
        for &(index, value) in overrides {
            match index.cmp(&config.len()) {
                core::cmp::Ordering::Less => config[index] = value,
                core::cmp::Ordering::Equal => config.push(value),
                core::cmp::Ordering::Greater => {
                    return Err(CapabilityError::InvalidConfig(alloc::format!(
                        "override index {index} beyond {} config words",
                        config.len()
                    )));
                }
            }
        }
        let capability = (descriptor.create)(&config)?;
        let mut instance = Self {
            id,
            descriptor: *descriptor,
            state: InstanceState::Created,
            config,
            capability,
            inputs: vec![None; descriptor.layout.inputs],
            outputs: vec![None; descriptor.layout.outputs],
        };
        instance.refresh_connected();
        Ok(instance)
    }

    /// Instance id.
    pub fn id(&self) -> InstanceId {
        self.id
    }

    /// Descriptor this instance was created from.
    pub fn descriptor(&self) -> &CapabilityDescriptor {
        &self.descriptor
    }

    /// Current lifecycle state.
    pub fn state(&self) -> InstanceState {
        self.state
    }

    /// Effective configuration words.
    pub fn config(&self) -> &[u32] {
        &self.config
    }

    /// Connection bound to `endpoint`, if any.
    pub fn binding(&self, endpoint: Endpoint) -> Option<ConnectionId> {
        match endpoint {
            Endpoint::Input(i) => self.inputs.get(i).copied().flatten(),
            Endpoint::Output(i) => self.outputs.get(i).copied().flatten(),
        }
    }

    /// Connections bound to the inputs, by index.
    pub fn input_bindings(&self) -> &[Option<ConnectionId>] {
        &self.inputs
    }

    /// Connections bound to the outputs, by index.
    pub fn output_bindings(&self) -> &[Option<ConnectionId>] {
        &self.outputs
    }

    /// Number of bound endpoints.
    pub fn bound_count(&self) -> usize {
        self.inputs
            .iter()
            .chain(self.outputs.iter())
            .filter(|b| b.is_some())
            .count()
    }

    /// Whether every mandatory endpoint is bound.
    pub fn mandatory_bound(&self) -> bool {
        let layout = self.descriptor.layout;
        self.inputs[..layout.mandatory_inputs.min(self.inputs.len())]
            .iter()
            .chain(self.outputs[..layout.mandatory_outputs.min(self.outputs.len())].iter())
            .all(Option::is_some)
    }

    fn slot_mut(&mut self, endpoint: Endpoint) -> Result<&mut Option<ConnectionId>, CapabilityError> {
        let slot = match endpoint {
            Endpoint::Input(i) => self.inputs.get_mut(i),
            Endpoint::Output(i) => self.outputs.get_mut(i),
        };
        slot.ok_or(CapabilityError::EndpointOutOfRange(endpoint))
    }

    /// `Created -> Connected` once the mandatory set is bound. Unbinding never
    /// moves an instance back; `start` checks the mandatory set instead.
    fn refresh_connected(&mut self) {
        if self.state == InstanceState::Created && self.mandatory_bound() {
            self.state = InstanceState::Connected;
        }
    }

    fn require(&self, legal: &[InstanceState]) -> Result<(), CapabilityError> {
        if legal.contains(&self.state) {
            Ok(())
        } else {
            Err(CapabilityError::InvalidState(self.state))
        }
    }

    /// Checks that `endpoint` could be bound right now, without binding it.
    pub fn check_bind(&self, endpoint: Endpoint) -> Result<(), CapabilityError> {
        self.require(&[
            InstanceState::Created,
            InstanceState::Connected,
            InstanceState::Stopped,
        ])?;
        if !self.descriptor.layout.contains(endpoint) {
            return Err(CapabilityError::EndpointOutOfRange(endpoint));
        }
        Ok(())
    }

    /// Binds `endpoint` to a connection and runs the connect hook.
    ///
    /// A `Stopped` instance stays `Stopped`; it is rearmed separately.
    pub fn bind(
        &mut self,
        endpoint: Endpoint,
        connection: ConnectionId,
        sample_size: SampleSize,
    ) -> Result<(), CapabilityError> {
        self.check_bind(endpoint)?;
        if self.binding(endpoint).is_some() {
            return Err(CapabilityError::InvalidState(self.state));
        }
        self.capability.connect(endpoint, sample_size)?;
        *self.slot_mut(endpoint)? = Some(connection);
        self.refresh_connected();
        Ok(())
    }

    /// Unbinds `endpoint` and runs the disconnect hook.
    ///
    /// Returns the connection that was bound.
    pub fn unbind(&mut self, endpoint: Endpoint) -> Result<Option<ConnectionId>, CapabilityError> {
        self.check_bind(endpoint)?;
        let previous = self.slot_mut(endpoint)?.take();
        if previous.is_some() {
            self.capability.disconnect(endpoint);
        }
        self.refresh_connected();
        Ok(previous)
    }

    /// `Connected -> Started`. Every mandatory endpoint must be bound.
    pub fn start(&mut self) -> Result<(), CapabilityError> {
        self.require(&[InstanceState::Connected])?;
        if !self.mandatory_bound() {
            return Err(CapabilityError::InvalidState(self.state));
        }
        self.capability.start()?;
        self.state = InstanceState::Started;
        Ok(())
    }

    /// `Started -> Running`, taken on the first tick after a start.
    pub fn mark_running(&mut self) -> Result<(), CapabilityError> {
        self.require(&[InstanceState::Started])?;
        self.state = InstanceState::Running;
        Ok(())
    }

    /// `Started/Running -> Stopped`.
    pub fn stop(&mut self) -> Result<(), CapabilityError> {
        self.require(&[InstanceState::Started, InstanceState::Running])?;
        self.capability.stop();
        self.state = InstanceState::Stopped;
        Ok(())
    }

    /// `Stopped -> Connected`, resetting the capability. Requires the
    /// mandatory endpoints to still be bound.
    pub fn rearm(&mut self) -> Result<(), CapabilityError> {
        self.require(&[InstanceState::Stopped])?;
        if !self.mandatory_bound() {
            return Err(CapabilityError::InvalidState(self.state));
        }
        self.capability.reset();
        self.state = InstanceState::Connected;
        Ok(())
    }

    /// Checks that the instance may be destroyed: nothing bound and not
    /// active.
    pub fn check_destroy(&self) -> Result<(), CapabilityError> {
        let bound = self.bound_count();
        if bound > 0 {
            return Err(CapabilityError::StillConnected(bound));
        }
        self.require(&[
            InstanceState::Created,
            InstanceState::Connected,
            InstanceState::Stopped,
        ])
    }

    /// Runs the destroy hook and marks the instance `Destroyed`.
    pub fn destroy(mut self) -> Result<(), (Self, CapabilityError)> {
        if let Err(e) = self.check_destroy() {
            return Err((self, e));
        }
        self.capability.destroy();
        self.state = InstanceState::Destroyed;
        Ok(())
    }

    /// Runs one `process` call. Only legal while `Running`.
    pub fn process(&mut self, io: &mut ProcessIo<'_>) -> Result<ProcessOutcome, CapabilityError> {
        self.require(&[InstanceState::Running])?;
        self.capability.process(io)
    }

    /// Routes a capability-specific operator message.
    pub fn handle_message(&mut self, id: u16, payload: &[u8]) -> Result<Vec<u8>, CapabilityError> {
        self.capability.handle_message(id, payload)
    }
}
