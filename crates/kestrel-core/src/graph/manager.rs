//! The graph manager: instance ownership, connections and ticks.

#[cfg(not(feature = "std"))]
use alloc::{boxed::Box, vec::Vec};

use alloc::sync::Arc;

use super::connection::{Connection, ConnectionId, Terminal};
use super::order;
use crate::buffer::{Buffer, HeapAllocator, RegionAllocator, SampleSize};
use crate::capability::{
    CapabilityError, CapabilityId, Endpoint, InputPort, OutputPort, ProcessIo, ProcessOutcome,
    opmsg,
};
use crate::instance::{CapabilityInstance, InstanceId, InstanceState};
use crate::registry::CapabilityRegistry;

/// Default limit on live instances.
pub const DEFAULT_MAX_INSTANCES: usize = 64;

/// Largest buffer capacity in bytes. Buffer cursors run over
/// `0..2 * capacity`, which must not overflow.
pub const MAX_CAPACITY: usize = isize::MAX as usize / 2;

/// Errors from graph-level operations.
#[derive(Debug, Clone, PartialEq)]
pub enum GraphError {
    /// `to` can already reach `from`, so `from -> to` would close a cycle.
    CycleDetected {
        /// Producer of the rejected edge.
        from: InstanceId,
        /// Consumer of the rejected edge.
        to: InstanceId,
    },
    /// The endpoint already has a connection.
    EndpointAlreadyBound {
        /// Instance owning the endpoint.
        instance: InstanceId,
        /// The endpoint.
        endpoint: Endpoint,
    },
    /// No live connection has this id.
    UnknownConnection(ConnectionId),
    /// Producer and consumer disagree on sample granularity.
    FormatMismatch {
        /// Producer granularity.
        source: SampleSize,
        /// Consumer granularity.
        sink: SampleSize,
    },
    /// Buffer capacity is zero, above [`MAX_CAPACITY`], or not a whole
    /// number of samples.
    InvalidCapacity {
        /// Requested capacity in bytes.
        capacity: usize,
        /// Required granularity.
        sample_size: SampleSize,
    },
    /// The region allocator could not supply the buffer.
    OutOfMemory {
        /// Requested capacity in bytes.
        requested: usize,
    },
    /// The connection does not have the host on the requested side.
    NotHostTerminal(ConnectionId),
    /// A lifecycle operation on one of the instances failed.
    Capability(CapabilityError),
}

impl From<CapabilityError> for GraphError {
    fn from(e: CapabilityError) -> Self {
        Self::Capability(e)
    }
}

impl core::fmt::Display for GraphError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::CycleDetected { from, to } => {
                write!(f, "connecting {from} to {to} would create a cycle")
            }
            Self::EndpointAlreadyBound { instance, endpoint } => {
                write!(f, "endpoint {instance}.{endpoint} is already bound")
            }
            Self::UnknownConnection(id) => write!(f, "connection {id} not found"),
            Self::FormatMismatch { source, sink } => {
                write!(f, "producer emits {source} samples but consumer expects {sink}")
            }
            Self::InvalidCapacity {
                capacity,
                sample_size,
            } => write!(f, "invalid capacity {capacity} for {sample_size} samples"),
            Self::OutOfMemory { requested } => {
                write!(f, "no memory for a {requested}-byte buffer")
            }
            Self::NotHostTerminal(id) => write!(f, "connection {id} has no host terminal there"),
            Self::Capability(e) => write!(f, "{e}"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for GraphError {}

/// A `process` failure isolated during a tick.
#[derive(Debug, Clone, PartialEq)]
pub struct Fault {
    /// The instance whose `process` failed.
    pub instance: InstanceId,
    /// What it returned.
    pub error: CapabilityError,
    /// Instances stopped as a result, failing instance first.
    pub stopped: Vec<InstanceId>,
}

/// Summary of one [`GraphManager::tick`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TickReport {
    /// Instances moved from `Started` to `Running`.
    pub promoted: usize,
    /// `process` calls that moved data.
    pub processed: usize,
    /// `process` calls that had nothing to do.
    pub idle: usize,
    /// Bytes consumed across all instances.
    pub consumed: usize,
    /// Bytes produced across all instances.
    pub produced: usize,
    /// Windows left open by a capability and closed by the manager.
    pub reclaimed_windows: usize,
    /// Faults isolated this tick.
    pub faults: Vec<Fault>,
}

/// Owns every capability instance and every connection buffer.
///
/// Mutations and ticks all happen on the audio task, so nothing here is
/// shared or locked. Other components refer to instances and connections by
/// id only.
///
/// Ids are handed out in creation order and never reused, so a stale id
/// reports `UnknownInstance` or `UnknownConnection` instead of reaching a
/// newer object. The slot tables therefore grow with the total number of
/// instances and connections ever made, not with the live count; the live
/// counts themselves are tracked separately and cost nothing to read.
///
/// # Usage
///
/// 1. Create instances with [`create()`](Self::create)
/// 2. Wire them with [`connect_capabilities()`](Self::connect_capabilities),
///    [`connect_host_input()`](Self::connect_host_input) and
///    [`connect_host_output()`](Self::connect_host_output)
/// 3. [`start_graph()`](Self::start_graph)
/// 4. Call [`tick()`](Self::tick) once per audio period
/// 5. [`stop_graph()`](Self::stop_graph) or [`teardown()`](Self::teardown)
pub struct GraphManager {
    registry: Arc<CapabilityRegistry>,
    allocator: Box<dyn RegionAllocator>,
    instances: Vec<Option<CapabilityInstance>>,
    connections: Vec<Option<Connection>>,
    live_instances: usize,
    live_connections: usize,
    max_instances: usize,
    order: Vec<InstanceId>,
    order_dirty: bool,
    scratch_inputs: Vec<Option<Buffer>>,
    scratch_outputs: Vec<Option<Buffer>>,
}

impl core::fmt::Debug for GraphManager {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("GraphManager")
            .field("instances", &self.len())
            .field("connections", &self.connection_count())
            .field("max_instances", &self.max_instances)
            .finish_non_exhaustive()
    }
}

impl GraphManager {
    /// Manager with heap-backed buffers.
    pub fn new(registry: Arc<CapabilityRegistry>) -> Self {
        Self::with_allocator(registry, HeapAllocator)
    }

    /// Manager drawing buffers from `allocator`.
    pub fn with_allocator(
        registry: Arc<CapabilityRegistry>,
        allocator: impl RegionAllocator + 'static,
    ) -> Self {
        Self {
            registry,
            allocator: Box::new(allocator),
            instances: Vec::new(),
            connections: Vec::new(),
            live_instances: 0,
            live_connections: 0,
            max_instances: DEFAULT_MAX_INSTANCES,
            order: Vec::new(),
            order_dirty: false,
            scratch_inputs: Vec::new(),
            scratch_outputs: Vec::new(),
        }
    }

    /// Sets the live-instance limit.
    pub fn with_max_instances(mut self, max_instances: usize) -> Self {
        self.max_instances = max_instances;
        self
    }

    /// The capability table instances are created from.
    pub fn registry(&self) -> &CapabilityRegistry {
        &self.registry
    }

    /// Instantiates capability `cap` with `(index, value)` config overrides.
    pub fn create(
        &mut self,
        cap: CapabilityId,
        overrides: &[(usize, u32)],
    ) -> Result<InstanceId, CapabilityError> {
        let descriptor = *self
            .registry
            .get(cap)
            .ok_or(CapabilityError::UnknownCapability(cap))?;
        if self.len() >= self.max_instances {
            return Err(CapabilityError::TooManyInstances(self.max_instances));
        }
        let id = u32::try_from(self.instances.len())
            .map(InstanceId)
            .map_err(|_| CapabilityError::TooManyInstances(self.max_instances))?;
        let instance = CapabilityInstance::create(id, &descriptor, overrides)?;
        self.instances.push(Some(instance));
        self.live_instances += 1;
        self.order_dirty = true;
        #[cfg(feature = "tracing")]
        tracing::debug!("create: {id} as {} ({cap})", descriptor.name);
        Ok(id)
    }

    /// The live instance `id`.
    pub fn instance(&self, id: InstanceId) -> Option<&CapabilityInstance> {
        self.instances.get(id.index()).and_then(Option::as_ref)
    }

    fn instance_mut(&mut self, id: InstanceId) -> Result<&mut CapabilityInstance, CapabilityError> {
        self.instances
            .get_mut(id.index())
            .and_then(Option::as_mut)
            .ok_or(CapabilityError::UnknownInstance(id))
    }

    /// Lifecycle state of `id`.
    pub fn state(&self, id: InstanceId) -> Result<InstanceState, CapabilityError> {
        self.instance(id)
            .map(CapabilityInstance::state)
            .ok_or(CapabilityError::UnknownInstance(id))
    }

    /// Live instance ids, ascending.
    pub fn instance_ids(&self) -> impl Iterator<Item = InstanceId> + '_ {
        self.instances.iter().flatten().map(CapabilityInstance::id)
    }

    /// Number of live instances.
    pub fn len(&self) -> usize {
        self.live_instances
    }

    /// Returns `true` if there are no live instances.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of live instances of capability `cap`.
    pub fn instance_count(&self, cap: CapabilityId) -> usize {
        self.instances
            .iter()
            .flatten()
            .filter(|i| i.descriptor().id == cap)
            .count()
    }

    /// `Connected -> Started`.
    pub fn start(&mut self, id: InstanceId) -> Result<(), CapabilityError> {
        self.instance_mut(id)?.start()?;
        #[cfg(feature = "tracing")]
        tracing::debug!("start: {id}");
        Ok(())
    }

    /// `Started/Running -> Stopped`.
    pub fn stop(&mut self, id: InstanceId) -> Result<(), CapabilityError> {
        self.instance_mut(id)?.stop()?;
        #[cfg(feature = "tracing")]
        tracing::debug!("stop: {id}");
        Ok(())
    }

    /// Releases an instance with no bound endpoints.
    pub fn destroy(&mut self, id: InstanceId) -> Result<(), CapabilityError> {
        let slot = self
            .instances
            .get_mut(id.index())
            .ok_or(CapabilityError::UnknownInstance(id))?;
        let instance = slot.take().ok_or(CapabilityError::UnknownInstance(id))?;
        if let Err((instance, e)) = instance.destroy() {
            *slot = Some(instance);
            return Err(e);
        }
        self.live_instances -= 1;
        self.order_dirty = true;
        #[cfg(feature = "tracing")]
        tracing::debug!("destroy: {id}");
        Ok(())
    }

    /// Delivers an operator message to `id` and returns the reply payload.
    ///
    /// The messages in [`opmsg`] are answered here for every capability; all
    /// other ids go to the capability's own handler. State does not matter.
    pub fn send_message(
        &mut self,
        id: InstanceId,
        message: u16,
        payload: &[u8],
    ) -> Result<Vec<u8>, CapabilityError> {
        let instance = self.instance_mut(id)?;
        match message {
            opmsg::GET_CAPABILITY_VERSION => {
                let (major, minor) = instance.descriptor().version;
                let mut reply = Vec::with_capacity(4);
                reply.extend_from_slice(&major.to_le_bytes());
                reply.extend_from_slice(&minor.to_le_bytes());
                Ok(reply)
            }
            opmsg::GET_CONFIG => Ok(instance
                .config()
                .iter()
                .flat_map(|w| w.to_le_bytes())
                .collect()),
            _ => instance.handle_message(message, payload),
        }
    }

    /// Connection `id`, if live.
    pub fn connection(&self, id: ConnectionId) -> Option<&Connection> {
        self.connections.get(id.index()).and_then(Option::as_ref)
    }

    /// Live connections, ascending by id.
    pub fn connections(&self) -> impl Iterator<Item = &Connection> {
        self.connections.iter().flatten()
    }

    /// Number of live connections.
    pub fn connection_count(&self) -> usize {
        self.live_connections
    }

    fn edges(&self) -> Vec<(InstanceId, InstanceId)> {
        self.connections().filter_map(Connection::edge).collect()
    }

    fn allocate_buffer(
        &mut self,
        capacity: usize,
        sample_size: SampleSize,
    ) -> Result<Buffer, GraphError> {
        if capacity == 0 || capacity > MAX_CAPACITY || !sample_size.is_aligned(capacity) {
            return Err(GraphError::InvalidCapacity {
                capacity,
                sample_size,
            });
        }
        let region = self
            .allocator
            .allocate(capacity)
            .ok_or(GraphError::OutOfMemory {
                requested: capacity,
            })?;
        Ok(Buffer::new(region, sample_size))
    }

    /// Validates one instance terminal and returns its granularity.
    fn check_terminal(&self, instance: InstanceId, endpoint: Endpoint) -> Result<SampleSize, GraphError> {
        let inst = self
            .instance(instance)
            .ok_or(CapabilityError::UnknownInstance(instance))?;
        inst.check_bind(endpoint)?;
        if inst.binding(endpoint).is_some() {
            return Err(GraphError::EndpointAlreadyBound { instance, endpoint });
        }
        Ok(inst.descriptor().sample_size)
    }

    fn insert_connection(
        &mut self,
        source: Terminal,
        sink: Terminal,
        buffer: Buffer,
    ) -> Result<ConnectionId, GraphError> {
        let id = ConnectionId(self.connections.len() as u32);
        let sample_size = buffer.sample_size();
        let mut bound = None;
        for terminal in [source, sink] {
            if let Terminal::Instance(instance, endpoint) = terminal {
                let result = self.instance_mut(instance)?.bind(endpoint, id, sample_size);
                if let Err(e) = result {
                    if let Some((prev, prev_ep)) = bound
                        && let Ok(inst) = self.instance_mut(prev)
                    {
                        let _ = inst.unbind(prev_ep);
                    }
                    return Err(e.into());
                }
                bound = Some((instance, endpoint));
            }
        }
        self.connections.push(Some(Connection {
            id,
            source,
            sink,
            buffer: Some(buffer),
        }));
        self.live_connections += 1;
        self.order_dirty = true;
        #[cfg(feature = "tracing")]
        tracing::debug!("connect: {source} → {sink} as {id}");
        Ok(id)
    }

    /// Binds a caller-supplied buffer to one endpoint of `instance`. The
    /// other end of the buffer belongs to the host.
    pub fn connect(
        &mut self,
        instance: InstanceId,
        endpoint: Endpoint,
        buffer: Buffer,
    ) -> Result<ConnectionId, GraphError> {
        let expected = self.check_terminal(instance, endpoint)?;
        if buffer.sample_size() != expected {
            let (source, sink) = if endpoint.is_input() {
                (buffer.sample_size(), expected)
            } else {
                (expected, buffer.sample_size())
            };
            return Err(GraphError::FormatMismatch { source, sink });
        }
        let terminal = Terminal::Instance(instance, endpoint);
        if endpoint.is_input() {
            self.insert_connection(Terminal::Host, terminal, buffer)
        } else {
            self.insert_connection(terminal, Terminal::Host, buffer)
        }
    }

    /// Feeds input `input` of `dst` from the host through a new buffer.
    pub fn connect_host_input(
        &mut self,
        dst: InstanceId,
        input: usize,
        capacity: usize,
    ) -> Result<ConnectionId, GraphError> {
        let sample_size = self.check_terminal(dst, Endpoint::Input(input))?;
        let buffer = self.allocate_buffer(capacity, sample_size)?;
        self.connect(dst, Endpoint::Input(input), buffer)
    }

    /// Drains output `output` of `src` to the host through a new buffer.
    pub fn connect_host_output(
        &mut self,
        src: InstanceId,
        output: usize,
        capacity: usize,
    ) -> Result<ConnectionId, GraphError> {
        let sample_size = self.check_terminal(src, Endpoint::Output(output))?;
        let buffer = self.allocate_buffer(capacity, sample_size)?;
        self.connect(src, Endpoint::Output(output), buffer)
    }

    /// Connects output `src_out` of `src` to input `dst_in` of `dst` through
    /// a new `capacity`-byte buffer.
    ///
    /// Rejected with [`GraphError::CycleDetected`] if `dst` already reaches
    /// `src`; the graph is unchanged on every error path.
    pub fn connect_capabilities(
        &mut self,
        src: InstanceId,
        src_out: usize,
        dst: InstanceId,
        dst_in: usize,
        capacity: usize,
    ) -> Result<ConnectionId, GraphError> {
        let source = self.check_terminal(src, Endpoint::Output(src_out))?;
        let sink = self.check_terminal(dst, Endpoint::Input(dst_in))?;
        if source != sink {
            return Err(GraphError::FormatMismatch { source, sink });
        }
        if order::reaches(dst, src, &self.edges()) {
            return Err(GraphError::CycleDetected { from: src, to: dst });
        }
        let buffer = self.allocate_buffer(capacity, source)?;
        self.insert_connection(
            Terminal::Instance(src, Endpoint::Output(src_out)),
            Terminal::Instance(dst, Endpoint::Input(dst_in)),
            buffer,
        )
    }

    /// Removes a connection and frees its buffer.
    ///
    /// Neither instance side may be `Started` or `Running`.
    pub fn disconnect(&mut self, id: ConnectionId) -> Result<(), GraphError> {
        let conn = self.connection(id).ok_or(GraphError::UnknownConnection(id))?;
        let terminals = [conn.source, conn.sink];
        for terminal in terminals {
            if let Terminal::Instance(instance, endpoint) = terminal {
                self.instance(instance)
                    .ok_or(CapabilityError::UnknownInstance(instance))?
                    .check_bind(endpoint)?;
            }
        }
        for terminal in terminals {
            if let Terminal::Instance(instance, endpoint) = terminal {
                self.instance_mut(instance)?.unbind(endpoint)?;
            }
        }
        self.connections[id.index()] = None;
        self.live_connections -= 1;
        self.order_dirty = true;
        #[cfg(feature = "tracing")]
        tracing::debug!("disconnect: {id}");
        Ok(())
    }

    /// Host-side writer for a graph input.
    pub fn host_writer(&mut self, id: ConnectionId) -> Result<OutputPort<'_>, GraphError> {
        let conn = self
            .connections
            .get_mut(id.index())
            .and_then(Option::as_mut)
            .ok_or(GraphError::UnknownConnection(id))?;
        if conn.source != Terminal::Host {
            return Err(GraphError::NotHostTerminal(id));
        }
        conn.buffer
            .as_mut()
            .map(OutputPort::new)
            .ok_or(GraphError::UnknownConnection(id))
    }

    /// Host-side reader for a graph output.
    pub fn host_reader(&mut self, id: ConnectionId) -> Result<InputPort<'_>, GraphError> {
        let conn = self
            .connections
            .get_mut(id.index())
            .and_then(Option::as_mut)
            .ok_or(GraphError::UnknownConnection(id))?;
        if conn.sink != Terminal::Host {
            return Err(GraphError::NotHostTerminal(id));
        }
        conn.buffer
            .as_mut()
            .map(InputPort::new)
            .ok_or(GraphError::UnknownConnection(id))
    }

    fn refresh_order(&mut self) {
        if self.order_dirty {
            let nodes: Vec<InstanceId> = self.instance_ids().collect();
            self.order = order::topological_order(&nodes, &self.edges());
            self.order_dirty = false;
        }
    }

    /// Producers before consumers; ties by ascending id.
    pub fn topological_order(&mut self) -> Vec<InstanceId> {
        self.refresh_order();
        self.order.clone()
    }

    /// Starts every connected instance in topological order and returns the
    /// ids started.
    ///
    /// `Stopped` instances whose mandatory endpoints are still bound are
    /// rearmed first. Instances that are still `Created`, `Connected` with a
    /// mandatory endpoint unbound, or already active are skipped. If any start
    /// fails, the instances started by this call are stopped again in reverse
    /// order and the error is returned.
    pub fn start_graph(&mut self) -> Result<Vec<InstanceId>, GraphError> {
        let order = self.topological_order();
        let mut started = Vec::new();
        for id in order {
            let Some(instance) = self.instances.get_mut(id.index()).and_then(Option::as_mut) else {
                continue;
            };
            if instance.state() == InstanceState::Stopped && instance.mandatory_bound() {
                instance.rearm()?;
            }
            if instance.state() != InstanceState::Connected || !instance.mandatory_bound() {
                continue;
            }
            if let Err(e) = instance.start() {
                #[cfg(feature = "tracing")]
                tracing::warn!("start_graph: {id} failed to start: {e}");
                for &prev in started.iter().rev() {
                    let _ = self.stop(prev);
                }
                return Err(e.into());
            }
            started.push(id);
        }
        #[cfg(feature = "tracing")]
        tracing::debug!("start_graph: started {} instance(s)", started.len());
        Ok(started)
    }

    /// Stops every active instance in reverse topological order and returns
    /// the ids stopped.
    pub fn stop_graph(&mut self) -> Vec<InstanceId> {
        let order = self.topological_order();
        let mut stopped = Vec::new();
        for id in order.into_iter().rev() {
            if let Ok(instance) = self.instance_mut(id)
                && instance.state().is_active()
                && instance.stop().is_ok()
            {
                stopped.push(id);
            }
        }
        #[cfg(feature = "tracing")]
        tracing::debug!("stop_graph: stopped {} instance(s)", stopped.len());
        stopped
    }

    /// Stops everything, disconnects leaf to root and destroys every
    /// instance.
    pub fn teardown(&mut self) -> Result<(), GraphError> {
        self.stop_graph();
        let order = self.topological_order();
        for id in order.iter().rev() {
            let Some(instance) = self.instance(*id) else {
                continue;
            };
            let bound: Vec<ConnectionId> = instance
                .input_bindings()
                .iter()
                .chain(instance.output_bindings())
                .flatten()
                .copied()
                .collect();
            for conn in bound {
                self.disconnect(conn)?;
            }
        }
        for id in order {
            self.destroy(id)?;
        }
        Ok(())
    }

    /// Runs one `process` on every active instance in topological order.
    ///
    /// `Started` instances become `Running` and are processed in the same
    /// tick. Buffer shortfalls count as idle. Any other error stops the
    /// failing instance plus everything downstream of it and is recorded in
    /// [`TickReport::faults`]; the rest of the graph keeps going.
    pub fn tick(&mut self) -> TickReport {
        let mut report = TickReport::default();
        self.refresh_order();
        let order = core::mem::take(&mut self.order);

        for &id in &order {
            let Some(instance) = self.instances.get_mut(id.index()).and_then(Option::as_mut) else {
                continue;
            };
            match instance.state() {
                InstanceState::Started => {
                    let _ = instance.mark_running();
                    report.promoted += 1;
                }
                InstanceState::Running => {}
                _ => continue,
            }

            match self.process_one(id, &mut report) {
                Ok(outcome) if outcome == ProcessOutcome::idle() => report.idle += 1,
                Ok(outcome) => {
                    report.processed += 1;
                    report.consumed += outcome.consumed;
                    report.produced += outcome.produced;
                }
                Err(CapabilityError::Buffer(e)) if e.is_shortfall() => report.idle += 1,
                Err(error) => {
                    let stopped = self.isolate_fault(id, &order);
                    #[cfg(feature = "tracing")]
                    tracing::warn!("tick: {id} faulted ({error}); stopped {stopped:?}");
                    report.faults.push(Fault {
                        instance: id,
                        error,
                        stopped,
                    });
                }
            }
        }

        self.order = order;
        report
    }

    /// Lends the instance its buffers for one `process` call, then takes
    /// them back and closes any window the capability leaked.
    fn process_one(
        &mut self,
        id: InstanceId,
        report: &mut TickReport,
    ) -> Result<ProcessOutcome, CapabilityError> {
        let Self {
            instances,
            connections,
            scratch_inputs,
            scratch_outputs,
            ..
        } = self;
        let instance = instances
            .get_mut(id.index())
            .and_then(Option::as_mut)
            .ok_or(CapabilityError::UnknownInstance(id))?;

        lend(connections, instance.input_bindings(), scratch_inputs);
        lend(connections, instance.output_bindings(), scratch_outputs);
        let result = {
            let mut io = ProcessIo::new(scratch_inputs, scratch_outputs);
            instance.process(&mut io)
        };
        report.reclaimed_windows += reclaim(connections, instance.input_bindings(), scratch_inputs);
        report.reclaimed_windows +=
            reclaim(connections, instance.output_bindings(), scratch_outputs);
        result
    }

    fn isolate_fault(&mut self, id: InstanceId, order: &[InstanceId]) -> Vec<InstanceId> {
        let affected = order::downstream(id, &self.edges());
        let mut stopped = Vec::new();
        if self.stop(id).is_ok() {
            stopped.push(id);
        }
        for &other in order {
            if other != id && affected.contains(&other) && self.stop(other).is_ok() {
                stopped.push(other);
            }
        }
        stopped
    }
}

fn lend(
    connections: &mut [Option<Connection>],
    bindings: &[Option<ConnectionId>],
    scratch: &mut Vec<Option<Buffer>>,
) {
    scratch.clear();
    scratch.extend(bindings.iter().map(|binding| {
        binding.and_then(|c| {
            connections
                .get_mut(c.index())
                .and_then(Option::as_mut)
                .and_then(|conn| conn.buffer.take())
        })
    }));
}

fn reclaim(
    connections: &mut [Option<Connection>],
    bindings: &[Option<ConnectionId>],
    scratch: &mut Vec<Option<Buffer>>,
) -> usize {
    let mut leaked = 0;
    for (binding, slot) in bindings.iter().zip(scratch.drain(..)) {
        if let (Some(c), Some(mut buffer)) = (binding, slot) {
            if buffer.reclaim_windows() {
                #[cfg(feature = "tracing")]
                tracing::warn!("closed a mapped window leaked on {c}");
                leaked += 1;
            }
            if let Some(conn) = connections.get_mut(c.index()).and_then(Option::as_mut) {
                conn.buffer = Some(buffer);
            }
        }
    }
    leaked
}
