//! The audio task.
//!
//! [`AudioTask`] owns the [`GraphManager`] and is the only code that touches
//! it. Host commands arrive as messages; each background interrupt runs one
//! graph tick. Device I/O around the tick goes through [`HardwareEndpoints`].

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use kestrel_core::{ConnectionId, GraphManager, Terminal, TickReport};
use kestrel_sched::{Context, Message, MessageId, Task, TaskId};

use crate::protocol::{
    FaultNotice, HostCommand, HostResponse, Status, TickSummary, WireTerminal, encode_ids,
};

/// Device side of the graph's host connections.
///
/// Called on the audio task around every tick, so implementations must not
/// block.
pub trait HardwareEndpoints: Send {
    /// Feeds graph inputs before the tick.
    fn before_tick(&mut self, graph: &mut GraphManager) {
        let _ = graph;
    }

    /// Drains graph outputs after the tick.
    fn after_tick(&mut self, graph: &mut GraphManager, report: &TickReport) {
        let _ = (graph, report);
    }
}

/// Counters shared between the audio task and observers on other threads.
#[derive(Debug, Default)]
pub struct AudioStats {
    ticks: AtomicU64,
    faults: AtomicU64,
    commands: AtomicU64,
    dropped: AtomicU64,
}

impl AudioStats {
    /// Graph ticks run.
    pub fn ticks(&self) -> u64 {
        self.ticks.load(Ordering::Relaxed)
    }

    /// Processing faults isolated.
    pub fn faults(&self) -> u64 {
        self.faults.load(Ordering::Relaxed)
    }

    /// Host commands handled, including malformed ones.
    pub fn commands(&self) -> u64 {
        self.commands.load(Ordering::Relaxed)
    }

    /// Responses and fault notices the host mailbox refused.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

/// Task that drives one graph.
pub struct AudioTask {
    graph: GraphManager,
    host: TaskId,
    endpoints: Option<Box<dyn HardwareEndpoints>>,
    stats: Arc<AudioStats>,
    tick_limit: Option<u64>,
}

impl std::fmt::Debug for AudioTask {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AudioTask")
            .field("graph", &self.graph)
            .field("host", &self.host)
            .field("tick_limit", &self.tick_limit)
            .finish_non_exhaustive()
    }
}

impl AudioTask {
    /// Audio task replying to `host`.
    pub fn new(graph: GraphManager, host: TaskId) -> Self {
        Self {
            graph,
            host,
            endpoints: None,
            stats: Arc::new(AudioStats::default()),
            tick_limit: None,
        }
    }

    /// Attaches device I/O.
    pub fn with_endpoints(mut self, endpoints: Box<dyn HardwareEndpoints>) -> Self {
        self.endpoints = Some(endpoints);
        self
    }

    /// Stops the scheduler loop after `limit` ticks.
    pub fn with_tick_limit(mut self, limit: Option<u64>) -> Self {
        self.tick_limit = limit;
        self
    }

    /// Shared counters.
    pub fn stats(&self) -> Arc<AudioStats> {
        Arc::clone(&self.stats)
    }

    /// The graph, for inspection before the task is registered.
    pub fn graph(&self) -> &GraphManager {
        &self.graph
    }

    fn run_tick(&mut self, ctx: &Context<'_>) -> TickReport {
        if let Some(endpoints) = self.endpoints.as_mut() {
            endpoints.before_tick(&mut self.graph);
        }
        let report = self.graph.tick();
        if let Some(endpoints) = self.endpoints.as_mut() {
            endpoints.after_tick(&mut self.graph, &report);
        }
        self.stats.ticks.fetch_add(1, Ordering::Relaxed);
        self.stats
            .faults
            .fetch_add(report.faults.len() as u64, Ordering::Relaxed);

        for fault in &report.faults {
            let notice = FaultNotice {
                instance: fault.instance,
                status: Status::from(&fault.error),
                stopped: fault.stopped.clone(),
            };
            tracing::debug!(
                "fault notice for {}: {} stopped",
                fault.instance,
                notice.stopped.len()
            );
            self.reply(ctx, notice.encode());
        }
        report
    }

    fn execute(&mut self, ctx: &Context<'_>, command: HostCommand) -> Result<Vec<u8>, Status> {
        let graph = &mut self.graph;
        match command {
            HostCommand::CreateOperator {
                capability,
                overrides,
            } => {
                let id = graph
                    .create(capability, &overrides)
                    .map_err(|e| Status::from(&e))?;
                Ok(id.raw().to_le_bytes().to_vec())
            }
            HostCommand::DestroyOperator { instance } => {
                graph.destroy(instance).map_err(|e| Status::from(&e))?;
                Ok(Vec::new())
            }
            HostCommand::Connect {
                source,
                sink,
                capacity,
            } => {
                let capacity = capacity as usize;
                let id = match (source, sink) {
                    (WireTerminal::Host, WireTerminal::Instance { instance, endpoint }) => {
                        graph.connect_host_input(instance, endpoint as usize, capacity)
                    }
                    (WireTerminal::Instance { instance, endpoint }, WireTerminal::Host) => {
                        graph.connect_host_output(instance, endpoint as usize, capacity)
                    }
                    (
                        WireTerminal::Instance {
                            instance: src,
                            endpoint: out,
                        },
                        WireTerminal::Instance {
                            instance: dst,
                            endpoint: input,
                        },
                    ) => graph.connect_capabilities(
                        src,
                        out as usize,
                        dst,
                        input as usize,
                        capacity,
                    ),
                    (WireTerminal::Host, WireTerminal::Host) => {
                        return Err(Status::MalformedCommand);
                    }
                }
                .map_err(|e| Status::from(&e))?;
                Ok(id.raw().to_le_bytes().to_vec())
            }
            HostCommand::Disconnect { connection } => {
                graph.disconnect(connection).map_err(|e| Status::from(&e))?;
                Ok(Vec::new())
            }
            HostCommand::Start { instance } => {
                graph.start(instance).map_err(|e| Status::from(&e))?;
                Ok(Vec::new())
            }
            HostCommand::Stop { instance } => {
                graph.stop(instance).map_err(|e| Status::from(&e))?;
                Ok(Vec::new())
            }
            HostCommand::StartGraph => {
                let started = graph.start_graph().map_err(|e| Status::from(&e))?;
                Ok(encode_ids(&started))
            }
            HostCommand::StopGraph => Ok(encode_ids(&graph.stop_graph())),
            HostCommand::OperatorMessage {
                instance,
                message,
                payload,
            } => graph
                .send_message(instance, message, &payload)
                .map_err(|e| Status::from(&e)),
            HostCommand::Tick => {
                let report = self.run_tick(ctx);
                Ok(TickSummary::from(&report).encode())
            }
            HostCommand::Teardown => {
                graph.teardown().map_err(|e| Status::from(&e))?;
                Ok(Vec::new())
            }
        }
    }

    fn reply(&self, ctx: &Context<'_>, message: Message) {
        if let Err(e) = ctx.post(self.host, message) {
            self.stats.dropped.fetch_add(1, Ordering::Relaxed);
            tracing::warn!("dropped message for host task: {e}");
        }
    }
}

impl Task for AudioTask {
    fn name(&self) -> &str {
        "audio"
    }

    fn init(&mut self, ctx: &mut Context<'_>) {
        tracing::debug!(
            "audio task {} up with {} instance(s), replies to {}",
            ctx.task_id(),
            self.graph.len(),
            self.host
        );
    }

    fn handle(&mut self, ctx: &mut Context<'_>, message: Message) {
        self.stats.commands.fetch_add(1, Ordering::Relaxed);
        let request: MessageId = message.id;
        let response = match HostCommand::decode(&message) {
            Ok(command) => match self.execute(ctx, command) {
                Ok(payload) => HostResponse::ok(request, payload),
                Err(status) => {
                    tracing::debug!("command {request} failed: {status}");
                    HostResponse::error(request, status)
                }
            },
            Err(e) => {
                tracing::warn!("rejected command {request}: {e}");
                HostResponse::error(request, Status::from(&e))
            }
        };
        self.reply(ctx, response.encode());
    }

    fn background(&mut self, ctx: &mut Context<'_>) {
        self.run_tick(ctx);
        if let Some(limit) = self.tick_limit
            && self.stats.ticks() >= limit
        {
            tracing::debug!("tick limit {limit} reached");
            ctx.request_stop();
        }
    }
}

/// Device stand-in: feeds silence to every graph input and discards every
/// graph output.
#[derive(Debug)]
pub struct NullDevice {
    feed: usize,
    counters: Arc<DeviceCounters>,
    scratch: Vec<u8>,
}

/// Byte totals moved by a [`NullDevice`].
#[derive(Debug, Default)]
pub struct DeviceCounters {
    fed: AtomicU64,
    drained: AtomicU64,
}

impl DeviceCounters {
    /// Bytes written into graph inputs.
    pub fn fed(&self) -> u64 {
        self.fed.load(Ordering::Relaxed)
    }

    /// Bytes read out of graph outputs.
    pub fn drained(&self) -> u64 {
        self.drained.load(Ordering::Relaxed)
    }
}

impl NullDevice {
    /// Writes up to `feed` bytes of silence per input per tick.
    pub fn new(feed: usize) -> Self {
        Self {
            feed,
            counters: Arc::new(DeviceCounters::default()),
            scratch: Vec::new(),
        }
    }

    /// Shared byte totals.
    pub fn counters(&self) -> Arc<DeviceCounters> {
        Arc::clone(&self.counters)
    }

    fn host_connections(graph: &GraphManager, host_is_source: bool) -> Vec<ConnectionId> {
        graph
            .connections()
            .filter(|c| {
                if host_is_source {
                    c.source() == Terminal::Host
                } else {
                    c.sink() == Terminal::Host
                }
            })
            .map(|c| c.id())
            .collect()
    }
}

impl HardwareEndpoints for NullDevice {
    fn before_tick(&mut self, graph: &mut GraphManager) {
        for id in Self::host_connections(graph, true) {
            let Ok(mut writer) = graph.host_writer(id) else {
                continue;
            };
            let unit = writer.sample_size().bytes();
            let n = self.feed.min(writer.space()) / unit * unit;
            if n == 0 {
                continue;
            }
            self.scratch.clear();
            self.scratch.resize(n, 0);
            if writer.write(&self.scratch).is_ok() {
                self.counters.fed.fetch_add(n as u64, Ordering::Relaxed);
            }
        }
    }

    fn after_tick(&mut self, graph: &mut GraphManager, _report: &TickReport) {
        for id in Self::host_connections(graph, false) {
            let Ok(mut reader) = graph.host_reader(id) else {
                continue;
            };
            let n = reader.available();
            if n > 0 && reader.discard(n).is_ok() {
                self.counters.drained.fetch_add(n as u64, Ordering::Relaxed);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kestrel_core::CapabilityRegistry;

    #[test]
    fn stats_start_at_zero() {
        let stats = AudioStats::default();
        assert_eq!(
            (stats.ticks(), stats.faults(), stats.commands(), stats.dropped()),
            (0, 0, 0, 0)
        );
    }

    #[test]
    fn null_device_without_host_connections_is_inert() {
        let registry = Arc::new(CapabilityRegistry::builder().build());
        let mut graph = GraphManager::new(registry);
        let mut device = NullDevice::new(64);
        let counters = device.counters();
        device.before_tick(&mut graph);
        device.after_tick(&mut graph, &TickReport::default());
        assert_eq!((counters.fed(), counters.drained()), (0, 0));
    }
}
