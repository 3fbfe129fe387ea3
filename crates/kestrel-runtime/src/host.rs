//! Host side of the control protocol.
//!
//! [`HostTask`] is the scheduler task the audio task replies to. It decodes
//! replies and fault notices and forwards them over a channel to a
//! [`HostLink`], which lives wherever the host logic runs. [`Runtime`] wires
//! both tasks into one scheduler for the common single-graph setup.

use std::collections::VecDeque;
use std::sync::Arc;

use crossbeam_channel::{Receiver, Sender, TryRecvError, unbounded};
use kestrel_core::{CapabilityError, GraphError, GraphManager};
use kestrel_sched::{
    Context, Message, MessageId, Scheduler, SchedulerBuilder, SchedulerConfig, SchedulerError,
    SchedulerHandle, SchedulerStats, Task, TaskId,
};

use crate::audio::{AudioStats, AudioTask, HardwareEndpoints};
use crate::protocol::{
    FaultNotice, HostCommand, HostResponse, ProtocolError, Status, TickSummary, msg,
};

/// Default id of the audio task.
pub const DEFAULT_AUDIO_TASK: TaskId = TaskId(1);

/// Default id of the host task.
pub const DEFAULT_HOST_TASK: TaskId = TaskId(2);

/// Errors seen by host code driving a [`Runtime`].
#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
    /// Posting to a task failed.
    #[error(transparent)]
    Scheduler(#[from] SchedulerError),

    /// A reply could not be decoded.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// A graph operation failed while building the runtime.
    #[error(transparent)]
    Graph(#[from] GraphError),

    /// A capability operation failed while building the runtime.
    #[error(transparent)]
    Capability(#[from] CapabilityError),

    /// The audio task answered with an error status.
    #[error("command {request} failed: {status}")]
    Status {
        /// Command that failed.
        request: MessageId,
        /// Reported status.
        status: Status,
    },

    /// The scheduler went idle without answering.
    #[error("no response to command {0}")]
    NoResponse(MessageId),

    /// The host task is gone.
    #[error("host link closed")]
    LinkClosed,
}

/// Something the audio task sent the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostEvent {
    /// Reply to a command.
    Response(HostResponse),
    /// Unsolicited fault notice.
    Fault(FaultNotice),
}

/// Scheduler task that receives everything the audio task sends the host.
#[derive(Debug)]
pub struct HostTask {
    events: Sender<HostEvent>,
}

impl HostTask {
    /// Host task plus the link that receives its events.
    pub fn new() -> (Self, HostLink) {
        let (events, rx) = unbounded();
        (
            Self { events },
            HostLink {
                events: rx,
                faults: VecDeque::new(),
            },
        )
    }

    fn decode(message: &Message) -> Result<HostEvent, ProtocolError> {
        match message.id {
            msg::RESPONSE => HostResponse::decode(&message.payload).map(HostEvent::Response),
            msg::OPERATOR_FAULT => FaultNotice::decode(&message.payload).map(HostEvent::Fault),
            other => Err(ProtocolError::UnknownCommand(other)),
        }
    }
}

impl Task for HostTask {
    fn name(&self) -> &str {
        "host"
    }

    fn handle(&mut self, _ctx: &mut Context<'_>, message: Message) {
        match Self::decode(&message) {
            Ok(event) => {
                if let HostEvent::Fault(notice) = &event {
                    tracing::warn!(
                        "instance {} faulted ({}), {} instance(s) stopped",
                        notice.instance,
                        notice.status,
                        notice.stopped.len()
                    );
                }
                if self.events.send(event).is_err() {
                    tracing::warn!("host link dropped, discarding {}", message.id);
                }
            }
            Err(e) => tracing::warn!("host task ignored message {}: {e}", message.id),
        }
    }
}

/// Receiving end of a [`HostTask`].
#[derive(Debug)]
pub struct HostLink {
    events: Receiver<HostEvent>,
    faults: VecDeque<FaultNotice>,
}

impl HostLink {
    /// Next pending response. Fault notices received on the way are kept for
    /// [`take_faults`](Self::take_faults).
    pub fn try_response(&mut self) -> Result<Option<HostResponse>, RuntimeError> {
        loop {
            match self.events.try_recv() {
                Ok(HostEvent::Response(response)) => return Ok(Some(response)),
                Ok(HostEvent::Fault(notice)) => self.faults.push_back(notice),
                Err(TryRecvError::Empty) => return Ok(None),
                Err(TryRecvError::Disconnected) => return Err(RuntimeError::LinkClosed),
            }
        }
    }

    /// Every fault notice received so far, oldest first.
    pub fn take_faults(&mut self) -> Vec<FaultNotice> {
        while let Ok(event) = self.events.try_recv() {
            match event {
                HostEvent::Fault(notice) => self.faults.push_back(notice),
                HostEvent::Response(response) => {
                    tracing::debug!("discarding unclaimed response to {}", response.request);
                }
            }
        }
        self.faults.drain(..).collect()
    }

    /// The raw event channel, for hosts running on their own thread.
    pub fn events(&self) -> &Receiver<HostEvent> {
        &self.events
    }
}

/// How a [`Runtime`] is laid out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RuntimeOptions {
    /// Task table and mailbox sizes.
    pub scheduler: SchedulerConfig,
    /// Id of the audio task.
    pub audio_task: TaskId,
    /// Id of the host task.
    pub host_task: TaskId,
    /// Stop the loop after this many ticks.
    pub tick_limit: Option<u64>,
}

impl Default for RuntimeOptions {
    fn default() -> Self {
        Self {
            scheduler: SchedulerConfig::default(),
            audio_task: DEFAULT_AUDIO_TASK,
            host_task: DEFAULT_HOST_TASK,
            tick_limit: None,
        }
    }
}

/// One scheduler running an audio task and a host task.
///
/// Extra peer tasks can be added through [`RuntimeBuilder::register_task`].
#[derive(Debug)]
pub struct Runtime {
    scheduler: Scheduler,
    link: HostLink,
    stats: Arc<AudioStats>,
    audio: TaskId,
    host: TaskId,
}

/// Staged [`Runtime`] that still accepts peer tasks.
#[derive(Debug)]
pub struct RuntimeBuilder {
    builder: SchedulerBuilder,
    link: HostLink,
    stats: Arc<AudioStats>,
    audio: TaskId,
    host: TaskId,
}

impl RuntimeBuilder {
    /// Registers an additional task.
    pub fn register_task(
        mut self,
        id: TaskId,
        task: Box<dyn Task>,
    ) -> Result<Self, RuntimeError> {
        self.builder.register_task(id, task)?;
        Ok(self)
    }

    /// Finishes registration and runs every task's `init`.
    pub fn build(self) -> Runtime {
        Runtime {
            scheduler: self.builder.build(),
            link: self.link,
            stats: self.stats,
            audio: self.audio,
            host: self.host,
        }
    }
}

impl Runtime {
    /// Runtime around `graph` with no device I/O.
    pub fn new(graph: GraphManager, options: RuntimeOptions) -> Result<Self, RuntimeError> {
        Ok(Self::builder(AudioTask::new(graph, options.host_task), options)?.build())
    }

    /// Runtime around `graph` with device I/O.
    pub fn with_endpoints(
        graph: GraphManager,
        endpoints: Box<dyn HardwareEndpoints>,
        options: RuntimeOptions,
    ) -> Result<Self, RuntimeError> {
        let audio = AudioTask::new(graph, options.host_task).with_endpoints(endpoints);
        Ok(Self::builder(audio, options)?.build())
    }

    /// Registers the audio and host tasks and returns the builder for
    /// further peers.
    pub fn builder(audio: AudioTask, options: RuntimeOptions) -> Result<RuntimeBuilder, RuntimeError> {
        let audio = audio.with_tick_limit(options.tick_limit);
        let stats = audio.stats();
        let (host, link) = HostTask::new();
        let mut builder = SchedulerBuilder::new(options.scheduler);
        builder.register_task(options.audio_task, Box::new(audio))?;
        builder.register_task(options.host_task, Box::new(host))?;
        Ok(RuntimeBuilder {
            builder,
            link,
            stats,
            audio: options.audio_task,
            host: options.host_task,
        })
    }

    /// Id of the audio task.
    pub fn audio_task(&self) -> TaskId {
        self.audio
    }

    /// Id of the host task.
    pub fn host_task(&self) -> TaskId {
        self.host
    }

    /// Sendable scheduler handle.
    pub fn handle(&self) -> SchedulerHandle {
        self.scheduler.handle()
    }

    /// Audio task counters.
    pub fn stats(&self) -> Arc<AudioStats> {
        Arc::clone(&self.stats)
    }

    /// Scheduler counters.
    pub fn scheduler_stats(&self) -> SchedulerStats {
        self.scheduler.stats()
    }

    /// Posts `command` to the audio task without waiting.
    pub fn post(&self, command: &HostCommand) -> Result<(), RuntimeError> {
        Ok(self.scheduler.post_message(self.audio, command.encode())?)
    }

    /// Sends `command`, runs the scheduler until idle and returns the reply.
    pub fn call(&mut self, command: &HostCommand) -> Result<HostResponse, RuntimeError> {
        let request = command.message_id();
        self.post(command)?;
        self.scheduler.run_until_idle();
        self.link
            .try_response()?
            .ok_or(RuntimeError::NoResponse(request))
    }

    /// Like [`call`](Self::call), but turns an error status into
    /// [`RuntimeError::Status`] and returns only the reply body.
    pub fn call_ok(&mut self, command: &HostCommand) -> Result<Vec<u8>, RuntimeError> {
        let response = self.call(command)?;
        if response.status.is_ok() {
            Ok(response.payload)
        } else {
            Err(RuntimeError::Status {
                request: response.request,
                status: response.status,
            })
        }
    }

    /// Runs one tick through the protocol.
    pub fn tick(&mut self) -> Result<TickSummary, RuntimeError> {
        let payload = self.call_ok(&HostCommand::Tick)?;
        Ok(TickSummary::decode(&payload)?)
    }

    /// Raises the audio task's background interrupt.
    pub fn kick(&self) -> Result<(), RuntimeError> {
        Ok(self.scheduler.raise_bg_int(self.audio)?)
    }

    /// Dispatches until nothing is pending.
    pub fn run_until_idle(&mut self) -> usize {
        self.scheduler.run_until_idle()
    }

    /// Runs the scheduler loop until stopped.
    pub fn run_forever(&mut self) {
        self.scheduler.run_forever();
    }

    /// Fault notices delivered so far.
    pub fn take_faults(&mut self) -> Vec<FaultNotice> {
        self.link.take_faults()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kestrel_core::CapabilityRegistry;

    fn empty_graph() -> GraphManager {
        GraphManager::new(Arc::new(CapabilityRegistry::builder().build()))
    }

    #[test]
    fn tick_on_empty_graph() {
        let mut rt = Runtime::new(empty_graph(), RuntimeOptions::default()).unwrap();
        assert_eq!(rt.tick().unwrap(), TickSummary::default());
        assert_eq!(rt.stats().ticks(), 1);
        assert_eq!(rt.stats().commands(), 1);
    }

    #[test]
    fn same_task_ids_are_rejected() {
        let options = RuntimeOptions {
            host_task: DEFAULT_AUDIO_TASK,
            ..RuntimeOptions::default()
        };
        let err = Runtime::new(empty_graph(), options).unwrap_err();
        assert!(matches!(
            err,
            RuntimeError::Scheduler(SchedulerError::DuplicateTask(_))
        ));
    }

    #[test]
    fn unknown_message_to_host_task_is_ignored() {
        let mut rt = Runtime::new(empty_graph(), RuntimeOptions::default()).unwrap();
        rt.handle()
            .post_message(rt.host_task(), Message::empty(MessageId(0x7777)))
            .unwrap();
        rt.run_until_idle();
        assert!(rt.take_faults().is_empty());
    }

    #[test]
    fn malformed_command_gets_error_status() {
        let mut rt = Runtime::new(empty_graph(), RuntimeOptions::default()).unwrap();
        rt.handle()
            .post_message(rt.audio_task(), Message::new(msg::START, vec![1]))
            .unwrap();
        rt.run_until_idle();
        let response = rt.link.try_response().unwrap().unwrap();
        assert_eq!(response.request, msg::START);
        assert_eq!(response.status, Status::MalformedCommand);
    }
}
