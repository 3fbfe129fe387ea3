//! Task table, mailboxes and the dispatch loop.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crossbeam_channel::{Receiver, Select, Sender, TryRecvError, TrySendError, bounded};

use crate::error::SchedulerError;
use crate::message::{Message, TaskId};
use crate::task::{Context, Task};

/// Default size of the task table.
pub const DEFAULT_MAX_TASKS: usize = 16;

/// Default mailbox depth per task.
pub const DEFAULT_MAILBOX_CAPACITY: usize = 32;

/// Table and mailbox sizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulerConfig {
    /// Maximum number of registered tasks.
    pub max_tasks: usize,
    /// Mailbox depth used by [`SchedulerBuilder::register_task`].
    pub mailbox_capacity: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            max_tasks: DEFAULT_MAX_TASKS,
            mailbox_capacity: DEFAULT_MAILBOX_CAPACITY,
        }
    }
}

/// Counters kept by the dispatch loop.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SchedulerStats {
    /// Messages delivered to handlers.
    pub messages: u64,
    /// Background handler runs.
    pub background_runs: u64,
    /// Times the loop found nothing to do and ran the idle hook.
    pub idle_waits: u64,
}

#[derive(Debug)]
struct Mailbox {
    task: TaskId,
    sender: Sender<Message>,
    bg_pending: AtomicBool,
}

#[derive(Debug)]
struct Shared {
    mailboxes: Vec<Mailbox>,
    wake: Sender<()>,
    stop: AtomicBool,
}

impl Shared {
    fn mailbox(&self, task: TaskId) -> Result<&Mailbox, SchedulerError> {
        self.mailboxes
            .iter()
            .find(|m| m.task == task)
            .ok_or(SchedulerError::UnknownTask(task))
    }

    fn wake(&self) {
        // A full wake channel already guarantees the loop will look again.
        let _ = self.wake.try_send(());
    }
}

/// Cloneable, `Send` access to a running scheduler.
///
/// This is how interrupt-like sources (timer threads, device callbacks,
/// other tasks) feed work in: they post messages or raise background
/// interrupts and never touch task state directly.
#[derive(Debug, Clone)]
pub struct SchedulerHandle {
    shared: Arc<Shared>,
}

impl SchedulerHandle {
    /// Queues `message` on the mailbox of `task`.
    ///
    /// Fails with [`SchedulerError::QueueFull`] when the mailbox is saturated;
    /// nothing is retried.
    pub fn post_message(&self, task: TaskId, message: Message) -> Result<(), SchedulerError> {
        let mailbox = self.shared.mailbox(task)?;
        mailbox.sender.try_send(message).map_err(|e| match e {
            TrySendError::Full(_) => SchedulerError::QueueFull(task),
            TrySendError::Disconnected(_) => SchedulerError::Disconnected(task),
        })
    }

    /// Marks `task` for a background run. Raises coalesce until the handler
    /// runs.
    pub fn raise_bg_int(&self, task: TaskId) -> Result<(), SchedulerError> {
        let mailbox = self.shared.mailbox(task)?;
        if !mailbox.bg_pending.swap(true, Ordering::AcqRel) {
            self.shared.wake();
        }
        Ok(())
    }

    /// Asks [`Scheduler::run_forever`] to return once the current handler
    /// finishes.
    pub fn stop(&self) {
        self.shared.stop.store(true, Ordering::Release);
        self.shared.wake();
    }

    /// Whether a stop has been requested.
    pub fn is_stopping(&self) -> bool {
        self.shared.stop.load(Ordering::Acquire)
    }

    /// Registered task ids, in registration order.
    pub fn tasks(&self) -> impl Iterator<Item = TaskId> + '_ {
        self.shared.mailboxes.iter().map(|m| m.task)
    }
}

struct TaskSlot {
    id: TaskId,
    task: Box<dyn Task>,
    inbox: Receiver<Message>,
}

/// Collects tasks before the table is frozen.
pub struct SchedulerBuilder {
    config: SchedulerConfig,
    tasks: Vec<(TaskSlot, Sender<Message>)>,
    idle_hook: Option<Box<dyn FnMut() + Send>>,
}

impl std::fmt::Debug for SchedulerBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SchedulerBuilder")
            .field("config", &self.config)
            .field("tasks", &self.tasks.len())
            .finish_non_exhaustive()
    }
}

impl SchedulerBuilder {
    /// Builder with the given table sizes.
    pub fn new(config: SchedulerConfig) -> Self {
        Self {
            config,
            tasks: Vec::new(),
            idle_hook: None,
        }
    }

    /// Registers `task` under `id` with the default mailbox depth.
    pub fn register_task(&mut self, id: TaskId, task: Box<dyn Task>) -> Result<TaskId, SchedulerError> {
        let capacity = self.config.mailbox_capacity;
        self.register_task_with_capacity(id, task, capacity)
    }

    /// Registers `task` under `id` with a mailbox of `capacity` messages
    /// (at least one).
    pub fn register_task_with_capacity(
        &mut self,
        id: TaskId,
        task: Box<dyn Task>,
        capacity: usize,
    ) -> Result<TaskId, SchedulerError> {
        if self.tasks.len() >= self.config.max_tasks {
            return Err(SchedulerError::TaskTableFull {
                max: self.config.max_tasks,
            });
        }
        if self.tasks.iter().any(|(slot, _)| slot.id == id) {
            return Err(SchedulerError::DuplicateTask(id));
        }
        let (sender, inbox) = bounded(capacity.max(1));
        tracing::debug!(task = %id, name = task.name(), capacity, "registered task");
        self.tasks.push((TaskSlot { id, task, inbox }, sender));
        Ok(id)
    }

    /// Work to run whenever every mailbox is empty, before the loop waits.
    pub fn idle_hook(&mut self, hook: impl FnMut() + Send + 'static) -> &mut Self {
        self.idle_hook = Some(Box::new(hook));
        self
    }

    /// Freezes the table and runs every task's `init` in registration order.
    pub fn build(self) -> Scheduler {
        let (wake, wake_rx) = bounded(1);
        let mut slots = Vec::with_capacity(self.tasks.len());
        let mut mailboxes = Vec::with_capacity(self.tasks.len());
        for (slot, sender) in self.tasks {
            mailboxes.push(Mailbox {
                task: slot.id,
                sender,
                bg_pending: AtomicBool::new(false),
            });
            slots.push(slot);
        }
        let handle = SchedulerHandle {
            shared: Arc::new(Shared {
                mailboxes,
                wake,
                stop: AtomicBool::new(false),
            }),
        };

        for slot in &mut slots {
            let mut ctx = Context::new(&handle, slot.id);
            slot.task.init(&mut ctx);
        }

        Scheduler {
            slots,
            handle,
            wake_rx,
            cursor: 0,
            idle_hook: self.idle_hook,
            stats: SchedulerStats::default(),
        }
    }
}

/// Single-threaded cooperative dispatcher.
///
/// Each turn picks the next task, in round-robin order starting after the one
/// served last, that has a pending background interrupt or a queued message.
/// It runs exactly one unit of work for it: the background handler if one is
/// pending, otherwise one message. Handlers always run to completion.
///
/// ```rust
/// use kestrel_sched::{Message, MessageId, Scheduler, TaskId, task_fn};
///
/// let mut builder = Scheduler::builder();
/// builder
///     .register_task(TaskId(1), Box::new(task_fn("log", |ctx, msg| {
///         if msg.id == MessageId(0xFF) {
///             ctx.request_stop();
///         }
///     })))
///     .unwrap();
/// let mut sched = builder.build();
/// sched.post_message(TaskId(1), Message::empty(MessageId(1))).unwrap();
/// sched.post_message(TaskId(1), Message::empty(MessageId(0xFF))).unwrap();
/// sched.run_forever();
/// assert_eq!(sched.stats().messages, 2);
/// ```
pub struct Scheduler {
    slots: Vec<TaskSlot>,
    handle: SchedulerHandle,
    wake_rx: Receiver<()>,
    cursor: usize,
    idle_hook: Option<Box<dyn FnMut() + Send>>,
    stats: SchedulerStats,
}

impl std::fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scheduler")
            .field("tasks", &self.slots.len())
            .field("stats", &self.stats)
            .finish_non_exhaustive()
    }
}

impl Scheduler {
    /// Builder with default table sizes.
    pub fn builder() -> SchedulerBuilder {
        SchedulerBuilder::new(SchedulerConfig::default())
    }

    /// Sendable handle for posting from elsewhere.
    pub fn handle(&self) -> SchedulerHandle {
        self.handle.clone()
    }

    /// See [`SchedulerHandle::post_message`].
    pub fn post_message(&self, task: TaskId, message: Message) -> Result<(), SchedulerError> {
        self.handle.post_message(task, message)
    }

    /// See [`SchedulerHandle::raise_bg_int`].
    pub fn raise_bg_int(&self, task: TaskId) -> Result<(), SchedulerError> {
        self.handle.raise_bg_int(task)
    }

    /// See [`SchedulerHandle::stop`].
    pub fn stop(&self) {
        self.handle.stop();
    }

    /// Number of registered tasks.
    pub fn task_count(&self) -> usize {
        self.slots.len()
    }

    /// Loop counters.
    pub fn stats(&self) -> SchedulerStats {
        self.stats
    }

    /// Runs one unit of work. Returns `false` if nothing was pending.
    pub fn run_once(&mut self) -> bool {
        let count = self.slots.len();
        for step in 0..count {
            let index = (self.cursor + step) % count;
            if self.service(index) {
                self.cursor = (index + 1) % count;
                return true;
            }
        }
        false
    }

    /// Runs until no message or background interrupt is pending, or a stop
    /// is requested. Returns the units of work done.
    pub fn run_until_idle(&mut self) -> usize {
        let mut done = 0;
        while !self.handle.is_stopping() && self.run_once() {
            done += 1;
        }
        done
    }

    /// Dispatches until [`stop`](SchedulerHandle::stop) is called.
    ///
    /// When every mailbox is empty the idle hook runs and the loop blocks until
    /// a message arrives, a background interrupt is raised or a stop is
    /// requested. The stop flag is cleared on return so the loop can be
    /// entered again.
    pub fn run_forever(&mut self) {
        tracing::debug!(tasks = self.slots.len(), "scheduler loop started");
        while !self.handle.is_stopping() {
            if self.run_once() {
                continue;
            }
            self.stats.idle_waits += 1;
            if let Some(hook) = self.idle_hook.as_mut() {
                hook();
            }
            if self.handle.is_stopping() {
                break;
            }
            self.wait();
        }
        self.handle.shared.stop.store(false, Ordering::Release);
        tracing::debug!(stats = ?self.stats, "scheduler loop stopped");
    }

    /// Blocks until any mailbox or the wake channel has something.
    fn wait(&self) {
        let mut select = Select::new();
        for slot in &self.slots {
            select.recv(&slot.inbox);
        }
        let wake = select.recv(&self.wake_rx);
        if select.ready() == wake {
            loop {
                match self.wake_rx.try_recv() {
                    Ok(()) => {}
                    Err(TryRecvError::Empty | TryRecvError::Disconnected) => break,
                }
            }
        }
    }

    /// One unit of work for slot `index`, if it has any.
    fn service(&mut self, index: usize) -> bool {
        let Self {
            slots,
            handle,
            stats,
            ..
        } = self;
        let handle = &*handle;
        let slot = &mut slots[index];
        let mailbox = &handle.shared.mailboxes[index];

        if mailbox.bg_pending.swap(false, Ordering::AcqRel) {
            tracing::trace!(task = %slot.id, "background");
            let mut ctx = Context::new(handle, slot.id);
            slot.task.background(&mut ctx);
            stats.background_runs += 1;
            return true;
        }

        match slot.inbox.try_recv() {
            Ok(message) => {
                tracing::trace!(task = %slot.id, message = %message.id, "dispatch");
                let mut ctx = Context::new(handle, slot.id);
                slot.task.handle(&mut ctx, message);
                stats.messages += 1;
                true
            }
            Err(TryRecvError::Empty | TryRecvError::Disconnected) => false,
        }
    }
}
