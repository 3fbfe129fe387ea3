//! The task abstraction.
//!
//! A task is a unit the scheduler dispatches to. Tasks are registered once at
//! startup and live as long as the scheduler. Every handler runs to completion
//! on the scheduler thread, so a handler that blocks stalls every other task.

use crate::error::SchedulerError;
use crate::message::{Message, TaskId};
use crate::scheduler::SchedulerHandle;

/// What a task sees while one of its handlers runs.
#[derive(Debug)]
pub struct Context<'a> {
    handle: &'a SchedulerHandle,
    task: TaskId,
}

impl<'a> Context<'a> {
    pub(crate) fn new(handle: &'a SchedulerHandle, task: TaskId) -> Self {
        Self { handle, task }
    }

    /// Id of the task whose handler is running.
    pub fn task_id(&self) -> TaskId {
        self.task
    }

    /// Queues `message` for task `to`. Posting to the running task is allowed;
    /// the message is handled on a later turn.
    pub fn post(&self, to: TaskId, message: Message) -> Result<(), SchedulerError> {
        self.handle.post_message(to, message)
    }

    /// Flags task `to` for a background run.
    pub fn raise_bg_int(&self, to: TaskId) -> Result<(), SchedulerError> {
        self.handle.raise_bg_int(to)
    }

    /// Makes the scheduler loop return after the current handler.
    pub fn request_stop(&self) {
        self.handle.stop();
    }

    /// Sendable handle to the scheduler, for work that outlives the handler.
    pub fn handle(&self) -> &SchedulerHandle {
        self.handle
    }
}

/// A schedulable unit.
///
/// Only [`handle`](Task::handle) is required.
pub trait Task: Send {
    /// Name used in logs.
    fn name(&self) -> &str {
        "task"
    }

    /// Runs once, in registration order, before any message is delivered.
    fn init(&mut self, ctx: &mut Context<'_>) {
        let _ = ctx;
    }

    /// Handles one message.
    fn handle(&mut self, ctx: &mut Context<'_>, message: Message);

    /// Runs once per batch of background interrupts raised for this task.
    fn background(&mut self, ctx: &mut Context<'_>) {
        let _ = ctx;
    }
}

/// A task built from a closure; see [`task_fn`].
pub struct FnTask<F> {
    name: &'static str,
    handler: F,
}

impl<F> std::fmt::Debug for FnTask<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnTask").field("name", &self.name).finish()
    }
}

impl<F> Task for FnTask<F>
where
    F: FnMut(&mut Context<'_>, Message) + Send,
{
    fn name(&self) -> &str {
        self.name
    }

    fn handle(&mut self, ctx: &mut Context<'_>, message: Message) {
        (self.handler)(ctx, message);
    }
}

/// Wraps a message handler closure as a task.
///
/// ```rust
/// use kestrel_sched::{MessageId, Scheduler, TaskId, task_fn};
///
/// let mut builder = Scheduler::builder();
/// builder
///     .register_task(TaskId(1), Box::new(task_fn("echo", |_ctx, msg| {
///         assert_eq!(msg.id, MessageId(7));
///     })))
///     .unwrap();
/// ```
pub fn task_fn<F>(name: &'static str, handler: F) -> FnTask<F>
where
    F: FnMut(&mut Context<'_>, Message) + Send,
{
    FnTask { name, handler }
}
