//! Scheduler errors.

use crate::message::TaskId;

/// Errors from task registration and message posting.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SchedulerError {
    /// No task is registered under this id.
    #[error("unknown task {0}")]
    UnknownTask(TaskId),

    /// The target mailbox is full; the caller decides whether to retry or drop.
    #[error("mailbox of {0} is full")]
    QueueFull(TaskId),

    /// The task table already holds its maximum number of tasks.
    #[error("task table full ({max} tasks)")]
    TaskTableFull {
        /// Table size.
        max: usize,
    },

    /// A task is already registered under this id.
    #[error("task {0} registered twice")]
    DuplicateTask(TaskId),

    /// The scheduler that owned the mailbox is gone.
    #[error("scheduler for {0} has shut down")]
    Disconnected(TaskId),
}
