//! Kestrel Sched - cooperative task scheduler
//!
//! A fixed table of tasks, one bounded FIFO mailbox per task, and a
//! single-threaded run-to-completion loop:
//!
//! - [`Task`] - handler set of one schedulable unit (`init`, `handle`,
//!   `background`)
//! - [`Scheduler`] - owns the task table and dispatches one message or one
//!   background run per turn, round-robin across tasks
//! - [`SchedulerHandle`] - `Send + Clone` entry point for everything outside
//!   the loop: post messages, raise background interrupts, stop
//!
//! Messages to one task are delivered in the order they were posted. There is
//! no ordering across tasks and no priority. A full mailbox is reported to the
//! sender as [`SchedulerError::QueueFull`]; the scheduler never retries.
//!
//! ## Example
//!
//! ```rust
//! use kestrel_sched::{Message, MessageId, Scheduler, TaskId, task_fn};
//!
//! let mut builder = Scheduler::builder();
//! builder
//!     .register_task(TaskId(1), Box::new(task_fn("worker", |ctx, msg| {
//!         println!("{} got {}", ctx.task_id(), msg.id);
//!     })))
//!     .unwrap();
//! let mut sched = builder.build();
//! sched.post_message(TaskId(1), Message::empty(MessageId(1))).unwrap();
//! assert_eq!(sched.run_until_idle(), 1);
//! ```

pub mod error;
pub mod message;
pub mod scheduler;
pub mod task;

pub use error::SchedulerError;
pub use message::{Message, MessageId, TaskId};
pub use scheduler::{
    DEFAULT_MAILBOX_CAPACITY, DEFAULT_MAX_TASKS, Scheduler, SchedulerBuilder, SchedulerConfig,
    SchedulerHandle, SchedulerStats,
};
pub use task::{Context, FnTask, Task, task_fn};
