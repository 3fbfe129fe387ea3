//! Kestrel Runtime - the audio task and its host control protocol
//!
//! A [`GraphManager`](kestrel_core::GraphManager) is only ever touched from
//! one scheduler task, the [`AudioTask`]. Everything else talks to it with
//! messages:
//!
//! - [`protocol`] - [`HostCommand`] / [`HostResponse`] / [`FaultNotice`]
//!   payload codec and the [`Status`] codes derived from the error taxonomy
//! - [`AudioTask`] - executes commands, ticks the graph on every background
//!   interrupt, reports processing faults to the host task
//! - [`HostTask`] / [`HostLink`] - receiving side of replies and fault notices
//! - [`Runtime`] - one scheduler wired with both tasks
//!
//! ## Example
//!
//! ```rust
//! use std::sync::Arc;
//! use kestrel_core::{CapabilityRegistry, GraphManager};
//! use kestrel_runtime::{HostCommand, Runtime, RuntimeOptions};
//!
//! let graph = GraphManager::new(Arc::new(CapabilityRegistry::builder().build()));
//! let mut rt = Runtime::new(graph, RuntimeOptions::default()).unwrap();
//! let started = rt.call(&HostCommand::StartGraph).unwrap();
//! assert!(started.status.is_ok());
//! ```

pub mod audio;
pub mod host;
pub mod protocol;

pub use audio::{AudioStats, AudioTask, DeviceCounters, HardwareEndpoints, NullDevice};
pub use host::{
    DEFAULT_AUDIO_TASK, DEFAULT_HOST_TASK, HostEvent, HostLink, HostTask, Runtime,
    RuntimeBuilder, RuntimeError, RuntimeOptions,
};
pub use protocol::{
    FaultNotice, HOST_TERMINAL, HostCommand, HostResponse, ProtocolError, Status, TickSummary,
    WireTerminal, msg,
};
