//! Operator graph for the kestrel runtime.
//!
//! The [`GraphManager`] owns every capability instance and every connection
//! buffer. Instances reference each other only through [`ConnectionId`]s bound
//! to their endpoints, and the manager lends the actual [`Buffer`](crate::Buffer)s
//! to an instance for the duration of its `process` call.
//!
//! # Ordering
//!
//! Instance-to-instance connections form a DAG; a connection that would close
//! a cycle is rejected before anything is allocated. Start, tick and stop all
//! walk the same deterministic topological order (Kahn, ties by ascending
//! instance id), so:
//!
//! - a producer is started no later than any consumer it feeds
//! - data produced during a tick is visible downstream in that same tick
//! - consumers are stopped before their producers
//!
//! # Host terminals
//!
//! A connection may have the host on one side instead of an instance. This is
//! how audio enters and leaves the graph: the host writes through
//! [`GraphManager::host_writer`] and reads through [`GraphManager::host_reader`].
//!
//! # Example
//!
//! ```rust,ignore
//! use kestrel_core::GraphManager;
//!
//! let mut graph = GraphManager::new(registry);
//! let src = graph.create(PATTERN_ID, &[])?;
//! let mix = graph.create(MIXER_ID, &[])?;
//! graph.connect_capabilities(src, 0, mix, 0, 256)?;
//! let out = graph.connect_host_output(mix, 0, 256)?;
//! graph.start_graph()?;
//! let report = graph.tick();
//! ```

mod connection;
mod manager;
mod order;

pub use connection::{Connection, ConnectionId, Terminal};
pub use manager::{DEFAULT_MAX_INSTANCES, Fault, GraphError, GraphManager, MAX_CAPACITY, TickReport};
