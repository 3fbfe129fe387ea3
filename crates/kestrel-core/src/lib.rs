//! Kestrel Core - the runtime underneath a real-time audio operator graph.
//!
//! This crate holds everything that runs on the audio task: the buffers that
//! carry samples between operators, the capability (operator) lifecycle, the
//! capability registry and the graph manager that wires instances together and
//! ticks them.
//!
//! # Core Abstractions
//!
//! ## Buffers
//!
//! - [`Buffer`] - SPSC circular byte store over a [`MemoryPort`]
//! - [`WriteWindow`] / [`ReadWindow`] - scoped mapped views, commit or release
//! - [`RegionAllocator`] - where connection buffers come from
//!   ([`HeapAllocator`], [`RegionPool`])
//!
//! ## Capabilities
//!
//! - [`Capability`] - per-class hooks (connect, start, stop, process, messages)
//! - [`CapabilityDescriptor`] - identity, endpoint layout, default config, factory
//! - [`CapabilityRegistry`] - immutable id to descriptor table
//! - [`CapabilityInstance`] - lifecycle state machine around one capability
//!
//! ## Graph
//!
//! - [`GraphManager`] - owns instances and connections, runs ticks
//!
//! # no_std Support
//!
//! This crate is `no_std` compatible (it needs `alloc`). Disable the default
//! `std` feature:
//!
//! ```toml
//! [dependencies]
//! kestrel-core = { version = "0.1", default-features = false }
//! ```
//!
//! Enable the `tracing` feature to log lifecycle transitions and faults.

#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

pub mod buffer;
pub mod capability;
pub mod graph;
pub mod instance;
pub mod registry;

pub use buffer::{
    Buffer, BufferError, HeapAllocator, HeapRegion, MemoryPort, ReadWindow, RegionAllocator,
    RegionPool, SampleSize, WriteWindow,
};
pub use capability::{
    Capability, CapabilityDescriptor, CapabilityError, CapabilityFactory, CapabilityId, Endpoint,
    EndpointLayout, InputPort, Inputs, OutputPort, Outputs, ProcessIo, ProcessOutcome, opmsg,
};
pub use graph::{
    Connection, ConnectionId, DEFAULT_MAX_INSTANCES, Fault, GraphError, GraphManager,
    MAX_CAPACITY, Terminal, TickReport,
};
pub use instance::{CapabilityInstance, InstanceId, InstanceState};
pub use registry::{CapabilityRegistry, RegistryBuilder, RegistryError};
