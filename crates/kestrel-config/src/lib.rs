//! Configuration and graph presets for kestrel.
//!
//! # Features
//!
//! - **Runtime configuration**: scheduler table sizes, graph limits and task
//!   ids from a TOML file, every field defaulted ([`RuntimeConfig`])
//! - **Graph presets**: instances and connections by name, loaded from TOML
//!   ([`GraphPreset`]) and instantiated into a
//!   [`GraphManager`](kestrel_core::GraphManager)
//! - **Validation**: capability references, endpoint ranges, capacities and
//!   cycles checked against the registry before anything is created
//! - **Paths**: platform-specific config and preset directories
//! - **Factory presets**: small graphs bundled with the library
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use kestrel_config::{RuntimeConfig, get_factory_preset};
//! use kestrel_registry::builtin_registry;
//!
//! let config = RuntimeConfig::default();
//! let mut graph = config.graph_manager(Arc::new(builtin_registry()));
//! let preset = get_factory_preset("tone-tap").unwrap();
//! let ids = preset
//!     .instantiate(&mut graph, config.graph.default_buffer_capacity)
//!     .unwrap();
//! assert_eq!(graph.len(), 3);
//! assert!(ids.id("meter").is_some());
//! ```

mod error;
mod preset;
mod runtime_config;

/// Platform-specific paths for presets and configuration.
#[cfg(feature = "std")]
pub mod paths;

/// Preset validation.
pub mod validation;

/// Presets bundled with the library.
pub mod factory_presets;

pub use error::ConfigError;
pub use factory_presets::{
    FACTORY_PRESET_NAMES, factory_presets, get_factory_preset, is_factory_preset,
};
pub use preset::{ConfigOverride, ConnectionSpec, GraphPreset, InstanceSpec, PresetGraph};
pub use runtime_config::{GraphSection, RuntimeConfig, SchedulerSection, TaskSection};
pub use validation::{EndpointRef, ValidationError, ValidationResult, validate_preset};
