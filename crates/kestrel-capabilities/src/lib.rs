//! Kestrel Capabilities - built-in audio operators
//!
//! Every module exposes one capability class and its `DESCRIPTOR`, ready to be
//! registered with a [`kestrel_core::CapabilityRegistry`]:
//!
//! - [`Mixer`] (`0x000A`) - sums up to three streams with per-stream gain
//! - [`Passthrough`] (`0x0001`) - copies one stream, with mute
//! - [`Splitter`] (`0x0013`) - duplicates one stream onto two outputs
//! - [`PatternSource`] (`0x0100`) - sawtooth generator with no inputs
//! - [`PeakMeter`] (`0x0101`) - sink that tracks peak magnitude
//!
//! All of them move 16-bit little-endian samples and take a block format as
//! configuration word 0 (see [`format`]).
//!
//! ## Example
//!
//! ```rust
//! use kestrel_capabilities::{mixer, passthrough};
//! use kestrel_core::CapabilityRegistry;
//!
//! let mut builder = CapabilityRegistry::builder();
//! builder.register(mixer::DESCRIPTOR).unwrap();
//! builder.register(passthrough::DESCRIPTOR).unwrap();
//! let registry = builder.build();
//! assert_eq!(registry.find("mixer").unwrap().default_config, &[0x2080]);
//! ```

#![cfg_attr(not(feature = "std"), no_std)]

#[cfg(not(feature = "std"))]
extern crate alloc;

pub mod format;
pub mod meter;
pub mod mixer;
pub mod passthrough;
pub mod pattern;
pub mod splitter;

pub use format::{BlockFormat, DEFAULT_FORMAT_WORD};
pub use meter::PeakMeter;
pub use mixer::Mixer;
pub use passthrough::Passthrough;
pub use pattern::PatternSource;
pub use splitter::Splitter;
