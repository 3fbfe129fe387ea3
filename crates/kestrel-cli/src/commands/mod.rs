//! CLI command implementations.

pub mod capabilities;
pub mod common;
pub mod presets;
pub mod run;
pub mod validate;
