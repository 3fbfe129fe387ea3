//! Error types for configuration operations.

use std::path::PathBuf;

use kestrel_core::{CapabilityError, GraphError};
use thiserror::Error;

/// Errors that can occur while loading, saving or instantiating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read a file
    #[error("failed to read file '{path}': {source}")]
    ReadFile {
        /// Path of the file that could not be read.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Failed to write a file
    #[error("failed to write file '{path}': {source}")]
    WriteFile {
        /// Path of the file that could not be written.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Failed to create a directory
    #[error("failed to create directory '{path}': {source}")]
    CreateDir {
        /// Path of the directory that could not be created.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Failed to parse TOML
    #[error("failed to parse TOML: {0}")]
    TomlParse(#[from] toml::de::Error),

    /// Failed to serialize TOML
    #[error("failed to serialize TOML: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    /// No preset file matched the name
    #[error("preset not found: {0}")]
    PresetNotFound(String),

    /// The configuration or preset is inconsistent
    #[error("validation failed: {0}")]
    Validation(#[from] crate::validation::ValidationError),

    /// Creating a preset instance failed
    #[error("failed to create instance '{instance}': {source}")]
    Instantiate {
        /// Preset name of the instance.
        instance: String,
        /// Error from the graph manager.
        #[source]
        source: CapabilityError,
    },

    /// Creating a preset connection failed
    #[error("failed to connect {from} -> {to}: {source}")]
    Connect {
        /// Source endpoint as written in the preset.
        from: String,
        /// Sink endpoint as written in the preset.
        to: String,
        /// Error from the graph manager.
        #[source]
        source: GraphError,
    },
}

impl ConfigError {
    /// Create a read file error.
    pub fn read_file(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        ConfigError::ReadFile {
            path: path.into(),
            source,
        }
    }

    /// Create a write file error.
    pub fn write_file(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        ConfigError::WriteFile {
            path: path.into(),
            source,
        }
    }

    /// Create a create directory error.
    pub fn create_dir(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        ConfigError::CreateDir {
            path: path.into(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kestrel_core::InstanceId;
    use std::error::Error;

    fn mock_io_err() -> std::io::Error {
        std::io::Error::new(std::io::ErrorKind::NotFound, "mock")
    }

    #[test]
    fn read_file_display_names_path() {
        let err = ConfigError::read_file("/a/b.toml", mock_io_err());
        let msg = err.to_string();
        assert!(msg.contains("failed to read file"), "got: {msg}");
        assert!(msg.contains("/a/b.toml"), "got: {msg}");
        assert!(err.source().is_some());
    }

    #[test]
    fn factories_produce_matching_variants() {
        assert!(matches!(
            ConfigError::write_file("/x", mock_io_err()),
            ConfigError::WriteFile { .. }
        ));
        assert!(matches!(
            ConfigError::create_dir("/x", mock_io_err()),
            ConfigError::CreateDir { .. }
        ));
    }

    #[test]
    fn preset_not_found_display() {
        let err = ConfigError::PresetNotFound("tap".to_string());
        assert_eq!(err.to_string(), "preset not found: tap");
        assert!(err.source().is_none());
    }

    #[test]
    fn graph_failures_keep_their_source() {
        let err = ConfigError::Connect {
            from: "b.0".to_string(),
            to: "a.0".to_string(),
            source: GraphError::CycleDetected {
                from: InstanceId::from_raw(1),
                to: InstanceId::from_raw(0),
            },
        };
        assert_eq!(
            err.to_string(),
            "failed to connect b.0 -> a.0: connecting op1 to op0 would create a cycle"
        );
        assert!(err.source().is_some());

        let err = ConfigError::Instantiate {
            instance: "mix".to_string(),
            source: CapabilityError::config("bad format"),
        };
        assert!(err.to_string().starts_with("failed to create instance 'mix'"));
    }
}
