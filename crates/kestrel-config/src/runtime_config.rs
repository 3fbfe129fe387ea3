//! Runtime configuration file.

use std::path::Path;
use std::sync::Arc;

use kestrel_core::{CapabilityRegistry, GraphManager, RegionPool};
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::validation::{ValidationError, ValidationResult};

/// Table sizes, graph limits and task ids for one runtime.
///
/// Every field has a default, so an empty file is a valid configuration.
///
/// # TOML Format
///
/// ```toml
/// [scheduler]
/// max_tasks = 16
/// mailbox_capacity = 32
///
/// [graph]
/// max_instances = 64
/// default_buffer_capacity = 256
/// memory_pool_bytes = 65536   # 0 = unbounded heap buffers
///
/// [tasks]
/// audio = 1
/// host = 2
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct RuntimeConfig {
    /// Scheduler table sizes.
    pub scheduler: SchedulerSection,
    /// Graph manager limits.
    pub graph: GraphSection,
    /// Task ids.
    pub tasks: TaskSection,
}

/// `[scheduler]` table.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct SchedulerSection {
    /// Task table size.
    pub max_tasks: usize,
    /// Default mailbox depth.
    pub mailbox_capacity: usize,
}

impl Default for SchedulerSection {
    fn default() -> Self {
        Self {
            max_tasks: 16,
            mailbox_capacity: 32,
        }
    }
}

/// `[graph]` table.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct GraphSection {
    /// Live-instance limit.
    pub max_instances: usize,
    /// Capacity for preset connections that do not name one.
    pub default_buffer_capacity: usize,
    /// Byte budget for connection buffers; 0 means unbounded.
    pub memory_pool_bytes: usize,
}

impl Default for GraphSection {
    fn default() -> Self {
        Self {
            max_instances: kestrel_core::DEFAULT_MAX_INSTANCES,
            default_buffer_capacity: 256,
            memory_pool_bytes: 0,
        }
    }
}

/// `[tasks]` table.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct TaskSection {
    /// Id of the audio task.
    pub audio: u16,
    /// Id of the host task.
    pub host: u16,
}

impl Default for TaskSection {
    fn default() -> Self {
        Self { audio: 1, host: 2 }
    }
}

impl RuntimeConfig {
    /// Load from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content =
            std::fs::read_to_string(path).map_err(|e| ConfigError::read_file(path, e))?;
        Self::from_toml(&content)
    }

    /// Parse and validate a TOML string.
    pub fn from_toml(toml_str: &str) -> Result<Self, ConfigError> {
        let config: RuntimeConfig = toml::from_str(toml_str)?;
        config.validate()?;
        Ok(config)
    }

    /// Save to a TOML file, creating parent directories.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::create_dir(parent, e))?;
        }
        std::fs::write(path, self.to_toml()?).map_err(|e| ConfigError::write_file(path, e))
    }

    /// Serialize to a TOML string.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Checks limits that would make the runtime unusable.
    pub fn validate(&self) -> ValidationResult<()> {
        let mut errors = Vec::new();
        if self.scheduler.max_tasks < 2 {
            errors.push(ValidationError::InvalidRuntime(
                "scheduler.max_tasks must leave room for the audio and host tasks".into(),
            ));
        }
        if self.scheduler.mailbox_capacity == 0 {
            errors.push(ValidationError::InvalidRuntime(
                "scheduler.mailbox_capacity must be at least 1".into(),
            ));
        }
        if self.tasks.audio == self.tasks.host {
            errors.push(ValidationError::InvalidRuntime(format!(
                "tasks.audio and tasks.host are both {}",
                self.tasks.audio
            )));
        }
        if self.graph.max_instances == 0 {
            errors.push(ValidationError::InvalidRuntime(
                "graph.max_instances must be at least 1".into(),
            ));
        }
        if self.graph.default_buffer_capacity == 0 {
            errors.push(ValidationError::InvalidRuntime(
                "graph.default_buffer_capacity must be non-zero".into(),
            ));
        }
        ValidationError::collect(errors)
    }

    /// Graph manager with this configuration's limits and allocator.
    pub fn graph_manager(&self, registry: Arc<CapabilityRegistry>) -> GraphManager {
        let graph = if self.graph.memory_pool_bytes == 0 {
            GraphManager::new(registry)
        } else {
            GraphManager::with_allocator(registry, RegionPool::new(self.graph.memory_pool_bytes))
        };
        graph.with_max_instances(self.graph.max_instances)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_file_is_all_defaults() {
        let config = RuntimeConfig::from_toml("").unwrap();
        assert_eq!(config, RuntimeConfig::default());
        assert_eq!(config.scheduler.max_tasks, 16);
        assert_eq!(config.scheduler.mailbox_capacity, 32);
        assert_eq!(config.graph.default_buffer_capacity, 256);
        assert_eq!((config.tasks.audio, config.tasks.host), (1, 2));
    }

    #[test]
    fn test_partial_tables_keep_other_defaults() {
        let config = RuntimeConfig::from_toml(
            r"
            [graph]
            memory_pool_bytes = 4096
            ",
        )
        .unwrap();
        assert_eq!(config.graph.memory_pool_bytes, 4096);
        assert_eq!(config.graph.max_instances, 64);
        assert_eq!(config.scheduler, SchedulerSection::default());
    }

    #[test]
    fn test_invalid_limits_are_all_reported() {
        let err = RuntimeConfig::from_toml(
            r"
            [scheduler]
            mailbox_capacity = 0
            [tasks]
            audio = 3
            host = 3
            ",
        )
        .unwrap_err();
        match err {
            ConfigError::Validation(ValidationError::Multiple(errors)) => {
                assert_eq!(errors.len(), 2);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_unknown_keys_are_a_parse_error() {
        assert!(matches!(
            RuntimeConfig::from_toml("[graph]\nmax_instance = 3\n"),
            Err(ConfigError::TomlParse(_))
        ));
    }

    #[test]
    fn test_graph_manager_honours_limits() {
        let config = RuntimeConfig {
            graph: GraphSection {
                max_instances: 1,
                ..GraphSection::default()
            },
            ..RuntimeConfig::default()
        };
        let mut graph = config.graph_manager(Arc::new(kestrel_registry::builtin_registry()));
        graph.create(kestrel_registry::ids::PASSTHROUGH, &[]).unwrap();
        assert!(
            graph
                .create(kestrel_registry::ids::PASSTHROUGH, &[])
                .is_err()
        );
    }
}
