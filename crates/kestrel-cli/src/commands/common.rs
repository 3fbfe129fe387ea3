//! Shared CLI helpers used across multiple commands.

use std::path::Path;

use kestrel_config::{ConfigError, GraphPreset, RuntimeConfig, get_factory_preset, paths};
use kestrel_runtime::RuntimeOptions;
use kestrel_sched::{SchedulerConfig, TaskId};

/// Load a preset by name or path.
///
/// Searches in this order:
/// 1. Factory presets (by name)
/// 2. File path
/// 3. The current directory and the user presets directory (by name)
pub fn load_preset(name: &str) -> anyhow::Result<GraphPreset> {
    if let Some(preset) = get_factory_preset(name) {
        return Ok(preset);
    }

    if let Some(path) = paths::find_preset(name) {
        return Ok(GraphPreset::load(&path)?);
    }

    Err(ConfigError::PresetNotFound(name.to_string()).into())
}

/// Load the runtime configuration.
///
/// An explicit path must exist. Without one the user config file is used
/// when present, and the defaults otherwise.
pub fn load_runtime_config(explicit: Option<&Path>) -> anyhow::Result<RuntimeConfig> {
    if let Some(path) = explicit {
        return Ok(RuntimeConfig::load(path)?);
    }
    load_runtime_config_from(&paths::runtime_config_path())
}

fn load_runtime_config_from(default_path: &Path) -> anyhow::Result<RuntimeConfig> {
    if default_path.is_file() {
        tracing::debug!(path = %default_path.display(), "using user runtime config");
        Ok(RuntimeConfig::load(default_path)?)
    } else {
        Ok(RuntimeConfig::default())
    }
}

/// Scheduler layout for a runtime built from `config`.
pub fn runtime_options(config: &RuntimeConfig, tick_limit: Option<u64>) -> RuntimeOptions {
    RuntimeOptions {
        scheduler: SchedulerConfig {
            max_tasks: config.scheduler.max_tasks,
            mailbox_capacity: config.scheduler.mailbox_capacity,
        },
        audio_task: TaskId(config.tasks.audio),
        host_task: TaskId(config.tasks.host),
        tick_limit,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_factory_preset_wins() {
        let preset = load_preset("tone-tap").unwrap();
        assert_eq!(preset.name, "tone-tap");
    }

    #[test]
    fn test_preset_from_path() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("mine.toml");
        GraphPreset::new("mine").save(&path).unwrap();
        let preset = load_preset(path.to_str().unwrap()).unwrap();
        assert_eq!(preset.name, "mine");
        let err = load_preset("definitely-not-a-preset").unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ConfigError>(),
            Some(ConfigError::PresetNotFound(_))
        ));
    }

    #[test]
    fn test_missing_default_config_falls_back() {
        let dir = TempDir::new().unwrap();
        let config = load_runtime_config_from(&dir.path().join("runtime.toml")).unwrap();
        assert_eq!(config, RuntimeConfig::default());
        assert!(load_runtime_config(Some(&dir.path().join("absent.toml"))).is_err());
    }

    #[test]
    fn test_options_follow_config() {
        let mut config = RuntimeConfig::default();
        config.scheduler.mailbox_capacity = 4;
        config.tasks.audio = 7;
        config.tasks.host = 9;
        let options = runtime_options(&config, Some(12));
        assert_eq!(options.scheduler.mailbox_capacity, 4);
        assert_eq!(options.audio_task, TaskId(7));
        assert_eq!(options.host_task, TaskId(9));
        assert_eq!(options.tick_limit, Some(12));
    }
}
