//! Platform-specific configuration and preset locations.
//!
//! - **User config**: `~/.config/kestrel/` (Linux), `~/Library/Application Support/kestrel/` (macOS), `%APPDATA%\kestrel\` (Windows)
//! - **User presets**: `<user config>/presets/`
//! - **Runtime config**: `<user config>/runtime.toml`

use std::path::{Path, PathBuf};

use crate::error::ConfigError;

const APP_NAME: &str = "kestrel";

const PRESETS_SUBDIR: &str = "presets";

const RUNTIME_CONFIG_FILE: &str = "runtime.toml";

/// The user configuration directory, or `./kestrel` if the platform has none.
pub fn user_config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_NAME)
}

/// The user presets directory.
pub fn user_presets_dir() -> PathBuf {
    user_config_dir().join(PRESETS_SUBDIR)
}

/// Where the runtime configuration is read from when none is given.
pub fn runtime_config_path() -> PathBuf {
    user_config_dir().join(RUNTIME_CONFIG_FILE)
}

/// Find a preset file by path or name.
///
/// `name` is tried as a path first, then as a file name in `search_dirs` (in
/// order), with `.toml` appended when missing.
pub fn find_preset_in(name: &str, search_dirs: &[PathBuf]) -> Option<PathBuf> {
    let path = PathBuf::from(name);
    if path.is_file() {
        return Some(path);
    }
    let filename = if name.ends_with(".toml") {
        name.to_string()
    } else {
        format!("{name}.toml")
    };
    search_dirs
        .iter()
        .map(|dir| dir.join(&filename))
        .find(|candidate| candidate.is_file())
}

/// [`find_preset_in`] over the current directory and the user presets
/// directory.
pub fn find_preset(name: &str) -> Option<PathBuf> {
    find_preset_in(name, &[PathBuf::from("."), user_presets_dir()])
}

/// Ensure the user presets directory exists.
pub fn ensure_user_presets_dir() -> Result<PathBuf, ConfigError> {
    let dir = user_presets_dir();
    if !dir.exists() {
        std::fs::create_dir_all(&dir).map_err(|e| ConfigError::create_dir(&dir, e))?;
    }
    Ok(dir)
}

/// Preset files (`*.toml`) in `dir`, sorted. Empty if unreadable.
pub fn list_presets_in(dir: &Path) -> Vec<PathBuf> {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return Vec::new();
    };
    let mut presets: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.is_file() && path.extension().is_some_and(|ext| ext == "toml"))
        .collect();
    presets.sort();
    presets
}

/// Preset files in the user presets directory.
pub fn list_user_presets() -> Vec<PathBuf> {
    list_presets_in(&user_presets_dir())
}

/// The file stem of a preset path.
///
/// ```rust
/// use kestrel_config::paths::preset_name_from_path;
/// use std::path::Path;
///
/// let name = preset_name_from_path(Path::new("/presets/tone-tap.toml"));
/// assert_eq!(name.as_deref(), Some("tone-tap"));
/// ```
pub fn preset_name_from_path(path: &Path) -> Option<String> {
    path.file_stem()
        .and_then(|s| s.to_str())
        .map(|s| s.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_user_dirs_end_with_app_name() {
        assert!(user_config_dir().ends_with(APP_NAME));
        assert!(user_presets_dir().ends_with("kestrel/presets"));
        assert!(runtime_config_path().ends_with("kestrel/runtime.toml"));
    }

    #[test]
    fn test_find_preset_in_search_dirs() {
        let first = TempDir::new().unwrap();
        let second = TempDir::new().unwrap();
        fs::write(second.path().join("tap.toml"), "name = \"tap\"").unwrap();
        let dirs = [first.path().to_path_buf(), second.path().to_path_buf()];

        let found = find_preset_in("tap", &dirs).unwrap();
        assert_eq!(found, second.path().join("tap.toml"));
        assert_eq!(find_preset_in("tap.toml", &dirs), Some(found.clone()));
        assert_eq!(
            find_preset_in(found.to_str().unwrap(), &[]),
            Some(found.clone())
        );
        assert!(find_preset_in("missing", &dirs).is_none());
    }

    #[test]
    fn test_list_presets_filters_and_sorts() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("b.toml"), "").unwrap();
        fs::write(dir.path().join("a.toml"), "").unwrap();
        fs::write(dir.path().join("notes.txt"), "").unwrap();
        fs::create_dir(dir.path().join("sub.toml")).unwrap();
        let names: Vec<_> = list_presets_in(dir.path())
            .iter()
            .filter_map(|p| preset_name_from_path(p))
            .collect();
        assert_eq!(names, vec!["a", "b"]);
        assert!(list_presets_in(&dir.path().join("missing")).is_empty());
    }
}
