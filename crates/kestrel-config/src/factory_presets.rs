//! Graph presets bundled with the library.
//!
//! Always available without external files; each one exercises a different
//! part of the built-in capability set.

use crate::GraphPreset;

/// Names of the bundled presets.
pub static FACTORY_PRESET_NAMES: &[&str] = &["passthrough", "mixer-bus", "tone-tap"];

static FACTORY_PRESETS_TOML: &[(&str, &str)] = &[
    ("passthrough", PASSTHROUGH_PRESET),
    ("mixer-bus", MIXER_BUS_PRESET),
    ("tone-tap", TONE_TAP_PRESET),
];

const PASSTHROUGH_PRESET: &str = r#"
name = "passthrough"
description = "Device input straight to device output"

[[instances]]
name = "pass"
capability = "passthrough"

[[connections]]
from = "host"
to = "pass.0"

[[connections]]
from = "pass.0"
to = "host"
"#;

const MIXER_BUS_PRESET: &str = r#"
name = "mixer-bus"
description = "Two device inputs summed by the mixer, second stream 6 dB down"

[[instances]]
name = "mix"
capability = "mixer"
overrides = [{ index = 1, value = 0 }, { index = 2, value = 0xFE98 }]

[[connections]]
from = "host"
to = "mix.0"

[[connections]]
from = "host"
to = "mix.1"

[[connections]]
from = "mix.0"
to = "host"
capacity = 512
"#;

const TONE_TAP_PRESET: &str = r#"
name = "tone-tap"
description = "Sawtooth source split between the device and a peak meter"

[[instances]]
name = "src"
capability = "pattern"
overrides = [{ index = 1, value = 100 }, { index = 2, value = 8000 }]

[[instances]]
name = "split"
capability = "splitter"

[[instances]]
name = "meter"
capability = "peak_meter"

[[connections]]
from = "src.0"
to = "split.0"

[[connections]]
from = "split.0"
to = "host"

[[connections]]
from = "split.1"
to = "meter.0"
"#;

/// Every bundled preset.
pub fn factory_presets() -> Vec<GraphPreset> {
    FACTORY_PRESETS_TOML
        .iter()
        .filter_map(|(_, toml)| GraphPreset::from_toml(toml).ok())
        .collect()
}

/// Bundled preset by name, case-insensitive.
pub fn get_factory_preset(name: &str) -> Option<GraphPreset> {
    FACTORY_PRESETS_TOML
        .iter()
        .find(|(preset_name, _)| preset_name.eq_ignore_ascii_case(name))
        .and_then(|(_, toml)| GraphPreset::from_toml(toml).ok())
}

/// Returns `true` if `name` is a bundled preset.
pub fn is_factory_preset(name: &str) -> bool {
    FACTORY_PRESET_NAMES
        .iter()
        .any(|preset_name| preset_name.eq_ignore_ascii_case(name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validate_preset;
    use kestrel_registry::builtin_registry;

    #[test]
    fn test_all_factory_presets_parse_and_validate() {
        let registry = builtin_registry();
        let presets = factory_presets();
        assert_eq!(presets.len(), FACTORY_PRESET_NAMES.len());
        for preset in &presets {
            validate_preset(preset, &registry, 256)
                .unwrap_or_else(|e| panic!("{} is invalid: {e}", preset.name));
        }
    }

    #[test]
    fn test_lookup_is_case_insensitive() {
        assert_eq!(get_factory_preset("Tone-Tap").unwrap().name, "tone-tap");
        assert!(is_factory_preset("MIXER-BUS"));
        assert!(!is_factory_preset("reverb"));
        assert!(get_factory_preset("reverb").is_none());
    }
}
