//! Preset listing command.

use clap::Args;
use kestrel_config::{GraphPreset, factory_presets, paths};

use super::common::load_preset;

#[derive(Args)]
pub struct PresetsArgs {
    /// Print one preset as TOML instead of listing
    #[arg(value_name = "PRESET")]
    preset: Option<String>,
}

pub fn run(args: PresetsArgs) -> anyhow::Result<()> {
    if let Some(name) = &args.preset {
        let preset = load_preset(name)?;
        print!("{}", preset.to_toml()?);
        return Ok(());
    }

    println!("Factory Presets");
    println!("---------------");
    for preset in factory_presets() {
        print_summary(&preset);
    }

    let user = paths::list_user_presets();
    println!();
    println!("User Presets ({})", paths::user_presets_dir().display());
    println!("------------");
    if user.is_empty() {
        println!("  (none)");
    }
    for path in user {
        match GraphPreset::load(&path) {
            Ok(preset) => print_summary(&preset),
            Err(e) => {
                let name = paths::preset_name_from_path(&path).unwrap_or_default();
                tracing::warn!(preset = %name, error = %e, "skipping unreadable preset");
            }
        }
    }
    Ok(())
}

fn print_summary(preset: &GraphPreset) {
    println!(
        "  {:15} {} instance(s), {} connection(s)  {}",
        preset.name,
        preset.instances.len(),
        preset.connections.len(),
        preset.description.as_deref().unwrap_or("")
    );
}
