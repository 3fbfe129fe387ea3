//! Preset validation command.

use std::path::PathBuf;
use std::sync::Arc;

use clap::Args;
use kestrel_config::validate_preset;
use kestrel_registry::builtin_registry;

use super::common::{load_preset, load_runtime_config};

#[derive(Args)]
pub struct ValidateArgs {
    /// Preset name or path
    preset: String,

    /// Runtime configuration (buffer defaults and memory pool)
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,
}

pub fn run(args: ValidateArgs) -> anyhow::Result<()> {
    let preset = load_preset(&args.preset)?;
    let config = load_runtime_config(args.config.as_deref())?;
    let registry = Arc::new(builtin_registry());
    let capacity = config.graph.default_buffer_capacity;

    if let Err(e) = validate_preset(&preset, &registry, capacity) {
        let errors = e.errors();
        println!("{}: {} problem(s)", preset.name, errors.len());
        for error in errors {
            println!("  - {error}");
        }
        anyhow::bail!("preset '{}' is invalid", preset.name);
    }

    // Building against the configured limits also catches pool exhaustion.
    let mut graph = config.graph_manager(registry);
    let built = preset.instantiate(&mut graph, capacity)?;
    let order: Vec<String> = graph
        .topological_order()
        .into_iter()
        .map(|id| built.name_of(id).map_or_else(|| id.to_string(), str::to_string))
        .collect();

    println!(
        "{}: ok ({} instance(s), {} connection(s))",
        preset.name,
        built.instances.len(),
        built.connections.len()
    );
    println!("  processing order: {}", order.join(" -> "));
    Ok(())
}
