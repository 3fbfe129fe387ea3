//! Capability listing command.

use clap::Args;
use kestrel_core::{CapabilityDescriptor, CapabilityRegistry};
use kestrel_registry::{builtin_registry, category_of, resolve};
use serde::Serialize;

#[derive(Args)]
pub struct CapabilitiesArgs {
    /// Show details for one capability (name or id)
    #[arg(value_name = "CAPABILITY")]
    capability: Option<String>,

    /// Print as JSON
    #[arg(long)]
    json: bool,
}

/// Listing entry, also the JSON shape.
#[derive(Debug, Serialize)]
struct CapabilityInfo {
    id: String,
    name: &'static str,
    description: &'static str,
    version: String,
    category: Option<&'static str>,
    inputs: usize,
    outputs: usize,
    mandatory_inputs: usize,
    mandatory_outputs: usize,
    sample_bits: usize,
    buffer_size_hint: usize,
    default_config: Vec<String>,
}

impl From<&CapabilityDescriptor> for CapabilityInfo {
    fn from(descriptor: &CapabilityDescriptor) -> Self {
        Self {
            id: format!("0x{:04X}", descriptor.id.0),
            name: descriptor.name,
            description: descriptor.description,
            version: format!("{}.{}", descriptor.version.0, descriptor.version.1),
            category: category_of(descriptor.id).map(|c| c.name()),
            inputs: descriptor.layout.inputs,
            outputs: descriptor.layout.outputs,
            mandatory_inputs: descriptor.layout.mandatory_inputs,
            mandatory_outputs: descriptor.layout.mandatory_outputs,
            sample_bits: descriptor.sample_size.bytes() * 8,
            buffer_size_hint: descriptor.buffer_size_hint,
            default_config: descriptor
                .default_config
                .iter()
                .map(|word| format!("0x{word:08X}"))
                .collect(),
        }
    }
}

fn collect(registry: &CapabilityRegistry, filter: Option<&str>) -> anyhow::Result<Vec<CapabilityInfo>> {
    match filter {
        Some(reference) => {
            let descriptor = resolve(registry, reference).ok_or_else(|| {
                anyhow::anyhow!("Unknown capability: {}", reference)
            })?;
            Ok(vec![CapabilityInfo::from(descriptor)])
        }
        None => Ok(registry.iter().map(CapabilityInfo::from).collect()),
    }
}

pub fn run(args: CapabilitiesArgs) -> anyhow::Result<()> {
    let registry = builtin_registry();
    let infos = collect(&registry, args.capability.as_deref())?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&infos)?);
        return Ok(());
    }

    if let [info] = infos.as_slice()
        && args.capability.is_some()
    {
        print_detail(info);
        return Ok(());
    }

    println!("Available Capabilities");
    println!("======================");
    println!();
    for info in &infos {
        println!(
            "  {}  {:12}  {:9}  {}",
            info.id,
            info.name,
            info.category.unwrap_or("-"),
            info.description
        );
    }
    println!();
    println!("Use 'kestrel capabilities <name>' for endpoint and config details.");
    Ok(())
}

fn print_detail(info: &CapabilityInfo) {
    println!("{} ({})", info.name, info.id);
    println!("{}", "=".repeat(info.name.len() + info.id.len() + 3));
    println!();
    println!("{}", info.description);
    println!();
    println!("  Version:      {}", info.version);
    println!("  Category:     {}", info.category.unwrap_or("-"));
    println!(
        "  Inputs:       {} ({} mandatory)",
        info.inputs, info.mandatory_inputs
    );
    println!(
        "  Outputs:      {} ({} mandatory)",
        info.outputs, info.mandatory_outputs
    );
    println!("  Sample size:  {}-bit", info.sample_bits);
    println!("  Buffer hint:  {} bytes", info.buffer_size_hint);
    println!("  Config:       [{}]", info.default_config.join(", "));
}
