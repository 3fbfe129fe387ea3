//! kestrel CLI - inspect capabilities, check presets and run operator graphs.

mod commands;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "kestrel")]
#[command(author, version, about = "kestrel operator graph CLI", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the registered capabilities
    Capabilities(commands::capabilities::CapabilitiesArgs),

    /// List factory and user graph presets
    Presets(commands::presets::PresetsArgs),

    /// Check a graph preset against the capability registry
    Validate(commands::validate::ValidateArgs),

    /// Build a graph from a preset and drive it from a timer
    Run(commands::run::RunArgs),
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Capabilities(args) => commands::capabilities::run(args),
        Commands::Presets(args) => commands::presets::run(args),
        Commands::Validate(args) => commands::validate::run(args),
        Commands::Run(args) => commands::run::run(args),
    }
}
