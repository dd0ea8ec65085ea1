//! SAPM CLI - inspect card tables and simulate power management on them.

mod commands;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "sapm")]
#[command(author, version, about = "Sound audio power management CLI", long_about = None)]
struct Cli {
    /// Log engine activity at debug level (RUST_LOG overrides)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List factory and user card tables
    Cards(commands::cards::CardsArgs),

    /// Show the components, routes and controls of a card
    Info(commands::info::InfoArgs),

    /// Bring a card up on simulated registers and apply events
    Simulate(commands::simulate::SimulateArgs),

    /// Write a card table to a TOML file
    Export(commands::export::ExportArgs),
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter.into()))
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Cards(args) => commands::cards::run(args),
        Commands::Info(args) => commands::info::run(args),
        Commands::Simulate(args) => commands::simulate::run(args),
        Commands::Export(args) => commands::export::run(args),
    }
}
