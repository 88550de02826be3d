//! cserm CLI - Causal strategic classification experiments
//!
//! This CLI provides:
//! - `run`: the feature-drop sensitivity experiment, CSERM against SERM
//! - `summarize`: per-`n_drops` statistics over saved result artifacts

use anyhow::{Result, anyhow};
use clap::{Parser, Subcommand};
use tracing::Level;

#[derive(Parser)]
#[command(name = "cserm")]
#[command(version, about = "Causal strategic classification simulator", long_about = None)]
struct Cli {
    /// Log level: error, warn, info, debug or trace
    #[arg(long, global = true, default_value = "warn")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the sensitivity experiment for one (n_drops, seed) pair
    Run(Box<cserm::cli::commands::run::RunArgs>),

    /// Summarize saved result artifacts
    Summarize(cserm::cli::commands::summarize::SummarizeArgs),
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let level: Level = cli
        .log_level
        .parse()
        .map_err(|_| anyhow!("Invalid log level '{}'", cli.log_level))?;
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Run(args) => cserm::cli::commands::run::execute(*args),
        Commands::Summarize(args) => cserm::cli::commands::summarize::execute(args),
    }
}
