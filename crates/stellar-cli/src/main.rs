//! Stellar CLI
//!
//! Fast snapshots and restores of development databases

use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;

#[derive(Debug, Parser)]
#[command(name = "stellar")]
#[command(about = "Stellar - Fast database snapshots for development", long_about = None)]
struct Cli {
    /// Path to stellar.yaml (default: searched upwards from the working directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Take a snapshot of the tracked databases
    Snapshot(commands::snapshot::SnapshotArgs),
    /// List snapshots
    List(commands::list::ListArgs),
    /// Restore the tracked databases from a snapshot (latest by default)
    Restore(commands::restore::RestoreArgs),
    /// Remove a snapshot
    Remove(commands::remove::RemoveArgs),
    /// Rename a snapshot
    Rename(commands::rename::RenameArgs),
    /// Replace a snapshot with a fresh copy of the current data
    Replace(commands::replace::ReplaceArgs),
    /// Delete storage left behind by interrupted operations
    Gc,
    /// Show the version
    Version,
    /// Copy one snapshot in the background (dispatched by `snapshot`)
    #[command(hide = true)]
    Worker(commands::worker::WorkerArgs),
}

fn main() {
    let cli = Cli::parse();
    let config = cli.config.as_deref();

    let result = match cli.command {
        Commands::Snapshot(args) => commands::snapshot::execute(config, args),
        Commands::List(args) => commands::list::execute(config, args),
        Commands::Restore(args) => commands::restore::execute(config, args),
        Commands::Remove(args) => commands::remove::execute(config, args),
        Commands::Rename(args) => commands::rename::execute(config, args),
        Commands::Replace(args) => commands::replace::execute(config, args),
        Commands::Gc => commands::gc::execute(config),
        Commands::Version => commands::version::execute(),
        Commands::Worker(args) => commands::worker::execute(config, args),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
