//! List command

use super::{open_engine, CmdResult};
use clap::Args;
use std::path::Path;
use stellar_core::logging_facility::Profile;
use stellar_core::Snapshot;
use stellar_engine::SnapshotEngine;

#[derive(Debug, Args)]
pub struct ListArgs {
    /// Print registry records as JSON
    #[arg(long)]
    pub json: bool,
}

pub fn execute(config: Option<&Path>, args: ListArgs) -> CmdResult {
    let engine = open_engine(config, Profile::Development)?;
    let snapshots = engine.list()?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&snapshots)?);
        return Ok(());
    }

    if snapshots.is_empty() {
        println!("You don't have any snapshots yet.");
        return Ok(());
    }

    let width = snapshots
        .iter()
        .map(|s| s.snapshot_name.chars().count())
        .max()
        .unwrap_or(0);
    for snapshot in &snapshots {
        println!(
            "{:<width$}  {}  {}",
            snapshot.snapshot_name,
            snapshot.created_at.format("%Y-%m-%d %H:%M:%S UTC"),
            status(&engine, snapshot),
            width = width
        );
    }
    Ok(())
}

fn status(engine: &SnapshotEngine, snapshot: &Snapshot) -> &'static str {
    if snapshot.ready {
        "ready"
    } else if engine.is_worker_alive(snapshot) {
        "copying"
    } else {
        "incomplete (restore will finish it, or use replace)"
    }
}
