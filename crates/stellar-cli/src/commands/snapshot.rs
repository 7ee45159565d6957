//! Snapshot command

use super::{open_engine, CmdResult};
use clap::Args;
use std::path::Path;
use stellar_core::logging_facility::Profile;
use stellar_engine::SnapshotEngine;

#[derive(Debug, Args)]
pub struct SnapshotArgs {
    /// Snapshot name (default: current UTC date and time)
    pub name: Option<String>,
}

pub fn execute(config: Option<&Path>, args: SnapshotArgs) -> CmdResult {
    let engine = open_engine(config, Profile::Development)?;
    let name = args.name.unwrap_or_else(SnapshotEngine::default_snapshot_name);

    engine.create(&name, None)?;

    println!(
        "Snapshotting {} database{} into '{}' in the background",
        engine.databases().len(),
        super::plural(engine.databases().len()),
        name
    );
    Ok(())
}
