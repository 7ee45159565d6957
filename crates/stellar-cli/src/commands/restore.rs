//! Restore command

use super::{open_engine, CmdResult};
use clap::Args;
use std::cell::Cell;
use std::path::Path;
use stellar_core::logging_facility::Profile;
use stellar_core::Snapshot;
use stellar_engine::RestoreOptions;

#[derive(Debug, Args)]
pub struct RestoreArgs {
    /// Snapshot to restore (default: the latest)
    pub name: Option<String>,
}

pub fn execute(config: Option<&Path>, args: RestoreArgs) -> CmdResult {
    let engine = open_engine(config, Profile::Development)?;
    let snapshot = match args.name {
        Some(name) => engine.get(&name)?,
        None => engine.latest()?,
    };

    let announced = Cell::new(false);
    let on_wait = |_: &Snapshot| {
        if !announced.replace(true) {
            eprintln!("Waiting for the background snapshot to finish...");
        }
    };
    let on_copy = |database: &str| eprintln!("Completing snapshot: copying {}", database);

    println!("Restoring from '{}'...", snapshot.snapshot_name);
    engine.restore(
        &snapshot,
        RestoreOptions {
            on_wait: Some(&on_wait),
            before_copy: Some(&on_copy),
            ..Default::default()
        },
    )?;
    println!("Restored '{}'", snapshot.snapshot_name);
    Ok(())
}
