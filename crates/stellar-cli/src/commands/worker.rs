//! Detached copy worker entry point
//!
//! Spawned as `stellar --config <file> worker <name>` by the process
//! launcher. Output goes to the worker log as JSON.

use super::{open_engine, CmdResult};
use clap::Args;
use std::path::Path;
use stellar_core::logging_facility::Profile;

#[derive(Debug, Args)]
pub struct WorkerArgs {
    pub name: String,
}

pub fn execute(config: Option<&Path>, args: WorkerArgs) -> CmdResult {
    let engine = open_engine(config, Profile::Production)?;
    engine.run_worker(&args.name)?;
    Ok(())
}
