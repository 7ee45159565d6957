//! Rename command

use super::{open_engine, CmdResult};
use clap::Args;
use std::path::Path;
use stellar_core::logging_facility::Profile;

#[derive(Debug, Args)]
pub struct RenameArgs {
    pub old_name: String,
    pub new_name: String,
}

pub fn execute(config: Option<&Path>, args: RenameArgs) -> CmdResult {
    let engine = open_engine(config, Profile::Development)?;
    engine.rename(&args.old_name, &args.new_name)?;
    println!("Renamed '{}' to '{}'", args.old_name, args.new_name);
    Ok(())
}
