//! Replace command

use super::{open_engine, CmdResult};
use clap::Args;
use std::path::Path;
use stellar_core::logging_facility::Profile;

#[derive(Debug, Args)]
pub struct ReplaceArgs {
    pub name: String,
}

pub fn execute(config: Option<&Path>, args: ReplaceArgs) -> CmdResult {
    let engine = open_engine(config, Profile::Development)?;
    engine.replace(&args.name)?;
    println!("Replacing '{}' in the background", args.name);
    Ok(())
}
