//! Remove command

use super::{open_engine, CmdResult};
use clap::Args;
use std::path::Path;
use stellar_core::logging_facility::Profile;

#[derive(Debug, Args)]
pub struct RemoveArgs {
    pub name: String,
}

pub fn execute(config: Option<&Path>, args: RemoveArgs) -> CmdResult {
    let engine = open_engine(config, Profile::Development)?;
    let snapshot = engine.get(&args.name)?;
    engine.remove(&snapshot)?;
    println!("Removed snapshot '{}'", args.name);
    Ok(())
}
