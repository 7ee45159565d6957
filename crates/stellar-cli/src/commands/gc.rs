//! Garbage collection command

use super::{open_engine, plural, CmdResult};
use std::path::Path;
use stellar_core::logging_facility::Profile;

pub fn execute(config: Option<&Path>) -> CmdResult {
    let engine = open_engine(config, Profile::Development)?;
    let on_delete = |location: &str| println!("Deleted {}", location);
    let deleted = engine.gc(Some(&on_delete))?;
    println!(
        "Deleted {} orphaned storage location{}",
        deleted.len(),
        plural(deleted.len())
    );
    Ok(())
}
