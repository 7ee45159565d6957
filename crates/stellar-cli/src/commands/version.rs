//! Version command

use super::CmdResult;

pub fn execute() -> CmdResult {
    println!("stellar {}", env!("CARGO_PKG_VERSION"));
    Ok(())
}
