//! SQLite copy strategies.
//!
//! - [`SqliteCloneStrategy`]: clones the whole database namespace in one
//!   operation (`VACUUM INTO`) and restores through the online backup API.
//! - [`SqliteRowCopyStrategy`]: recreates table definitions and bulk-transfers
//!   rows; restores by rebuilding every table inside one write transaction.
//!
//! Both satisfy the same [`stellar_core::CopyStrategy`] contract.

#![allow(clippy::result_large_err)]

mod clone;
mod rowcopy;

pub use clone::SqliteCloneStrategy;
pub use rowcopy::SqliteRowCopyStrategy;

use crate::errors::{io_error, Result};
use std::fs;
use std::io::ErrorKind;
use std::path::Path;
use stellar_core::errors::{ExError, ExErrorKind};
use stellar_core::model::TrackedDatabase;

/// Sidecar files SQLite may leave next to a database
const SIDECAR_SUFFIXES: [&str; 3] = ["-journal", "-wal", "-shm"];

/// Remove a partial copy (and its sidecars) left by an interrupted run
fn remove_leftover(destination: &Path) -> Result<()> {
    let mut candidates = vec![destination.to_path_buf()];
    for suffix in SIDECAR_SUFFIXES {
        let mut sidecar = destination.as_os_str().to_owned();
        sidecar.push(suffix);
        candidates.push(sidecar.into());
    }

    for path in candidates {
        match fs::remove_file(&path) {
            Ok(()) => tracing::debug!(path = %path.display(), "Removed leftover copy"),
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => return Err(io_error("copy_remove_leftover", e)),
        }
    }
    Ok(())
}

fn path_str<'a>(op: &str, path: &'a Path) -> Result<&'a str> {
    path.to_str().ok_or_else(|| {
        ExError::new(ExErrorKind::InvalidInput)
            .with_op(op.to_string())
            .with_message(format!("Path is not valid UTF-8: {}", path.display()))
    })
}

fn require_live_database(op: &str, database: &TrackedDatabase) -> Result<()> {
    if database.path.is_file() {
        return Ok(());
    }
    Err(ExError::new(ExErrorKind::NotFound)
        .with_op(op.to_string())
        .with_message(format!(
            "Tracked database {} not found at {}",
            database.name,
            database.path.display()
        )))
}

fn require_snapshot_file(op: &str, source: &Path) -> Result<()> {
    if source.is_file() {
        return Ok(());
    }
    Err(ExError::new(ExErrorKind::StorageInconsistency)
        .with_op(op.to_string())
        .with_message(format!("Snapshot copy missing at {}", source.display())))
}

fn copy_error(op: &str, database: &str, err: rusqlite::Error) -> ExError {
    ExError::new(ExErrorKind::Persistence)
        .with_op(op.to_string())
        .with_message(format!("Copying database {} failed: {}", database, err))
}

/// Quote an identifier for interpolation into SQL
fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}
