//! Namespace-level clone for SQLite.

use super::{copy_error, path_str, remove_leftover, require_live_database, require_snapshot_file};
use crate::db::BUSY_TIMEOUT;
use crate::errors::Result;
use rusqlite::backup::Progress;
use rusqlite::{Connection, DatabaseName, OpenFlags};
use std::path::Path;
use stellar_core::copy_strategy::CopyStrategy;
use stellar_core::model::TrackedDatabase;

/// Duplicates a whole database in one statement.
///
/// `VACUUM INTO` writes a transactionally consistent copy of the live
/// database; restore goes through the online backup API, which holds the
/// destination's write lock for the whole page copy, so readers see either
/// the old database or the restored one.
#[derive(Debug, Default, Clone, Copy)]
pub struct SqliteCloneStrategy;

impl CopyStrategy for SqliteCloneStrategy {
    fn name(&self) -> &'static str {
        "sqlite-clone"
    }

    fn copy_forward(&self, source: &TrackedDatabase, destination: &Path) -> Result<()> {
        require_live_database("copy_forward", source)?;
        remove_leftover(destination)?;
        let target = path_str("copy_forward", destination)?;

        // Read-write without create: WAL databases need their -shm writable.
        let conn = Connection::open_with_flags(&source.path, OpenFlags::SQLITE_OPEN_READ_WRITE)
            .map_err(|e| copy_error("copy_forward", &source.name, e))?;
        conn.busy_timeout(BUSY_TIMEOUT)
            .map_err(|e| copy_error("copy_forward", &source.name, e))?;
        conn.execute("VACUUM INTO ?1", [target])
            .map_err(|e| copy_error("copy_forward", &source.name, e))?;

        tracing::debug!(database = %source.name, destination = target, "Cloned database");
        Ok(())
    }

    fn copy_backward(&self, source: &Path, destination: &TrackedDatabase) -> Result<()> {
        require_snapshot_file("copy_backward", source)?;

        let mut conn = Connection::open(&destination.path)
            .map_err(|e| copy_error("copy_backward", &destination.name, e))?;
        conn.busy_timeout(BUSY_TIMEOUT)
            .map_err(|e| copy_error("copy_backward", &destination.name, e))?;
        conn.restore(DatabaseName::Main, source, None::<fn(Progress)>)
            .map_err(|e| copy_error("copy_backward", &destination.name, e))?;

        tracing::debug!(database = %destination.name, "Restored database from clone");
        Ok(())
    }
}
