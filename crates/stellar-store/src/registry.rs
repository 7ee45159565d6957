//! Snapshot Registry.
//!
//! The single source of truth for which snapshots exist. Every write that
//! establishes uniqueness is a single conditional statement or runs in an
//! IMMEDIATE transaction; the `UNIQUE (project_name, snapshot_name)`
//! constraint, not an in-process lock, rejects racing creators, since callers
//! may live in separate processes.
//!
//! ## Non-Responsibilities
//!
//! - Copying data (handled by the copy strategies)
//! - Orchestration and lifecycle logging (handled by `stellar-engine`)

#![allow(clippy::result_large_err)]

use crate::db;
use crate::errors::{from_rusqlite, is_unique_violation, name_collision, not_found, sqlite_error, Result};
use crate::migrations::apply_migrations;
use crate::storage::SnapshotStorage;
use chrono::{TimeZone, Utc};
use rusqlite::{Connection, OptionalExtension, TransactionBehavior};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use stellar_core::errors::{ExError, ExErrorKind};
use stellar_core::model::{storage_location, Snapshot, WorkerHandle};

const SNAPSHOT_COLUMNS: &str =
    "snapshot_name, project_name, storage_location, created_at, ready, worker_handle";

/// Row as stored, before timestamp and handle decoding
struct SnapshotRow {
    snapshot_name: String,
    project_name: String,
    storage_location: String,
    created_at_ms: i64,
    ready: bool,
    worker_handle: Option<String>,
}

impl SnapshotRow {
    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            snapshot_name: row.get(0)?,
            project_name: row.get(1)?,
            storage_location: row.get(2)?,
            created_at_ms: row.get(3)?,
            ready: row.get(4)?,
            worker_handle: row.get(5)?,
        })
    }

    fn into_snapshot(self) -> Result<Snapshot> {
        let created_at = Utc
            .timestamp_millis_opt(self.created_at_ms)
            .single()
            .ok_or_else(|| {
                ExError::new(ExErrorKind::Serialization)
                    .with_op("decode_snapshot")
                    .with_snapshot(&self.snapshot_name)
                    .with_message(format!("Invalid created_at {}", self.created_at_ms))
            })?;
        let worker_handle = self
            .worker_handle
            .map(|h| h.parse::<WorkerHandle>())
            .transpose()?;

        Ok(Snapshot {
            snapshot_name: self.snapshot_name,
            project_name: self.project_name,
            created_at,
            ready: self.ready,
            worker_handle,
            storage_location: self.storage_location,
        })
    }
}

/// Registry of one project's snapshots, backed by a SQLite file that may be
/// shared with other projects and other processes.
///
/// Each call opens its own connection, so the registry is cheap to clone and
/// safe to hand to worker threads.
#[derive(Debug, Clone)]
pub struct SnapshotRegistry {
    db_path: PathBuf,
    project_name: String,
}

impl SnapshotRegistry {
    /// Open (and migrate) the registry at `db_path` for `project_name`.
    pub fn open(db_path: impl Into<PathBuf>, project_name: impl Into<String>) -> Result<Self> {
        let registry = Self {
            db_path: db_path.into(),
            project_name: project_name.into(),
        };
        let mut conn = registry.connect()?;
        apply_migrations(&mut conn)?;
        Ok(registry)
    }

    pub fn project_name(&self) -> &str {
        &self.project_name
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    fn connect(&self) -> Result<Connection> {
        let conn = db::open(&self.db_path)?;
        db::configure(&conn)?;
        Ok(conn)
    }

    fn query_snapshot(&self, conn: &Connection, name: &str) -> Result<Option<Snapshot>> {
        let sql = format!(
            "SELECT {} FROM snapshots WHERE project_name = ?1 AND snapshot_name = ?2",
            SNAPSHOT_COLUMNS
        );
        conn.query_row(&sql, rusqlite::params![self.project_name, name], SnapshotRow::from_row)
            .optional()
            .map_err(|e| sqlite_error("snapshot_get", e))?
            .map(SnapshotRow::into_snapshot)
            .transpose()
    }

    fn query_many(&self, conn: &Connection, order_and_limit: &str) -> Result<Vec<Snapshot>> {
        let sql = format!(
            "SELECT {} FROM snapshots WHERE project_name = ?1 {}",
            SNAPSHOT_COLUMNS, order_and_limit
        );
        let mut stmt = conn.prepare(&sql).map_err(from_rusqlite)?;
        let rows = stmt
            .query_map([&self.project_name], SnapshotRow::from_row)
            .map_err(from_rusqlite)?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(from_rusqlite)?;
        rows.into_iter().map(SnapshotRow::into_snapshot).collect()
    }

    /// Atomically create a not-ready record for `name`.
    ///
    /// `created_at` is `max(now, latest created_at)` computed inside the same
    /// statement, so it never decreases with insertion order even if the
    /// clock steps back.
    ///
    /// ## Errors
    ///
    /// - `NameCollision`: a live snapshot already has this name
    pub fn insert(&self, name: &str) -> Result<Snapshot> {
        let conn = self.connect()?;
        let location = storage_location(name, &self.project_name);
        let now_ms = Utc::now().timestamp_millis();

        conn.execute(
            r#"
            INSERT INTO snapshots (project_name, snapshot_name, storage_location, created_at, ready)
            SELECT ?1, ?2, ?3, MAX(?4, COALESCE(MAX(created_at), 0)), 0
            FROM snapshots
            WHERE project_name = ?1
            "#,
            rusqlite::params![self.project_name, name, location, now_ms],
        )
        .map_err(|e| {
            if is_unique_violation(&e) {
                name_collision("snapshot_insert", name)
            } else {
                sqlite_error("snapshot_insert", e)
            }
        })?;

        tracing::debug!(snapshot_name = name, storage_location = %location, "Inserted snapshot record");

        self.query_snapshot(&conn, name)?
            .ok_or_else(|| not_found("snapshot_insert", name))
    }

    /// ## Errors
    ///
    /// - `NotFound`: no record for `name`
    pub fn get(&self, name: &str) -> Result<Snapshot> {
        let conn = self.connect()?;
        self.query_snapshot(&conn, name)?
            .ok_or_else(|| not_found("snapshot_get", name))
    }

    /// All snapshots, oldest first; equal timestamps keep insertion order
    pub fn list(&self) -> Result<Vec<Snapshot>> {
        let conn = self.connect()?;
        self.query_many(&conn, "ORDER BY created_at ASC, id ASC")
    }

    /// Snapshot with the greatest `created_at`; the earliest inserted wins ties
    ///
    /// ## Errors
    ///
    /// - `NotFound`: the project has no snapshots
    pub fn latest(&self) -> Result<Snapshot> {
        let conn = self.connect()?;
        self.query_many(&conn, "ORDER BY created_at DESC, id ASC LIMIT 1")?
            .into_iter()
            .next()
            .ok_or_else(|| {
                ExError::new(ExErrorKind::NotFound)
                    .with_op("snapshot_latest")
                    .with_message(format!(
                        "Couldn't find any snapshots for project {}",
                        self.project_name
                    ))
            })
    }

    /// ## Errors
    ///
    /// - `NotFound`: no record for `name`
    pub fn delete(&self, name: &str) -> Result<()> {
        let conn = self.connect()?;
        let deleted = conn
            .execute(
                "DELETE FROM snapshots WHERE project_name = ?1 AND snapshot_name = ?2",
                rusqlite::params![self.project_name, name],
            )
            .map_err(|e| sqlite_error("snapshot_delete", e))?;

        if deleted == 0 {
            return Err(not_found("snapshot_delete", name));
        }
        Ok(())
    }

    /// Rename a snapshot together with its storage location.
    ///
    /// The row update and the directory move happen inside one IMMEDIATE
    /// transaction: if the move fails the row update rolls back, and if the
    /// commit fails the directory is moved back. Callers never observe `old`
    /// gone with `new` not yet visible.
    ///
    /// ## Errors
    ///
    /// - `NotFound`: no record for `old_name`
    /// - `NameCollision`: `new_name` is taken (including `new_name == old_name`)
    /// - `StorageInconsistency`: unregistered storage already sits at the new location
    pub fn rename(&self, old_name: &str, new_name: &str, storage: &SnapshotStorage) -> Result<()> {
        let mut conn = self.connect()?;
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(|e| sqlite_error("snapshot_rename", e))?;

        let current = self
            .query_snapshot(&tx, old_name)?
            .ok_or_else(|| not_found("snapshot_rename", old_name))?;
        if old_name == new_name {
            return Err(name_collision("snapshot_rename", new_name));
        }

        let new_location = storage_location(new_name, &self.project_name);
        tx.execute(
            r#"
            UPDATE snapshots SET snapshot_name = ?1, storage_location = ?2
            WHERE project_name = ?3 AND snapshot_name = ?4
            "#,
            rusqlite::params![new_name, new_location, self.project_name, old_name],
        )
        .map_err(|e| {
            if is_unique_violation(&e) {
                name_collision("snapshot_rename", new_name)
            } else {
                sqlite_error("snapshot_rename", e)
            }
        })?;

        storage.rename(&current.storage_location, &new_location)?;

        if let Err(e) = tx.commit() {
            if let Err(undo) = storage.rename(&new_location, &current.storage_location) {
                tracing::warn!(
                    snapshot_name = old_name,
                    error = %undo,
                    "Could not move storage back after failed rename commit"
                );
            }
            return Err(sqlite_error("snapshot_rename", e));
        }

        tracing::debug!(old_name, new_name, "Renamed snapshot record");
        Ok(())
    }

    /// Flip `ready` to true and drop the handle, provided `handle` still owns
    /// the copy.
    ///
    /// Returns `false` and changes nothing when the record is gone, already
    /// ready, or owned by another worker (the snapshot was removed and
    /// created again underneath a stale worker).
    pub fn mark_ready(&self, name: &str, handle: &WorkerHandle) -> Result<bool> {
        let conn = self.connect()?;
        let updated = conn
            .execute(
                r#"
                UPDATE snapshots SET ready = 1, worker_handle = NULL
                WHERE project_name = ?1 AND snapshot_name = ?2 AND ready = 0 AND worker_handle = ?3
                "#,
                rusqlite::params![self.project_name, name, handle.to_string()],
            )
            .map_err(|e| sqlite_error("snapshot_mark_ready", e))?;

        if updated == 0 {
            tracing::debug!(snapshot_name = name, worker_handle = %handle, "mark_ready skipped; not the owner");
        }
        Ok(updated > 0)
    }

    /// Make `handle` the owner of a not-ready snapshot that has no owner yet.
    ///
    /// Claiming again with the same handle succeeds, so the dispatcher and
    /// the worker may both record it. Returns `false` when the record is
    /// gone, ready, or owned by someone else.
    pub fn claim_worker(&self, name: &str, handle: &WorkerHandle) -> Result<bool> {
        let conn = self.connect()?;
        let handle = handle.to_string();
        let updated = conn
            .execute(
                r#"
                UPDATE snapshots SET worker_handle = ?1
                WHERE project_name = ?2 AND snapshot_name = ?3 AND ready = 0
                  AND (worker_handle IS NULL OR worker_handle = ?1)
                "#,
                rusqlite::params![handle, self.project_name, name],
            )
            .map_err(|e| sqlite_error("snapshot_claim_worker", e))?;
        Ok(updated > 0)
    }

    /// Replace the owner `expected` (`None`: no owner) with `handle`.
    ///
    /// Compare-and-swap: fails with `false` if the owner changed or the
    /// snapshot became ready since the caller read it.
    pub fn take_over_worker(
        &self,
        name: &str,
        expected: Option<&WorkerHandle>,
        handle: &WorkerHandle,
    ) -> Result<bool> {
        let conn = self.connect()?;
        let updated = conn
            .execute(
                r#"
                UPDATE snapshots SET worker_handle = ?1
                WHERE project_name = ?2 AND snapshot_name = ?3 AND ready = 0
                  AND worker_handle IS ?4
                "#,
                rusqlite::params![
                    handle.to_string(),
                    self.project_name,
                    name,
                    expected.map(WorkerHandle::to_string)
                ],
            )
            .map_err(|e| sqlite_error("snapshot_take_over_worker", e))?;
        Ok(updated > 0)
    }

    /// Give up ownership after a failed copy, so the next restore can take
    /// over without waiting on a live owner.
    pub fn release_worker(&self, name: &str, handle: &WorkerHandle) -> Result<bool> {
        let conn = self.connect()?;
        let updated = conn
            .execute(
                r#"
                UPDATE snapshots SET worker_handle = NULL
                WHERE project_name = ?1 AND snapshot_name = ?2 AND ready = 0 AND worker_handle = ?3
                "#,
                rusqlite::params![self.project_name, name, handle.to_string()],
            )
            .map_err(|e| sqlite_error("snapshot_release_worker", e))?;
        Ok(updated > 0)
    }

    /// Run `f` with every storage location referenced by any record (all
    /// projects, ready or not) while holding the registry write lock.
    ///
    /// No insert or rename can interleave with `f`.
    pub fn locked_storage_locations<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&HashSet<String>) -> Result<T>,
    {
        let mut conn = self.connect()?;
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(|e| sqlite_error("snapshot_lock", e))?;

        let locations = {
            let mut stmt = tx
                .prepare("SELECT storage_location FROM snapshots")
                .map_err(from_rusqlite)?;
            let locations = stmt
                .query_map([], |row| row.get::<_, String>(0))
                .map_err(from_rusqlite)?
                .collect::<std::result::Result<HashSet<_>, _>>()
                .map_err(from_rusqlite)?;
            locations
        };

        let result = f(&locations)?;
        tx.commit().map_err(|e| sqlite_error("snapshot_lock", e))?;
        Ok(result)
    }
}
