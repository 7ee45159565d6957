//! Snapshot Engine.
//!
//! The caller-facing orchestrator. Owns the invariant that the registry and
//! physical storage stay consistent:
//!
//! - a record is inserted before any storage for it is written
//! - `remove` deletes storage before the record, so a crash in between
//!   leaves an orphan that `gc` reclaims, never a record without data that
//!   looks restorable
//! - `rename` moves record and storage together (see
//!   [`SnapshotRegistry::rename`])
//!
//! Every public operation emits `start` and `end`/`end_error` events.

#![allow(clippy::result_large_err)]

use crate::connection::{ConnectionProvider, CopyStrategies, UrlConnectionProvider};
use crate::gc;
use crate::wait::{poll_until, CancelFlag};
use crate::worker::{CopyWorker, WorkerJob, WorkerLauncher};
use chrono::Utc;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};
use stellar_core::errors::{ExError, ExErrorKind, Result};
use stellar_core::model::validate_snapshot_name;
use stellar_core::{log_op_end, log_op_error, log_op_start};
use stellar_core::{CopyObserver, CopyStrategy, Project, Snapshot, TrackedDatabase, WorkerHandle};
use stellar_store::{SnapshotRegistry, SnapshotStorage};

/// Default interval between readiness checks while restore waits
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Knobs for [`SnapshotEngine::restore`]
pub struct RestoreOptions<'a> {
    pub poll_interval: Duration,
    /// Stops the wait for a running worker (the worker itself continues)
    pub cancel: Option<&'a CancelFlag>,
    /// Called with the current record each time restore goes back to sleep
    pub on_wait: Option<&'a dyn Fn(&Snapshot)>,
    /// Called per database if restore has to copy inline
    pub before_copy: Option<&'a CopyObserver<'a>>,
}

impl Default for RestoreOptions<'_> {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            cancel: None,
            on_wait: None,
            before_copy: None,
        }
    }
}

pub struct SnapshotEngine {
    project: Project,
    databases: Vec<TrackedDatabase>,
    strategy: Arc<dyn CopyStrategy>,
    storage: SnapshotStorage,
    registry: SnapshotRegistry,
    launcher: Arc<dyn WorkerLauncher>,
}

impl SnapshotEngine {
    /// Resolve `project`, select its copy strategy and open the registry.
    ///
    /// All configuration and dialect problems surface here, before anything
    /// is written to the registry.
    ///
    /// ## Errors
    ///
    /// - `InvalidConfig`: the project URLs cannot be resolved
    /// - `UnsupportedDialect`: no strategy is registered for the dialect
    /// - `Io`, `Persistence`: storage root or registry cannot be opened
    pub fn open(
        project: Project,
        provider: &dyn ConnectionProvider,
        strategies: &CopyStrategies,
        launcher: Arc<dyn WorkerLauncher>,
    ) -> Result<Self> {
        let resolved = provider.resolve(&project)?;
        let strategy = strategies.select(&resolved.dialect)?;

        let storage = SnapshotStorage::new(resolved.storage_root);
        storage.ensure_root()?;
        let registry = SnapshotRegistry::open(storage.registry_path(), project.project_name.as_str())?;

        tracing::debug!(
            project_name = %project.project_name,
            dialect = %resolved.dialect,
            strategy = strategy.name(),
            storage_root = %storage.root().display(),
            "Opened snapshot engine"
        );

        Ok(Self {
            project,
            databases: resolved.databases,
            strategy,
            storage,
            registry,
            launcher,
        })
    }

    /// [`open`](Self::open) with URL resolution and the built-in strategies
    ///
    /// ## Errors
    ///
    /// See [`open`](Self::open).
    pub fn with_defaults(project: Project, launcher: Arc<dyn WorkerLauncher>) -> Result<Self> {
        Self::open(
            project,
            &UrlConnectionProvider,
            &CopyStrategies::default(),
            launcher,
        )
    }

    pub fn project(&self) -> &Project {
        &self.project
    }

    pub fn databases(&self) -> &[TrackedDatabase] {
        &self.databases
    }

    pub fn storage_root(&self) -> &Path {
        self.storage.root()
    }

    /// Name used when the caller gives none: the current UTC minute
    pub fn default_snapshot_name() -> String {
        Utc::now().format("%Y-%m-%d %H:%M").to_string()
    }

    fn worker(&self) -> CopyWorker {
        CopyWorker::new(
            self.registry.clone(),
            self.storage.clone(),
            Arc::clone(&self.strategy),
            self.databases.clone(),
        )
    }

    /// Register `name` and dispatch a worker to copy it.
    ///
    /// Returns as soon as the worker is dispatched, with `ready == false`.
    /// If the worker cannot be started the record stays not ready with no
    /// handle, and the next restore copies inline.
    ///
    /// ## Errors
    ///
    /// - `NameCollision`: a snapshot named `name` already exists
    /// - `InvalidInput`: `name` is empty, too long or has control characters
    pub fn create(
        &self,
        name: &str,
        before_copy: Option<Arc<CopyObserver<'static>>>,
    ) -> Result<Snapshot> {
        instrumented("snapshot_create", Some(name), || {
            validate_snapshot_name(name)?;
            let snapshot = self.registry.insert(name)?;

            let job = WorkerJob {
                snapshot_name: name.to_string(),
                worker: self.worker(),
                before_copy,
            };
            let handle = match self.launcher.launch(job) {
                Ok(handle) => handle,
                Err(e) => {
                    tracing::warn!(snapshot_name = name, error = %e, "Worker did not start");
                    return Ok(snapshot);
                }
            };
            // The worker claims itself too; this covers the window before a
            // process worker gets that far. A no-op once the worker finished.
            self.registry.claim_worker(name, &handle)?;

            Ok(Snapshot {
                worker_handle: Some(handle),
                ..snapshot
            })
        })
    }

    /// ## Errors
    ///
    /// - `NotFound`: no snapshot named `name`
    pub fn get(&self, name: &str) -> Result<Snapshot> {
        instrumented("snapshot_get", Some(name), || self.registry.get(name))
    }

    /// Snapshots in creation order
    pub fn list(&self) -> Result<Vec<Snapshot>> {
        instrumented("snapshot_list", None, || self.registry.list())
    }

    /// ## Errors
    ///
    /// - `NotFound`: the project has no snapshots
    pub fn latest(&self) -> Result<Snapshot> {
        instrumented("snapshot_latest", None, || self.registry.latest())
    }

    /// Whether the worker recorded on `snapshot` is still running.
    ///
    /// False when no handle is recorded.
    pub fn is_worker_alive(&self, snapshot: &Snapshot) -> bool {
        snapshot
            .worker_handle
            .as_ref()
            .is_some_and(|handle| self.launcher.is_alive(handle))
    }

    /// Replace the live databases with the contents of `snapshot`.
    ///
    /// Waits for a running worker to finish; if none is running and the
    /// snapshot is not ready, takes the copy over under this process's handle
    /// and copies inline first. Each database is restored atomically, the set
    /// of databases is not.
    ///
    /// ## Errors
    ///
    /// - `NotFound`: the snapshot no longer exists
    /// - `Cancelled`: `options.cancel` was set while waiting
    /// - `WorkerFailure`: the inline copy failed
    /// - `Concurrency`: the snapshot was removed and created again during
    ///   the inline copy
    pub fn restore(&self, snapshot: &Snapshot, options: RestoreOptions<'_>) -> Result<()> {
        let name = snapshot.snapshot_name.as_str();
        instrumented("snapshot_restore", Some(name), || {
            let current = self.registry.get(name)?;
            let current = if current.ready {
                current
            } else {
                self.await_ready(name, &options)?
            };

            for database in &self.databases {
                let source = self
                    .storage
                    .object_path(&current.storage_location, database)?;
                self.strategy.copy_backward(&source, database)?;
                tracing::debug!(snapshot_name = name, database = %database.name, "Restored database");
            }
            Ok(())
        })
    }

    fn await_ready(&self, name: &str, options: &RestoreOptions<'_>) -> Result<Snapshot> {
        let inline = WorkerHandle::current_process();
        let current = poll_until("snapshot_restore", options.poll_interval, options.cancel, || {
            let current = self.registry.get(name)?;
            if current.ready {
                return Ok(Some(current));
            }
            if self.is_worker_alive(&current) {
                if let Some(on_wait) = options.on_wait {
                    on_wait(&current);
                }
                return Ok(None);
            }
            // Fails if the worker finished or someone else took over since
            // the read; poll again in that case.
            let taken = self.registry.take_over_worker(
                name,
                current.worker_handle.as_ref(),
                &inline,
            )?;
            Ok(taken.then_some(current))
        })?;

        if current.ready {
            return Ok(current);
        }

        tracing::info!(snapshot_name = name, worker_handle = %inline, "No live worker for snapshot; copying inline");
        let worker = self.worker();
        let copied = worker
            .copy_all(name, &inline, options.before_copy)
            .and_then(|_| worker.finish(name, &inline));
        if let Err(e) = copied {
            if let Err(release) = self.registry.release_worker(name, &inline) {
                tracing::warn!(snapshot_name = name, error = %release, "Could not release inline copy");
            }
            return Err(e);
        }
        self.registry.get(name)
    }

    /// Delete the snapshot's storage, then its record.
    ///
    /// Storage deletion is attempted even when the record is already gone,
    /// so a remove interrupted earlier can simply be repeated.
    ///
    /// ## Errors
    ///
    /// - `Io`: storage could not be deleted (the record is kept)
    pub fn remove(&self, snapshot: &Snapshot) -> Result<()> {
        let name = snapshot.snapshot_name.as_str();
        instrumented("snapshot_remove", Some(name), || {
            self.storage.delete(&snapshot.storage_location)?;
            match self.registry.delete(name) {
                Err(e) if e.is_not_found() => {
                    tracing::warn!(snapshot_name = name, "Snapshot record was already gone");
                    Ok(())
                }
                other => other,
            }
        })
    }

    /// ## Errors
    ///
    /// - `NotFound`: no snapshot named `old_name`
    /// - `NameCollision`: `new_name` is taken
    /// - `Concurrency`: a worker is still copying `old_name`
    /// - `StorageInconsistency`: orphaned storage sits at the new location
    pub fn rename(&self, old_name: &str, new_name: &str) -> Result<()> {
        instrumented("snapshot_rename", Some(old_name), || {
            validate_snapshot_name(new_name)?;
            let current = self.registry.get(old_name)?;
            if !current.ready && self.is_worker_alive(&current) {
                return Err(ExError::new(ExErrorKind::Concurrency)
                    .with_op("snapshot_rename")
                    .with_message("A worker is still copying this snapshot; try again once it is ready"));
            }
            self.registry.rename(old_name, new_name, &self.storage)
        })
    }

    /// Remove `name` and create it again from the current live data.
    ///
    /// Not atomic: if the create fails after the remove, the snapshot is gone.
    ///
    /// ## Errors
    ///
    /// - `NotFound`: no snapshot named `name`
    pub fn replace(&self, name: &str) -> Result<Snapshot> {
        instrumented("snapshot_replace", Some(name), || {
            let existing = self.registry.get(name)?;
            self.remove(&existing)?;
            self.create(name, None)
        })
    }

    /// Delete orphaned storage; returns the deleted locations, sorted.
    ///
    /// ## Errors
    ///
    /// - `Io`: storage could not be listed or deleted
    pub fn gc(&self, on_delete: Option<&dyn Fn(&str)>) -> Result<Vec<String>> {
        instrumented("snapshot_gc", None, || {
            let deleted = gc::reconcile(&self.registry, &self.storage, on_delete)?;
            tracing::info!(deleted_count = deleted.len(), "Reconciled snapshot storage");
            Ok(deleted)
        })
    }

    /// Body of a detached worker process: copy `name` under this process's id.
    ///
    /// ## Errors
    ///
    /// See [`CopyWorker::run`].
    pub fn run_worker(&self, name: &str) -> Result<()> {
        self.worker()
            .run(name, &WorkerHandle::current_process(), None)
    }
}

/// Run `f` between `start` and `end`/`end_error` lifecycle events.
fn instrumented<T>(
    op: &'static str,
    snapshot_name: Option<&str>,
    f: impl FnOnce() -> Result<T>,
) -> Result<T> {
    log_op_start!(op, snapshot_name);
    let started = Instant::now();

    let result = f().map_err(|e| match snapshot_name {
        Some(name) if e.snapshot_name().is_none() => e.with_snapshot(name),
        _ => e,
    });

    match &result {
        Ok(_) => log_op_end!(op, snapshot_name, started),
        Err(e) => log_op_error!(op, snapshot_name, started, e),
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_snapshot_name_shape() {
        let name = SnapshotEngine::default_snapshot_name();
        assert_eq!(name.len(), "2024-01-31 12:00".len());
        assert!(validate_snapshot_name(&name).is_ok());
        assert!(chrono::NaiveDateTime::parse_from_str(&name, "%Y-%m-%d %H:%M").is_ok());
    }
}
