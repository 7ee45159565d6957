//! Copy Worker and its launchers.
//!
//! A worker copies every tracked database of one snapshot into storage and
//! then flips the snapshot to ready. It shares nothing with whoever
//! dispatched it except the registry, so the dispatcher may exit first.

#![allow(clippy::result_large_err)]

mod launcher;
mod liveness;
mod process;

pub use launcher::{ThreadLauncher, WorkerJob, WorkerLauncher};
pub use liveness::process_alive;
pub use process::ProcessLauncher;

use std::sync::Arc;
use std::time::Instant;
use stellar_core::errors::{ExError, ExErrorKind, Result};
use stellar_core::{log_op_end, log_op_error, log_op_start};
use stellar_core::{CopyObserver, CopyStrategy, Snapshot, TrackedDatabase, WorkerHandle};
use stellar_store::{SnapshotRegistry, SnapshotStorage};

/// Progress of one database copy inside a running worker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CopyJobStatus {
    Pending,
    Copying,
    Done,
    Failed,
}

#[derive(Debug)]
struct CopyJob<'a> {
    snapshot_name: &'a str,
    database: &'a str,
    status: CopyJobStatus,
}

impl<'a> CopyJob<'a> {
    fn new(snapshot_name: &'a str, database: &'a str) -> Self {
        Self {
            snapshot_name,
            database,
            status: CopyJobStatus::Pending,
        }
    }

    fn advance(&mut self, status: CopyJobStatus) {
        self.status = status;
        tracing::debug!(
            snapshot_name = self.snapshot_name,
            database = self.database,
            status = ?self.status,
            "Copy job"
        );
    }
}

/// Runs the forward copy of one snapshot.
#[derive(Clone)]
pub struct CopyWorker {
    registry: SnapshotRegistry,
    storage: SnapshotStorage,
    strategy: Arc<dyn CopyStrategy>,
    databases: Vec<TrackedDatabase>,
}

impl CopyWorker {
    pub fn new(
        registry: SnapshotRegistry,
        storage: SnapshotStorage,
        strategy: Arc<dyn CopyStrategy>,
        databases: Vec<TrackedDatabase>,
    ) -> Self {
        Self {
            registry,
            storage,
            strategy,
            databases,
        }
    }

    /// Claim the snapshot for `handle`, copy every database, then mark it
    /// ready.
    ///
    /// On failure the snapshot is left not ready; nothing is retried.
    ///
    /// ## Errors
    ///
    /// - `WorkerFailure`: a database copy failed
    /// - `NotFound`: the snapshot was removed before the worker started
    /// - `Concurrency`: another worker owns the snapshot
    pub fn run(
        &self,
        snapshot_name: &str,
        handle: &WorkerHandle,
        before_copy: Option<&CopyObserver<'_>>,
    ) -> Result<()> {
        log_op_start!("worker_run", snapshot_name, worker = handle);
        let started = Instant::now();

        let outcome = self
            .claim(snapshot_name, handle)
            .and_then(|()| self.copy_all(snapshot_name, handle, before_copy))
            .and_then(|count| {
                self.finish(snapshot_name, handle)?;
                Ok(count)
            });

        match outcome {
            Ok(count) => {
                log_op_end!("worker_run", snapshot_name, started, databases = count);
                Ok(())
            }
            Err(e) => {
                log_op_error!("worker_run", snapshot_name, started, &e);
                Err(e)
            }
        }
    }

    fn claim(&self, snapshot_name: &str, handle: &WorkerHandle) -> Result<()> {
        if self.registry.claim_worker(snapshot_name, handle)? {
            return Ok(());
        }
        let current = self.registry.get(snapshot_name)?;
        Err(lost_ownership(snapshot_name, handle, &current))
    }

    /// Mark the snapshot ready on behalf of `handle`.
    ///
    /// ## Errors
    ///
    /// - `Concurrency`: `handle` no longer owns the snapshot
    pub fn finish(&self, snapshot_name: &str, handle: &WorkerHandle) -> Result<()> {
        if self.registry.mark_ready(snapshot_name, handle)? {
            return Ok(());
        }
        let current = self.registry.get(snapshot_name)?;
        Err(lost_ownership(snapshot_name, handle, &current))
    }

    /// Copy every tracked database into the snapshot's storage location
    /// without touching `ready`. Returns the number of databases copied.
    ///
    /// Ownership is re-checked before each database, so a worker whose
    /// snapshot was removed and created again stops instead of writing into
    /// the new snapshot's storage.
    ///
    /// ## Errors
    ///
    /// - `WorkerFailure`: a database copy failed (source attached)
    /// - `Concurrency`: `handle` does not own the snapshot
    pub fn copy_all(
        &self,
        snapshot_name: &str,
        handle: &WorkerHandle,
        before_copy: Option<&CopyObserver<'_>>,
    ) -> Result<usize> {
        let snapshot = self.owned(snapshot_name, handle)?;
        self.storage.prepare(&snapshot.storage_location)?;

        let mut jobs: Vec<CopyJob<'_>> = self
            .databases
            .iter()
            .map(|database| CopyJob::new(snapshot_name, &database.name))
            .collect();

        for (job, database) in jobs.iter_mut().zip(&self.databases) {
            if let Some(observer) = before_copy {
                observer(&database.name);
            }
            self.owned(snapshot_name, handle)?;
            job.advance(CopyJobStatus::Copying);

            let destination = self
                .storage
                .object_path(&snapshot.storage_location, database)?;
            if let Err(e) = self.strategy.copy_forward(database, &destination) {
                job.advance(CopyJobStatus::Failed);
                return Err(ExError::new(ExErrorKind::WorkerFailure)
                    .with_op("copy_forward")
                    .with_snapshot(snapshot_name)
                    .with_message(format!(
                        "Copying {} with {} failed: {}",
                        database.name,
                        self.strategy.name(),
                        e
                    ))
                    .with_source(e));
            }
            job.advance(CopyJobStatus::Done);
        }

        debug_assert!(jobs.iter().all(|j| j.status == CopyJobStatus::Done));
        Ok(jobs.len())
    }

    fn owned(&self, snapshot_name: &str, handle: &WorkerHandle) -> Result<Snapshot> {
        let current = self.registry.get(snapshot_name)?;
        if current.ready || current.worker_handle.as_ref() != Some(handle) {
            return Err(lost_ownership(snapshot_name, handle, &current));
        }
        Ok(current)
    }
}

fn lost_ownership(snapshot_name: &str, handle: &WorkerHandle, current: &Snapshot) -> ExError {
    let owner = match (&current.worker_handle, current.ready) {
        (_, true) => "it is already ready".to_string(),
        (Some(owner), false) => format!("it is owned by {}", owner),
        (None, false) => "it has no owner".to_string(),
    };
    ExError::new(ExErrorKind::Concurrency)
        .with_op("worker_run")
        .with_snapshot(snapshot_name)
        .with_message(format!(
            "Worker {} no longer owns snapshot {}: {}",
            handle, snapshot_name, owner
        ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;
    use std::sync::Mutex;
    use tempfile::TempDir;

    /// Strategy that writes a marker file, or fails for one database
    struct MarkerStrategy {
        fail_on: Option<&'static str>,
    }

    impl CopyStrategy for MarkerStrategy {
        fn name(&self) -> &'static str {
            "marker"
        }

        fn copy_forward(&self, source: &TrackedDatabase, destination: &Path) -> Result<()> {
            if self.fail_on == Some(source.name.as_str()) {
                return Err(ExError::new(ExErrorKind::Io).with_message("disk on fire"));
            }
            std::fs::write(destination, source.name.as_bytes())
                .map_err(|e| ExError::new(ExErrorKind::Io).with_message(e.to_string()))
        }

        fn copy_backward(&self, _source: &Path, _destination: &TrackedDatabase) -> Result<()> {
            Ok(())
        }
    }

    fn worker(fail_on: Option<&'static str>) -> (TempDir, SnapshotRegistry, CopyWorker) {
        let temp_dir = TempDir::new().unwrap();
        let storage = SnapshotStorage::new(temp_dir.path().join("store"));
        storage.ensure_root().unwrap();
        let registry = SnapshotRegistry::open(storage.registry_path(), "app").unwrap();
        let databases = vec![
            TrackedDatabase::new("a.db", temp_dir.path().join("a.db")),
            TrackedDatabase::new("b.db", temp_dir.path().join("b.db")),
        ];
        let worker = CopyWorker::new(
            registry.clone(),
            storage,
            Arc::new(MarkerStrategy { fail_on }),
            databases,
        );
        (temp_dir, registry, worker)
    }

    #[test]
    fn test_run_marks_ready_after_all_copies() {
        let (_tmp, registry, worker) = worker(None);
        registry.insert("v1").unwrap();
        let seen = Mutex::new(Vec::new());
        let observer = |name: &str| seen.lock().unwrap().push(name.to_string());

        worker
            .run("v1", &WorkerHandle::new_task(), Some(&observer))
            .unwrap();

        let snapshot = registry.get("v1").unwrap();
        assert!(snapshot.ready);
        assert_eq!(snapshot.worker_handle, None);
        assert_eq!(*seen.lock().unwrap(), vec!["a.db", "b.db"]);
    }

    #[test]
    fn test_failed_copy_leaves_snapshot_stuck() {
        let (_tmp, registry, worker) = worker(Some("b.db"));
        registry.insert("v1").unwrap();
        let handle = WorkerHandle::Process(999_999);

        let err = worker.run("v1", &handle, None).unwrap_err();

        assert_eq!(err.kind(), ExErrorKind::WorkerFailure);
        assert_eq!(err.source_error().map(|e| e.kind()), Some(ExErrorKind::Io));
        let snapshot = registry.get("v1").unwrap();
        assert!(!snapshot.ready);
        assert_eq!(snapshot.worker_handle, Some(handle));
    }

    #[test]
    fn test_worker_refuses_snapshot_owned_by_another() {
        let (_tmp, registry, worker) = worker(None);
        registry.insert("v1").unwrap();
        let owner = WorkerHandle::new_task();
        registry.claim_worker("v1", &owner).unwrap();

        let err = worker.run("v1", &WorkerHandle::new_task(), None).unwrap_err();

        assert_eq!(err.kind(), ExErrorKind::Concurrency);
        let snapshot = registry.get("v1").unwrap();
        assert!(!snapshot.ready);
        assert_eq!(snapshot.worker_handle, Some(owner));
    }

    #[test]
    fn test_worker_stops_when_snapshot_recreated_mid_copy() {
        let (tmp, registry, worker) = worker(None);
        registry.insert("v1").unwrap();
        let stale = WorkerHandle::new_task();
        let successor = WorkerHandle::new_task();
        let recreate = |name: &str| {
            if name == "b.db" {
                registry.delete("v1").unwrap();
                registry.insert("v1").unwrap();
                registry.claim_worker("v1", &successor).unwrap();
            }
        };

        let err = worker.run("v1", &stale, Some(&recreate)).unwrap_err();

        assert_eq!(err.kind(), ExErrorKind::Concurrency);
        let snapshot = registry.get("v1").unwrap();
        assert!(!snapshot.ready);
        assert_eq!(snapshot.worker_handle, Some(successor));
        let location = tmp.path().join("store").join(&snapshot.storage_location);
        assert!(!location.join("b.db").exists());
    }
}
