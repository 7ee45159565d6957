//! Worker dispatch.

use super::liveness::process_alive;
use super::CopyWorker;
use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread;
use stellar_core::errors::{ExError, ExErrorKind, Result};
use stellar_core::{CopyObserver, WorkerHandle};

/// Everything a launcher needs to start copying one snapshot
#[derive(Clone)]
pub struct WorkerJob {
    pub snapshot_name: String,
    pub worker: CopyWorker,
    /// Progress observer; only honoured by in-process launchers
    pub before_copy: Option<Arc<CopyObserver<'static>>>,
}

impl WorkerJob {
    /// Run the job to completion on the current thread
    ///
    /// ## Errors
    ///
    /// See [`CopyWorker::run`].
    pub fn run(&self, handle: &WorkerHandle) -> Result<()> {
        self.worker
            .run(&self.snapshot_name, handle, self.before_copy.as_deref())
    }
}

/// Starts detached copy workers and checks whether they are still running.
pub trait WorkerLauncher: Send + Sync {
    /// Start `job` without waiting for it. The returned handle is what gets
    /// recorded in the registry.
    ///
    /// ## Errors
    ///
    /// - `WorkerFailure`: the worker could not be started
    fn launch(&self, job: WorkerJob) -> Result<WorkerHandle>;

    /// Whether the worker behind `handle` is still running.
    fn is_alive(&self, handle: &WorkerHandle) -> bool;
}

/// Runs workers on detached threads of the current process.
///
/// Running tasks are tracked in a shared set; a task leaves the set when its
/// thread ends, whether the copy succeeded, failed or panicked.
#[derive(Debug, Clone, Default)]
pub struct ThreadLauncher {
    tasks: Arc<Mutex<HashSet<WorkerHandle>>>,
}

impl ThreadLauncher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of workers still running
    pub fn running(&self) -> usize {
        self.tasks().len()
    }

    fn tasks(&self) -> MutexGuard<'_, HashSet<WorkerHandle>> {
        lock(&self.tasks)
    }
}

fn lock(tasks: &Mutex<HashSet<WorkerHandle>>) -> MutexGuard<'_, HashSet<WorkerHandle>> {
    tasks.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Removes a task from the running set when dropped
struct TaskGuard {
    tasks: Arc<Mutex<HashSet<WorkerHandle>>>,
    handle: WorkerHandle,
}

impl Drop for TaskGuard {
    fn drop(&mut self) {
        lock(&self.tasks).remove(&self.handle);
    }
}

impl WorkerLauncher for ThreadLauncher {
    fn launch(&self, job: WorkerJob) -> Result<WorkerHandle> {
        let handle = WorkerHandle::new_task();
        self.tasks().insert(handle.clone());
        let guard = TaskGuard {
            tasks: Arc::clone(&self.tasks),
            handle: handle.clone(),
        };

        thread::Builder::new()
            .name(format!("stellar-worker-{}", job.snapshot_name))
            .spawn(move || {
                if job.run(&guard.handle).is_err() {
                    tracing::debug!(
                        snapshot_name = %job.snapshot_name,
                        "Worker thread ended without marking the snapshot ready"
                    );
                }
                drop(guard);
            })
            .map_err(|e| {
                ExError::new(ExErrorKind::WorkerFailure)
                    .with_op("launch_worker")
                    .with_message(format!("Could not spawn worker thread: {}", e))
            })?;

        Ok(handle)
    }

    fn is_alive(&self, handle: &WorkerHandle) -> bool {
        match handle {
            WorkerHandle::Task(_) => self.tasks().contains(handle),
            WorkerHandle::Process(pid) => process_alive(*pid),
        }
    }
}
