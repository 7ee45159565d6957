//! Detached worker processes.

use super::launcher::{WorkerJob, WorkerLauncher};
use super::liveness::process_alive;
use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use stellar_core::errors::{ExError, ExErrorKind, Result};
use stellar_core::WorkerHandle;

/// Re-invokes the `stellar` binary as `stellar --config <file> worker <name>`.
///
/// The child runs in its own process group with no terminal attached, so it
/// outlives the dispatching command and ignores its Ctrl-C. Its logs go to
/// the optional log file, otherwise nowhere.
#[derive(Debug, Clone)]
pub struct ProcessLauncher {
    program: PathBuf,
    config_path: PathBuf,
    log_file: Option<PathBuf>,
}

impl ProcessLauncher {
    pub fn new(program: impl Into<PathBuf>, config_path: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            config_path: config_path.into(),
            log_file: None,
        }
    }

    /// Launcher re-running the current executable
    ///
    /// ## Errors
    ///
    /// - `Io`: the current executable cannot be determined
    pub fn current_exe(config_path: impl Into<PathBuf>) -> Result<Self> {
        let program = std::env::current_exe().map_err(|e| {
            ExError::new(ExErrorKind::Io)
                .with_op("launch_worker")
                .with_message(format!("Cannot locate the stellar executable: {}", e))
        })?;
        Ok(Self::new(program, config_path))
    }

    /// Append worker stderr to `path`
    pub fn with_log_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.log_file = Some(path.into());
        self
    }

    fn stderr(&self) -> Stdio {
        match self.log_file.as_deref().map(open_log) {
            Some(Ok(file)) => Stdio::from(file),
            Some(Err(e)) => {
                tracing::warn!(error = %e, "Could not open worker log file; discarding worker output");
                Stdio::null()
            }
            None => Stdio::null(),
        }
    }
}

fn open_log(path: &Path) -> std::io::Result<File> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    OpenOptions::new().create(true).append(true).open(path)
}

impl WorkerLauncher for ProcessLauncher {
    fn launch(&self, job: WorkerJob) -> Result<WorkerHandle> {
        if job.before_copy.is_some() {
            tracing::debug!(
                snapshot_name = %job.snapshot_name,
                "Progress observer not forwarded to worker process"
            );
        }

        let mut command = Command::new(&self.program);
        command
            .arg("--config")
            .arg(&self.config_path)
            .arg("worker")
            .arg(&job.snapshot_name)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(self.stderr());
        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            command.process_group(0);
        }

        let child = command.spawn().map_err(|e| {
            ExError::new(ExErrorKind::WorkerFailure)
                .with_op("launch_worker")
                .with_snapshot(&job.snapshot_name)
                .with_message(format!(
                    "Could not start {}: {}",
                    self.program.display(),
                    e
                ))
        })?;

        let handle = WorkerHandle::Process(child.id());
        tracing::debug!(snapshot_name = %job.snapshot_name, worker_handle = %handle, "Spawned worker process");
        Ok(handle)
    }

    fn is_alive(&self, handle: &WorkerHandle) -> bool {
        match handle {
            WorkerHandle::Process(pid) => process_alive(*pid),
            // Tasks live in some other process's memory.
            WorkerHandle::Task(_) => false,
        }
    }
}
