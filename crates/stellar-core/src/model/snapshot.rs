//! Snapshot registry record and worker handle.

use crate::errors::{ExError, ExErrorKind};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Identifier of the unit of execution copying a snapshot.
///
/// Persisted as text: `pid:<n>` for a detached OS process, `task:<id>` for a
/// supervised in-process task.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum WorkerHandle {
    Process(u32),
    Task(String),
}

impl WorkerHandle {
    /// Handle for the current process
    pub fn current_process() -> Self {
        WorkerHandle::Process(std::process::id())
    }

    /// Fresh handle for an in-process task
    pub fn new_task() -> Self {
        WorkerHandle::Task(uuid::Uuid::new_v4().to_string())
    }
}

impl fmt::Display for WorkerHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorkerHandle::Process(pid) => write!(f, "pid:{}", pid),
            WorkerHandle::Task(id) => write!(f, "task:{}", id),
        }
    }
}

impl FromStr for WorkerHandle {
    type Err = ExError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || {
            ExError::new(ExErrorKind::InvalidInput)
                .with_op("parse_worker_handle")
                .with_message(format!("Invalid worker handle '{}'", s))
        };
        match s.split_once(':') {
            Some(("pid", pid)) => pid.parse().map(WorkerHandle::Process).map_err(|_| invalid()),
            Some(("task", id)) if !id.is_empty() => Ok(WorkerHandle::Task(id.to_string())),
            _ => Err(invalid()),
        }
    }
}

impl From<WorkerHandle> for String {
    fn from(handle: WorkerHandle) -> Self {
        handle.to_string()
    }
}

impl TryFrom<String> for WorkerHandle {
    type Error = ExError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// A registry record: one named, point-in-time copy of all tracked databases.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    pub snapshot_name: String,
    pub project_name: String,
    /// Monotonically non-decreasing with insertion order
    pub created_at: DateTime<Utc>,
    /// Flips false -> true exactly once, when every database copy completed
    pub ready: bool,
    /// Present only while `ready` is false and a worker was dispatched
    pub worker_handle: Option<WorkerHandle>,
    /// Pure function of `(snapshot_name, project_name)`
    pub storage_location: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_worker_handle_text_form() {
        assert_eq!(WorkerHandle::Process(42).to_string(), "pid:42");
        assert_eq!(
            "pid:42".parse::<WorkerHandle>().unwrap(),
            WorkerHandle::Process(42)
        );
        assert_eq!(
            "task:abc".parse::<WorkerHandle>().unwrap(),
            WorkerHandle::Task("abc".into())
        );
    }

    #[test]
    fn test_worker_handle_rejects_garbage() {
        for bad in ["", "pid:", "pid:x", "task:", "thread:1", "42"] {
            let err = bad.parse::<WorkerHandle>().unwrap_err();
            assert_eq!(err.kind(), ExErrorKind::InvalidInput, "{}", bad);
        }
    }

    #[test]
    fn test_new_task_handles_are_unique() {
        assert_ne!(WorkerHandle::new_task(), WorkerHandle::new_task());
    }
}
