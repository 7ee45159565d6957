//! Stellar Core - Domain kernel for database snapshots
//!
//! This crate provides the foundational pieces shared by the store, the
//! engine and the CLI:
//! - Canonical error facility (`ExError`, `ExErrorKind`)
//! - Structured logging facility with lifecycle macros
//! - Snapshot record model, worker handles and storage-location naming
//! - Project configuration loading and validation
//! - The per-dialect `CopyStrategy` contract

pub mod config;
pub mod copy_strategy;
pub mod errors;
pub mod logging_facility;
pub mod model;

// Re-export commonly used types
pub use config::Project;
pub use copy_strategy::{CopyObserver, CopyStrategy};
pub use errors::{ConfigError, ExError, ExErrorKind, Result};
pub use model::{Snapshot, TrackedDatabase, WorkerHandle};
