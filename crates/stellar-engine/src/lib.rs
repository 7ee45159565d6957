//! Stellar Engine - Snapshot lifecycle orchestration
//!
//! Coordinates the registry, the per-dialect copy strategies and the
//! detached copy workers behind one [`SnapshotEngine`] value. The engine
//! holds no global state: every instance is built from an explicit
//! [`stellar_core::Project`].

pub mod connection;
pub mod engine;
pub mod gc;
pub mod wait;
pub mod worker;

pub use connection::{ConnectionProvider, CopyStrategies, ResolvedProject, UrlConnectionProvider};
pub use engine::{RestoreOptions, SnapshotEngine};
pub use wait::CancelFlag;
pub use worker::{CopyWorker, ProcessLauncher, ThreadLauncher, WorkerJob, WorkerLauncher};
