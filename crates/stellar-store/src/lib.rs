//! Stellar Store - Persistence layer for database snapshots
//!
//! Provides:
//! - SQLite connection helpers and an embedded, checksummed migrations framework
//! - The Snapshot Registry (durable snapshot metadata)
//! - Physical snapshot storage (one directory per storage location)
//! - SQLite copy strategies (namespace clone and row transfer)

pub mod copy;
pub mod db;
pub mod errors;
pub mod migrations;
pub mod registry;
pub mod storage;

// Re-export key types
pub use copy::{SqliteCloneStrategy, SqliteRowCopyStrategy};
pub use errors::Result;
pub use registry::SnapshotRegistry;
pub use storage::SnapshotStorage;
