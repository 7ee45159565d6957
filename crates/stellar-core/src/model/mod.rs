//! Domain model: snapshot records, worker handles, tracked databases and the
//! storage-location naming convention.

pub mod database;
pub mod naming;
pub mod snapshot;

pub use database::TrackedDatabase;
pub use naming::{is_storage_location, storage_location, validate_snapshot_name};
pub use snapshot::{Snapshot, WorkerHandle};
