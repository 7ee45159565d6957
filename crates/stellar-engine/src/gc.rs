//! Orphan Reconciler.
//!
//! An orphan is a storage directory that follows the snapshot naming
//! convention but is referenced by no registry record of any project. They
//! are left behind by crashes between steps of remove or replace, or by a
//! worker writing into a snapshot that was removed underneath it.

#![allow(clippy::result_large_err)]

use stellar_core::errors::Result;
use stellar_store::{SnapshotRegistry, SnapshotStorage};

/// Delete every orphaned storage location, in sorted order.
///
/// Orphans are found and renamed out of the naming convention under the
/// registry write lock, so no create or rename can make a location
/// referenced in between. The recursive deletes run after the lock is
/// released, so workers recording progress are never held up by them.
/// Needs no knowledge of running workers: a snapshot's record exists before
/// its worker starts.
///
/// ## Errors
///
/// - `Io`: a directory could not be listed, renamed or deleted
pub fn reconcile(
    registry: &SnapshotRegistry,
    storage: &SnapshotStorage,
    on_delete: Option<&dyn Fn(&str)>,
) -> Result<Vec<String>> {
    let leftovers = storage.purge_retired()?;
    if leftovers > 0 {
        tracing::info!(deleted_count = leftovers, "Purged storage retired by an interrupted gc");
    }

    let retired = registry.locked_storage_locations(|referenced| {
        let mut retired = Vec::new();
        for location in storage.list_locations()? {
            if !referenced.contains(&location) {
                storage.retire(&location)?;
                retired.push(location);
            }
        }
        Ok(retired)
    })?;

    storage.purge_retired()?;
    for location in &retired {
        tracing::info!(storage_location = %location, "Deleted orphaned snapshot storage");
        if let Some(callback) = on_delete {
            callback(location);
        }
    }
    Ok(retired)
}
