//! Physical snapshot storage.
//!
//! Layout under the storage root:
//!
//! ```text
//! <root>/registry.db                     snapshot registry
//! <root>/stellar_<16 hex>/<database>     one copy per tracked database
//! <root>/gc-stellar_<16 hex>/             orphan set aside by gc, pending deletion
//! ```
//!
//! Only directories matching the naming convention are ever renamed, listed
//! or deleted here.

#![allow(clippy::result_large_err)]

use crate::errors::{io_error, Result};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use stellar_core::errors::{ExError, ExErrorKind};
use stellar_core::model::{is_storage_location, TrackedDatabase};

/// File name of the registry database inside the storage root
pub const REGISTRY_FILE_NAME: &str = "registry.db";

/// Prefix that moves a location out of the naming convention until purged
pub const RETIRED_PREFIX: &str = "gc-";

/// Directory-per-snapshot storage rooted at the project's storage URL
#[derive(Debug, Clone)]
pub struct SnapshotStorage {
    root: PathBuf,
}

impl SnapshotStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Create the storage root if needed
    pub fn ensure_root(&self) -> Result<()> {
        fs::create_dir_all(&self.root).map_err(|e| io_error("storage_ensure_root", e))
    }

    /// Path of the registry database
    pub fn registry_path(&self) -> PathBuf {
        self.root.join(REGISTRY_FILE_NAME)
    }

    /// Directory holding one snapshot's copies
    pub fn location_path(&self, location: &str) -> Result<PathBuf> {
        if !is_storage_location(location) {
            return Err(ExError::new(ExErrorKind::InvalidInput)
                .with_op("storage_location_path")
                .with_message(format!(
                    "'{}' does not match the snapshot storage naming convention",
                    location
                )));
        }
        Ok(self.root.join(location))
    }

    /// File holding the copy of `database` for the snapshot at `location`
    pub fn object_path(&self, location: &str, database: &TrackedDatabase) -> Result<PathBuf> {
        Ok(self.location_path(location)?.join(&database.name))
    }

    /// Create the location directory, returning its path
    pub fn prepare(&self, location: &str) -> Result<PathBuf> {
        let path = self.location_path(location)?;
        fs::create_dir_all(&path).map_err(|e| io_error("storage_prepare", e))?;
        Ok(path)
    }

    pub fn exists(&self, location: &str) -> bool {
        self.location_path(location)
            .map(|p| p.is_dir())
            .unwrap_or(false)
    }

    /// Delete a location and everything in it.
    ///
    /// Returns `false` when there was nothing to delete.
    pub fn delete(&self, location: &str) -> Result<bool> {
        let path = self.location_path(location)?;
        match fs::remove_dir_all(&path) {
            Ok(()) => {
                tracing::debug!(storage_location = location, "Deleted snapshot storage");
                Ok(true)
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(io_error("storage_delete", e)),
        }
    }

    /// Move a location to a new name.
    ///
    /// A source that was never materialized (worker not started yet) is not
    /// an error. A target that already exists is: it is unregistered debris
    /// and must be reclaimed by gc rather than overwritten.
    pub fn rename(&self, from: &str, to: &str) -> Result<()> {
        let from_path = self.location_path(from)?;
        let to_path = self.location_path(to)?;

        if to_path.exists() {
            return Err(ExError::new(ExErrorKind::StorageInconsistency)
                .with_op("storage_rename")
                .with_message(format!(
                    "Storage location {} already exists without a snapshot; run gc first",
                    to
                )));
        }
        if !from_path.exists() {
            return Ok(());
        }

        fs::rename(&from_path, &to_path).map_err(|e| io_error("storage_rename", e))?;
        tracing::debug!(from, to, "Renamed snapshot storage");
        Ok(())
    }

    /// Every directory under the root matching the naming convention, sorted
    pub fn list_locations(&self) -> Result<Vec<String>> {
        let mut locations: Vec<String> = self
            .directory_names("storage_list")?
            .into_iter()
            .filter(|name| is_storage_location(name))
            .collect();
        locations.sort();
        Ok(locations)
    }

    /// Rename `location` out of the naming convention.
    ///
    /// A single rename, cheap enough to run under the registry write lock;
    /// the contents are deleted later by [`purge_retired`](Self::purge_retired).
    pub fn retire(&self, location: &str) -> Result<()> {
        let from = self.location_path(location)?;
        let to = self.root.join(format!("{}{}", RETIRED_PREFIX, location));
        fs::rename(&from, &to).map_err(|e| io_error("storage_retire", e))?;
        tracing::debug!(storage_location = location, "Retired snapshot storage");
        Ok(())
    }

    /// Delete every retired location, including leftovers of an interrupted
    /// gc. Returns how many were deleted.
    pub fn purge_retired(&self) -> Result<usize> {
        let mut purged = 0;
        for name in self.directory_names("storage_purge")? {
            let Some(location) = name.strip_prefix(RETIRED_PREFIX) else {
                continue;
            };
            if !is_storage_location(location) {
                continue;
            }
            match fs::remove_dir_all(self.root.join(&name)) {
                Ok(()) => purged += 1,
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => return Err(io_error("storage_purge", e)),
            }
        }
        Ok(purged)
    }

    fn directory_names(&self, op: &str) -> Result<Vec<String>> {
        let entries = match fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(io_error(op, e)),
        };

        let mut names = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| io_error(op, e))?;
            if !entry.file_type().map_err(|e| io_error(op, e))?.is_dir() {
                continue;
            }
            if let Some(name) = entry.file_name().to_str() {
                names.push(name.to_string());
            }
        }
        Ok(names)
    }
}
