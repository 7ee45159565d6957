//! Storage-location naming convention.
//!
//! A snapshot's storage lives under `stellar_<16 hex>` where the hex digits
//! are the prefix of `SHA-256("<snapshot_name>|<project_name>")`. The
//! location is derived, never chosen, so registry and storage cannot disagree
//! about which directory belongs to which name. Anything in the storage root
//! matching [`is_storage_location`] is owned by the snapshot engine.

use crate::errors::{ExError, ExErrorKind, Result};
use sha2::{Digest, Sha256};

/// Prefix shared by every snapshot storage location
pub const STORAGE_PREFIX: &str = "stellar_";

const DIGEST_CHARS: usize = 16;
const MAX_NAME_LEN: usize = 255;

/// Derive the storage location of a snapshot.
pub fn storage_location(snapshot_name: &str, project_name: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(format!("{}|{}", snapshot_name, project_name).as_bytes());
    let digest = hex::encode(hasher.finalize());
    format!("{}{}", STORAGE_PREFIX, &digest[..DIGEST_CHARS])
}

/// Whether `candidate` matches the snapshot storage naming convention.
pub fn is_storage_location(candidate: &str) -> bool {
    match candidate.strip_prefix(STORAGE_PREFIX) {
        Some(rest) => {
            rest.len() == DIGEST_CHARS
                && rest
                    .chars()
                    .all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c))
        }
        None => false,
    }
}

/// Reject names that cannot be stored or typed back on a command line.
pub fn validate_snapshot_name(name: &str) -> Result<()> {
    let reason = if name.trim().is_empty() {
        Some("snapshot name must not be empty")
    } else if name.len() > MAX_NAME_LEN {
        Some("snapshot name is longer than 255 bytes")
    } else if name.chars().any(char::is_control) {
        Some("snapshot name must not contain control characters")
    } else {
        None
    };

    match reason {
        Some(reason) => Err(ExError::new(ExErrorKind::InvalidInput)
            .with_op("validate_snapshot_name")
            .with_snapshot(name)
            .with_message(reason)),
        None => Ok(()),
    }
}
