//! Per-dialect copy contract.
//!
//! A `CopyStrategy` duplicates one tracked database into snapshot storage and
//! back. Strategies differ in how they do it (whole-namespace clone versus
//! definition copy plus bulk row transfer) but callers treat them as
//! interchangeable black boxes. Only strategy selection ever looks at the
//! dialect.

use crate::errors::Result;
use crate::model::TrackedDatabase;
use std::path::Path;

/// Observer invoked with a database name right before its copy begins.
///
/// Borrowing observers use `CopyObserver<'_>`; observers handed to another
/// thread are `Arc<CopyObserver<'static>>`.
pub type CopyObserver<'a> = dyn Fn(&str) + Send + Sync + 'a;

/// Bulk duplication of a tracked database, for one dialect.
pub trait CopyStrategy: Send + Sync {
    /// Short identifier used in logs
    fn name(&self) -> &'static str;

    /// Copy the live `source` database into the storage file `destination`.
    ///
    /// Any leftover at `destination` from an interrupted copy is replaced.
    fn copy_forward(&self, source: &TrackedDatabase, destination: &Path) -> Result<()>;

    /// Replace the live `destination` database with the contents of the
    /// storage file `source`.
    ///
    /// Must be atomic with respect to readers of `destination`: they observe
    /// either the old contents or the restored contents, never a mix.
    fn copy_backward(&self, source: &Path, destination: &TrackedDatabase) -> Result<()>;
}
