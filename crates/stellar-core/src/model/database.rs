use std::path::PathBuf;

/// A database designated by project configuration to take part in
/// snapshot/restore, resolved to the file that holds it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackedDatabase {
    /// Name as written in `tracked_databases`; also the file name inside a
    /// snapshot's storage location
    pub name: String,
    /// Live database file
    pub path: PathBuf,
}

impl TrackedDatabase {
    pub fn new(name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
        }
    }
}
