//! Project resolution and copy strategy selection.
//!
//! The connection provider turns configured URLs into concrete database files
//! plus a dialect tag. The dialect tag is looked at exactly once, when
//! [`CopyStrategies::select`] picks the strategy for an engine.

#![allow(clippy::result_large_err)]

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use stellar_core::errors::{ExError, ExErrorKind, Result};
use stellar_core::{CopyStrategy, Project, TrackedDatabase};
use stellar_store::{SqliteCloneStrategy, SqliteRowCopyStrategy};

/// A project's configuration resolved against the filesystem
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedProject {
    pub dialect: String,
    pub databases: Vec<TrackedDatabase>,
    pub storage_root: PathBuf,
}

/// Resolves a project's connection URL into databases and a dialect tag.
pub trait ConnectionProvider: Send + Sync {
    /// ## Errors
    ///
    /// - `InvalidConfig`: a URL does not have the expected shape
    fn resolve(&self, project: &Project) -> Result<ResolvedProject>;
}

/// Resolves `<dialect>://<directory>` URLs.
///
/// Each tracked database is the file `<directory>/<name>`. Relative
/// directories are anchored at the project root.
#[derive(Debug, Default, Clone, Copy)]
pub struct UrlConnectionProvider;

impl ConnectionProvider for UrlConnectionProvider {
    fn resolve(&self, project: &Project) -> Result<ResolvedProject> {
        let (dialect, data_dir) = split_url("url", &project.url)?;
        let (_, storage_dir) = split_url("storage_url", &project.storage_url)?;

        let data_dir = anchor(&project.root, data_dir);
        let databases = project
            .tracked_databases
            .iter()
            .map(|name| TrackedDatabase::new(name.as_str(), data_dir.join(name)))
            .collect();

        Ok(ResolvedProject {
            dialect: dialect.to_string(),
            databases,
            storage_root: anchor(&project.root, storage_dir),
        })
    }
}

fn split_url<'a>(field: &str, url: &'a str) -> Result<(&'a str, &'a str)> {
    match url.split_once("://") {
        Some((scheme, path)) if !scheme.is_empty() => Ok((scheme, path)),
        _ => Err(ExError::new(ExErrorKind::InvalidConfig)
            .with_op("resolve_project")
            .with_message(format!(
                "{} '{}' must look like <dialect>://<path>",
                field, url
            ))),
    }
}

fn anchor(root: &Path, path: &str) -> PathBuf {
    let path = Path::new(path);
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        root.join(path)
    }
}

/// Copy strategies keyed by dialect tag.
#[derive(Clone)]
pub struct CopyStrategies {
    strategies: BTreeMap<String, Arc<dyn CopyStrategy>>,
}

impl CopyStrategies {
    /// A table with no strategies registered
    pub fn empty() -> Self {
        Self {
            strategies: BTreeMap::new(),
        }
    }

    /// Register (or override) the strategy for `dialect`
    pub fn register(mut self, dialect: impl Into<String>, strategy: Arc<dyn CopyStrategy>) -> Self {
        self.strategies.insert(dialect.into(), strategy);
        self
    }

    /// Dialect tags with a registered strategy, sorted
    pub fn dialects(&self) -> Vec<&str> {
        self.strategies.keys().map(String::as_str).collect()
    }

    /// ## Errors
    ///
    /// - `UnsupportedDialect`: nothing is registered for `dialect`
    pub fn select(&self, dialect: &str) -> Result<Arc<dyn CopyStrategy>> {
        self.strategies.get(dialect).cloned().ok_or_else(|| {
            ExError::new(ExErrorKind::UnsupportedDialect)
                .with_op("select_strategy")
                .with_message(format!(
                    "Dialect '{}' is not supported (supported: {})",
                    dialect,
                    self.dialects().join(", ")
                ))
        })
    }
}

impl Default for CopyStrategies {
    fn default() -> Self {
        Self::empty()
            .register("sqlite", Arc::new(SqliteCloneStrategy))
            .register("sqlite+rowcopy", Arc::new(SqliteRowCopyStrategy))
    }
}

impl fmt::Debug for CopyStrategies {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map()
            .entries(self.strategies.iter().map(|(k, v)| (k, v.name())))
            .finish()
    }
}
