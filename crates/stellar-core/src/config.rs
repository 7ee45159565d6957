//! Project configuration (`stellar.yaml`).
//!
//! The file is discovered by walking from a start directory up to the
//! filesystem root. The directory holding it becomes the project root, which
//! relative URLs resolve against.

use crate::errors::ConfigError;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

/// Name of the project configuration file
pub const CONFIG_FILE_NAME: &str = "stellar.yaml";

/// Immutable project configuration, loaded once per process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    pub project_name: String,
    pub tracked_databases: Vec<String>,
    /// Connection template handed to the connection provider
    pub url: String,
    /// Prefix under which snapshot storage and the registry live
    #[serde(alias = "stellar_url")]
    pub storage_url: String,
    /// Default log level for the CLI (`RUST_LOG` overrides it)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logging: Option<String>,
    /// Directory the configuration was loaded from
    #[serde(skip)]
    pub root: PathBuf,
    /// Path of the configuration file, when loaded from disk
    #[serde(skip)]
    pub config_path: Option<PathBuf>,
}

impl Project {
    /// Parse and validate configuration text. `root` anchors relative paths.
    pub fn from_yaml_str(content: &str, root: &Path) -> Result<Self, ConfigError> {
        let mut project: Project =
            serde_yaml::from_str(content).map_err(|e| ConfigError::Parse {
                path: root.join(CONFIG_FILE_NAME),
                reason: e.to_string(),
            })?;
        project.root = root.to_path_buf();
        project.validate()?;
        Ok(project)
    }

    /// Load a configuration file from an explicit path.
    pub fn load_file(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|e| ConfigError::Unreadable {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        let root = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        let mut project = Self::from_yaml_str(&content, root)?;
        project.config_path = Some(path.to_path_buf());
        Ok(project)
    }

    /// Find `stellar.yaml` in `start` or its nearest ancestor and load it.
    pub fn discover(start: &Path) -> Result<Self, ConfigError> {
        let found = start
            .ancestors()
            .map(|dir| dir.join(CONFIG_FILE_NAME))
            .find(|candidate| candidate.is_file());

        match found {
            Some(path) => Self::load_file(&path),
            None => Err(ConfigError::Missing {
                searched_from: start.to_path_buf(),
            }),
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |reason: String| Err(ConfigError::Invalid { reason });

        if self.project_name.trim().is_empty() {
            return invalid("project_name must not be empty".into());
        }
        if self.url.trim().is_empty() {
            return invalid("url must not be empty".into());
        }
        if self.storage_url.trim().is_empty() {
            return invalid("storage_url must not be empty".into());
        }
        if self.tracked_databases.is_empty() {
            return invalid("tracked_databases must list at least one database".into());
        }

        let mut seen = HashSet::new();
        for name in &self.tracked_databases {
            if name.trim().is_empty() || name == "." || name == ".." {
                return invalid(format!("invalid tracked database name '{}'", name));
            }
            if name.contains('/') || name.contains('\\') {
                return invalid(format!(
                    "tracked database '{}' must be a name, not a path",
                    name
                ));
            }
            if !seen.insert(name.as_str()) {
                return invalid(format!("tracked database '{}' is listed twice", name));
            }
        }

        Ok(())
    }
}
