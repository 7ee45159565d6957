//! Subcommands and the shared engine bootstrap

pub mod gc;
pub mod list;
pub mod remove;
pub mod rename;
pub mod replace;
pub mod restore;
pub mod snapshot;
pub mod version;
pub mod worker;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use stellar_core::errors::ExError;
use stellar_core::logging_facility::{init_with_level, Profile};
use stellar_core::Project;
use stellar_engine::{ConnectionProvider, ProcessLauncher, SnapshotEngine, UrlConnectionProvider};

pub type CmdResult = Result<(), Box<dyn std::error::Error>>;

/// Worker process output, inside the storage root
const WORKER_LOG_FILE: &str = "worker.log";

/// Interactive commands stay quiet; detached workers log their progress
fn default_log_level(profile: Profile) -> &'static str {
    match profile {
        Profile::Production => "info",
        Profile::Development | Profile::Test => "warn",
    }
}

fn load_project(config: Option<&Path>) -> Result<Project, ExError> {
    let project = match config {
        Some(path) => Project::load_file(path)?,
        None => {
            let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
            Project::discover(&cwd)?
        }
    };
    Ok(project)
}

/// Load the project, start logging and open an engine whose workers are
/// detached `stellar worker` processes.
pub fn open_engine(config: Option<&Path>, profile: Profile) -> Result<SnapshotEngine, ExError> {
    let project = load_project(config)?;
    init_with_level(
        profile,
        Some(
            project
                .logging
                .as_deref()
                .unwrap_or(default_log_level(profile)),
        ),
    );

    let config_path = project
        .config_path
        .clone()
        .unwrap_or_else(|| project.root.join(stellar_core::config::CONFIG_FILE_NAME));
    // The worker may run from another directory.
    let config_path = std::fs::canonicalize(&config_path).unwrap_or(config_path);

    let storage_root = UrlConnectionProvider.resolve(&project)?.storage_root;
    let launcher =
        ProcessLauncher::current_exe(config_path)?.with_log_file(storage_root.join(WORKER_LOG_FILE));

    SnapshotEngine::with_defaults(project, Arc::new(launcher))
}

fn plural(count: usize) -> &'static str {
    if count == 1 {
        ""
    } else {
        "s"
    }
}
