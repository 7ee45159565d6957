use std::path::PathBuf;
use thiserror::Error;

/// Result type alias using ExError
pub type Result<T> = std::result::Result<T, ExError>;

// ========== Error Facility ==========

/// Canonical error kind taxonomy
///
/// This taxonomy provides a stable, structured classification of all errors
/// raised by the snapshot engine. Each kind maps to a stable error code that
/// callers (the CLI, scripts, tests) can match on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExErrorKind {
    // Registry
    /// A create or rename target name is already taken by a live snapshot
    NameCollision,
    /// No registry record exists for the referenced snapshot name
    NotFound,

    // Configuration
    MissingConfig,
    InvalidConfig,
    /// The resolved dialect has no registered copy strategy
    UnsupportedDialect,
    InvalidInput,

    // Copy / storage
    /// A per-database copy failed
    WorkerFailure,
    /// Physical storage disagrees with the registry
    StorageInconsistency,

    // Waiting
    Cancelled,
    Concurrency,

    // Integration/IO
    Io,
    Serialization,
    Persistence,

    // Internal
    Internal,
}

impl ExErrorKind {
    /// Get the stable error code for this kind
    pub fn code(&self) -> &'static str {
        match self {
            ExErrorKind::NameCollision => "ERR_NAME_COLLISION",
            ExErrorKind::NotFound => "ERR_NOT_FOUND",
            ExErrorKind::MissingConfig => "ERR_MISSING_CONFIG",
            ExErrorKind::InvalidConfig => "ERR_INVALID_CONFIG",
            ExErrorKind::UnsupportedDialect => "ERR_UNSUPPORTED_DIALECT",
            ExErrorKind::InvalidInput => "ERR_INVALID_INPUT",
            ExErrorKind::WorkerFailure => "ERR_WORKER_FAILURE",
            ExErrorKind::StorageInconsistency => "ERR_STORAGE_INCONSISTENCY",
            ExErrorKind::Cancelled => "ERR_CANCELLED",
            ExErrorKind::Concurrency => "ERR_CONCURRENCY",
            ExErrorKind::Io => "ERR_IO",
            ExErrorKind::Serialization => "ERR_SERIALIZATION",
            ExErrorKind::Persistence => "ERR_PERSISTENCE",
            ExErrorKind::Internal => "ERR_INTERNAL",
        }
    }
}

/// Canonical structured error type
///
/// Carries a classification (`kind`) for programmatic handling plus the
/// operation and snapshot it concerns for debugging.
#[derive(Debug, Clone)]
pub struct ExError {
    kind: ExErrorKind,
    op: Option<String>,
    snapshot_name: Option<String>,
    message: String,
    source: Option<Box<ExError>>,
}

impl ExError {
    /// Create a new error with the specified kind
    pub fn new(kind: ExErrorKind) -> Self {
        Self {
            kind,
            op: None,
            snapshot_name: None,
            message: String::new(),
            source: None,
        }
    }

    /// Add operation context
    pub fn with_op(mut self, op: impl Into<String>) -> Self {
        self.op = Some(op.into());
        self
    }

    /// Add snapshot name context
    pub fn with_snapshot(mut self, name: impl Into<String>) -> Self {
        self.snapshot_name = Some(name.into());
        self
    }

    /// Add custom message
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    /// Add source error
    pub fn with_source(mut self, source: ExError) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    /// Get the error kind
    pub fn kind(&self) -> ExErrorKind {
        self.kind
    }

    /// Get the stable error code
    pub fn code(&self) -> &'static str {
        self.kind.code()
    }

    /// Get the operation context, if any
    pub fn op(&self) -> Option<&str> {
        self.op.as_deref()
    }

    /// Get the snapshot name context, if any
    pub fn snapshot_name(&self) -> Option<&str> {
        self.snapshot_name.as_deref()
    }

    /// Get the error message
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Get the source error, if any
    pub fn source_error(&self) -> Option<&ExError> {
        self.source.as_deref()
    }

    /// Shorthand for `kind() == NotFound`
    pub fn is_not_found(&self) -> bool {
        self.kind == ExErrorKind::NotFound
    }
}

impl std::fmt::Display for ExError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}]", self.code())?;
        if let Some(op) = &self.op {
            write!(f, " in operation '{}'", op)?;
        }
        if !self.message.is_empty() {
            write!(f, ": {}", self.message)?;
        }
        if let Some(name) = &self.snapshot_name {
            write!(f, " (snapshot: {})", name)?;
        }
        Ok(())
    }
}

impl std::error::Error for ExError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_deref()
            .map(|e| e as &(dyn std::error::Error + 'static))
    }
}

// ========== End Error Facility ==========

/// Errors raised while locating and validating `stellar.yaml`
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    /// No configuration file in the start directory or any ancestor
    #[error("You don't have stellar.yaml configuration yet (searched from {searched_from})")]
    Missing { searched_from: PathBuf },

    /// The configuration file exists but could not be read
    #[error("Could not read {path}: {reason}")]
    Unreadable { path: PathBuf, reason: String },

    /// The configuration file is not valid YAML for a project
    #[error("Could not parse {path}: {reason}")]
    Parse { path: PathBuf, reason: String },

    /// The configuration parsed but violates a rule
    #[error("Your stellar.yaml configuration is wrong: {reason}")]
    Invalid { reason: String },
}

impl From<ConfigError> for ExError {
    fn from(err: ConfigError) -> Self {
        let kind = match err {
            ConfigError::Missing { .. } => ExErrorKind::MissingConfig,
            ConfigError::Unreadable { .. } => ExErrorKind::Io,
            ConfigError::Parse { .. } | ConfigError::Invalid { .. } => ExErrorKind::InvalidConfig,
        };
        ExError::new(kind)
            .with_op("load_config")
            .with_message(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_includes_code_op_and_snapshot() {
        let err = ExError::new(ExErrorKind::NameCollision)
            .with_op("create")
            .with_snapshot("v1")
            .with_message("snapshot already exists");
        let rendered = err.to_string();
        assert!(rendered.starts_with("[ERR_NAME_COLLISION]"));
        assert!(rendered.contains("'create'"));
        assert!(rendered.contains("(snapshot: v1)"));
    }

    #[test]
    fn test_source_chain_is_exposed() {
        use std::error::Error as _;
        let inner = ExError::new(ExErrorKind::Io).with_message("disk full");
        let outer = ExError::new(ExErrorKind::WorkerFailure).with_source(inner);
        assert!(outer.source().is_some());
        assert_eq!(
            outer.source_error().map(|e| e.kind()),
            Some(ExErrorKind::Io)
        );
    }

    #[test]
    fn test_config_error_kinds() {
        let missing: ExError = ConfigError::Missing {
            searched_from: PathBuf::from("/tmp"),
        }
        .into();
        assert_eq!(missing.kind(), ExErrorKind::MissingConfig);

        let invalid: ExError = ConfigError::Invalid {
            reason: "empty".into(),
        }
        .into();
        assert_eq!(invalid.kind(), ExErrorKind::InvalidConfig);
    }
}
