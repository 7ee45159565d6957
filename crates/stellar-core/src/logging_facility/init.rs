//! Logging initialization module
//!
//! Provides a single initialization point for the logging facility.

use std::sync::Once;
use tracing_subscriber::{util::SubscriberInitExt, EnvFilter};

/// Logging profile configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Profile {
    /// Human-readable output for development
    Development,
    /// JSON structured output for production
    Production,
    /// Test capture mode for deterministic testing
    Test,
}

impl Profile {
    fn default_level(&self) -> &'static str {
        match self {
            Profile::Development => "debug",
            Profile::Production | Profile::Test => "info",
        }
    }
}

static INIT_ONCE: Once = Once::new();

/// Initialize the logging facility with the profile's default level
///
/// # Profiles
///
/// - **Development**: Human-readable logs with debug level
/// - **Production**: JSON structured logs with info level
/// - **Test**: Capture mode for test assertions
///
/// # Example
///
/// ```
/// use stellar_core::logging_facility::{init, Profile};
///
/// init(Profile::Development);
/// ```
pub fn init(profile: Profile) {
    init_with_level(profile, None);
}

/// Initialize the logging facility, overriding the default level.
///
/// `RUST_LOG` still wins over `level` when set. Logs go to stderr so command
/// output on stdout stays clean. Only the first call has any effect.
pub fn init_with_level(profile: Profile, level: Option<&str>) {
    INIT_ONCE.call_once(|| {
        let directive = format!("stellar={}", level.unwrap_or(profile.default_level()));
        let filter = || EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&directive));
        match profile {
            Profile::Development => {
                tracing_subscriber::fmt()
                    .with_writer(std::io::stderr)
                    .with_env_filter(filter())
                    .init();
            }
            Profile::Production => {
                tracing_subscriber::fmt()
                    .json()
                    .with_writer(std::io::stderr)
                    .with_env_filter(filter())
                    .init();
            }
            Profile::Test => {
                // Test capture is initialized separately via init_test_capture()
                tracing_subscriber::registry().init();
            }
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_idempotent() {
        init(Profile::Test);
        init(Profile::Test);
        init_with_level(Profile::Test, Some("warn"));
    }

    #[test]
    fn test_profile_default_levels() {
        assert_eq!(Profile::Development.default_level(), "debug");
        assert_eq!(Profile::Production.default_level(), "info");
        assert_ne!(Profile::Development, Profile::Production);
    }
}
