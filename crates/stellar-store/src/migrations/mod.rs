//! Migration framework
//!
//! Provides:
//! - Migration runner with checksums
//! - Idempotent application, safe when several processes open the registry at once
//! - Embedded SQL migrations

mod checksums;
mod embedded;
mod runner;

pub use runner::apply_migrations;
