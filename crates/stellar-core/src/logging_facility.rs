//! Structured logging facility for Stellar
//!
//! This module provides a canonical logging facility with:
//! - Single initialization point via `init(profile)`
//! - Structured logging macros (`log_op_start!`, `log_op_end!`, `log_op_error!`)
//! - Test capture mode for deterministic assertions
//!
//! # Usage
//!
//! ```rust
//! use stellar_core::logging_facility::{init, Profile};
//!
//! // Initialize once at application startup
//! init(Profile::Development);
//! ```
//!
//! # Logging Macros
//!
//! - `log_op_start!(op, snapshot [, worker = handle])`
//! - `log_op_end!(op, snapshot, started [, databases = n])`
//! - `log_op_error!(op, snapshot, started, &err)`
//!
//! Engine operations own lifecycle events; the store and copy strategies only
//! emit `tracing::debug!` details.

pub mod init;
pub mod macros;
pub mod test_capture;

pub use init::{init, init_with_level, Profile};
pub use test_capture::{init_test_capture, CapturedEvent, TestCapture};
