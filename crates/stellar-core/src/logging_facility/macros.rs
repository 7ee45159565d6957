//! Lifecycle logging macros.
//!
//! Every snapshot operation emits exactly one `start` event and then either
//! `end` or `end_error`. The macros fix the field set so log consumers can
//! rely on it:
//!
//! | field           | start | end | end_error |
//! |-----------------|-------|-----|-----------|
//! | `snapshot_name` | opt   | opt | opt       |
//! | `worker_handle` | opt   |     |           |
//! | `duration_ms`   |       | yes | yes       |
//! | `database_count`|       | opt |           |
//! | `err_kind`, `err_code`, `error` | | | yes |
//!
//! `snapshot` arguments accept `&str` or `Option<&str>`; `started` is the
//! [`Instant`] the operation began.

use std::time::Instant;

#[doc(hidden)]
pub fn snapshot_field<'a>(name: impl Into<Option<&'a str>>) -> Option<&'a str> {
    name.into()
}

#[doc(hidden)]
pub fn elapsed_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}

/// Emit the `start` event of a snapshot operation
///
/// ```
/// # use stellar_core::log_op_start;
/// let unnamed: Option<&str> = None;
/// log_op_start!("snapshot_list", unnamed);
/// log_op_start!("snapshot_create", "v1");
/// log_op_start!("worker_run", "v1", worker = "pid:42");
/// ```
#[macro_export]
macro_rules! log_op_start {
    ($op:expr, $snapshot:expr) => {
        tracing::info!(
            component = module_path!(),
            op = $op,
            event = stellar_core_types::schema::EVENT_START,
            snapshot_name = $crate::logging_facility::macros::snapshot_field($snapshot),
        )
    };
    ($op:expr, $snapshot:expr, worker = $handle:expr) => {
        tracing::info!(
            component = module_path!(),
            op = $op,
            event = stellar_core_types::schema::EVENT_START,
            snapshot_name = $crate::logging_facility::macros::snapshot_field($snapshot),
            worker_handle = %$handle,
        )
    };
}

/// Emit the `end` event, with the time elapsed since `started`
///
/// ```
/// # use stellar_core::log_op_end;
/// let started = std::time::Instant::now();
/// log_op_end!("snapshot_create", "v1", started);
/// log_op_end!("worker_run", "v1", started, databases = 2);
/// ```
#[macro_export]
macro_rules! log_op_end {
    ($op:expr, $snapshot:expr, $started:expr) => {
        tracing::info!(
            component = module_path!(),
            op = $op,
            event = stellar_core_types::schema::EVENT_END,
            snapshot_name = $crate::logging_facility::macros::snapshot_field($snapshot),
            duration_ms = $crate::logging_facility::macros::elapsed_ms($started),
        )
    };
    ($op:expr, $snapshot:expr, $started:expr, databases = $count:expr) => {
        tracing::info!(
            component = module_path!(),
            op = $op,
            event = stellar_core_types::schema::EVENT_END,
            snapshot_name = $crate::logging_facility::macros::snapshot_field($snapshot),
            duration_ms = $crate::logging_facility::macros::elapsed_ms($started),
            database_count = $count,
        )
    };
}

/// Emit the `end_error` event for `err` (an `&ExError`).
///
/// Without an explicit snapshot the one carried by the error is used.
///
/// ```
/// # use stellar_core::{log_op_error, errors::{ExError, ExErrorKind}};
/// let started = std::time::Instant::now();
/// let unnamed: Option<&str> = None;
/// let err = ExError::new(ExErrorKind::NotFound).with_snapshot("v1");
/// log_op_error!("snapshot_get", unnamed, started, &err);
/// ```
#[macro_export]
macro_rules! log_op_error {
    ($op:expr, $snapshot:expr, $started:expr, $err:expr) => {{
        let err: &$crate::errors::ExError = $err;
        tracing::error!(
            component = module_path!(),
            op = $op,
            event = stellar_core_types::schema::EVENT_END_ERROR,
            snapshot_name = $crate::logging_facility::macros::snapshot_field($snapshot)
                .or(err.snapshot_name()),
            duration_ms = $crate::logging_facility::macros::elapsed_ms($started),
            err_kind = ?err.kind(),
            err_code = err.code(),
            error = %err,
        )
    }};
}
