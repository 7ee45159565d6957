//! Cancellable polling.
//!
//! Cancelling only ends the wait. Whatever is being waited on (a detached
//! copy worker) keeps running.

#![allow(clippy::result_large_err)]

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use stellar_core::errors::{ExError, ExErrorKind, Result};

/// Longest uninterrupted sleep, so a cancel is noticed promptly
const SLEEP_SLICE: Duration = Duration::from_millis(50);

/// Shared flag that stops a blocking wait, e.g. from a signal handler or
/// another thread.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

fn cancelled(op: &str) -> ExError {
    ExError::new(ExErrorKind::Cancelled)
        .with_op(op.to_string())
        .with_message("Wait cancelled; the worker keeps running")
}

/// Call `check` until it yields a value, sleeping `interval` between calls.
///
/// ## Errors
///
/// - `Cancelled`: `cancel` was set before a value was produced
/// - anything `check` returns
pub fn poll_until<T, F>(
    op: &str,
    interval: Duration,
    cancel: Option<&CancelFlag>,
    mut check: F,
) -> Result<T>
where
    F: FnMut() -> Result<Option<T>>,
{
    let is_cancelled = || cancel.is_some_and(CancelFlag::is_cancelled);

    loop {
        if let Some(value) = check()? {
            return Ok(value);
        }
        if is_cancelled() {
            return Err(cancelled(op));
        }

        let deadline = Instant::now() + interval;
        loop {
            let now = Instant::now();
            if now >= deadline {
                break;
            }
            thread::sleep(SLEEP_SLICE.min(deadline - now));
            if is_cancelled() {
                return Err(cancelled(op));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn test_returns_first_value() {
        let calls = Cell::new(0);
        let value = poll_until("test", Duration::from_millis(1), None, || {
            calls.set(calls.get() + 1);
            Ok((calls.get() == 3).then_some("done"))
        })
        .unwrap();
        assert_eq!(value, "done");
        assert_eq!(calls.get(), 3);
    }

    #[test]
    fn test_cancel_stops_waiting() {
        let flag = CancelFlag::new();
        let remote = flag.clone();
        let canceller = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            remote.cancel();
        });

        let started = Instant::now();
        let err = poll_until::<(), _>("test", Duration::from_secs(30), Some(&flag), || Ok(None))
            .unwrap_err();

        assert_eq!(err.kind(), ExErrorKind::Cancelled);
        assert!(started.elapsed() < Duration::from_secs(5));
        canceller.join().unwrap();
    }

    #[test]
    fn test_check_error_propagates() {
        let err = poll_until::<(), _>("test", Duration::from_millis(1), None, || {
            Err(ExError::new(ExErrorKind::NotFound))
        })
        .unwrap_err();
        assert!(err.is_not_found());
    }
}
