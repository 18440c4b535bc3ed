#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
#![cfg_attr(docsrs, feature(doc_cfg))]
#![cfg_attr(coverage_nightly, coverage(off))] // This is all test code, no need to test it.

//! Private helpers for testing and examples in bench_engine packages.

use std::panic;
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

/// Runs a test with the default timeout to turn hangs into test failures.
///
/// Benchmark threads synchronize on barriers, so a broken synchronization path shows up as a
/// hang rather than a panic. The default timeout is 10 seconds under normal conditions and 60
/// seconds under Miri.
///
/// When the `MUTATION_TESTING` environment variable is set to "1", the watchdog is disabled
/// and the test function is executed directly, so that mutation testing can detect hanging
/// mutations by its own means.
///
/// # Panics
///
/// Panics if the test exceeds the timeout (when not in mutation testing mode) and re-raises
/// any panic of the test function.
///
/// # Example
///
/// ```rust
/// use testing::with_watchdog;
///
/// let result = with_watchdog(|| 2 + 2);
/// assert_eq!(result, 4);
/// ```
pub fn with_watchdog<F, R>(test_fn: F) -> R
where
    F: FnOnce() -> R + Send + 'static,
    R: Send + 'static,
{
    let timeout = if cfg!(miri) {
        Duration::from_secs(60)
    } else {
        Duration::from_secs(10)
    };

    with_watchdog_timeout(timeout, test_fn)
}

/// Runs a test on a separate thread and fails it if it does not complete within `timeout`.
///
/// See [`with_watchdog()`] for the behavior under mutation testing.
///
/// # Panics
///
/// Panics if the test exceeds the timeout and re-raises any panic of the test function.
pub fn with_watchdog_timeout<F, R>(timeout: Duration, test_fn: F) -> R
where
    F: FnOnce() -> R + Send + 'static,
    R: Send + 'static,
{
    if std::env::var("MUTATION_TESTING").as_deref() == Ok("1") {
        return test_fn();
    }

    let (tx, rx) = mpsc::channel();

    let test_handle = thread::spawn(move || {
        let result = test_fn();
        // If this fails, the receiver has already timed out.
        drop(tx.send(result));
    });

    match rx.recv_timeout(timeout) {
        Ok(result) => {
            test_handle.join().expect("test thread should not panic");
            result
        }
        Err(mpsc::RecvTimeoutError::Timeout) => {
            panic!("test exceeded its timeout of {timeout:?}");
        }
        Err(mpsc::RecvTimeoutError::Disconnected) => match test_handle.join() {
            Ok(()) => panic!("test thread disconnected unexpectedly"),
            Err(payload) => panic::resume_unwind(payload),
        },
    }
}

/// Calculates the difference between two f64 values and considers
/// them equal if the difference is not more than `close_enough`.
///
/// This is a "correctly performed" floating point equality comparison.
#[must_use]
pub fn f64_diff_abs(a: f64, b: f64, close_enough: f64) -> f64 {
    let diff = (a - b).abs();

    if diff <= close_enough { 0.0 } else { diff }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    #[test]
    fn watchdog_returns_result() {
        assert_eq!(with_watchdog(|| 42), 42);
    }

    #[test]
    #[should_panic(expected = "inner failure")]
    fn watchdog_propagates_panics() {
        with_watchdog(|| panic!("inner failure"));
    }

    #[test]
    #[should_panic]
    fn watchdog_fails_hanging_tests() {
        if std::env::var("MUTATION_TESTING").as_deref() == Ok("1") {
            panic!("skipped under mutation testing");
        }

        with_watchdog_timeout(Duration::from_millis(10), || {
            thread::sleep(Duration::from_secs(60));
        });
    }

    #[test]
    fn diff_within_tolerance_is_zero() {
        assert_eq!(f64_diff_abs(1.0, 1.0 + 1e-12, 1e-9), 0.0);
        assert!(f64_diff_abs(1.0, 2.0, 1e-9) > 0.5);
    }
}
