//! Fake platform implementation for testing.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::pal::abstractions::Platform;

#[derive(Debug)]
struct FakePlatformState {
    real_time: Duration,
    cpu_time: Duration,
}

/// Platform whose clocks only move when a test advances them.
///
/// Clones share the same clocks, so a test can keep one clone and advance time from inside a
/// benchmark body while the engine reads the other. The processor time clock is shared by all
/// threads rather than being tracked per thread.
#[derive(Clone, Debug)]
pub(crate) struct FakePlatform {
    state: Arc<Mutex<FakePlatformState>>,
}

impl FakePlatform {
    pub(crate) fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(FakePlatformState {
                real_time: Duration::ZERO,
                cpu_time: Duration::ZERO,
            })),
        }
    }

    /// Advances both clocks by the same amount.
    pub(crate) fn advance(&self, by: Duration) {
        let mut state = self
            .state
            .lock()
            .expect("FakePlatform state lock should not be poisoned");

        state.real_time = state.real_time.saturating_add(by);
        state.cpu_time = state.cpu_time.saturating_add(by);
    }

    pub(crate) fn advance_real(&self, by: Duration) {
        let mut state = self
            .state
            .lock()
            .expect("FakePlatform state lock should not be poisoned");

        state.real_time = state.real_time.saturating_add(by);
    }

    pub(crate) fn advance_cpu(&self, by: Duration) {
        let mut state = self
            .state
            .lock()
            .expect("FakePlatform state lock should not be poisoned");

        state.cpu_time = state.cpu_time.saturating_add(by);
    }
}

impl Platform for FakePlatform {
    fn real_time(&self) -> Duration {
        self.state
            .lock()
            .expect("FakePlatform state lock should not be poisoned")
            .real_time
    }

    fn thread_cpu_time(&self) -> Duration {
        self.state
            .lock()
            .expect("FakePlatform state lock should not be poisoned")
            .cpu_time
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    #[test]
    fn starts_at_zero() {
        let platform = FakePlatform::new();

        assert_eq!(platform.real_time(), Duration::ZERO);
        assert_eq!(platform.thread_cpu_time(), Duration::ZERO);
    }

    #[test]
    fn advance_moves_both_clocks() {
        let platform = FakePlatform::new();
        platform.advance(Duration::from_millis(5));

        assert_eq!(platform.real_time(), Duration::from_millis(5));
        assert_eq!(platform.thread_cpu_time(), Duration::from_millis(5));
    }

    #[test]
    fn clocks_advance_independently() {
        let platform = FakePlatform::new();
        platform.advance_real(Duration::from_millis(7));
        platform.advance_cpu(Duration::from_millis(3));

        assert_eq!(platform.real_time(), Duration::from_millis(7));
        assert_eq!(platform.thread_cpu_time(), Duration::from_millis(3));
    }

    #[test]
    fn clones_share_clocks() {
        let platform1 = FakePlatform::new();
        let platform2 = platform1.clone();

        platform1.advance(Duration::from_secs(1));

        assert_eq!(platform2.real_time(), Duration::from_secs(1));
    }
}
