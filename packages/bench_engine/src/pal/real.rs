//! Real platform implementation backed by the operating system clocks.

use std::time::{Duration, Instant};

use cpu_time::ThreadTime;

use crate::pal::abstractions::Platform;

/// Reads the wall clock via [`Instant`] and thread processor time via `cpu_time`.
///
/// Wall clock readings are expressed relative to the moment the platform was created so that
/// both clocks can be reported as plain durations.
#[derive(Clone, Copy, Debug)]
pub(crate) struct RealPlatform {
    origin: Instant,
}

impl RealPlatform {
    pub(crate) fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Platform for RealPlatform {
    #[cfg_attr(test, mutants::skip)] // Real clock, no meaningful assertions possible on exact values.
    fn real_time(&self) -> Duration {
        self.origin.elapsed()
    }

    #[cfg_attr(test, mutants::skip)] // Real clock, no meaningful assertions possible on exact values.
    fn thread_cpu_time(&self) -> Duration {
        ThreadTime::now().as_duration()
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use std::hint::black_box;

    use super::*;

    #[test]
    fn real_time_is_monotonic() {
        let platform = RealPlatform::new();

        let first = platform.real_time();
        let second = platform.real_time();

        assert!(second >= first);
    }

    #[test]
    fn thread_cpu_time_advances_under_load() {
        let platform = RealPlatform::new();

        let before = platform.thread_cpu_time();

        let mut sum = 0_u64;
        for i in 0..5_000_000_u64 {
            sum = black_box(sum.wrapping_add(i));
        }
        black_box(sum);

        let after = platform.thread_cpu_time();

        assert!(after >= before);
    }
}
