use std::time::Duration;

use crate::pal::{Platform, PlatformFacade};

/// Measures the time one thread spends inside the timed region of one attempt.
///
/// The timer may be started and stopped any number of times; the accumulated durations are the
/// sums over all started intervals. Manual time is supplied by the benchmark body and is
/// independent of the running state.
#[derive(Debug)]
pub(crate) struct ThreadTimer {
    platform: PlatformFacade,

    running: bool,

    start_real_time: Duration,
    start_cpu_time: Duration,

    real_time_used: Duration,
    cpu_time_used: Duration,
    manual_time_used: Duration,
}

impl ThreadTimer {
    pub(crate) fn new(platform: PlatformFacade) -> Self {
        Self {
            platform,
            running: false,
            start_real_time: Duration::ZERO,
            start_cpu_time: Duration::ZERO,
            real_time_used: Duration::ZERO,
            cpu_time_used: Duration::ZERO,
            manual_time_used: Duration::ZERO,
        }
    }

    pub(crate) fn is_running(&self) -> bool {
        self.running
    }

    /// # Panics
    ///
    /// Panics if the timer is already running.
    pub(crate) fn start(&mut self) {
        assert!(!self.running, "timer started while already running");

        self.running = true;
        self.start_real_time = self.platform.real_time();
        self.start_cpu_time = self.platform.thread_cpu_time();
    }

    /// # Panics
    ///
    /// Panics if the timer is not running.
    pub(crate) fn stop(&mut self) {
        assert!(self.running, "timer stopped while not running");

        let real_now = self.platform.real_time();
        let cpu_now = self.platform.thread_cpu_time();

        self.running = false;
        self.real_time_used = self
            .real_time_used
            .saturating_add(real_now.saturating_sub(self.start_real_time));
        self.cpu_time_used = self
            .cpu_time_used
            .saturating_add(cpu_now.saturating_sub(self.start_cpu_time));
    }

    pub(crate) fn set_iteration_time(&mut self, duration: Duration) {
        self.manual_time_used = self.manual_time_used.saturating_add(duration);
    }

    /// # Panics
    ///
    /// Panics if the timer is running.
    pub(crate) fn real_time_used(&self) -> Duration {
        assert!(!self.running, "timer queried while running");
        self.real_time_used
    }

    /// # Panics
    ///
    /// Panics if the timer is running.
    pub(crate) fn cpu_time_used(&self) -> Duration {
        assert!(!self.running, "timer queried while running");
        self.cpu_time_used
    }

    /// # Panics
    ///
    /// Panics if the timer is running.
    pub(crate) fn manual_time_used(&self) -> Duration {
        assert!(!self.running, "timer queried while running");
        self.manual_time_used
    }
}
