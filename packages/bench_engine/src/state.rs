use std::num::NonZero;
use std::time::Duration;

use crate::counters::{Counter, UserCounters};
use crate::manager::{ThreadContribution, ThreadManager};
use crate::timer::ThreadTimer;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum Phase {
    Initial,
    Starting,
    Running,
    Stopping,
    Stopped,
}

/// The handle a benchmark body uses to drive and annotate the measurement on one thread.
///
/// A body is expected to call [`keep_running()`][Self::keep_running] in a loop and execute one
/// iteration of the measured work each time it returns `true`:
///
/// ```
/// use bench_engine::State;
///
/// fn bench_sum(state: &mut State<'_>) {
///     let data = vec![1_u64; 1024];
///
///     while state.keep_running() {
///         std::hint::black_box(data.iter().sum::<u64>());
///     }
///
///     state.set_items_processed(state.iterations() * 1024);
/// }
/// ```
///
/// The first call to [`keep_running()`][Self::keep_running] waits until every thread
/// participating in the attempt is ready and then starts the timer. The call that returns
/// `false` stops the timer and waits until every thread is done. The body must not return
/// before that happens unless it has reported an error via
/// [`skip_with_error()`][Self::skip_with_error].
#[derive(Debug)]
pub struct State<'a> {
    thread_index: usize,
    threads: NonZero<usize>,

    max_iterations: NonZero<u64>,
    remaining_iterations: u64,
    completed_iterations: u64,

    args: &'a [i64],

    bytes_processed: u64,
    items_processed: u64,
    complexity_n: u64,
    counters: UserCounters,

    error_occurred: bool,

    phase: Phase,
    timer: ThreadTimer,
    manager: &'a ThreadManager,
}

impl<'a> State<'a> {
    pub(crate) fn new(
        thread_index: usize,
        threads: NonZero<usize>,
        max_iterations: NonZero<u64>,
        args: &'a [i64],
        timer: ThreadTimer,
        manager: &'a ThreadManager,
    ) -> Self {
        assert!(
            thread_index < threads.get(),
            "thread index {thread_index} out of bounds for {threads} threads"
        );

        Self {
            thread_index,
            threads,
            max_iterations,
            remaining_iterations: 0,
            completed_iterations: 0,
            args,
            bytes_processed: 0,
            items_processed: 0,
            complexity_n: 0,
            counters: UserCounters::new(),
            error_occurred: false,
            phase: Phase::Initial,
            timer,
            manager,
        }
    }

    /// Decides whether the body should execute another iteration.
    ///
    /// Returns `true` exactly [`max_iterations()`][Self::max_iterations] times per attempt
    /// (fewer if an error is reported) and `false` once afterwards.
    ///
    /// # Panics
    ///
    /// Panics if called again after it has already returned `false`, or if the timer is still
    /// paused when the loop ends.
    pub fn keep_running(&mut self) -> bool {
        if self.phase == Phase::Initial {
            self.start_attempt();
        }

        assert!(
            self.phase == Phase::Running,
            "keep_running() called after the benchmark loop had already finished"
        );

        if self.remaining_iterations > 0 {
            self.remaining_iterations = self.remaining_iterations.saturating_sub(1);
            self.completed_iterations = self.completed_iterations.saturating_add(1);
            return true;
        }

        self.finish_attempt();
        false
    }

    /// Stops the timer so that the following work is excluded from the measurement.
    ///
    /// # Panics
    ///
    /// Panics if the benchmark loop is not running, an error has been reported or the timer
    /// is already paused.
    pub fn pause_timing(&mut self) {
        self.assert_timing_control_allowed("pause_timing()");
        self.timer.stop();
    }

    /// Restarts the timer after [`pause_timing()`][Self::pause_timing].
    ///
    /// # Panics
    ///
    /// Panics if the benchmark loop is not running, an error has been reported or the timer
    /// is not paused.
    pub fn resume_timing(&mut self) {
        self.assert_timing_control_allowed("resume_timing()");
        self.timer.start();
    }

    fn assert_timing_control_allowed(&self, operation: &str) {
        assert!(
            self.phase == Phase::Running,
            "{operation} is only allowed inside the benchmark loop"
        );
        assert!(
            !self.error_occurred,
            "{operation} is not allowed after an error has been reported"
        );
    }

    /// Reports that the benchmark cannot produce a valid measurement.
    ///
    /// The attempt ends at the next call to [`keep_running()`][Self::keep_running], which
    /// returns `false`, and the run record is reported with the error message instead of
    /// timing data. If several threads report an error, the first message is kept.
    ///
    /// May be called before the benchmark loop starts, in which case the body may return
    /// without calling [`keep_running()`][Self::keep_running] at all.
    pub fn skip_with_error(&mut self, message: &str) {
        self.error_occurred = true;
        self.manager.publish_error(message);

        self.remaining_iterations = 0;

        if self.timer.is_running() {
            self.timer.stop();
        }
    }

    /// Whether this thread has reported an error during the current attempt.
    #[must_use]
    pub fn error_occurred(&self) -> bool {
        self.error_occurred
    }

    /// Sets the number of bytes this thread processed, used to report a throughput.
    pub fn set_bytes_processed(&mut self, bytes: u64) {
        self.bytes_processed = bytes;
    }

    /// The number of bytes this thread reported as processed.
    #[must_use]
    pub fn bytes_processed(&self) -> u64 {
        self.bytes_processed
    }

    /// Sets the number of items this thread processed, used to report a throughput.
    pub fn set_items_processed(&mut self, items: u64) {
        self.items_processed = items;
    }

    /// The number of items this thread reported as processed.
    #[must_use]
    pub fn items_processed(&self) -> u64 {
        self.items_processed
    }

    /// Sets the input size used when fitting the asymptotic complexity of a benchmark family.
    pub fn set_complexity_n(&mut self, n: u64) {
        self.complexity_n = n;
    }

    /// The input size set by [`set_complexity_n()`][Self::set_complexity_n].
    #[must_use]
    pub fn complexity_n(&self) -> u64 {
        self.complexity_n
    }

    /// Attaches a free-form label to the run record. If several threads set a label, the last
    /// one wins.
    pub fn set_label(&self, label: &str) {
        self.manager.set_label(label);
    }

    /// Adds a measured duration to the manual time of this thread.
    ///
    /// Only meaningful for benchmarks that use manual timing, where the body measures each
    /// iteration itself and reports it here.
    pub fn set_iteration_time(&mut self, duration: Duration) {
        self.timer.set_iteration_time(duration);
    }

    /// Sets a user counter, replacing any previous value with the same name.
    pub fn set_counter(&mut self, name: impl Into<String>, counter: impl Into<Counter>) {
        self.counters.insert(name.into(), counter.into());
    }

    /// The user counters set on this thread so far.
    #[must_use]
    pub fn counters(&self) -> &UserCounters {
        &self.counters
    }

    /// Returns the argument at `index` of the argument tuple of the benchmark instance.
    ///
    /// # Panics
    ///
    /// Panics if the instance has no argument at `index`.
    #[must_use]
    pub fn range(&self, index: usize) -> i64 {
        *self.args.get(index).unwrap_or_else(|| {
            panic!(
                "benchmark argument {index} requested but the instance only has {} arguments",
                self.args.len()
            )
        })
    }

    /// The full argument tuple of the benchmark instance.
    #[must_use]
    pub fn args(&self) -> &[i64] {
        self.args
    }

    /// The index of this thread among the threads of the attempt, starting from zero.
    #[must_use]
    pub fn thread_index(&self) -> usize {
        self.thread_index
    }

    /// The number of threads participating in the attempt.
    #[must_use]
    pub fn threads(&self) -> NonZero<usize> {
        self.threads
    }

    /// The number of iterations this thread is asked to execute in the current attempt.
    #[must_use]
    pub fn max_iterations(&self) -> NonZero<u64> {
        self.max_iterations
    }

    /// The number of iterations this thread has started so far.
    #[must_use]
    pub fn iterations(&self) -> u64 {
        self.completed_iterations
    }

    /// Synchronizes with the other threads and starts the timer.
    ///
    /// # Panics
    ///
    /// Panics if the attempt has already been started on this thread.
    pub(crate) fn start_attempt(&mut self) {
        assert!(
            self.phase == Phase::Initial,
            "attempt started more than once on the same thread"
        );

        self.phase = Phase::Starting;
        self.manager.wait_at_barrier();
        self.phase = Phase::Running;

        if self.error_occurred {
            self.remaining_iterations = 0;
        } else {
            self.remaining_iterations = self.max_iterations.get();
            self.timer.start();
        }
    }

    /// Stops the timer and synchronizes with the other threads.
    ///
    /// # Panics
    ///
    /// Panics if the attempt is not running, or (after synchronizing) if the body left the
    /// timer paused.
    pub(crate) fn finish_attempt(&mut self) {
        assert!(
            self.phase == Phase::Running,
            "attempt finished without being started or finished twice"
        );

        let timer_was_running = self.timer.is_running();

        if timer_was_running {
            self.timer.stop();
        }

        self.phase = Phase::Stopping;
        self.manager.wait_at_barrier();
        self.phase = Phase::Stopped;

        assert!(
            self.error_occurred || timer_was_running,
            "benchmark loop ended while timing was paused"
        );
    }

    /// Whether the body has honored the loop contract, given that it has returned.
    pub(crate) fn returned_cleanly(&self) -> bool {
        self.phase == Phase::Stopped || self.error_occurred
    }

    /// Drives any barrier phase the body did not reach so sibling threads are not left waiting,
    /// then hands over what this thread measured.
    pub(crate) fn complete(mut self) -> ThreadContribution {
        if self.phase == Phase::Initial {
            self.phase = Phase::Starting;
            self.manager.wait_at_barrier();
            self.phase = Phase::Running;
        }

        if self.phase == Phase::Running {
            if self.timer.is_running() {
                self.timer.stop();
            }

            self.phase = Phase::Stopping;
            self.manager.wait_at_barrier();
            self.phase = Phase::Stopped;
        }

        ThreadContribution {
            real_time: self.timer.real_time_used(),
            cpu_time: self.timer.cpu_time_used(),
            manual_time: self.timer.manual_time_used(),
            bytes_processed: self.bytes_processed,
            items_processed: self.items_processed,
            complexity_n: self.complexity_n,
            counters: self.counters,
        }
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use crate::CounterKind;
    use crate::pal::{FakePlatform, PlatformFacade};

    fn single_thread_manager() -> ThreadManager {
        ThreadManager::new(NonZero::new(1).unwrap())
    }

    fn new_state<'a>(
        platform: &FakePlatform,
        iterations: u64,
        args: &'a [i64],
        manager: &'a ThreadManager,
    ) -> State<'a> {
        State::new(
            0,
            NonZero::new(1).unwrap(),
            NonZero::new(iterations).unwrap(),
            args,
            ThreadTimer::new(PlatformFacade::fake(platform.clone())),
            manager,
        )
    }

    #[test]
    fn single_iteration_minimal() {
        let platform = FakePlatform::new();
        let manager = single_thread_manager();
        let mut state = new_state(&platform, 1, &[], &manager);

        assert!(state.keep_running());
        assert!(!state.keep_running());
        assert_eq!(state.iterations(), 1);
        assert!(state.returned_cleanly());
    }

    #[test]
    fn keep_running_returns_true_exactly_target_times() {
        let platform = FakePlatform::new();
        let manager = single_thread_manager();
        let mut state = new_state(&platform, 37, &[], &manager);

        let mut count = 0;
        while state.keep_running() {
            count += 1;
        }

        assert_eq!(count, 37);
        assert_eq!(state.iterations(), 37);
    }

    #[test]
    #[should_panic]
    fn keep_running_after_finish_panics() {
        let platform = FakePlatform::new();
        let manager = single_thread_manager();
        let mut state = new_state(&platform, 1, &[], &manager);

        while state.keep_running() {}
        state.keep_running();
    }

    #[test]
    fn paused_interval_is_excluded() {
        let platform = FakePlatform::new();
        let manager = single_thread_manager();
        let mut state = new_state(&platform, 2, &[], &manager);

        while state.keep_running() {
            platform.advance(Duration::from_millis(10));

            state.pause_timing();
            platform.advance(Duration::from_millis(1000));
            state.resume_timing();
        }

        let contribution = state.complete();
        assert_eq!(contribution.real_time, Duration::from_millis(20));
        assert_eq!(contribution.cpu_time, Duration::from_millis(20));
    }

    #[test]
    #[should_panic]
    fn pause_before_loop_panics() {
        let platform = FakePlatform::new();
        let manager = single_thread_manager();
        let mut state = new_state(&platform, 1, &[], &manager);

        state.pause_timing();
    }

    #[test]
    #[should_panic]
    fn loop_ending_while_paused_panics() {
        let platform = FakePlatform::new();
        let manager = single_thread_manager();
        let mut state = new_state(&platform, 1, &[], &manager);

        while state.keep_running() {
            state.pause_timing();
        }
    }

    #[test]
    fn error_before_loop_skips_iterations() {
        let platform = FakePlatform::new();
        let manager = single_thread_manager();
        let mut state = new_state(&platform, 100, &[], &manager);

        state.skip_with_error("not supported");

        assert!(!state.keep_running());
        assert_eq!(state.iterations(), 0);
        assert!(state.error_occurred());

        drop(state.complete());
        assert_eq!(
            manager.into_result().error_message.as_deref(),
            Some("not supported")
        );
    }

    #[test]
    fn error_inside_loop_ends_it_and_stops_timer() {
        let platform = FakePlatform::new();
        let manager = single_thread_manager();
        let mut state = new_state(&platform, 100, &[], &manager);

        while state.keep_running() {
            platform.advance(Duration::from_millis(5));
            state.skip_with_error("broken");
            platform.advance(Duration::from_millis(500));
        }

        assert_eq!(state.iterations(), 1);

        let contribution = state.complete();
        assert_eq!(contribution.real_time, Duration::from_millis(5));
    }

    #[test]
    fn error_without_loop_returns_cleanly() {
        let platform = FakePlatform::new();
        let manager = single_thread_manager();
        let mut state = new_state(&platform, 10, &[], &manager);

        state.skip_with_error("early exit");

        assert!(state.returned_cleanly());
        drop(state.complete());
    }

    #[test]
    fn early_return_is_detected_and_completed() {
        let platform = FakePlatform::new();
        let manager = single_thread_manager();
        let mut state = new_state(&platform, 10, &[], &manager);

        assert!(state.keep_running());

        assert!(!state.returned_cleanly());

        // Completing must not hang even though the loop never finished.
        let contribution = state.complete();
        assert_eq!(contribution.real_time, Duration::ZERO);
    }

    #[test]
    fn contribution_carries_annotations() {
        let platform = FakePlatform::new();
        let manager = single_thread_manager();
        let mut state = new_state(&platform, 1, &[], &manager);

        while state.keep_running() {
            state.set_iteration_time(Duration::from_millis(3));
        }

        state.set_bytes_processed(1024);
        state.set_items_processed(16);
        state.set_complexity_n(512);
        state.set_counter("hits", Counter::new(4.0, CounterKind::Rate));
        state.set_label("warm");

        assert_eq!(state.bytes_processed(), 1024);
        assert_eq!(state.items_processed(), 16);
        assert_eq!(state.complexity_n(), 512);
        assert_eq!(state.counters().len(), 1);

        let contribution = state.complete();
        assert_eq!(contribution.manual_time, Duration::from_millis(3));
        assert_eq!(contribution.bytes_processed, 1024);
        assert_eq!(contribution.items_processed, 16);
        assert_eq!(contribution.complexity_n, 512);
        assert_eq!(contribution.counters["hits"].kind, CounterKind::Rate);
        assert_eq!(manager.into_result().label.as_deref(), Some("warm"));
    }

    #[test]
    fn exposes_arguments() {
        let platform = FakePlatform::new();
        let manager = single_thread_manager();
        let state = new_state(&platform, 1, &[8, 64], &manager);

        assert_eq!(state.range(0), 8);
        assert_eq!(state.range(1), 64);
        assert_eq!(state.args(), &[8, 64]);
        assert_eq!(state.thread_index(), 0);
        assert_eq!(state.threads().get(), 1);
        assert_eq!(state.max_iterations().get(), 1);
    }

    #[test]
    #[should_panic]
    fn missing_argument_panics() {
        let platform = FakePlatform::new();
        let manager = single_thread_manager();
        let state = new_state(&platform, 1, &[1], &manager);

        _ = state.range(1);
    }
}
