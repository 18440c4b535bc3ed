use std::any::Any;
use std::num::NonZero;
use std::panic::{self, AssertUnwindSafe};
use std::thread;
use std::time::Duration;

use tracing::{debug, trace, warn};

use crate::complexity::compute_big_o;
use crate::instance::{BenchmarkFn, BenchmarkInstance, TimingMode};
use crate::manager::{AttemptResult, ThreadManager};
use crate::options::DriverOptions;
use crate::pal::PlatformFacade;
use crate::record::{BenchmarkReport, RunKind, RunRecord};
use crate::state::State;
use crate::statistics::compute_stats;
use crate::timer::ThreadTimer;

// An attempt shorter than this fraction of the minimum time is not trusted to predict how many
// iterations are needed, so its growth is capped.
const SIGNIFICANT_FRACTION: f64 = 0.1;

// Attempts are accepted regardless of processor time once wall clock time exceeds this many
// minimum times.
const REAL_TIME_OVERRUN_FACTOR: f64 = 5.0;

// Guards the growth calculation against attempts that measured no time at all.
const MIN_MEASURABLE_SECONDS: f64 = 1e-9;

/// Executes benchmark instances, scaling their iteration counts until the measurement is long
/// enough to trust.
///
/// For each instance and repetition, the driver runs attempts with a growing iteration count
/// until one of them measures at least the minimum time (or another acceptance condition is
/// met), then records that attempt. Statistics are computed over the repetitions and, for
/// families that request it, a complexity fit over the family's instances.
///
/// Every attempt runs the benchmark body on freshly spawned threads, one per thread requested
/// by the instance, with the calling thread acting as the first of them. All threads start and
/// stop timing together.
///
/// # Examples
///
/// ```
/// use std::num::NonZero;
/// use std::time::Duration;
///
/// use bench_engine::{BenchmarkInstance, Driver, DriverOptions};
///
/// let instance = BenchmarkInstance::new("sum", |state| {
///     while state.keep_running() {
///         std::hint::black_box((0..64_u64).sum::<u64>());
///     }
/// })
/// .with_min_time(Duration::from_millis(10));
///
/// let driver = Driver::new(DriverOptions::default());
/// let reports = driver.run_benchmarks(&[instance]);
///
/// for record in reports.iter().flat_map(|report| report.records()) {
///     println!("{record}");
/// }
/// ```
#[derive(Debug)]
pub struct Driver {
    options: DriverOptions,
    platform: PlatformFacade,
}

/// What the acceptance decision of an attempt is based on.
#[derive(Clone, Copy, Debug)]
struct AttemptMeasurement {
    iterations: u64,
    seconds: f64,
    real_seconds: f64,
    has_error: bool,
}

enum ParticipantFailure {
    Panicked(Box<dyn Any + Send + 'static>),
    ReturnedEarly,
}

impl Driver {
    /// Creates a driver that measures with the operating system clocks.
    #[must_use]
    pub fn new(options: DriverOptions) -> Self {
        Self {
            options,
            platform: PlatformFacade::real(),
        }
    }

    #[cfg(test)]
    pub(crate) fn with_platform(options: DriverOptions, platform: PlatformFacade) -> Self {
        Self { options, platform }
    }

    /// The global tunables of the driver.
    #[must_use]
    pub fn options(&self) -> &DriverOptions {
        &self.options
    }

    /// Runs every instance in order and returns one report per instance.
    ///
    /// Errors reported by one benchmark body only affect the report of that instance.
    ///
    /// # Panics
    ///
    /// Re-raises any panic of a benchmark body, and panics if a body breaks the loop contract
    /// of [`State`] (for example by returning before
    /// [`keep_running()`][State::keep_running] returned `false` without reporting an error).
    pub fn run_benchmarks(&self, instances: &[BenchmarkInstance]) -> Vec<BenchmarkReport> {
        let mut complexity_reports = Vec::new();

        instances
            .iter()
            .map(|instance| self.run_instance(instance, &mut complexity_reports))
            .collect()
    }

    fn run_instance(
        &self,
        instance: &BenchmarkInstance,
        complexity_reports: &mut Vec<RunRecord>,
    ) -> BenchmarkReport {
        let repetitions = instance
            .repetitions()
            .unwrap_or_else(|| self.options.repetitions());
        let min_time = instance
            .min_time()
            .unwrap_or_else(|| self.options.min_time());
        let aggregates_only = repetitions.get() != 1
            && instance
                .aggregates_only()
                .unwrap_or_else(|| self.options.aggregates_only());

        debug!(
            name = instance.name(),
            threads = instance.threads().get(),
            repetitions = repetitions.get(),
            "running benchmark instance"
        );

        // Later repetitions reuse the iteration count the first one converged on.
        let mut iterations = instance.iterations().unwrap_or(NonZero::<u64>::MIN);

        let mut runs = Vec::new();

        for repetition in 0..repetitions.get() {
            let record = self.run_repetition(instance, repetition, &mut iterations, min_time);
            let has_error = record.kind() == RunKind::Error;

            runs.push(record);

            if has_error {
                break;
            }
        }

        let statistics = compute_stats(&runs, instance.statistics());

        let mut complexity = None;

        if let Some(curve) = instance.complexity() {
            complexity_reports.extend(
                runs.iter()
                    .filter(|run| run.kind() == RunKind::Normal)
                    .cloned(),
            );

            if instance.is_last_in_family() {
                complexity = compute_big_o(instance.family_name(), curve, complexity_reports);
                complexity_reports.clear();
            }
        }

        BenchmarkReport::new(
            instance.name().to_string(),
            instance.family_index(),
            runs,
            statistics,
            complexity,
            aggregates_only,
        )
    }

    /// Runs attempts until one is accepted and returns its record.
    fn run_repetition(
        &self,
        instance: &BenchmarkInstance,
        repetition: u32,
        iterations: &mut NonZero<u64>,
        min_time: Duration,
    ) -> RunRecord {
        loop {
            let result = self.run_attempt(instance, *iterations);

            let real_seconds = result.real_time.as_secs_f64();
            let seconds = match instance.timing() {
                TimingMode::Cpu => result.cpu_time.as_secs_f64(),
                TimingMode::Real => real_seconds,
                TimingMode::Manual => result.manual_time.as_secs_f64(),
            };

            trace!(
                name = instance.name(),
                iterations = iterations.get(),
                cpu_seconds = result.cpu_time.as_secs_f64(),
                real_seconds,
                manual_seconds = result.manual_time.as_secs_f64(),
                "attempt finished"
            );

            let measurement = AttemptMeasurement {
                iterations: iterations.get(),
                seconds,
                real_seconds,
                has_error: result.has_error(),
            };

            if self.is_accepted(instance, repetition, min_time, measurement) {
                if let Some(message) = &result.error_message {
                    warn!(
                        name = instance.name(),
                        error = message.as_str(),
                        "benchmark reported an error"
                    );
                } else {
                    debug!(
                        name = instance.name(),
                        iterations = iterations.get(),
                        seconds,
                        "attempt accepted"
                    );
                }

                return RunRecord::from_attempt(instance, iterations.get(), result, seconds);
            }

            let next = next_iterations(
                *iterations,
                seconds,
                min_time.as_secs_f64(),
                &self.options,
            );

            trace!(
                name = instance.name(),
                iterations = iterations.get(),
                next_iterations = next.get(),
                "attempt too short, growing iteration count"
            );

            *iterations = next;
        }
    }

    fn is_accepted(
        &self,
        instance: &BenchmarkInstance,
        repetition: u32,
        min_time: Duration,
        measurement: AttemptMeasurement,
    ) -> bool {
        let min_time = min_time.as_secs_f64();

        repetition > 0
            || instance.iterations().is_some()
            || measurement.has_error
            || measurement.iterations >= self.options.max_iterations().get()
            || measurement.seconds >= min_time
            || (measurement.real_seconds >= REAL_TIME_OVERRUN_FACTOR * min_time
                && instance.timing() != TimingMode::Manual)
    }

    /// Executes one attempt on all threads of the instance and returns the aggregate, with wall
    /// clock and manual time averaged over the threads.
    fn run_attempt(&self, instance: &BenchmarkInstance, iterations: NonZero<u64>) -> AttemptResult {
        let threads = instance.threads();
        let manager = ThreadManager::new(threads);
        let body = instance.body();
        let args = instance.args();

        let failures = thread::scope(|scope| {
            let helpers = (1..threads.get())
                .map(|thread_index| {
                    let manager = &manager;
                    let timer = ThreadTimer::new(self.platform.clone());

                    scope.spawn(move || {
                        let state =
                            State::new(thread_index, threads, iterations, args, timer, manager);
                        run_participant(body, state, manager)
                    })
                })
                .collect::<Vec<_>>();

            let state = State::new(
                0,
                threads,
                iterations,
                args,
                ThreadTimer::new(self.platform.clone()),
                &manager,
            );
            let mut outcomes = vec![run_participant(body, state, &manager)];

            manager.wait_for_completion();

            outcomes.extend(helpers.into_iter().map(|helper| {
                helper
                    .join()
                    .unwrap_or_else(|payload| Err(ParticipantFailure::Panicked(payload)))
            }));

            outcomes
                .into_iter()
                .filter_map(Result::err)
                .collect::<Vec<_>>()
        });

        if let Some(failure) = failures.into_iter().next() {
            match failure {
                ParticipantFailure::Panicked(payload) => panic::resume_unwind(payload),
                ParticipantFailure::ReturnedEarly => panic!(
                    "benchmark body of '{}' returned before keep_running() returned false",
                    instance.name()
                ),
            }
        }

        let mut result = manager.into_result();
        result.real_time = mean_duration(result.real_time, threads);
        result.manual_time = mean_duration(result.manual_time, threads);

        result
    }
}

/// Runs the body on one thread and always hands the thread's measurements to the manager,
/// completing any barrier phase the body skipped, so that sibling threads never deadlock.
fn run_participant(
    body: &BenchmarkFn,
    mut state: State<'_>,
    manager: &ThreadManager,
) -> Result<(), ParticipantFailure> {
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| body(&mut state)));
    let returned_cleanly = state.returned_cleanly();

    manager.record_and_finish(&state.complete());

    match outcome {
        Err(payload) => Err(ParticipantFailure::Panicked(payload)),
        Ok(()) if !returned_cleanly => Err(ParticipantFailure::ReturnedEarly),
        Ok(()) => Ok(()),
    }
}

#[cfg_attr(test, mutants::skip)] // Equivalent mutations on nanosecond rounding.
fn mean_duration(total: Duration, threads: NonZero<usize>) -> Duration {
    let nanos_per_thread = total
        .as_nanos()
        .checked_div(threads.get() as u128)
        .expect("thread count is NonZero, so division by zero is impossible");

    Duration::from_nanos(u64::try_from(nanos_per_thread).unwrap_or(u64::MAX))
}

/// Computes the iteration count of the next attempt after one that measured `seconds` with
/// `iterations` iterations, which was too short.
///
/// The result is always greater than `iterations` unless it is clamped to the maximum.
fn next_iterations(
    iterations: NonZero<u64>,
    seconds: f64,
    min_time_secs: f64,
    options: &DriverOptions,
) -> NonZero<u64> {
    #[expect(
        clippy::cast_precision_loss,
        reason = "iteration counts are capped far below the precision limit of f64"
    )]
    let (current, max) = (
        iterations.get() as f64,
        options.max_iterations().get() as f64,
    );

    let mut multiplier =
        min_time_secs * options.growth_factor() / seconds.max(MIN_MEASURABLE_SECONDS);

    if seconds / min_time_secs < SIGNIFICANT_FRACTION {
        multiplier = multiplier.min(options.dampening_cap());
    }

    if multiplier <= 1.0 {
        multiplier = 2.0;
    }

    let next = (multiplier * current).max(current + 1.0).min(max).round();

    #[expect(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        reason = "value is positive and clamped to a u64 maximum above"
    )]
    let next = next as u64;

    NonZero::new(next).unwrap_or(NonZero::<u64>::MIN)
}
