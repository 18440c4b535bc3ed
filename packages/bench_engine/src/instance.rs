use std::num::NonZero;
use std::sync::Arc;
use std::time::Duration;

use crate::complexity::BigO;
use crate::state::State;
use crate::statistics::{Statistic, default_statistics};
use crate::time_unit::TimeUnit;

/// The signature of a benchmark body.
///
/// The body is invoked once per participating thread per attempt and is expected to loop on
/// [`State::keep_running()`].
pub type BenchmarkFn = dyn Fn(&mut State<'_>) + Send + Sync;

/// Which measured time decides whether an attempt ran long enough and is reported as the
/// "real" time of a run.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
#[non_exhaustive]
pub enum TimingMode {
    /// Processor time decides; wall clock time is reported alongside.
    #[default]
    Cpu,

    /// Wall clock time decides.
    Real,

    /// Time reported by the body via [`State::set_iteration_time()`] decides and replaces the
    /// wall clock time in the report.
    Manual,
}

/// A fully resolved configuration for measuring one benchmark body with one argument tuple
/// and one thread count.
///
/// Instances are usually produced by expanding the families of a
/// [`Registry`][crate::Registry] but can also be built directly. Settings left unset fall back
/// to the [`DriverOptions`][crate::DriverOptions] of the driver that runs the instance.
///
/// # Examples
///
/// ```
/// use std::num::NonZero;
///
/// use bench_engine::{BenchmarkInstance, TimeUnit};
///
/// let instance = BenchmarkInstance::new("vec_push/1024", |state| {
///     let len = usize::try_from(state.range(0)).unwrap();
///
///     while state.keep_running() {
///         let mut v = Vec::with_capacity(len);
///         v.push(1_u8);
///         std::hint::black_box(v);
///     }
/// })
/// .with_args(vec![1024])
/// .with_threads(NonZero::new(2).unwrap())
/// .with_time_unit(TimeUnit::Microsecond);
///
/// assert_eq!(instance.family_name(), "vec_push");
/// ```
#[derive(Clone, derive_more::Debug)]
pub struct BenchmarkInstance {
    name: String,
    family_name: String,
    family_index: usize,

    #[debug(ignore)]
    body: Arc<BenchmarkFn>,

    args: Vec<i64>,
    threads: NonZero<usize>,
    time_unit: TimeUnit,

    iterations: Option<NonZero<u64>>,
    min_time: Option<Duration>,
    repetitions: Option<NonZero<u32>>,
    timing: TimingMode,

    complexity: Option<BigO>,
    statistics: Vec<Statistic>,
    aggregates_only: Option<bool>,

    last_in_family: bool,
}

impl BenchmarkInstance {
    /// Creates a single-threaded instance with default settings.
    ///
    /// The family name is the part of `name` before the first `/`. The instance is considered
    /// the last (and only) member of its family until configured otherwise.
    #[must_use]
    pub fn new<F>(name: impl Into<String>, body: F) -> Self
    where
        F: Fn(&mut State<'_>) + Send + Sync + 'static,
    {
        Self::from_shared_body(name.into(), Arc::new(body))
    }

    pub(crate) fn from_shared_body(name: String, body: Arc<BenchmarkFn>) -> Self {
        let family_name = name
            .split_once('/')
            .map_or_else(|| name.clone(), |(family, _)| family.to_string());

        Self {
            name,
            family_name,
            family_index: 0,
            body,
            args: Vec::new(),
            threads: NonZero::<usize>::MIN,
            time_unit: TimeUnit::default(),
            iterations: None,
            min_time: None,
            repetitions: None,
            timing: TimingMode::default(),
            complexity: None,
            statistics: default_statistics(),
            aggregates_only: None,
            last_in_family: true,
        }
    }

    /// Sets the argument tuple exposed to the body via [`State::range()`].
    #[must_use]
    pub fn with_args(mut self, args: Vec<i64>) -> Self {
        self.args = args;
        self
    }

    /// Sets the number of threads that execute the body concurrently.
    #[must_use]
    pub fn with_threads(mut self, threads: NonZero<usize>) -> Self {
        self.threads = threads;
        self
    }

    /// Sets the unit in which times are reported.
    #[must_use]
    pub fn with_time_unit(mut self, time_unit: TimeUnit) -> Self {
        self.time_unit = time_unit;
        self
    }

    /// Fixes the number of iterations per thread, disabling iteration scaling.
    ///
    /// # Panics
    ///
    /// Panics if a minimum measurement time has already been set.
    #[must_use]
    pub fn with_iterations(mut self, iterations: NonZero<u64>) -> Self {
        assert!(
            self.min_time.is_none(),
            "an explicit iteration count cannot be combined with a minimum time"
        );

        self.iterations = Some(iterations);
        self
    }

    /// Overrides the minimum measurement time an attempt must reach to be accepted.
    ///
    /// # Panics
    ///
    /// Panics if `min_time` is zero or an explicit iteration count has already been set.
    #[must_use]
    pub fn with_min_time(mut self, min_time: Duration) -> Self {
        assert!(!min_time.is_zero(), "minimum time must be positive");
        assert!(
            self.iterations.is_none(),
            "a minimum time cannot be combined with an explicit iteration count"
        );

        self.min_time = Some(min_time);
        self
    }

    /// Overrides the number of repetitions.
    #[must_use]
    pub fn with_repetitions(mut self, repetitions: NonZero<u32>) -> Self {
        self.repetitions = Some(repetitions);
        self
    }

    /// Selects which measured time drives the measurement.
    #[must_use]
    pub fn with_timing(mut self, timing: TimingMode) -> Self {
        self.timing = timing;
        self
    }

    /// Requests a complexity fit over the family once its last instance has run.
    #[must_use]
    pub fn with_complexity(mut self, complexity: BigO) -> Self {
        self.complexity = Some(complexity);
        self
    }

    /// Replaces the statistics computed over the repetitions.
    #[must_use]
    pub fn with_statistics(mut self, statistics: Vec<Statistic>) -> Self {
        self.statistics = statistics;
        self
    }

    /// Overrides whether individual repetitions are suppressed in favor of the statistics.
    #[must_use]
    pub fn with_aggregates_only(mut self, aggregates_only: bool) -> Self {
        self.aggregates_only = Some(aggregates_only);
        self
    }

    /// Assigns the instance to a benchmark family.
    #[must_use]
    pub fn with_family(mut self, family_name: impl Into<String>, family_index: usize) -> Self {
        self.family_name = family_name.into();
        self.family_index = family_index;
        self
    }

    /// Marks whether the instance uses the last argument tuple of its family, which is when
    /// the complexity fit of the family is computed.
    #[must_use]
    pub fn with_last_in_family(mut self, last_in_family: bool) -> Self {
        self.last_in_family = last_in_family;
        self
    }

    /// The full name of the instance.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The name of the family the instance belongs to.
    #[must_use]
    pub fn family_name(&self) -> &str {
        &self.family_name
    }

    /// The index of the family in the registry that produced the instance.
    #[must_use]
    pub fn family_index(&self) -> usize {
        self.family_index
    }

    pub(crate) fn body(&self) -> &BenchmarkFn {
        &*self.body
    }

    /// The argument tuple exposed to the body.
    #[must_use]
    pub fn args(&self) -> &[i64] {
        &self.args
    }

    /// The number of threads that execute the body concurrently.
    #[must_use]
    pub fn threads(&self) -> NonZero<usize> {
        self.threads
    }

    /// The unit in which times are reported.
    #[must_use]
    pub fn time_unit(&self) -> TimeUnit {
        self.time_unit
    }

    /// The explicit iteration count per thread, if iteration scaling is disabled.
    #[must_use]
    pub fn iterations(&self) -> Option<NonZero<u64>> {
        self.iterations
    }

    /// The minimum measurement time override, if any.
    #[must_use]
    pub fn min_time(&self) -> Option<Duration> {
        self.min_time
    }

    /// The repetition count override, if any.
    #[must_use]
    pub fn repetitions(&self) -> Option<NonZero<u32>> {
        self.repetitions
    }

    /// Which measured time drives the measurement.
    #[must_use]
    pub fn timing(&self) -> TimingMode {
        self.timing
    }

    /// The requested complexity curve, if any.
    #[must_use]
    pub fn complexity(&self) -> Option<BigO> {
        self.complexity
    }

    /// The statistics computed over the repetitions.
    #[must_use]
    pub fn statistics(&self) -> &[Statistic] {
        &self.statistics
    }

    /// The aggregates-only override, if any.
    #[must_use]
    pub fn aggregates_only(&self) -> Option<bool> {
        self.aggregates_only
    }

    /// Whether the instance uses the last argument tuple of its family.
    #[must_use]
    pub fn is_last_in_family(&self) -> bool {
        self.last_in_family
    }
}
