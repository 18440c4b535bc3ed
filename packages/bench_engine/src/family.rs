use std::fmt::Write;
use std::num::NonZero;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use itertools::Itertools;
use tracing::warn;

use crate::complexity::BigO;
use crate::instance::{BenchmarkFn, BenchmarkInstance, TimingMode};
use crate::state::State;
use crate::statistics::{Statistic, StatisticFn, default_statistics};
use crate::time_unit::TimeUnit;

const ERR_STRING_WRITE: &str = "we expect writing to a String to be infallible";

const DEFAULT_RANGE_MULTIPLIER: i64 = 8;

// Families that expand to more instances than this are likely a configuration mistake.
const MAX_FAMILY_SIZE: usize = 100;

/// An explicit collection of benchmark families.
///
/// Each registry is independent, so separate registries (for example in concurrently running
/// tests) never observe each other's families.
///
/// # Examples
///
/// ```
/// use bench_engine::Registry;
///
/// let mut registry = Registry::new();
///
/// registry
///     .register("vec_with_capacity", |state| {
///         let len = usize::try_from(state.range(0)).unwrap();
///
///         while state.keep_running() {
///             std::hint::black_box(Vec::<u8>::with_capacity(len));
///         }
///     })
///     .range(8, 512)
///     .thread_range(1, 2);
///
/// let names = registry
///     .instances()
///     .iter()
///     .map(|instance| instance.name().to_string())
///     .collect::<Vec<_>>();
///
/// assert_eq!(
///     names,
///     [
///         "vec_with_capacity/8/threads:1",
///         "vec_with_capacity/8/threads:2",
///         "vec_with_capacity/64/threads:1",
///         "vec_with_capacity/64/threads:2",
///         "vec_with_capacity/512/threads:1",
///         "vec_with_capacity/512/threads:2",
///     ]
/// );
/// ```
#[derive(Debug, Default)]
pub struct Registry {
    families: Vec<Family>,
}

impl Registry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a benchmark family and returns it for further configuration.
    pub fn register<F>(&mut self, name: impl Into<String>, body: F) -> &mut Family
    where
        F: Fn(&mut State<'_>) + Send + Sync + 'static,
    {
        self.families.push(Family::new(name.into(), Arc::new(body)));

        self.families
            .last_mut()
            .expect("a family was pushed on the line above")
    }

    /// Removes every family.
    pub fn clear(&mut self) {
        self.families.clear();
    }

    /// The number of registered families.
    #[must_use]
    pub fn len(&self) -> usize {
        self.families.len()
    }

    /// Whether no family is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.families.is_empty()
    }

    /// The registered families, in registration order.
    #[must_use]
    pub fn families(&self) -> &[Family] {
        &self.families
    }

    /// Expands every family into one instance per argument tuple and thread count.
    ///
    /// Instances are ordered by family, then argument tuple, then thread count.
    #[must_use]
    pub fn instances(&self) -> Vec<BenchmarkInstance> {
        self.families
            .iter()
            .enumerate()
            .flat_map(|(family_index, family)| family.instances(family_index))
            .collect()
    }
}

/// A benchmark body together with the argument tuples and thread counts to measure it with.
///
/// Families are created by [`Registry::register()`] and configured by chaining the methods
/// below. Arguments given by [`arg()`][Self::arg], [`args()`][Self::args],
/// [`range()`][Self::range], [`ranges()`][Self::ranges] and
/// [`dense_range()`][Self::dense_range] accumulate, and all tuples must have the same length.
#[derive(derive_more::Debug)]
pub struct Family {
    name: String,

    #[debug(ignore)]
    body: Arc<BenchmarkFn>,

    arg_tuples: Vec<Vec<i64>>,
    arg_names: Vec<String>,
    range_multiplier: i64,

    thread_counts: Vec<NonZero<usize>>,

    time_unit: TimeUnit,
    min_time: Option<Duration>,
    iterations: Option<NonZero<u64>>,
    repetitions: Option<NonZero<u32>>,
    aggregates_only: Option<bool>,
    timing: TimingMode,

    complexity: Option<BigO>,
    statistics: Vec<Statistic>,
}

impl Family {
    fn new(name: String, body: Arc<BenchmarkFn>) -> Self {
        Self {
            name,
            body,
            arg_tuples: Vec::new(),
            arg_names: Vec::new(),
            range_multiplier: DEFAULT_RANGE_MULTIPLIER,
            thread_counts: Vec::new(),
            time_unit: TimeUnit::default(),
            min_time: None,
            iterations: None,
            repetitions: None,
            aggregates_only: None,
            timing: TimingMode::default(),
            complexity: None,
            statistics: default_statistics(),
        }
    }

    /// The name of the family.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The argument tuples configured so far.
    #[must_use]
    pub fn arg_tuples(&self) -> &[Vec<i64>] {
        &self.arg_tuples
    }

    fn push_tuple(&mut self, tuple: Vec<i64>) {
        if let Some(existing) = self.arg_tuples.first() {
            assert!(
                existing.len() == tuple.len(),
                "benchmark family '{}' mixes argument tuples of length {} and {}",
                self.name,
                existing.len(),
                tuple.len()
            );
        }

        self.arg_tuples.push(tuple);
    }

    /// Adds a single-argument tuple.
    ///
    /// # Panics
    ///
    /// Panics if the family already has tuples with more than one argument.
    pub fn arg(&mut self, value: i64) -> &mut Self {
        self.push_tuple(vec![value]);
        self
    }

    /// Adds an argument tuple.
    ///
    /// # Panics
    ///
    /// Panics if the family already has tuples of a different length.
    pub fn args(&mut self, values: &[i64]) -> &mut Self {
        self.push_tuple(values.to_vec());
        self
    }

    /// Adds single-argument tuples for `low`, every power of the range multiplier strictly
    /// between `low` and `high`, and `high`.
    ///
    /// # Panics
    ///
    /// Panics if `low` is negative or greater than `high`, or if the family already has tuples
    /// with more than one argument.
    pub fn range(&mut self, low: i64, high: i64) -> &mut Self {
        for value in geometric_range(low, high, self.range_multiplier) {
            self.push_tuple(vec![value]);
        }

        self
    }

    /// Adds the cartesian product of one geometric range per argument position, with the
    /// first position varying fastest.
    ///
    /// # Panics
    ///
    /// Panics if any range is invalid (see [`range()`][Self::range]) or if the family already
    /// has tuples of a different length.
    pub fn ranges(&mut self, ranges: &[(i64, i64)]) -> &mut Self {
        let multiplier = self.range_multiplier;

        // The product varies its last input fastest, so the positions are fed in reverse.
        let tuples = ranges
            .iter()
            .rev()
            .map(|(low, high)| geometric_range(*low, *high, multiplier))
            .multi_cartesian_product()
            .map(|mut tuple| {
                tuple.reverse();
                tuple
            })
            .collect::<Vec<_>>();

        for tuple in tuples {
            self.push_tuple(tuple);
        }

        self
    }

    /// Adds single-argument tuples from `start` to `limit` (inclusive) in steps of `step`.
    ///
    /// # Panics
    ///
    /// Panics if `start` is greater than `limit`, if `step` is not positive or if the family
    /// already has tuples with more than one argument.
    pub fn dense_range(&mut self, start: i64, limit: i64, step: i64) -> &mut Self {
        assert!(start <= limit, "dense range start must not exceed its limit");
        assert!(step > 0, "dense range step must be positive");

        let mut value = start;

        while value <= limit {
            self.push_tuple(vec![value]);

            match value.checked_add(step) {
                Some(next) => value = next,
                None => break,
            }
        }

        self
    }

    /// Sets the multiplier used by subsequent [`range()`][Self::range] and
    /// [`ranges()`][Self::ranges] calls. Defaults to 8.
    ///
    /// # Panics
    ///
    /// Panics if `multiplier` is less than 2.
    pub fn range_multiplier(&mut self, multiplier: i64) -> &mut Self {
        assert!(multiplier >= 2, "range multiplier must be at least 2");

        self.range_multiplier = multiplier;
        self
    }

    /// Names the single argument of the family, rendered as `name:value` in instance names.
    pub fn arg_name(&mut self, name: impl Into<String>) -> &mut Self {
        self.arg_names = vec![name.into()];
        self
    }

    /// Names the arguments of the family by position. An empty name leaves that argument
    /// unnamed.
    pub fn arg_names(&mut self, names: &[&str]) -> &mut Self {
        self.arg_names = names.iter().map(|name| (*name).to_string()).collect();
        self
    }

    /// Adds a thread count to measure the family with.
    ///
    /// # Panics
    ///
    /// Panics if `threads` is zero.
    pub fn threads(&mut self, threads: usize) -> &mut Self {
        self.thread_counts.push(non_zero_threads(threads));
        self
    }

    /// Adds `min_threads`, every power of two strictly between the bounds, and `max_threads`.
    ///
    /// # Panics
    ///
    /// Panics if `min_threads` is zero or greater than `max_threads`.
    pub fn thread_range(&mut self, min_threads: usize, max_threads: usize) -> &mut Self {
        assert!(
            min_threads <= max_threads,
            "thread range minimum must not exceed its maximum"
        );
        let min_threads = i64::try_from(min_threads).expect("thread counts fit in i64");
        let max_threads = i64::try_from(max_threads).expect("thread counts fit in i64");

        for threads in geometric_range(min_threads, max_threads, 2) {
            let threads = usize::try_from(threads).expect("range stays within its usize bounds");
            self.thread_counts.push(non_zero_threads(threads));
        }

        self
    }

    /// Adds thread counts from `min_threads` in steps of `stride`, always including
    /// `max_threads`.
    ///
    /// # Panics
    ///
    /// Panics if `min_threads` is zero or greater than `max_threads`, or if `stride` is zero.
    pub fn dense_thread_range(
        &mut self,
        min_threads: usize,
        max_threads: usize,
        stride: usize,
    ) -> &mut Self {
        assert!(
            min_threads <= max_threads,
            "thread range minimum must not exceed its maximum"
        );
        assert!(stride > 0, "thread range stride must be positive");

        let mut threads = min_threads;

        while threads < max_threads {
            self.thread_counts.push(non_zero_threads(threads));
            threads = threads.saturating_add(stride);
        }

        self.thread_counts.push(non_zero_threads(max_threads));
        self
    }

    /// Adds a thread count equal to the available parallelism of the machine.
    #[cfg_attr(test, mutants::skip)] // Result depends on the machine.
    pub fn thread_per_cpu(&mut self) -> &mut Self {
        let threads = thread::available_parallelism().unwrap_or(NonZero::<usize>::MIN);

        self.thread_counts.push(threads);
        self
    }

    /// Sets the unit in which times are reported.
    pub fn unit(&mut self, time_unit: TimeUnit) -> &mut Self {
        self.time_unit = time_unit;
        self
    }

    /// Overrides the minimum measurement time of every instance.
    ///
    /// # Panics
    ///
    /// Panics if `min_time` is zero or an explicit iteration count is set.
    pub fn min_time(&mut self, min_time: Duration) -> &mut Self {
        assert!(!min_time.is_zero(), "minimum time must be positive");
        assert!(
            self.iterations.is_none(),
            "a minimum time cannot be combined with an explicit iteration count"
        );

        self.min_time = Some(min_time);
        self
    }

    /// Fixes the iteration count per thread of every instance, disabling iteration scaling.
    ///
    /// # Panics
    ///
    /// Panics if `iterations` is zero or a minimum time is set.
    pub fn iterations(&mut self, iterations: u64) -> &mut Self {
        assert!(
            self.min_time.is_none(),
            "an explicit iteration count cannot be combined with a minimum time"
        );

        self.iterations =
            Some(NonZero::new(iterations).expect("iteration count must be positive"));
        self
    }

    /// Overrides the repetition count of every instance.
    ///
    /// # Panics
    ///
    /// Panics if `repetitions` is zero.
    pub fn repetitions(&mut self, repetitions: u32) -> &mut Self {
        self.repetitions =
            Some(NonZero::new(repetitions).expect("repetition count must be positive"));
        self
    }

    /// Overrides whether individual repetitions are suppressed in favor of the statistics.
    pub fn report_aggregates_only(&mut self, aggregates_only: bool) -> &mut Self {
        self.aggregates_only = Some(aggregates_only);
        self
    }

    /// Measures wall clock time instead of processor time.
    ///
    /// # Panics
    ///
    /// Panics if manual timing is selected.
    pub fn use_real_time(&mut self) -> &mut Self {
        assert!(
            self.timing != TimingMode::Manual,
            "real time cannot be combined with manual time"
        );

        self.timing = TimingMode::Real;
        self
    }

    /// Uses the time reported via [`State::set_iteration_time()`] instead of measured time.
    ///
    /// # Panics
    ///
    /// Panics if real time is selected.
    pub fn use_manual_time(&mut self) -> &mut Self {
        assert!(
            self.timing != TimingMode::Real,
            "manual time cannot be combined with real time"
        );

        self.timing = TimingMode::Manual;
        self
    }

    /// Requests a complexity fit over the instances of the family.
    pub fn complexity(&mut self, complexity: BigO) -> &mut Self {
        self.complexity = Some(complexity);
        self
    }

    /// Adds a statistic computed over the repetitions of every instance.
    pub fn compute_statistics(
        &mut self,
        name: impl Into<String>,
        compute: StatisticFn,
    ) -> &mut Self {
        self.statistics.push(Statistic::new(name, compute));
        self
    }

    fn instances(&self, family_index: usize) -> Vec<BenchmarkInstance> {
        let arg_tuples = if self.arg_tuples.is_empty() {
            vec![Vec::new()]
        } else {
            self.arg_tuples.clone()
        };

        let thread_counts = if self.thread_counts.is_empty() {
            vec![NonZero::<usize>::MIN]
        } else {
            self.thread_counts.clone()
        };

        let family_size = arg_tuples.len().saturating_mul(thread_counts.len());

        if family_size > MAX_FAMILY_SIZE {
            warn!(
                family = self.name,
                family_size, "benchmark family expands to a very large number of instances"
            );
        }

        let last_tuple_index = arg_tuples.len().saturating_sub(1);

        arg_tuples
            .iter()
            .enumerate()
            .flat_map(|(tuple_index, args)| {
                thread_counts.iter().map(move |threads| {
                    self.instance(family_index, args, *threads, tuple_index == last_tuple_index)
                })
            })
            .collect()
    }

    fn instance(
        &self,
        family_index: usize,
        args: &[i64],
        threads: NonZero<usize>,
        last_in_family: bool,
    ) -> BenchmarkInstance {
        let name = self.instance_name(args, threads);

        let mut instance = BenchmarkInstance::from_shared_body(name, Arc::clone(&self.body))
            .with_family(self.name.clone(), family_index)
            .with_args(args.to_vec())
            .with_threads(threads)
            .with_time_unit(self.time_unit)
            .with_timing(self.timing)
            .with_statistics(self.statistics.clone())
            .with_last_in_family(last_in_family);

        if let Some(min_time) = self.min_time {
            instance = instance.with_min_time(min_time);
        }

        if let Some(iterations) = self.iterations {
            instance = instance.with_iterations(iterations);
        }

        if let Some(repetitions) = self.repetitions {
            instance = instance.with_repetitions(repetitions);
        }

        if let Some(aggregates_only) = self.aggregates_only {
            instance = instance.with_aggregates_only(aggregates_only);
        }

        if let Some(complexity) = self.complexity {
            instance = instance.with_complexity(complexity);
        }

        instance
    }

    fn instance_name(&self, args: &[i64], threads: NonZero<usize>) -> String {
        let mut name = self.name.clone();

        for (index, value) in args.iter().enumerate() {
            match self.arg_names.get(index).filter(|n| !n.is_empty()) {
                Some(arg_name) => write!(&mut name, "/{arg_name}:{value}"),
                None => write!(&mut name, "/{value}"),
            }
            .expect(ERR_STRING_WRITE);
        }

        if let Some(min_time) = self.min_time {
            write!(&mut name, "/min_time:{:.3}", min_time.as_secs_f64()).expect(ERR_STRING_WRITE);
        }

        if let Some(iterations) = self.iterations {
            write!(&mut name, "/iterations:{iterations}").expect(ERR_STRING_WRITE);
        }

        if let Some(repetitions) = self.repetitions {
            write!(&mut name, "/repeats:{repetitions}").expect(ERR_STRING_WRITE);
        }

        match self.timing {
            TimingMode::Manual => name.push_str("/manual_time"),
            TimingMode::Real => name.push_str("/real_time"),
            TimingMode::Cpu => {}
        }

        if !self.thread_counts.is_empty() {
            write!(&mut name, "/threads:{threads}").expect(ERR_STRING_WRITE);
        }

        name
    }
}

fn non_zero_threads(threads: usize) -> NonZero<usize> {
    NonZero::new(threads).expect("thread count must be positive")
}

/// `low`, every power of `multiplier` strictly between `low` and `high`, then `high` if it
/// differs from `low`.
fn geometric_range(low: i64, high: i64, multiplier: i64) -> Vec<i64> {
    assert!(low >= 0, "range bounds must not be negative");
    assert!(low <= high, "range low bound must not exceed its high bound");
    assert!(multiplier >= 2, "range multiplier must be at least 2");

    let mut values = vec![low];

    let mut power: i64 = 1;

    while power < high {
        if power > low {
            values.push(power);
        }

        match power.checked_mul(multiplier) {
            Some(next) => power = next,
            None => break,
        }
    }

    if high != low {
        values.push(high);
    }

    values
}
