use std::fmt;

use crate::complexity::ComplexityFit;
use crate::counters::{self, UserCounters};
use crate::instance::{BenchmarkInstance, TimingMode};
use crate::manager::AttemptResult;
use crate::time_unit::TimeUnit;

/// What a [`RunRecord`] describes.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
#[non_exhaustive]
pub enum RunKind {
    /// A measured repetition of a benchmark instance.
    Normal,

    /// A repetition whose benchmark body reported an error.
    Error,

    /// A statistic computed over the repetitions of a benchmark instance.
    Statistic,

    /// An asymptotic complexity fit over the instances of a benchmark family.
    Complexity,
}

/// The immutable result of one accepted attempt, or a record derived from several of them.
///
/// Times are stored in seconds and reported in the [`time_unit()`][Self::time_unit] of the
/// benchmark instance.
#[derive(Clone, Debug)]
pub struct RunRecord {
    pub(crate) name: String,
    pub(crate) family_index: usize,
    pub(crate) kind: RunKind,
    pub(crate) aggregate_name: Option<String>,

    // Total over all threads.
    pub(crate) iterations: u64,
    pub(crate) threads: usize,
    pub(crate) time_unit: TimeUnit,

    pub(crate) real_accumulated_secs: f64,
    pub(crate) cpu_accumulated_secs: f64,

    pub(crate) bytes_per_second: Option<f64>,
    pub(crate) items_per_second: Option<f64>,
    pub(crate) complexity_n: Option<u64>,

    pub(crate) label: Option<String>,
    pub(crate) error_message: Option<String>,
    pub(crate) counters: UserCounters,

    pub(crate) big_o: Option<ComplexityFit>,
}

impl RunRecord {
    /// Builds the record of an accepted attempt.
    ///
    /// `result` must already have its wall clock and manual time averaged over the threads and
    /// `seconds` is the time the acceptance decision was based on.
    pub(crate) fn from_attempt(
        instance: &BenchmarkInstance,
        iterations_per_thread: u64,
        result: AttemptResult,
        seconds: f64,
    ) -> Self {
        let threads = instance.threads().get();

        let iterations = iterations_per_thread.saturating_mul(threads as u64);

        let real_accumulated_secs = match instance.timing() {
            TimingMode::Manual => result.manual_time.as_secs_f64(),
            TimingMode::Cpu | TimingMode::Real => result.real_time.as_secs_f64(),
        };

        let has_error = result.has_error();

        let mut user_counters = result.counters;
        counters::finish(&mut user_counters, seconds, threads);

        Self {
            name: instance.name().to_string(),
            family_index: instance.family_index(),
            kind: if has_error {
                RunKind::Error
            } else {
                RunKind::Normal
            },
            aggregate_name: None,
            iterations,
            threads,
            time_unit: instance.time_unit(),
            real_accumulated_secs,
            cpu_accumulated_secs: result.cpu_time.as_secs_f64(),
            bytes_per_second: per_second(result.bytes_processed, seconds),
            items_per_second: per_second(result.items_processed, seconds),
            complexity_n: (result.complexity_n > 0).then_some(result.complexity_n),
            label: result.label,
            error_message: result.error_message,
            counters: user_counters,
            big_o: None,
        }
    }

    /// The name of the benchmark instance, with a suffix for derived records.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The index of the benchmark family in the registry that produced the instance.
    #[must_use]
    pub fn family_index(&self) -> usize {
        self.family_index
    }

    /// What this record describes.
    #[must_use]
    pub fn kind(&self) -> RunKind {
        self.kind
    }

    /// For statistic records, the name of the statistic (e.g. `mean`).
    #[must_use]
    pub fn aggregate_name(&self) -> Option<&str> {
        self.aggregate_name.as_deref()
    }

    /// The number of iterations executed, summed over all threads.
    ///
    /// Complexity records report zero.
    #[must_use]
    pub fn iterations(&self) -> u64 {
        self.iterations
    }

    /// The number of threads that executed the benchmark body.
    #[must_use]
    pub fn threads(&self) -> usize {
        self.threads
    }

    /// The unit in which times of this record are reported.
    #[must_use]
    pub fn time_unit(&self) -> TimeUnit {
        self.time_unit
    }

    /// The total wall clock (or manual) time of the measurement, in [`time_unit()`][Self::time_unit].
    #[must_use]
    pub fn real_accumulated_time(&self) -> f64 {
        self.real_accumulated_secs * self.time_unit.multiplier()
    }

    /// The total processor time of the measurement, in [`time_unit()`][Self::time_unit].
    #[must_use]
    pub fn cpu_accumulated_time(&self) -> f64 {
        self.cpu_accumulated_secs * self.time_unit.multiplier()
    }

    /// The wall clock (or manual) time of one iteration, in [`time_unit()`][Self::time_unit].
    ///
    /// For complexity records this is the fitted coefficient of the wall clock time.
    #[must_use]
    pub fn real_iteration_time(&self) -> f64 {
        self.per_iteration(self.real_accumulated_time())
    }

    /// The processor time of one iteration, in [`time_unit()`][Self::time_unit].
    ///
    /// For complexity records this is the fitted coefficient of the processor time.
    #[must_use]
    pub fn cpu_iteration_time(&self) -> f64 {
        self.per_iteration(self.cpu_accumulated_time())
    }

    pub(crate) fn per_iteration(&self, accumulated: f64) -> f64 {
        if self.iterations == 0 {
            return accumulated;
        }

        #[expect(
            clippy::cast_precision_loss,
            reason = "we accept loss of precision for astronomically large iteration counts"
        )]
        let iterations = self.iterations as f64;

        accumulated / iterations
    }

    /// Bytes processed per second of measured time, if the benchmark reported any.
    #[must_use]
    pub fn bytes_per_second(&self) -> Option<f64> {
        self.bytes_per_second
    }

    /// Items processed per second of measured time, if the benchmark reported any.
    #[must_use]
    pub fn items_per_second(&self) -> Option<f64> {
        self.items_per_second
    }

    /// The input size reported by the benchmark body, if any.
    #[must_use]
    pub fn complexity_n(&self) -> Option<u64> {
        self.complexity_n
    }

    /// The label reported by the benchmark body, if any.
    #[must_use]
    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    /// The error reported by the benchmark body, if any.
    #[must_use]
    pub fn error_message(&self) -> Option<&str> {
        self.error_message.as_deref()
    }

    /// The user counters, already adjusted according to their kinds.
    #[must_use]
    pub fn counters(&self) -> &UserCounters {
        &self.counters
    }

    /// For complexity records, the fitted curve with coefficients and errors.
    #[must_use]
    pub fn big_o(&self) -> Option<&ComplexityFit> {
        self.big_o.as_ref()
    }
}

fn per_second(amount: u64, seconds: f64) -> Option<f64> {
    if amount == 0 || seconds <= 0.0 {
        return None;
    }

    #[expect(
        clippy::cast_precision_loss,
        reason = "we accept loss of precision for astronomically large amounts"
    )]
    let amount = amount as f64;

    Some(amount / seconds)
}

impl fmt::Display for RunRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(message) = &self.error_message {
            return write!(f, "{} ERROR OCCURRED: '{message}'", self.name);
        }

        if let Some(fit) = &self.big_o {
            let symbol = fit.complexity().symbol();

            return write!(
                f,
                "{} {:.2} {symbol} {:.2} {symbol} (rms {:.0}% {:.0}%)",
                self.name,
                self.real_iteration_time(),
                self.cpu_iteration_time(),
                fit.real_rms() * 100.0,
                fit.cpu_rms() * 100.0,
            );
        }

        write!(
            f,
            "{} {:.2} {unit} {:.2} {unit} {} iterations",
            self.name,
            self.real_iteration_time(),
            self.cpu_iteration_time(),
            self.iterations,
            unit = self.time_unit,
        )?;

        if let Some(bytes) = self.bytes_per_second {
            write!(f, " {bytes:.0} B/s")?;
        }

        if let Some(items) = self.items_per_second {
            write!(f, " {items:.0} items/s")?;
        }

        for (name, counter) in &self.counters {
            write!(f, " {name}={:.2}", counter.value)?;
        }

        if let Some(label) = &self.label {
            write!(f, " {label}")?;
        }

        Ok(())
    }
}

/// Everything the driver produced for one benchmark instance.
#[derive(Clone, Debug)]
pub struct BenchmarkReport {
    name: String,
    family_index: usize,
    runs: Vec<RunRecord>,
    statistics: Vec<RunRecord>,
    complexity: Option<RunRecord>,
    aggregates_only: bool,
}

impl BenchmarkReport {
    pub(crate) fn new(
        name: String,
        family_index: usize,
        runs: Vec<RunRecord>,
        statistics: Vec<RunRecord>,
        complexity: Option<RunRecord>,
        aggregates_only: bool,
    ) -> Self {
        Self {
            name,
            family_index,
            runs,
            statistics,
            complexity,
            aggregates_only,
        }
    }

    /// The name of the benchmark instance.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The index of the benchmark family in the registry that produced the instance.
    #[must_use]
    pub fn family_index(&self) -> usize {
        self.family_index
    }

    /// One record per executed repetition, including those suppressed from
    /// [`records()`][Self::records] in aggregates-only mode.
    #[must_use]
    pub fn runs(&self) -> &[RunRecord] {
        &self.runs
    }

    /// One record per statistic, present when at least two repetitions succeeded.
    #[must_use]
    pub fn statistics(&self) -> &[RunRecord] {
        &self.statistics
    }

    /// The complexity fit of the family, attached to the report of its last instance.
    #[must_use]
    pub fn complexity(&self) -> Option<&RunRecord> {
        self.complexity.as_ref()
    }

    /// Whether the individual repetitions are suppressed from [`records()`][Self::records].
    #[must_use]
    pub fn aggregates_only(&self) -> bool {
        self.aggregates_only
    }

    /// The records to present, in order: repetitions, statistics and the complexity fit.
    ///
    /// In aggregates-only mode, repetitions are omitted unless they carry an error.
    pub fn records(&self) -> impl Iterator<Item = &RunRecord> {
        let aggregates_only = self.aggregates_only;

        self.runs
            .iter()
            .filter(move |run| !aggregates_only || run.kind == RunKind::Error)
            .chain(self.statistics.iter())
            .chain(self.complexity.iter())
    }
}
