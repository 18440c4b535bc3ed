use std::collections::BTreeMap;

/// How a [`Counter`] value is post-processed when a run record is built.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
#[non_exhaustive]
pub enum CounterKind {
    /// The value is reported as the sum over all threads.
    #[default]
    Default,

    /// The summed value is divided by the measured seconds of the attempt.
    Rate,

    /// The summed value is divided by the number of threads.
    AvgThreads,

    /// The summed value is divided by both the measured seconds and the number of threads.
    AvgThreadsRate,
}

impl CounterKind {
    fn is_rate(self) -> bool {
        matches!(self, Self::Rate | Self::AvgThreadsRate)
    }

    fn is_avg_threads(self) -> bool {
        matches!(self, Self::AvgThreads | Self::AvgThreadsRate)
    }
}

/// A user-defined measurement reported by a benchmark body alongside the timing data.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
#[non_exhaustive]
pub struct Counter {
    /// The value of the counter. Before a run record is built this is the raw sum over all
    /// threads; afterwards it has been adjusted according to [`kind`][Self::kind].
    pub value: f64,

    /// How the value is post-processed.
    pub kind: CounterKind,
}

impl Counter {
    /// Creates a counter with the given value and kind.
    #[must_use]
    pub fn new(value: f64, kind: CounterKind) -> Self {
        Self { value, kind }
    }
}

impl From<f64> for Counter {
    fn from(value: f64) -> Self {
        Self::new(value, CounterKind::Default)
    }
}

/// User counters keyed by name, in name order.
pub type UserCounters = BTreeMap<String, Counter>;

/// Adds every counter of `from` into `into`, summing values of counters with the same name.
///
/// Counters whose kind disagrees with an existing counter of the same name are skipped and the
/// name of the first such counter is returned as the error.
pub(crate) fn increment(into: &mut UserCounters, from: &UserCounters) -> Result<(), String> {
    let mut mismatch = None;

    for (name, counter) in from {
        match into.get_mut(name) {
            Some(existing) if existing.kind != counter.kind => {
                mismatch.get_or_insert_with(|| name.clone());
            }
            Some(existing) => {
                existing.value += counter.value;
            }
            None => {
                into.insert(name.clone(), *counter);
            }
        }
    }

    mismatch.map_or(Ok(()), Err)
}

/// Adjusts summed counter values according to their kinds.
pub(crate) fn finish(counters: &mut UserCounters, seconds: f64, threads: usize) {
    #[expect(
        clippy::cast_precision_loss,
        reason = "thread counts are tiny, no precision is lost"
    )]
    let threads = threads as f64;

    for counter in counters.values_mut() {
        if counter.kind.is_rate() && seconds > 0.0 {
            counter.value /= seconds;
        }

        if counter.kind.is_avg_threads() && threads > 0.0 {
            counter.value /= threads;
        }
    }
}
