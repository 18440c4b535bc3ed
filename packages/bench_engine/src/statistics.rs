//! Summary statistics over the repetitions of a benchmark instance.

use std::collections::BTreeMap;

use crate::counters::{Counter, CounterKind, UserCounters};
use crate::record::{RunKind, RunRecord};

/// A function that reduces a series of measurements to a single value.
pub type StatisticFn = fn(&[f64]) -> f64;

/// A named statistic computed over the repetitions of a benchmark instance.
///
/// Each statistic produces one record whose name is the instance name suffixed with
/// `_<name>`.
#[derive(Clone, Debug)]
pub struct Statistic {
    name: String,
    compute: StatisticFn,
}

impl Statistic {
    /// Creates a statistic with the given name and reduction function.
    #[must_use]
    pub fn new(name: impl Into<String>, compute: StatisticFn) -> Self {
        Self {
            name: name.into(),
            compute,
        }
    }

    /// The name of the statistic, used as the suffix of the record name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Applies the statistic to a series of values.
    #[must_use]
    pub fn compute(&self, values: &[f64]) -> f64 {
        (self.compute)(values)
    }
}

/// The statistics every benchmark family starts with: mean, median and standard deviation.
#[must_use]
pub fn default_statistics() -> Vec<Statistic> {
    vec![
        Statistic::new("mean", mean),
        Statistic::new("median", median),
        Statistic::new("stddev", stddev),
    ]
}

#[expect(
    clippy::cast_precision_loss,
    reason = "we accept loss of precision for absurdly long series"
)]
fn len_f64(values: &[f64]) -> f64 {
    values.len() as f64
}

/// The arithmetic mean, or zero for an empty series.
#[must_use]
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }

    values.iter().sum::<f64>() / len_f64(values)
}

/// The median. Series with fewer than three values yield their mean.
///
/// For an even number of values, the result is the mean of the two middle values.
#[must_use]
pub fn median(values: &[f64]) -> f64 {
    if values.len() < 3 {
        return mean(values);
    }

    let mut copy = values.to_vec();
    let count = copy.len();

    #[expect(clippy::integer_division, reason = "we want the lower middle index")]
    let middle = count / 2;

    let (lower, center, _) = copy.select_nth_unstable_by(middle, f64::total_cmp);
    let center = *center;

    if count % 2 == 1 {
        return center;
    }

    let below = lower
        .iter()
        .copied()
        .max_by(f64::total_cmp)
        .expect("at least three values means the lower half is never empty");

    f64::midpoint(below, center)
}

/// The sample standard deviation (with Bessel's correction), or zero for fewer than two
/// values.
#[must_use]
pub fn stddev(values: &[f64]) -> f64 {
    if values.len() <= 1 {
        return 0.0;
    }

    let count = len_f64(values);
    let avg = mean(values);
    let avg_squares = values.iter().map(|value| value * value).sum::<f64>() / count;

    // Rounding can push the variance slightly below zero for near-identical values.
    let variance = (count / (count - 1.0)) * (avg_squares - avg * avg);

    variance.max(0.0).sqrt()
}

/// Computes one statistic record per entry of `statistics` over the successful records in
/// `runs`. Yields nothing if fewer than two repetitions succeeded.
///
/// # Panics
///
/// Panics if a user counter is reported with different kinds by different repetitions.
pub(crate) fn compute_stats(runs: &[RunRecord], statistics: &[Statistic]) -> Vec<RunRecord> {
    let successful = runs
        .iter()
        .filter(|run| run.kind == RunKind::Normal)
        .collect::<Vec<_>>();

    let [first, _, ..] = successful.as_slice() else {
        return Vec::new();
    };

    let real_times = successful
        .iter()
        .map(|run| run.real_accumulated_secs)
        .collect::<Vec<_>>();
    let cpu_times = successful
        .iter()
        .map(|run| run.cpu_accumulated_secs)
        .collect::<Vec<_>>();
    let bytes_rates = successful
        .iter()
        .filter_map(|run| run.bytes_per_second)
        .collect::<Vec<_>>();
    let items_rates = successful
        .iter()
        .filter_map(|run| run.items_per_second)
        .collect::<Vec<_>>();

    let mut counter_series: BTreeMap<&str, (CounterKind, Vec<f64>)> = BTreeMap::new();

    for run in &successful {
        for (name, counter) in &run.counters {
            let (kind, series) = counter_series
                .entry(name.as_str())
                .or_insert_with(|| (counter.kind, Vec::with_capacity(successful.len())));

            assert!(
                *kind == counter.kind,
                "counter '{name}' changed its kind between repetitions"
            );

            series.push(counter.value);
        }
    }

    // A label only survives aggregation if every repetition agrees on it.
    let label = successful
        .iter()
        .all(|run| run.label == first.label)
        .then(|| first.label.clone())
        .flatten();

    statistics
        .iter()
        .map(|statistic| {
            let counters = counter_series
                .iter()
                .map(|(name, (kind, series))| {
                    (
                        (*name).to_string(),
                        Counter::new(statistic.compute(series), *kind),
                    )
                })
                .collect::<UserCounters>();

            RunRecord {
                name: format!("{}_{}", first.name, statistic.name()),
                family_index: first.family_index,
                kind: RunKind::Statistic,
                aggregate_name: Some(statistic.name().to_string()),
                iterations: first.iterations,
                threads: first.threads,
                time_unit: first.time_unit,
                real_accumulated_secs: statistic.compute(&real_times),
                cpu_accumulated_secs: statistic.compute(&cpu_times),
                bytes_per_second: (!bytes_rates.is_empty())
                    .then(|| statistic.compute(&bytes_rates)),
                items_per_second: (!items_rates.is_empty())
                    .then(|| statistic.compute(&items_rates)),
                complexity_n: None,
                label: label.clone(),
                error_message: None,
                counters,
                big_o: None,
            }
        })
        .collect()
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use testing::f64_diff_abs;

    use super::*;
    use crate::TimeUnit;

    const CLOSE_ENOUGH: f64 = 1e-9;

    #[test]
    #[expect(clippy::float_cmp, reason = "exact results expected for trivial inputs")]
    fn mean_of_empty_is_zero() {
        assert_eq!(mean(&[]), 0.0);
    }

    #[test]
    fn mean_is_arithmetic() {
        assert_eq!(f64_diff_abs(mean(&[1.0, 2.0, 3.0, 6.0]), 3.0, CLOSE_ENOUGH), 0.0);
    }

    #[test]
    fn median_even_count_averages_middle() {
        assert_eq!(f64_diff_abs(median(&[1.0, 2.0, 3.0, 4.0]), 2.5, CLOSE_ENOUGH), 0.0);
    }

    #[test]
    fn median_odd_count_picks_middle() {
        assert_eq!(f64_diff_abs(median(&[1.0, 2.0, 3.0]), 2.0, CLOSE_ENOUGH), 0.0);
    }

    #[test]
    fn median_is_order_independent() {
        let sorted = median(&[1.0, 2.0, 3.0, 4.0, 100.0, 7.0]);
        let shuffled = median(&[100.0, 4.0, 1.0, 7.0, 3.0, 2.0]);

        assert_eq!(f64_diff_abs(sorted, shuffled, CLOSE_ENOUGH), 0.0);
        assert_eq!(f64_diff_abs(sorted, 3.5, CLOSE_ENOUGH), 0.0);
    }

    #[test]
    fn median_of_two_is_mean() {
        assert_eq!(f64_diff_abs(median(&[1.0, 4.0]), 2.5, CLOSE_ENOUGH), 0.0);
    }

    #[test]
    #[expect(clippy::float_cmp, reason = "exact results expected for trivial inputs")]
    fn stddev_of_short_series_is_zero() {
        assert_eq!(stddev(&[]), 0.0);
        assert_eq!(stddev(&[42.0]), 0.0);
    }

    #[test]
    fn stddev_uses_bessel_correction() {
        // Sample variance of 2, 4, 4, 4, 5, 5, 7, 9 is 32 / 7.
        let values = [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];

        assert_eq!(
            f64_diff_abs(stddev(&values), (32.0_f64 / 7.0).sqrt(), CLOSE_ENOUGH),
            0.0
        );
    }

    #[test]
    fn stddev_of_identical_values_is_not_nan() {
        let values = [0.1; 7];

        let result = stddev(&values);
        assert!(!result.is_nan());
        assert_eq!(f64_diff_abs(result, 0.0, 1e-6), 0.0);
    }

    fn run(real_secs: f64, label: Option<&str>, hits: f64) -> RunRecord {
        let mut counters = UserCounters::new();
        counters.insert("hits".to_string(), Counter::from(hits));

        RunRecord {
            name: "bench/4".to_string(),
            family_index: 3,
            kind: RunKind::Normal,
            aggregate_name: None,
            iterations: 100,
            threads: 1,
            time_unit: TimeUnit::Nanosecond,
            real_accumulated_secs: real_secs,
            cpu_accumulated_secs: real_secs * 2.0,
            bytes_per_second: None,
            items_per_second: Some(real_secs * 10.0),
            complexity_n: None,
            label: label.map(str::to_string),
            error_message: None,
            counters,
            big_o: None,
        }
    }

    #[test]
    fn stats_need_two_successful_runs() {
        let mut errored = run(1.0, None, 0.0);
        errored.kind = RunKind::Error;

        let stats = compute_stats(&[run(1.0, None, 0.0), errored], &default_statistics());

        assert!(stats.is_empty());
    }

    #[test]
    fn stats_produce_one_record_per_statistic() {
        let runs = [
            run(1.0, Some("same"), 2.0),
            run(2.0, Some("same"), 4.0),
            run(3.0, Some("same"), 6.0),
        ];

        let stats = compute_stats(&runs, &default_statistics());

        let names = stats.iter().map(RunRecord::name).collect::<Vec<_>>();
        assert_eq!(names, vec!["bench/4_mean", "bench/4_median", "bench/4_stddev"]);

        let mean_record = &stats[0];
        assert_eq!(mean_record.kind(), RunKind::Statistic);
        assert_eq!(mean_record.aggregate_name(), Some("mean"));
        assert_eq!(mean_record.iterations(), 100);
        assert_eq!(mean_record.family_index(), 3);
        assert_eq!(mean_record.label(), Some("same"));
        assert_eq!(mean_record.bytes_per_second(), None);
        assert_eq!(
            f64_diff_abs(mean_record.real_accumulated_secs, 2.0, CLOSE_ENOUGH),
            0.0
        );
        assert_eq!(
            f64_diff_abs(mean_record.cpu_accumulated_secs, 4.0, CLOSE_ENOUGH),
            0.0
        );
        assert_eq!(
            f64_diff_abs(mean_record.items_per_second().unwrap(), 20.0, CLOSE_ENOUGH),
            0.0
        );
        assert_eq!(
            f64_diff_abs(mean_record.counters()["hits"].value, 4.0, CLOSE_ENOUGH),
            0.0
        );

        let stddev_record = &stats[2];
        assert_eq!(
            f64_diff_abs(stddev_record.real_accumulated_secs, 1.0, CLOSE_ENOUGH),
            0.0
        );
    }

    #[test]
    fn differing_labels_are_dropped() {
        let runs = [run(1.0, Some("a"), 0.0), run(2.0, Some("b"), 0.0)];

        let stats = compute_stats(&runs, &default_statistics());

        assert!(stats.iter().all(|record| record.label().is_none()));
    }

    #[test]
    fn custom_statistic_is_applied() {
        fn max(values: &[f64]) -> f64 {
            values.iter().copied().fold(f64::MIN, f64::max)
        }

        let runs = [run(1.0, None, 0.0), run(5.0, None, 0.0)];

        let stats = compute_stats(&runs, &[Statistic::new("max", max)]);

        assert_eq!(stats.len(), 1);
        assert_eq!(stats[0].name(), "bench/4_max");
        assert_eq!(
            f64_diff_abs(stats[0].real_accumulated_secs, 5.0, CLOSE_ENOUGH),
            0.0
        );
    }

    #[test]
    #[should_panic]
    fn counter_kind_mismatch_panics() {
        let first = run(1.0, None, 1.0);
        let mut second = run(2.0, None, 1.0);
        second
            .counters
            .insert("hits".to_string(), Counter::new(1.0, CounterKind::Rate));

        drop(compute_stats(&[first, second], &default_statistics()));
    }
}
