//! Integration tests for `bench_engine`.
//!
//! These tests run benchmarks end to end on the real clocks of the machine, so they only assert
//! properties that do not depend on how fast the machine is.

use std::hint::black_box;
use std::num::NonZero;
use std::time::Duration;

use bench_engine::{
    BenchmarkInstance, BigO, CounterKind, Driver, DriverOptions, Registry, RunKind,
};
use testing::with_watchdog;

fn quick_options() -> DriverOptions {
    DriverOptions::default().with_min_time(Duration::from_millis(10))
}

#[test]
fn explicit_iterations_are_multiplied_by_thread_count() {
    with_watchdog(|| {
        let driver = Driver::new(quick_options());

        let instances = (1..=8)
            .map(|threads| {
                BenchmarkInstance::new(format!("spin/threads:{threads}"), |state| {
                    while state.keep_running() {
                        black_box(state.thread_index());
                    }
                })
                .with_threads(NonZero::new(threads).unwrap())
                .with_iterations(NonZero::new(25).unwrap())
            })
            .collect::<Vec<_>>();

        let reports = driver.run_benchmarks(&instances);

        assert_eq!(reports.len(), 8);

        for (report, threads) in reports.iter().zip(1_u64..) {
            let [run] = report.runs() else {
                panic!("expected exactly one run for {}", report.name());
            };

            assert_eq!(run.kind(), RunKind::Normal);
            assert_eq!(run.iterations(), 25 * threads);
            assert_eq!(run.threads() as u64, threads);
        }
    });
}

#[test]
fn error_before_loop_does_not_deadlock() {
    with_watchdog(|| {
        let driver = Driver::new(quick_options());

        let instances = (1..=8)
            .map(|threads| {
                BenchmarkInstance::new(format!("broken/threads:{threads}"), |state| {
                    state.skip_with_error("resource unavailable");
                })
                .with_threads(NonZero::new(threads).unwrap())
            })
            .collect::<Vec<_>>();

        for report in driver.run_benchmarks(&instances) {
            let [run] = report.runs() else {
                panic!("expected exactly one run for {}", report.name());
            };

            assert_eq!(run.kind(), RunKind::Error);
            assert_eq!(run.error_message(), Some("resource unavailable"));
            assert!(report.statistics().is_empty());
        }
    });
}

#[test]
fn error_on_one_thread_while_others_loop() {
    with_watchdog(|| {
        let driver = Driver::new(quick_options());

        let instance = BenchmarkInstance::new("partial", |state| {
            if state.thread_index() == 2 {
                state.skip_with_error("thread 2 gave up");
                return;
            }

            while state.keep_running() {
                black_box(());
            }
        })
        .with_threads(NonZero::new(4).unwrap());

        let reports = driver.run_benchmarks(&[instance]);
        let [run] = reports[0].runs() else {
            panic!("expected exactly one run");
        };

        assert_eq!(run.kind(), RunKind::Error);
        assert_eq!(run.error_message(), Some("thread 2 gave up"));
    });
}

#[test]
fn repetitions_produce_statistics() {
    with_watchdog(|| {
        let driver = Driver::new(quick_options().with_repetitions(NonZero::new(3).unwrap()));

        let instance = BenchmarkInstance::new("repeated", |state| {
            while state.keep_running() {
                black_box((0..16_u64).sum::<u64>());
            }
        });

        let reports = driver.run_benchmarks(&[instance]);
        let report = &reports[0];

        assert_eq!(report.runs().len(), 3);
        assert_eq!(report.statistics().len(), 3);
        assert_eq!(report.records().count(), 6);

        let first_iterations = report.runs()[0].iterations();
        assert!(
            report
                .runs()
                .iter()
                .all(|run| run.iterations() == first_iterations)
        );

        let names = report
            .statistics()
            .iter()
            .map(|record| record.name().to_string())
            .collect::<Vec<_>>();
        assert_eq!(names, ["repeated_mean", "repeated_median", "repeated_stddev"]);
        assert!(
            report
                .statistics()
                .iter()
                .all(|record| record.kind() == RunKind::Statistic)
        );
    });
}

#[test]
fn aggregates_only_hides_repetitions() {
    with_watchdog(|| {
        let driver = Driver::new(
            quick_options()
                .with_repetitions(NonZero::new(2).unwrap())
                .with_aggregates_only(true),
        );

        let instance = BenchmarkInstance::new("aggregated", |state| {
            while state.keep_running() {
                black_box(());
            }
        });

        let reports = driver.run_benchmarks(&[instance]);
        let report = &reports[0];

        assert!(report.aggregates_only());
        assert_eq!(report.runs().len(), 2);
        assert!(
            report
                .records()
                .all(|record| record.kind() == RunKind::Statistic)
        );
    });
}

#[test]
fn iteration_scaling_terminates_on_real_clocks() {
    with_watchdog(|| {
        let driver = Driver::new(DriverOptions::default().with_min_time(Duration::from_millis(20)));

        let instance = BenchmarkInstance::new("empty", |state| {
            while state.keep_running() {
                black_box(());
            }
        });

        let reports = driver.run_benchmarks(&[instance]);
        let run = &reports[0].runs()[0];

        assert_eq!(run.kind(), RunKind::Normal);
        assert!(run.iterations() > 1);
        assert!(run.real_accumulated_time() > 0.0);
    });
}

#[test]
fn registry_feeds_driver() {
    with_watchdog(|| {
        let mut registry = Registry::new();

        registry
            .register("linear", |state| {
                let len = state.range(0);

                while state.keep_running() {
                    black_box((0..len).map(black_box).sum::<i64>());
                }

                state.set_complexity_n(len.unsigned_abs());
                state.set_items_processed(state.iterations() * len.unsigned_abs());
                state.set_counter("len", f64::from(u32::try_from(len).unwrap()));
            })
            .range_multiplier(2)
            .range(16, 256)
            .iterations(200)
            .complexity(BigO::N);

        let instances = registry.instances();
        assert_eq!(instances.len(), 5);

        let reports = Driver::new(quick_options()).run_benchmarks(&instances);

        assert_eq!(
            reports
                .iter()
                .map(|report| report.name().to_string())
                .collect::<Vec<_>>(),
            [
                "linear/16/iterations:200",
                "linear/32/iterations:200",
                "linear/64/iterations:200",
                "linear/128/iterations:200",
                "linear/256/iterations:200",
            ]
        );

        assert!(reports[..4].iter().all(|report| report.complexity().is_none()));

        let fit = reports[4]
            .complexity()
            .expect("last instance of the family carries the fit");

        assert_eq!(fit.name(), "linear_BigO");
        assert_eq!(fit.kind(), RunKind::Complexity);
        assert!(matches!(fit.big_o().unwrap().complexity(), BigO::N));

        let run = &reports[4].runs()[0];
        assert_eq!(run.complexity_n(), Some(256));
        assert!(run.items_per_second().is_some());

        let counter = run.counters()["len"];
        assert_eq!(counter.kind, CounterKind::Default);
    });
}

#[test]
fn options_from_toml_drive_runs() {
    let options = DriverOptions::from_toml_str(
        r"
        min_time_secs = 0.25
        repetitions = 2
        ",
    )
    .unwrap();

    assert_eq!(options.min_time(), Duration::from_millis(250));
    assert_eq!(options.repetitions().get(), 2);

    let instance = BenchmarkInstance::new("configured", |state| {
        while state.keep_running() {
            black_box(());
        }
    })
    .with_iterations(NonZero::new(10).unwrap());

    let reports = Driver::new(options).run_benchmarks(&[instance]);

    assert_eq!(reports[0].runs().len(), 2);
    assert_eq!(reports[0].statistics().len(), 3);
}

#[test]
fn invalid_toml_options_are_rejected() {
    DriverOptions::from_toml_str("repetitions = 0").unwrap_err();
    DriverOptions::from_toml_str("unknown_key = 1").unwrap_err();
    DriverOptions::from_toml_str("min_time_secs = ").unwrap_err();
}
