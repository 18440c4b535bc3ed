//! Benchmark demonstrating `bench_engine` overhead with an empty benchmark body.
//!
//! The body does nothing, so the measured time is the cost of the engine itself: spawning and
//! synchronizing the participating threads, reading the clocks and building the records.

#![allow(
    missing_docs,
    reason = "No need for API documentation in benchmark code"
)]

use std::hint::black_box;
use std::num::NonZero;

use bench_engine::{BenchmarkInstance, Driver, DriverOptions, Registry};
use criterion::{Criterion, criterion_group, criterion_main};

criterion_group!(benches, run_overhead, expansion_overhead);
criterion_main!(benches);

fn run_overhead(c: &mut Criterion) {
    let driver = Driver::new(DriverOptions::default());

    let mut group = c.benchmark_group("bench_engine_run");

    for threads in [1_usize, 4] {
        let instance = BenchmarkInstance::new("empty", |state| {
            while state.keep_running() {
                black_box(());
            }
        })
        .with_threads(NonZero::new(threads).unwrap())
        .with_iterations(NonZero::new(1000).unwrap());

        group.bench_function(format!("threads_{threads}"), |b| {
            b.iter(|| black_box(driver.run_benchmarks(std::slice::from_ref(&instance))));
        });
    }

    group.finish();
}

fn expansion_overhead(c: &mut Criterion) {
    let mut registry = Registry::new();

    registry
        .register("grid", |state| {
            while state.keep_running() {
                black_box(());
            }
        })
        .ranges(&[(1, 1 << 10), (1, 1 << 10)])
        .thread_range(1, 8);

    c.bench_function("bench_engine_expand", |b| {
        b.iter(|| black_box(registry.instances()));
    });
}
