//! Example demonstrating key `bench_engine` types working together.
//!
//! This example shows how to:
//! - Describe benchmark families in a `Registry`
//! - Run the expanded instances with a `Driver`
//! - Print the records of every report, including statistics and a complexity fit
//!
//! Run with: `cargo run --example bench_engine_basic`.
#![expect(
    clippy::arithmetic_side_effects,
    clippy::cast_precision_loss,
    reason = "this is example code that does not need production-level safety"
)]

use std::collections::BTreeSet;
use std::hint::black_box;
use std::num::NonZero;
use std::time::Duration;

use bench_engine::{BigO, Counter, CounterKind, Driver, DriverOptions, Registry, TimeUnit};

fn main() {
    let mut registry = Registry::new();

    // Inserting into a BTreeSet grows as N log N with the number of elements.
    registry
        .register("btree_insert", |state| {
            let len = state.range(0);

            while state.keep_running() {
                let set = (0..len).collect::<BTreeSet<_>>();
                black_box(set);
            }

            let len = len.unsigned_abs();
            state.set_complexity_n(len);
            state.set_items_processed(state.iterations() * len);
        })
        .arg_name("len")
        .range(64, 8192)
        .unit(TimeUnit::Microsecond)
        .complexity(BigO::Auto);

    // Every thread works on its own data, so throughput should scale with the thread count.
    registry
        .register("vec_sum", |state| {
            let data = vec![1_u64; 4096];

            while state.keep_running() {
                black_box(data.iter().sum::<u64>());
            }

            state.set_bytes_processed(state.iterations() * 4096 * 8);
            state.set_counter(
                "sums",
                Counter::new(state.iterations() as f64, CounterKind::Rate),
            );
        })
        .thread_range(1, 4)
        .use_real_time();

    let options = DriverOptions::default()
        .with_min_time(Duration::from_millis(100))
        .with_repetitions(NonZero::new(3).unwrap())
        .with_aggregates_only(true);

    let driver = Driver::new(options);

    for report in driver.run_benchmarks(&registry.instances()) {
        for record in report.records() {
            println!("{record}");
        }
    }
}
