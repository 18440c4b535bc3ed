#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
#![cfg_attr(docsrs, feature(doc_cfg))]

//! Engine for running microbenchmarks and reporting their measurements.
//!
//! The engine runs a benchmark body with a growing iteration count until a run is long enough
//! to be significant, optionally on several threads at once, and turns the measurements into
//! per-run records, statistics across repetitions and asymptotic complexity fits.
//!
//! The core functionality includes:
//! - [`Registry`] and [`Family`] - Describe benchmarks and expand them into instances
//! - [`BenchmarkInstance`] - A single benchmark configuration ready to be run
//! - [`Driver`] - Runs instances and produces [`BenchmarkReport`]s
//! - [`State`] - Handed to the benchmark body to drive the measurement loop
//! - [`RunRecord`] - One measured run, statistic or complexity fit
//!
//! # Usage
//!
//! ```
//! use std::hint::black_box;
//! use std::time::Duration;
//!
//! use bench_engine::{Driver, DriverOptions, Registry};
//!
//! let mut registry = Registry::new();
//!
//! registry
//!     .register("sum", |state| {
//!         let len = state.range(0);
//!
//!         while state.keep_running() {
//!             black_box((0..len).sum::<i64>());
//!         }
//!
//!         state.set_items_processed(state.iterations() * len.unsigned_abs());
//!     })
//!     .arg(64)
//!     .arg(512);
//!
//! let driver = Driver::new(DriverOptions::default().with_min_time(Duration::from_millis(10)));
//!
//! for report in driver.run_benchmarks(&registry.instances()) {
//!     for record in report.records() {
//!         println!("{record}");
//!     }
//! }
//! ```
//!
//! # Multithreaded benchmarks
//!
//! An instance with more than one thread runs its body on that many threads at the same time.
//! All threads start and stop the measured region together and their measurements are merged
//! into one record. Processor time is summed over the threads while wall clock time is
//! averaged.
//!
//! # Configuration
//!
//! [`DriverOptions`] can be built in code or parsed from TOML via
//! [`DriverOptions::from_toml_str()`].

mod complexity;
mod counters;
mod driver;
mod error;
mod family;
mod instance;
mod manager;
mod options;
mod pal;
mod record;
mod state;
mod statistics;
mod time_unit;
mod timer;

pub use complexity::{BigO, ComplexityFit, LeastSq, minimal_least_sq};
pub use counters::{Counter, CounterKind, UserCounters};
pub use driver::Driver;
pub use error::Error;
pub use family::{Family, Registry};
pub use instance::{BenchmarkFn, BenchmarkInstance, TimingMode};
pub use options::DriverOptions;
pub use record::{BenchmarkReport, RunKind, RunRecord};
pub use state::State;
pub use statistics::{Statistic, StatisticFn, default_statistics, mean, median, stddev};
pub use time_unit::TimeUnit;

pub(crate) const ERR_POISONED_LOCK: &str =
    "encountered poisoned lock - program validity cannot be guaranteed";
