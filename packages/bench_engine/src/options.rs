use std::num::NonZero;
use std::time::Duration;

use toml::{Table, Value};

use crate::error::{Error, Result};

const DEFAULT_MIN_TIME: Duration = Duration::from_millis(500);
const DEFAULT_MAX_ITERATIONS: u64 = 1_000_000_000;
const DEFAULT_GROWTH_FACTOR: f64 = 1.4;
const DEFAULT_DAMPENING_CAP: f64 = 10.0;

/// Global tunables of the [`Driver`][crate::Driver].
///
/// Benchmark instances may override the minimum time, the repetition count and the
/// aggregates-only flag; the other tunables always apply.
///
/// # Examples
///
/// ```
/// use std::num::NonZero;
/// use std::time::Duration;
///
/// use bench_engine::DriverOptions;
///
/// let options = DriverOptions::default()
///     .with_min_time(Duration::from_millis(250))
///     .with_repetitions(NonZero::new(5).unwrap());
///
/// let from_config = DriverOptions::from_toml_str(
///     r#"
///     min_time_secs = 0.25
///     repetitions = 5
///     "#,
/// )
/// .unwrap();
///
/// assert_eq!(options, from_config);
/// ```
#[derive(Clone, Debug, PartialEq)]
pub struct DriverOptions {
    min_time: Duration,
    repetitions: NonZero<u32>,
    aggregates_only: bool,
    max_iterations: NonZero<u64>,
    growth_factor: f64,
    dampening_cap: f64,
}

impl Default for DriverOptions {
    fn default() -> Self {
        Self {
            min_time: DEFAULT_MIN_TIME,
            repetitions: NonZero::<u32>::MIN,
            aggregates_only: false,
            max_iterations: NonZero::new(DEFAULT_MAX_ITERATIONS)
                .expect("constant is non-zero"),
            growth_factor: DEFAULT_GROWTH_FACTOR,
            dampening_cap: DEFAULT_DAMPENING_CAP,
        }
    }
}

impl DriverOptions {
    /// Parses options from a TOML document. Keys that are absent keep their default values.
    ///
    /// Recognized keys are `min_time_secs`, `repetitions`, `aggregates_only`,
    /// `max_iterations`, `growth_factor` and `dampening_cap`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Toml`] if the text is not valid TOML and [`Error::InvalidOption`] if a
    /// key is unknown or its value is of the wrong type or out of range.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let table = toml::from_str::<Table>(text)?;

        let mut options = Self::default();

        for (key, value) in &table {
            match key.as_str() {
                "min_time_secs" => {
                    let secs = positive_float(key, value, 0.0)?;
                    options.min_time = Duration::try_from_secs_f64(secs)
                        .map_err(|e| invalid(key, e.to_string()))?;

                    if options.min_time.is_zero() {
                        return Err(invalid(key, "must be at least one nanosecond"));
                    }
                }
                "repetitions" => {
                    let repetitions = positive_integer(key, value)?;
                    options.repetitions = u32::try_from(repetitions)
                        .ok()
                        .and_then(NonZero::new)
                        .ok_or_else(|| invalid(key, "must fit in a 32-bit unsigned integer"))?;
                }
                "aggregates_only" => {
                    options.aggregates_only = value
                        .as_bool()
                        .ok_or_else(|| invalid(key, "must be a boolean"))?;
                }
                "max_iterations" => {
                    options.max_iterations = NonZero::new(positive_integer(key, value)?)
                        .ok_or_else(|| invalid(key, "must be a positive integer"))?;
                }
                "growth_factor" => {
                    options.growth_factor = positive_float(key, value, 1.0)?;
                }
                "dampening_cap" => {
                    options.dampening_cap = positive_float(key, value, 1.0)?;
                }
                _ => return Err(invalid(key, "unknown option")),
            }
        }

        Ok(options)
    }

    /// Sets the minimum measurement time an attempt must reach to be accepted. Defaults to
    /// 0.5 seconds.
    ///
    /// # Panics
    ///
    /// Panics if `min_time` is zero.
    #[must_use]
    pub fn with_min_time(mut self, min_time: Duration) -> Self {
        assert!(!min_time.is_zero(), "minimum time must be positive");

        self.min_time = min_time;
        self
    }

    /// Sets how many times each instance is measured. Defaults to 1.
    #[must_use]
    pub fn with_repetitions(mut self, repetitions: NonZero<u32>) -> Self {
        self.repetitions = repetitions;
        self
    }

    /// Sets whether individual repetitions are suppressed in favor of their statistics when
    /// an instance is repeated. Defaults to `false`.
    #[must_use]
    pub fn with_aggregates_only(mut self, aggregates_only: bool) -> Self {
        self.aggregates_only = aggregates_only;
        self
    }

    /// Sets the iteration count at which scaling stops and the attempt is accepted regardless
    /// of its duration. Defaults to one billion.
    #[must_use]
    pub fn with_max_iterations(mut self, max_iterations: NonZero<u64>) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    /// Sets how far past the minimum time the driver aims when it grows the iteration count.
    /// Defaults to 1.4.
    ///
    /// # Panics
    ///
    /// Panics if `growth_factor` is not a finite number greater than 1.
    #[must_use]
    pub fn with_growth_factor(mut self, growth_factor: f64) -> Self {
        assert!(
            growth_factor.is_finite() && growth_factor > 1.0,
            "growth factor must be a finite number greater than 1"
        );

        self.growth_factor = growth_factor;
        self
    }

    /// Sets the largest factor by which the iteration count grows after an attempt that
    /// measured less than a tenth of the minimum time. Defaults to 10.
    ///
    /// # Panics
    ///
    /// Panics if `dampening_cap` is not a finite number greater than 1.
    #[must_use]
    pub fn with_dampening_cap(mut self, dampening_cap: f64) -> Self {
        assert!(
            dampening_cap.is_finite() && dampening_cap > 1.0,
            "dampening cap must be a finite number greater than 1"
        );

        self.dampening_cap = dampening_cap;
        self
    }

    /// The minimum measurement time an attempt must reach to be accepted.
    #[must_use]
    pub fn min_time(&self) -> Duration {
        self.min_time
    }

    /// How many times each instance is measured.
    #[must_use]
    pub fn repetitions(&self) -> NonZero<u32> {
        self.repetitions
    }

    /// Whether individual repetitions are suppressed when an instance is repeated.
    #[must_use]
    pub fn aggregates_only(&self) -> bool {
        self.aggregates_only
    }

    /// The iteration count at which scaling stops.
    #[must_use]
    pub fn max_iterations(&self) -> NonZero<u64> {
        self.max_iterations
    }

    /// How far past the minimum time the driver aims when it grows the iteration count.
    #[must_use]
    pub fn growth_factor(&self) -> f64 {
        self.growth_factor
    }

    /// The largest growth factor applied after a far too short attempt.
    #[must_use]
    pub fn dampening_cap(&self) -> f64 {
        self.dampening_cap
    }
}

fn invalid(key: &str, problem: impl Into<String>) -> Error {
    Error::InvalidOption {
        key: key.to_string(),
        problem: problem.into(),
    }
}

/// Reads a finite number strictly greater than `exclusive_min`. Integers are accepted too.
fn positive_float(key: &str, value: &Value, exclusive_min: f64) -> Result<f64> {
    #[expect(
        clippy::cast_precision_loss,
        reason = "configuration values are small, no precision is lost"
    )]
    let number = match value {
        Value::Float(f) => *f,
        Value::Integer(i) => *i as f64,
        _ => return Err(invalid(key, "must be a number")),
    };

    if !number.is_finite() || number <= exclusive_min {
        return Err(invalid(
            key,
            format!("must be a finite number greater than {exclusive_min}"),
        ));
    }

    Ok(number)
}

fn positive_integer(key: &str, value: &Value) -> Result<u64> {
    let integer = value
        .as_integer()
        .ok_or_else(|| invalid(key, "must be an integer"))?;

    u64::try_from(integer)
        .ok()
        .filter(|n| *n > 0)
        .ok_or_else(|| invalid(key, "must be a positive integer"))
}
