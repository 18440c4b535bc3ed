use std::fmt;

/// The unit in which a benchmark reports its per-iteration times.
///
/// The unit only affects presentation. Measurements are always taken in seconds and scaled by
/// [`multiplier()`][Self::multiplier] when reported.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
#[non_exhaustive]
pub enum TimeUnit {
    /// Nanoseconds.
    #[default]
    Nanosecond,

    /// Microseconds.
    Microsecond,

    /// Milliseconds.
    Millisecond,

    /// Seconds.
    Second,
}

impl TimeUnit {
    /// How many of this unit fit into one second.
    #[must_use]
    pub fn multiplier(self) -> f64 {
        match self {
            Self::Nanosecond => 1e9,
            Self::Microsecond => 1e6,
            Self::Millisecond => 1e3,
            Self::Second => 1.0,
        }
    }

    /// The short symbol used when printing values in this unit.
    #[must_use]
    pub fn symbol(self) -> &'static str {
        match self {
            Self::Nanosecond => "ns",
            Self::Microsecond => "us",
            Self::Millisecond => "ms",
            Self::Second => "s",
        }
    }
}

impl fmt::Display for TimeUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    #[test]
    fn default_is_nanoseconds() {
        assert_eq!(TimeUnit::default(), TimeUnit::Nanosecond);
    }

    #[test]
    #[expect(clippy::float_cmp, reason = "multipliers are exact powers of ten")]
    fn multipliers_scale_from_seconds() {
        assert_eq!(TimeUnit::Nanosecond.multiplier(), 1e9);
        assert_eq!(TimeUnit::Microsecond.multiplier(), 1e6);
        assert_eq!(TimeUnit::Millisecond.multiplier(), 1e3);
        assert_eq!(TimeUnit::Second.multiplier(), 1.0);
    }

    #[test]
    fn display_uses_symbol() {
        assert_eq!(TimeUnit::Microsecond.to_string(), "us");
        assert_eq!(TimeUnit::Second.to_string(), "s");
    }
}
