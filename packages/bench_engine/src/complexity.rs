//! Least-squares fitting of benchmark timings against asymptotic complexity curves.

use std::fmt;

use tracing::debug;

use crate::counters::UserCounters;
use crate::record::{RunKind, RunRecord};

/// The asymptotic complexity curve a benchmark family is fitted against.
#[derive(Clone, Copy, Debug)]
#[non_exhaustive]
pub enum BigO {
    /// O(1)
    Constant,

    /// O(log n)
    LogN,

    /// O(n)
    N,

    /// O(n log n)
    NLogN,

    /// O(n²)
    NSquared,

    /// O(n³)
    NCubed,

    /// Fit every fixed curve and keep the one with the lowest error.
    Auto,

    /// A caller-supplied curve.
    Lambda(fn(u64) -> f64),
}

/// The fixed curves tried in automatic selection, in tie-break order.
const AUTO_CANDIDATES: [BigO; 6] = [
    BigO::Constant,
    BigO::LogN,
    BigO::N,
    BigO::NLogN,
    BigO::NSquared,
    BigO::NCubed,
];

impl BigO {
    /// The short human-readable symbol of the curve.
    #[must_use]
    pub fn symbol(self) -> &'static str {
        match self {
            Self::Constant => "(1)",
            Self::LogN => "lgN",
            Self::N => "N",
            Self::NLogN => "NlgN",
            Self::NSquared => "N^2",
            Self::NCubed => "N^3",
            Self::Auto => "auto",
            Self::Lambda(_) => "f(N)",
        }
    }

    /// Evaluates the curve at `n`, or `None` for [`BigO::Auto`], which is not a curve.
    #[must_use]
    pub fn evaluate(self, n: u64) -> Option<f64> {
        #[expect(
            clippy::cast_precision_loss,
            reason = "we accept loss of precision for astronomically large inputs"
        )]
        let x = n as f64;

        match self {
            Self::Constant => Some(1.0),
            Self::LogN => Some(x.log2()),
            Self::N => Some(x),
            Self::NLogN => Some(x * x.log2()),
            Self::NSquared => Some(x * x),
            Self::NCubed => Some(x * x * x),
            Self::Auto => None,
            Self::Lambda(f) => Some(f(n)),
        }
    }
}

impl fmt::Display for BigO {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

/// The result of fitting one time series against one curve.
#[derive(Clone, Copy, Debug)]
pub struct LeastSq {
    complexity: BigO,
    coef: f64,
    rms: f64,
}

impl LeastSq {
    /// The curve the series was fitted against.
    #[must_use]
    pub fn complexity(&self) -> BigO {
        self.complexity
    }

    /// The coefficient that minimizes the squared error of `time ≈ coef · curve(n)`.
    #[must_use]
    pub fn coef(&self) -> f64 {
        self.coef
    }

    /// The root-mean-square residual divided by the mean of the times.
    ///
    /// If the mean time is zero, the residual is reported without normalization.
    #[must_use]
    pub fn rms(&self) -> f64 {
        self.rms
    }
}

/// Fits `time ≈ coef · curve(n)` by least squares.
///
/// With [`BigO::Auto`], every fixed curve is fitted and the one with the lowest normalized
/// error is returned, preferring earlier curves (constant first) on ties.
///
/// Returns `None` if there are fewer than two points, if every point has the same `n` or if
/// the curve yields no usable values for the given inputs.
///
/// # Panics
///
/// Panics if `n` and `time` have different lengths.
#[must_use]
pub fn minimal_least_sq(n: &[u64], time: &[f64], complexity: BigO) -> Option<LeastSq> {
    assert_eq!(
        n.len(),
        time.len(),
        "complexity fit requires one time value per input size"
    );

    let [first_n, _, ..] = n else {
        return None;
    };

    if n.iter().all(|value| value == first_n) {
        return None;
    }

    if !matches!(complexity, BigO::Auto) {
        return fit_curve(n, time, complexity);
    }

    let mut best: Option<LeastSq> = None;

    for candidate in AUTO_CANDIDATES {
        let Some(fit) = fit_curve(n, time, candidate) else {
            continue;
        };

        if best.is_none_or(|best| fit.rms < best.rms) {
            best = Some(fit);
        }
    }

    best
}

fn fit_curve(n: &[u64], time: &[f64], complexity: BigO) -> Option<LeastSq> {
    let curve = n
        .iter()
        .map(|value| complexity.evaluate(*value))
        .collect::<Option<Vec<_>>>()?;

    let sigma_gn_squared = curve.iter().map(|g| g * g).sum::<f64>();

    if !(sigma_gn_squared > 0.0 && sigma_gn_squared.is_finite()) {
        return None;
    }

    let sigma_time_gn = time.iter().zip(&curve).map(|(t, g)| t * g).sum::<f64>();
    let coef = sigma_time_gn / sigma_gn_squared;

    #[expect(
        clippy::cast_precision_loss,
        reason = "we accept loss of precision for absurdly long series"
    )]
    let count = time.len() as f64;

    let sum_squared_residuals = time
        .iter()
        .zip(&curve)
        .map(|(t, g)| {
            let residual = t - coef * g;
            residual * residual
        })
        .sum::<f64>();

    let rms = (sum_squared_residuals / count).sqrt();
    let mean = time.iter().sum::<f64>() / count;

    #[expect(clippy::float_cmp, reason = "only an exact zero mean cannot be normalized")]
    let rms = if mean == 0.0 { rms } else { rms / mean };

    if !coef.is_finite() || !rms.is_finite() {
        return None;
    }

    Some(LeastSq {
        complexity,
        coef,
        rms,
    })
}

/// The complexity fit of a benchmark family, for both timing bases.
#[derive(Clone, Copy, Debug)]
pub struct ComplexityFit {
    complexity: BigO,
    real_coefficient: f64,
    cpu_coefficient: f64,
    real_rms: f64,
    cpu_rms: f64,
}

impl ComplexityFit {
    /// The curve the family was fitted against.
    #[must_use]
    pub fn complexity(&self) -> BigO {
        self.complexity
    }

    /// The coefficient of the wall clock (or manual) time fit, in seconds.
    #[must_use]
    pub fn real_coefficient(&self) -> f64 {
        self.real_coefficient
    }

    /// The coefficient of the processor time fit, in seconds.
    #[must_use]
    pub fn cpu_coefficient(&self) -> f64 {
        self.cpu_coefficient
    }

    /// The normalized RMS error of the wall clock (or manual) time fit.
    #[must_use]
    pub fn real_rms(&self) -> f64 {
        self.real_rms
    }

    /// The normalized RMS error of the processor time fit.
    #[must_use]
    pub fn cpu_rms(&self) -> f64 {
        self.cpu_rms
    }
}

/// Fits the per-iteration times of a family's successful runs against `complexity`.
///
/// Curve selection happens on processor time; the wall clock time is then fitted against
/// the selected curve. Runs without a complexity input size are ignored.
pub(crate) fn compute_big_o(
    family_name: &str,
    complexity: BigO,
    reports: &[RunRecord],
) -> Option<RunRecord> {
    let eligible = reports
        .iter()
        .filter(|run| run.kind == RunKind::Normal && run.complexity_n.is_some())
        .collect::<Vec<_>>();

    let [first, ..] = eligible.as_slice() else {
        return None;
    };

    let n = eligible
        .iter()
        .filter_map(|run| run.complexity_n)
        .collect::<Vec<_>>();
    let real_time = eligible
        .iter()
        .map(|run| run.per_iteration(run.real_accumulated_secs))
        .collect::<Vec<_>>();
    let cpu_time = eligible
        .iter()
        .map(|run| run.per_iteration(run.cpu_accumulated_secs))
        .collect::<Vec<_>>();

    let (cpu_fit, real_fit) = if matches!(complexity, BigO::Lambda(_)) {
        (
            minimal_least_sq(&n, &cpu_time, complexity),
            minimal_least_sq(&n, &real_time, complexity),
        )
    } else {
        let cpu_fit = minimal_least_sq(&n, &cpu_time, complexity);
        let real_fit =
            cpu_fit.and_then(|fit| minimal_least_sq(&n, &real_time, fit.complexity()));
        (cpu_fit, real_fit)
    };

    let (Some(cpu_fit), Some(real_fit)) = (cpu_fit, real_fit) else {
        debug!(
            family_name,
            points = eligible.len(),
            "complexity fit skipped because the data is degenerate"
        );
        return None;
    };

    Some(RunRecord {
        name: format!("{family_name}_BigO"),
        family_index: first.family_index,
        kind: RunKind::Complexity,
        aggregate_name: None,
        iterations: 0,
        threads: first.threads,
        time_unit: first.time_unit,
        real_accumulated_secs: real_fit.coef(),
        cpu_accumulated_secs: cpu_fit.coef(),
        bytes_per_second: None,
        items_per_second: None,
        complexity_n: None,
        label: None,
        error_message: None,
        counters: UserCounters::new(),
        big_o: Some(ComplexityFit {
            complexity: cpu_fit.complexity(),
            real_coefficient: real_fit.coef(),
            cpu_coefficient: cpu_fit.coef(),
            real_rms: real_fit.rms(),
            cpu_rms: cpu_fit.rms(),
        }),
    })
}
