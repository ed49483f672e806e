//! Scoring candidate configurations against a surrogate.
//!
//! An [`AcquisitionFunction`] is either *unbound* or *bound* to a fitted
//! surrogate and the current incumbent cost. Computing an unbound function
//! is an error, never a silent default:
//!
//! ```
//! use smbo::acquisition::{AcquisitionFunction, AcquisitionKind};
//! use smbo::Error;
//!
//! let acq = AcquisitionFunction::new(AcquisitionKind::PredictedMean);
//! assert!(matches!(acq.compute(&[vec![0.5]]), Err(Error::NotFitted)));
//! ```
//!
//! Scores are "higher is better". [`AcquisitionKind::PredictedMean`] scores
//! a point by its negated predicted mean and ignores the variance, so the
//! maximizer simply looks for the lowest predicted cost.

use crate::error::{Error, Result};
use crate::surrogate::SurrogateModel;

/// The scoring rule.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub enum AcquisitionKind {
    /// `-mean`: pure exploitation of the surrogate.
    #[default]
    PredictedMean,
    /// Expected improvement over the incumbent cost, minus margin `xi`.
    ExpectedImprovement {
        /// Improvement margin; larger values explore more.
        xi: f64,
    },
}

impl AcquisitionKind {
    /// Whether the rule needs a surrogate with meaningful variance.
    #[must_use]
    pub fn requires_uncertainty(self) -> bool {
        matches!(self, Self::ExpectedImprovement { .. })
    }
}

enum Binding<'m> {
    Unbound,
    Bound {
        model: &'m dyn SurrogateModel,
        incumbent_cost: f64,
    },
}

/// An acquisition function with an explicit binding lifecycle.
pub struct AcquisitionFunction<'m> {
    kind: AcquisitionKind,
    binding: Binding<'m>,
}

impl<'m> AcquisitionFunction<'m> {
    /// Creates an unbound function.
    #[must_use]
    pub fn new(kind: AcquisitionKind) -> Self {
        Self {
            kind,
            binding: Binding::Unbound,
        }
    }

    /// The scoring rule.
    #[must_use]
    pub fn kind(&self) -> AcquisitionKind {
        self.kind
    }

    /// Whether [`update`](Self::update) has been called.
    #[must_use]
    pub fn is_bound(&self) -> bool {
        matches!(self.binding, Binding::Bound { .. })
    }

    /// Binds the function to a surrogate and the current incumbent cost.
    ///
    /// `incumbent_cost` may be `+inf` when nothing has completed yet.
    pub fn update(&mut self, model: &'m dyn SurrogateModel, incumbent_cost: f64) {
        self.binding = Binding::Bound {
            model,
            incumbent_cost,
        };
    }

    /// Scores unit-cube encoded rows; higher is better.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFitted`] when unbound or when the bound surrogate
    /// has not been fitted, and propagates prediction errors.
    pub fn compute(&self, x: &[Vec<f64>]) -> Result<Vec<f64>> {
        let Binding::Bound {
            model,
            incumbent_cost,
        } = self.binding
        else {
            return Err(Error::NotFitted);
        };
        if !model.is_fitted() {
            return Err(Error::NotFitted);
        }
        let (means, variances) = model.predict_marginalized(x)?;
        Ok(match self.kind {
            AcquisitionKind::PredictedMean => means.into_iter().map(|m| -m).collect(),
            AcquisitionKind::ExpectedImprovement { xi } if incumbent_cost.is_finite() => means
                .iter()
                .zip(&variances)
                .map(|(&m, &v)| expected_improvement(m, v.max(0.0).sqrt(), incumbent_cost - xi))
                .collect(),
            AcquisitionKind::ExpectedImprovement { .. } => means.into_iter().map(|m| -m).collect(),
        })
    }
}

/// Standard normal PDF.
fn norm_pdf(x: f64) -> f64 {
    const INV_SQRT_2PI: f64 = 0.398_942_280_401_432_7;
    INV_SQRT_2PI * (-0.5 * x * x).exp()
}

/// Standard normal CDF (Hart rational approximation).
fn norm_cdf(x: f64) -> f64 {
    if x < -8.0 {
        return 0.0;
    }
    if x > 8.0 {
        return 1.0;
    }

    let abs_x = x.abs();
    let t = 1.0 / (1.0 + 0.231_641_9 * abs_x);
    let t2 = t * t;
    let t3 = t2 * t;
    let t4 = t3 * t;
    let t5 = t4 * t;

    let poly = 0.319_381_530 * t - 0.356_563_782 * t2 + 1.781_477_937 * t3 - 1.821_255_978 * t4
        + 1.330_274_429 * t5;
    let cdf = 1.0 - norm_pdf(abs_x) * poly;

    if x >= 0.0 { cdf } else { 1.0 - cdf }
}

/// `EI(x) = (f_best - mean) Φ(z) + std φ(z)` with `z = (f_best - mean) / std`.
fn expected_improvement(mean: f64, std: f64, f_best: f64) -> f64 {
    if std < 1e-12 {
        return (f_best - mean).max(0.0);
    }
    let z = (f_best - mean) / std;
    ((f_best - mean) * norm_cdf(z) + std * norm_pdf(z)).max(0.0)
}
