//! Turning oracle fields into the scalar cost that gets minimized.
//!
//! A [`Reduction`] collapses a [`Field`] to one number; [`PNorm`] with
//! `p = 4` is the default. [`TargetFunction`] couples an oracle with a
//! reduction and is the single evaluation path used both while optimizing
//! and when validating configurations afterwards.
//!
//! ```
//! use smbo::objective::{PNorm, Reduction};
//! use smbo::oracle::Field;
//!
//! let m = Field::from_row_slice(1, 2, &[3.0, -4.0]);
//! assert!((PNorm::new(2.0).reduce(&m) - 5.0).abs() < 1e-12);
//! assert_eq!(PNorm::new(f64::INFINITY).reduce(&m), 4.0);
//! ```

use std::sync::Arc;

use crate::error::Result;
use crate::oracle::{Field, Oracle};
use crate::space::Configuration;

/// Scalar reduction of an oracle field.
pub trait Reduction: Send + Sync {
    /// Reduces a flattened field.
    ///
    /// Non-finite entries must propagate into a non-finite result.
    fn reduce_slice(&self, values: &[f64]) -> f64;

    /// Reduces a field.
    fn reduce(&self, field: &Field) -> f64 {
        self.reduce_slice(field.as_slice())
    }
}

/// The L-p norm over all entries of a field.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PNorm {
    p: f64,
}

impl PNorm {
    /// Default exponent.
    pub const DEFAULT_P: f64 = 4.0;

    /// Creates a p-norm. `p = f64::INFINITY` gives the max norm.
    ///
    /// # Panics
    ///
    /// Panics if `p < 1` or `p` is NaN; such a norm is a programming error.
    #[must_use]
    pub fn new(p: f64) -> Self {
        assert!(p >= 1.0, "p-norm requires p >= 1, got {p}");
        Self { p }
    }

    /// The exponent.
    #[must_use]
    pub fn p(&self) -> f64 {
        self.p
    }
}

impl Default for PNorm {
    fn default() -> Self {
        Self::new(Self::DEFAULT_P)
    }
}

impl Reduction for PNorm {
    fn reduce_slice(&self, values: &[f64]) -> f64 {
        if values.iter().any(|v| !v.is_finite()) {
            // Summation would hide NaN behind inf (or the reverse); report NaN.
            return if values.iter().any(|v| v.is_nan()) {
                f64::NAN
            } else {
                f64::INFINITY
            };
        }
        if self.p.is_infinite() {
            return values.iter().fold(0.0_f64, |acc, v| acc.max(v.abs()));
        }
        // Scale by the largest magnitude so large fields do not overflow.
        let scale = values.iter().fold(0.0_f64, |acc, v| acc.max(v.abs()));
        if scale == 0.0 {
            return 0.0;
        }
        let sum: f64 = values.iter().map(|v| (v.abs() / scale).powf(self.p)).sum();
        scale * sum.powf(1.0 / self.p)
    }
}

/// The result of one true-objective evaluation.
#[derive(Clone, Debug)]
pub struct Evaluation {
    /// Reduced cost.
    pub cost: f64,
    /// The oracle field the cost was reduced from.
    pub output: Arc<Field>,
}

/// Oracle + reduction: the true objective.
pub struct TargetFunction {
    oracle: Arc<dyn Oracle>,
    reduction: Arc<dyn Reduction>,
}

impl TargetFunction {
    /// Couples an oracle with a reduction.
    pub fn new(oracle: impl Oracle + 'static, reduction: impl Reduction + 'static) -> Self {
        Self {
            oracle: Arc::new(oracle),
            reduction: Arc::new(reduction),
        }
    }

    pub(crate) fn from_parts(oracle: Arc<dyn Oracle>, reduction: Arc<dyn Reduction>) -> Self {
        Self { oracle, reduction }
    }

    /// The wrapped oracle.
    #[must_use]
    pub fn oracle(&self) -> &Arc<dyn Oracle> {
        &self.oracle
    }

    /// The wrapped reduction.
    #[must_use]
    pub fn reduction(&self) -> &Arc<dyn Reduction> {
        &self.reduction
    }

    /// Simulates `config` and reduces the result.
    ///
    /// The seed is part of the trial protocol only; the oracle is
    /// deterministic and does not receive it.
    ///
    /// # Errors
    ///
    /// Propagates oracle errors such as [`Error::InvalidInput`](crate::Error::InvalidInput).
    pub fn evaluate(&self, config: &Configuration, _seed: u64) -> Result<Evaluation> {
        let field = self.oracle.simulate(config.values())?;
        let cost = self.reduction.reduce(&field);
        Ok(Evaluation {
            cost,
            output: Arc::new(field),
        })
    }

    /// The cost of `config`, without keeping the field.
    ///
    /// # Errors
    ///
    /// Propagates oracle errors.
    pub fn cost(&self, config: &Configuration) -> Result<f64> {
        let field = self.oracle.simulate(config.values())?;
        Ok(self.reduction.reduce(&field))
    }
}

impl Clone for TargetFunction {
    fn clone(&self) -> Self {
        Self::from_parts(Arc::clone(&self.oracle), Arc::clone(&self.reduction))
    }
}
