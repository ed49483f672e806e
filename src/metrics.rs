//! Fit-quality metrics for learned surrogates.
//!
//! All metrics compare flattened rows element-wise and return `NaN` for
//! empty input.

use crate::objective::Reduction;

/// Root mean squared error over all elements.
#[must_use]
pub fn rmse(truth: &[Vec<f64>], pred: &[Vec<f64>]) -> f64 {
    mean(pairs(truth, pred).map(|(t, p)| (t - p).powi(2))).sqrt()
}

/// Mean absolute error over all elements.
#[must_use]
pub fn mae(truth: &[Vec<f64>], pred: &[Vec<f64>]) -> f64 {
    mean(pairs(truth, pred).map(|(t, p)| (t - p).abs()))
}

/// RMSE between the reduced objective values of true and predicted rows.
#[must_use]
pub fn rmse_objective(truth: &[Vec<f64>], pred: &[Vec<f64>], reduction: &dyn Reduction) -> f64 {
    mean(
        truth
            .iter()
            .zip(pred)
            .map(|(t, p)| (reduction.reduce_slice(t) - reduction.reduce_slice(p)).powi(2)),
    )
    .sqrt()
}

/// Fraction of elements whose absolute error is within `tolerance`.
#[must_use]
pub fn tolerance_accuracy(truth: &[Vec<f64>], pred: &[Vec<f64>], tolerance: f64) -> f64 {
    mean(pairs(truth, pred).map(|(t, p)| if (t - p).abs() <= tolerance { 1.0 } else { 0.0 }))
}

fn pairs<'a>(truth: &'a [Vec<f64>], pred: &'a [Vec<f64>]) -> impl Iterator<Item = (f64, f64)> + 'a {
    truth
        .iter()
        .zip(pred)
        .flat_map(|(t, p)| t.iter().copied().zip(p.iter().copied()))
}

#[allow(clippy::cast_precision_loss)]
fn mean(values: impl Iterator<Item = f64>) -> f64 {
    let (sum, n) = values.fold((0.0, 0_usize), |(s, n), v| (s + v, n + 1));
    if n == 0 { f64::NAN } else { sum / n as f64 }
}
