//! Gaussian process surrogate over aggregated costs.
//!
//! Matérn 5/2 kernel with ARD lengthscales, fitted by Cholesky
//! decomposition on standardized targets. ARD lengthscales are set to the
//! per-dimension standard deviation of the training inputs. At most
//! [`MAX_TRAIN_POINTS`] of the most recently added distinct configurations
//! are used, capping the O(n³) fit.

use nalgebra::{DMatrix, DVector};

use crate::error::{Error, Result};
use crate::runhistory::RunHistory;
use crate::space::ConfigurationSpace;

use super::{SurrogateModel, check_rows};

/// Maximum number of training points.
pub(crate) const MAX_TRAIN_POINTS: usize = 100;

const DEFAULT_NOISE_VAR: f64 = 1e-6;
const SQRT_5: f64 = 2.236_067_977_499_79;

/// Gaussian process surrogate.
///
/// Predicts in cost units: the standardization applied during the fit is
/// undone on the way out, so means are comparable with observed costs and
/// variances are scaled accordingly.
///
/// # Examples
///
/// ```
/// use smbo::prelude::*;
///
/// let space = ConfigurationSpace::uniform(2, 0.0, 1.0).unwrap();
/// let gp = GaussianProcessSurrogate::builder(space)
///     .noise_variance(1e-4)
///     .build();
/// assert!(!gp.is_fitted());
/// ```
pub struct GaussianProcessSurrogate {
    space: ConfigurationSpace,
    noise_variance: f64,
    model: Option<GpModel>,
    version: u64,
}

/// Builder for [`GaussianProcessSurrogate`].
///
/// Defaults:
/// - `noise_variance`: 1e-6 (near-noiseless)
pub struct GaussianProcessSurrogateBuilder {
    space: ConfigurationSpace,
    noise_variance: Option<f64>,
}

impl GaussianProcessSurrogateBuilder {
    /// Sets the observation noise variance added to the kernel diagonal.
    ///
    /// Larger values make the GP smoother.
    #[must_use]
    pub fn noise_variance(mut self, v: f64) -> Self {
        self.noise_variance = Some(v);
        self
    }

    /// Builds an unfitted surrogate.
    #[must_use]
    pub fn build(self) -> GaussianProcessSurrogate {
        GaussianProcessSurrogate {
            space: self.space,
            noise_variance: self.noise_variance.unwrap_or(DEFAULT_NOISE_VAR),
            model: None,
            version: 0,
        }
    }
}

impl GaussianProcessSurrogate {
    /// Creates an unfitted surrogate with default settings.
    #[must_use]
    pub fn new(space: ConfigurationSpace) -> Self {
        Self::builder(space).build()
    }

    /// Creates a builder.
    #[must_use]
    pub fn builder(space: ConfigurationSpace) -> GaussianProcessSurrogateBuilder {
        GaussianProcessSurrogateBuilder {
            space,
            noise_variance: None,
        }
    }
}

/// A fitted GP ready for predictions.
struct GpModel {
    /// Cholesky factor of K + σ²I.
    cholesky: nalgebra::linalg::Cholesky<f64, nalgebra::Dyn>,
    /// (K + σ²I)^{-1} y.
    alpha: DVector<f64>,
    x_train: Vec<Vec<f64>>,
    lengthscales: Vec<f64>,
    signal_var: f64,
    y_mean: f64,
    y_std: f64,
}

/// Matérn 5/2 kernel with ARD lengthscales.
///
/// `k(x1, x2) = σ² (1 + √5 r + 5/3 r²) exp(-√5 r)`
/// where `r = sqrt(Σ ((x1_i - x2_i) / l_i)²)`
fn matern52(x1: &[f64], x2: &[f64], lengthscales: &[f64], signal_var: f64) -> f64 {
    let r_sq: f64 = x1
        .iter()
        .zip(x2)
        .zip(lengthscales)
        .map(|((a, b), l)| ((a - b) / l).powi(2))
        .sum();
    let sqrt5_r = SQRT_5 * r_sq.sqrt();
    signal_var * (1.0 + sqrt5_r + 5.0 / 3.0 * r_sq) * (-sqrt5_r).exp()
}

#[allow(clippy::cast_precision_loss)]
fn fit_gp(x_train: &[Vec<f64>], y_train: &[f64], noise_var: f64) -> Option<GpModel> {
    let n = y_train.len();
    if n == 0 {
        return None;
    }

    let y_mean = y_train.iter().sum::<f64>() / n as f64;
    let y_var = if n > 1 {
        y_train.iter().map(|&y| (y - y_mean).powi(2)).sum::<f64>() / (n - 1) as f64
    } else {
        1.0
    };
    let y_std = y_var.sqrt().max(1e-10);
    let y_standardized: Vec<f64> = y_train.iter().map(|&y| (y - y_mean) / y_std).collect();

    let d = x_train.first().map_or(0, Vec::len);
    let lengthscales: Vec<f64> = (0..d)
        .map(|j| {
            let mean_j = x_train.iter().map(|x| x[j]).sum::<f64>() / n as f64;
            let var_j = x_train.iter().map(|x| (x[j] - mean_j).powi(2)).sum::<f64>() / n as f64;
            var_j.sqrt().max(0.01)
        })
        .collect();

    // Data is standardized.
    let signal_var = 1.0;

    let k = DMatrix::from_fn(n, n, |i, j| {
        let k = matern52(&x_train[i], &x_train[j], &lengthscales, signal_var);
        if i == j { k + noise_var } else { k }
    });
    let cholesky = nalgebra::linalg::Cholesky::new(k)?;
    let alpha = cholesky.solve(&DVector::from_column_slice(&y_standardized));

    Some(GpModel {
        cholesky,
        alpha,
        x_train: x_train.to_vec(),
        lengthscales,
        signal_var,
        y_mean,
        y_std,
    })
}

impl GpModel {
    /// Mean and variance at a test point, in cost units.
    fn predict(&self, x: &[f64]) -> (f64, f64) {
        let k_star = DVector::from_fn(self.x_train.len(), |i, _| {
            matern52(x, &self.x_train[i], &self.lengthscales, self.signal_var)
        });
        let mean = k_star.dot(&self.alpha);
        let v = self.cholesky.solve(&k_star);
        let var = (self.signal_var - k_star.dot(&v)).max(0.0);
        (
            mean * self.y_std + self.y_mean,
            var * self.y_std * self.y_std,
        )
    }
}

impl SurrogateModel for GaussianProcessSurrogate {
    fn train(&mut self, history: &RunHistory) -> Result<()> {
        let data = history.encode(&self.space);
        if data.is_empty() {
            return Err(Error::EmptyTrainingSet);
        }
        let start = data.len().saturating_sub(MAX_TRAIN_POINTS);
        let model = fit_gp(&data.x[start..], &data.y[start..], self.noise_variance)
            .ok_or_else(|| Error::SurrogateFit("kernel matrix is not positive definite".into()))?;
        self.model = Some(model);
        self.version += 1;
        trace_debug!(rows = data.len() - start, version = self.version, "gaussian process refitted");
        Ok(())
    }

    fn predict_marginalized(&self, x: &[Vec<f64>]) -> Result<(Vec<f64>, Vec<f64>)> {
        let model = self.model.as_ref().ok_or(Error::NotFitted)?;
        check_rows(x, self.space.len())?;
        Ok(x.iter().map(|row| model.predict(row)).unzip())
    }

    fn is_fitted(&self) -> bool {
        self.model.is_some()
    }

    fn fit_version(&self) -> u64 {
        self.version
    }

    fn is_probabilistic(&self) -> bool {
        true
    }

    fn n_dims(&self) -> usize {
        self.space.len()
    }
}
