//! Learned regressors backing [`NetworkSurrogate`](crate::surrogate::NetworkSurrogate).
//!
//! A [`PredictiveModel`] maps a feature row to a target row (typically a
//! flattened oracle field). [`DenseModel`] is a small fully connected
//! network: one `tanh` hidden layer, a linear head, full-batch Adam.
//!
//! With a positive dropout rate the model is *stochastic*: each call to
//! [`predict`](PredictiveModel::predict) with `Some(pass)` applies an
//! inverted-dropout mask derived from `(seed, pass)`, so repeated passes
//! give a Monte Carlo estimate of predictive spread while staying
//! reproducible.
//!
//! # Examples
//!
//! ```
//! use smbo::model::{DenseModel, PredictiveModel};
//!
//! let x: Vec<Vec<f64>> = (0..20).map(|i| vec![f64::from(i) / 19.0]).collect();
//! let y: Vec<Vec<f64>> = x.iter().map(|r| vec![2.0 * r[0]]).collect();
//!
//! let mut model = DenseModel::builder().hidden(8).epochs(400).seed(1).build();
//! model.fit(&x, &y).unwrap();
//! let p = model.predict(&[0.5], None).unwrap();
//! assert!((p[0] - 1.0).abs() < 0.2);
//! ```

use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::rng_util;

/// A trainable regressor from feature rows to target rows.
pub trait PredictiveModel: Send {
    /// Trains from scratch, replacing any previous weights.
    ///
    /// # Errors
    ///
    /// Returns [`Error::EmptyTrainingSet`] for no rows and
    /// [`Error::SurrogateFit`] for mismatched or ragged rows or a diverged
    /// fit. On error the previous weights are kept.
    fn fit(&mut self, x: &[Vec<f64>], y: &[Vec<f64>]) -> Result<()>;

    /// Predicts one target row. `pass` selects a Monte Carlo dropout pass;
    /// `None` is the deterministic forward pass.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFitted`] before the first successful fit and
    /// [`Error::DimensionMismatch`] for a feature row of the wrong width.
    fn predict(&self, x: &[f64], pass: Option<u64>) -> Result<Vec<f64>>;

    /// Whether `predict` with different passes can disagree.
    fn is_stochastic(&self) -> bool;

    /// Whether a fit has succeeded.
    fn is_fitted(&self) -> bool;

    /// Writes the weights to `path`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFitted`] for an untrained model and
    /// [`Error::Storage`] on I/O failure.
    fn save(&self, path: &Path) -> Result<()>;

    /// Replaces the weights with those stored at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Storage`] on I/O or parse failure.
    fn load(&mut self, path: &Path) -> Result<()>;
}

const DEFAULT_HIDDEN: usize = 32;
const DEFAULT_EPOCHS: usize = 500;
const DEFAULT_LEARNING_RATE: f64 = 0.01;
const DEFAULT_PATIENCE: usize = 50;
const BETA1: f64 = 0.9;
const BETA2: f64 = 0.999;
const EPSILON: f64 = 1e-8;

/// Multilayer perceptron with one hidden layer.
#[derive(Clone, Debug)]
pub struct DenseModel {
    hidden: usize,
    epochs: usize,
    learning_rate: f64,
    dropout: f64,
    patience: usize,
    seed: u64,
    weights: Option<Weights>,
}

/// Builder for [`DenseModel`].
///
/// Defaults:
/// - `hidden`: 32
/// - `epochs`: 500
/// - `learning_rate`: 0.01
/// - `dropout`: 0.0 (deterministic)
/// - `patience`: 50 epochs without training-loss improvement
/// - `seed`: 0
#[derive(Clone, Debug, Default)]
pub struct DenseModelBuilder {
    hidden: Option<usize>,
    epochs: Option<usize>,
    learning_rate: Option<f64>,
    dropout: Option<f64>,
    patience: Option<usize>,
    seed: Option<u64>,
}

impl DenseModelBuilder {
    /// Sets the hidden layer width (at least 1).
    #[must_use]
    pub fn hidden(mut self, n: usize) -> Self {
        self.hidden = Some(n.max(1));
        self
    }

    /// Sets the maximum number of full-batch epochs.
    #[must_use]
    pub fn epochs(mut self, n: usize) -> Self {
        self.epochs = Some(n);
        self
    }

    /// Sets the Adam step size.
    #[must_use]
    pub fn learning_rate(mut self, lr: f64) -> Self {
        self.learning_rate = Some(lr);
        self
    }

    /// Sets the hidden-unit dropout rate, clamped to `[0, 0.9]`.
    #[must_use]
    pub fn dropout(mut self, rate: f64) -> Self {
        self.dropout = Some(rate.clamp(0.0, 0.9));
        self
    }

    /// Sets the number of epochs without improvement before stopping.
    #[must_use]
    pub fn patience(mut self, n: usize) -> Self {
        self.patience = Some(n.max(1));
        self
    }

    /// Sets the seed for weight initialization and dropout masks.
    #[must_use]
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Builds an untrained model.
    #[must_use]
    pub fn build(self) -> DenseModel {
        DenseModel {
            hidden: self.hidden.unwrap_or(DEFAULT_HIDDEN),
            epochs: self.epochs.unwrap_or(DEFAULT_EPOCHS),
            learning_rate: self.learning_rate.unwrap_or(DEFAULT_LEARNING_RATE),
            dropout: self.dropout.unwrap_or(0.0),
            patience: self.patience.unwrap_or(DEFAULT_PATIENCE),
            seed: self.seed.unwrap_or(0),
            weights: None,
        }
    }
}

#[derive(Clone, Debug)]
struct Weights {
    w1: DMatrix<f64>,
    b1: DVector<f64>,
    w2: DMatrix<f64>,
    b2: DVector<f64>,
    y_mean: DVector<f64>,
    y_std: DVector<f64>,
}

#[derive(Serialize, Deserialize)]
struct WeightsFile {
    n_in: usize,
    hidden: usize,
    n_out: usize,
    dropout: f64,
    seed: u64,
    w1: Vec<f64>,
    b1: Vec<f64>,
    w2: Vec<f64>,
    b2: Vec<f64>,
    y_mean: Vec<f64>,
    y_std: Vec<f64>,
}

/// First and second moment estimates for one parameter tensor.
struct Moments {
    m: DMatrix<f64>,
    v: DMatrix<f64>,
}

impl Moments {
    fn zeros(rows: usize, cols: usize) -> Self {
        Self {
            m: DMatrix::zeros(rows, cols),
            v: DMatrix::zeros(rows, cols),
        }
    }

    /// One bias-corrected Adam step on `param`.
    #[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
    fn step(&mut self, param: &mut DMatrix<f64>, grad: &DMatrix<f64>, lr: f64, t: usize) {
        let t = t as i32;
        let lr_t = lr * (1.0 - BETA2.powi(t)).sqrt() / (1.0 - BETA1.powi(t));
        for ((p, g), (m, v)) in param
            .iter_mut()
            .zip(grad.iter())
            .zip(self.m.iter_mut().zip(self.v.iter_mut()))
        {
            *m = BETA1 * *m + (1.0 - BETA1) * g;
            *v = BETA2 * *v + (1.0 - BETA2) * g * g;
            *p -= lr_t * *m / (v.sqrt() + EPSILON);
        }
    }
}

impl DenseModel {
    /// Creates a builder with default settings.
    #[must_use]
    pub fn builder() -> DenseModelBuilder {
        DenseModelBuilder::default()
    }

    /// Input width of the fitted network.
    #[must_use]
    pub fn n_inputs(&self) -> Option<usize> {
        self.weights.as_ref().map(|w| w.w1.ncols())
    }

    /// Output width of the fitted network.
    #[must_use]
    pub fn n_outputs(&self) -> Option<usize> {
        self.weights.as_ref().map(|w| w.w2.nrows())
    }

    fn keep_scale(&self) -> f64 {
        1.0 / (1.0 - self.dropout)
    }

    /// Inverted-dropout mask over hidden units: `0` or `1 / (1 - rate)`.
    fn mask(&self, rng: &mut fastrand::Rng) -> Vec<f64> {
        let scale = self.keep_scale();
        (0..self.hidden)
            .map(|_| if rng.f64() < self.dropout { 0.0 } else { scale })
            .collect()
    }

    fn init(&self, n_in: usize, n_out: usize, rng: &mut fastrand::Rng) -> (DMatrix<f64>, DMatrix<f64>) {
        #[allow(clippy::cast_precision_loss)]
        let glorot = |fan_in: usize, fan_out: usize| (6.0 / (fan_in + fan_out) as f64).sqrt();
        let a1 = glorot(n_in, self.hidden);
        let a2 = glorot(self.hidden, n_out);
        let w1 = DMatrix::from_fn(self.hidden, n_in, |_, _| rng_util::f64_range(rng, -a1, a1));
        let w2 = DMatrix::from_fn(n_out, self.hidden, |_, _| rng_util::f64_range(rng, -a2, a2));
        (w1, w2)
    }
}

#[allow(clippy::cast_precision_loss)]
fn column_stats(y: &DMatrix<f64>) -> (DVector<f64>, DVector<f64>) {
    let n = y.nrows() as f64;
    let mean = DVector::from_fn(y.ncols(), |j, _| y.column(j).sum() / n);
    let std = DVector::from_fn(y.ncols(), |j, _| {
        let var = y.column(j).iter().map(|v| (v - mean[j]).powi(2)).sum::<f64>() / n;
        var.sqrt().max(1e-8)
    });
    (mean, std)
}

fn to_matrix(rows: &[Vec<f64>]) -> Result<DMatrix<f64>> {
    let width = rows.first().map_or(0, Vec::len);
    if rows.iter().any(|r| r.len() != width) {
        return Err(Error::SurrogateFit("ragged training rows".into()));
    }
    Ok(DMatrix::from_fn(rows.len(), width, |i, j| rows[i][j]))
}

impl Default for DenseModel {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl PredictiveModel for DenseModel {
    #[allow(clippy::cast_precision_loss, clippy::many_single_char_names)]
    fn fit(&mut self, x: &[Vec<f64>], y: &[Vec<f64>]) -> Result<()> {
        if x.is_empty() {
            return Err(Error::EmptyTrainingSet);
        }
        if x.len() != y.len() {
            return Err(Error::SurrogateFit(format!(
                "{} input rows but {} target rows",
                x.len(),
                y.len()
            )));
        }
        let xm = to_matrix(x)?;
        let ym = to_matrix(y)?;
        if xm.ncols() == 0 || ym.ncols() == 0 {
            return Err(Error::SurrogateFit("zero-width rows".into()));
        }
        let (n, n_in, n_out) = (xm.nrows(), xm.ncols(), ym.ncols());
        let (y_mean, y_std) = column_stats(&ym);
        let ys = DMatrix::from_fn(n, n_out, |i, j| (ym[(i, j)] - y_mean[j]) / y_std[j]);

        let mut rng = fastrand::Rng::with_seed(self.seed);
        let (mut w1, mut w2) = self.init(n_in, n_out, &mut rng);
        let mut b1: DMatrix<f64> = DMatrix::zeros(self.hidden, 1);
        let mut b2: DMatrix<f64> = DMatrix::zeros(n_out, 1);
        let mut adam = [
            Moments::zeros(self.hidden, n_in),
            Moments::zeros(self.hidden, 1),
            Moments::zeros(n_out, self.hidden),
            Moments::zeros(n_out, 1),
        ];
        let scale = 2.0 / (n * n_out) as f64;

        let mut best_loss = f64::INFINITY;
        let mut stale = 0;
        let mut epochs_run = 0;
        for epoch in 1..=self.epochs {
            let mask = if self.dropout > 0.0 {
                self.mask(&mut rng)
            } else {
                vec![1.0; self.hidden]
            };
            let z = &xm * w1.transpose();
            let h = DMatrix::from_fn(n, self.hidden, |i, j| (z[(i, j)] + b1[(j, 0)]).tanh());
            let hd = DMatrix::from_fn(n, self.hidden, |i, j| h[(i, j)] * mask[j]);
            let o = &hd * w2.transpose();
            let err = DMatrix::from_fn(n, n_out, |i, j| o[(i, j)] + b2[(j, 0)] - ys[(i, j)]);
            let loss = err.norm_squared() / (n * n_out) as f64;
            if !loss.is_finite() {
                return Err(Error::SurrogateFit(format!("training diverged at epoch {epoch}")));
            }

            let d_out = err * scale;
            let g_w2 = d_out.transpose() * &hd;
            let g_b2 = DMatrix::from_fn(n_out, 1, |j, _| d_out.column(j).sum());
            let d_hd = &d_out * &w2;
            let d_z = DMatrix::from_fn(n, self.hidden, |i, j| {
                d_hd[(i, j)] * mask[j] * (1.0 - h[(i, j)] * h[(i, j)])
            });
            let g_w1 = d_z.transpose() * &xm;
            let g_b1 = DMatrix::from_fn(self.hidden, 1, |j, _| d_z.column(j).sum());

            let lr = self.learning_rate;
            adam[0].step(&mut w1, &g_w1, lr, epoch);
            adam[1].step(&mut b1, &g_b1, lr, epoch);
            adam[2].step(&mut w2, &g_w2, lr, epoch);
            adam[3].step(&mut b2, &g_b2, lr, epoch);
            epochs_run = epoch;

            if loss < best_loss - 1e-9 {
                best_loss = loss;
                stale = 0;
            } else {
                stale += 1;
                if stale >= self.patience {
                    break;
                }
            }
        }
        trace_debug!(epochs = epochs_run, loss = best_loss, rows = n, "dense model fitted");

        self.weights = Some(Weights {
            w1,
            b1: b1.column(0).into_owned(),
            w2,
            b2: b2.column(0).into_owned(),
            y_mean,
            y_std,
        });
        Ok(())
    }

    fn predict(&self, x: &[f64], pass: Option<u64>) -> Result<Vec<f64>> {
        let w = self.weights.as_ref().ok_or(Error::NotFitted)?;
        if x.len() != w.w1.ncols() {
            return Err(Error::DimensionMismatch {
                expected: w.w1.ncols(),
                got: x.len(),
            });
        }
        let mut h = &w.w1 * DVector::from_column_slice(x) + &w.b1;
        h.apply(|v| *v = v.tanh());
        if let Some(pass) = pass
            && self.dropout > 0.0
        {
            let mut rng = rng_util::derived(self.seed, pass.wrapping_add(1));
            for (v, m) in h.iter_mut().zip(self.mask(&mut rng)) {
                *v *= m;
            }
        }
        let out = &w.w2 * h + &w.b2;
        Ok(out
            .iter()
            .enumerate()
            .map(|(j, v)| v * w.y_std[j] + w.y_mean[j])
            .collect())
    }

    fn is_stochastic(&self) -> bool {
        self.dropout > 0.0
    }

    fn is_fitted(&self) -> bool {
        self.weights.is_some()
    }

    fn save(&self, path: &Path) -> Result<()> {
        let w = self.weights.as_ref().ok_or(Error::NotFitted)?;
        let file = WeightsFile {
            n_in: w.w1.ncols(),
            hidden: self.hidden,
            n_out: w.w2.nrows(),
            dropout: self.dropout,
            seed: self.seed,
            w1: w.w1.as_slice().to_vec(),
            b1: w.b1.as_slice().to_vec(),
            w2: w.w2.as_slice().to_vec(),
            b2: w.b2.as_slice().to_vec(),
            y_mean: w.y_mean.as_slice().to_vec(),
            y_std: w.y_std.as_slice().to_vec(),
        };
        serde_json::to_writer(BufWriter::new(File::create(path)?), &file)?;
        Ok(())
    }

    fn load(&mut self, path: &Path) -> Result<()> {
        let f: WeightsFile = serde_json::from_reader(BufReader::new(File::open(path)?))?;
        let sizes_ok = f.w1.len() == f.hidden * f.n_in
            && f.b1.len() == f.hidden
            && f.w2.len() == f.n_out * f.hidden
            && f.b2.len() == f.n_out
            && f.y_mean.len() == f.n_out
            && f.y_std.len() == f.n_out;
        if !sizes_ok {
            return Err(Error::Storage("weight file has inconsistent shapes".into()));
        }
        self.hidden = f.hidden;
        self.dropout = f.dropout;
        self.seed = f.seed;
        self.weights = Some(Weights {
            w1: DMatrix::from_column_slice(f.hidden, f.n_in, &f.w1),
            b1: DVector::from_vec(f.b1),
            w2: DMatrix::from_column_slice(f.n_out, f.hidden, &f.w2),
            b2: DVector::from_vec(f.b2),
            y_mean: DVector::from_vec(f.y_mean),
            y_std: DVector::from_vec(f.y_std),
        });
        Ok(())
    }
}
