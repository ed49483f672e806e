//! Cheap learned approximations of the cost surface.
//!
//! A [`SurrogateModel`] is refitted from the [`RunHistory`] and queried
//! with unit-cube encoded configurations. It returns, per query point, a
//! predicted mean cost and a variance. Two implementations are provided:
//!
//! - [`NetworkSurrogate`] wraps a [`PredictiveModel`](crate::model::PredictiveModel)
//!   that predicts the oracle's output field; the cost is obtained by
//!   applying the objective reduction to each predicted field.
//! - [`GaussianProcessSurrogate`] fits a Matérn 5/2 Gaussian process to
//!   the aggregated costs directly.
//!
//! # Lifecycle
//!
//! | Method | Before a successful fit | After |
//! |--------|-------------------------|-------|
//! | [`predict_marginalized`](SurrogateModel::predict_marginalized) | [`Error::NotFitted`](crate::Error::NotFitted) | `(means, variances)` |
//! | [`is_fitted`](SurrogateModel::is_fitted) | `false` | `true` |
//! | [`fit_version`](SurrogateModel::fit_version) | `0` | number of successful [`train`](SurrogateModel::train) calls |
//!
//! A failed `train` leaves the previous fit in place.

mod gp;
mod network;

pub use gp::{GaussianProcessSurrogate, GaussianProcessSurrogateBuilder};
pub use network::{NetworkSurrogate, NetworkSurrogateBuilder};

use crate::error::Result;
use crate::runhistory::RunHistory;

/// A model of the cost surface that can be refitted and queried.
pub trait SurrogateModel: Send {
    /// Refits from the run history, replacing the previous fit.
    ///
    /// # Errors
    ///
    /// Returns [`Error::EmptyTrainingSet`](crate::Error::EmptyTrainingSet)
    /// when the history holds no finite costs, or
    /// [`Error::SurrogateFit`](crate::Error::SurrogateFit) when the
    /// underlying fit fails. The previous fit is kept on error.
    fn train(&mut self, history: &RunHistory) -> Result<()>;

    /// Predicted mean cost and variance for each unit-cube encoded row.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFitted`](crate::Error::NotFitted) before the
    /// first successful fit and
    /// [`Error::DimensionMismatch`](crate::Error::DimensionMismatch) for
    /// rows of the wrong width.
    fn predict_marginalized(&self, x: &[Vec<f64>]) -> Result<(Vec<f64>, Vec<f64>)>;

    /// Whether a fit is available.
    fn is_fitted(&self) -> bool;

    /// Number of successful [`train`](SurrogateModel::train) calls.
    fn fit_version(&self) -> u64;

    /// Whether the reported variance carries uncertainty information.
    fn is_probabilistic(&self) -> bool;

    /// Width of a query row.
    fn n_dims(&self) -> usize;
}

impl<S: SurrogateModel + ?Sized> SurrogateModel for Box<S> {
    fn train(&mut self, history: &RunHistory) -> Result<()> {
        (**self).train(history)
    }

    fn predict_marginalized(&self, x: &[Vec<f64>]) -> Result<(Vec<f64>, Vec<f64>)> {
        (**self).predict_marginalized(x)
    }

    fn is_fitted(&self) -> bool {
        (**self).is_fitted()
    }

    fn fit_version(&self) -> u64 {
        (**self).fit_version()
    }

    fn is_probabilistic(&self) -> bool {
        (**self).is_probabilistic()
    }

    fn n_dims(&self) -> usize {
        (**self).n_dims()
    }
}

fn check_rows(x: &[Vec<f64>], n_dims: usize) -> Result<()> {
    match x.iter().find(|r| r.len() != n_dims) {
        Some(row) => Err(crate::Error::DimensionMismatch {
            expected: n_dims,
            got: row.len(),
        }),
        None => Ok(()),
    }
}
