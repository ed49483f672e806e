use std::path::Path;
use std::sync::Arc;

use crate::data::{DataLoader, Dataset};
use crate::error::{Error, Result};
use crate::metrics;
use crate::model::PredictiveModel;
use crate::objective::{PNorm, Reduction};
use crate::runhistory::RunHistory;
use crate::space::ConfigurationSpace;

use super::{SurrogateModel, check_rows};

// Absolute error still counted as a hit when logging fit accuracy.
const FIT_TOLERANCE: f64 = 0.03;

/// What the wrapped model was last fitted to predict.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Target {
    /// A flattened oracle field of the given length.
    Field(usize),
    /// The scalar cost.
    Cost,
}

/// Surrogate backed by a learned [`PredictiveModel`].
///
/// The model predicts the oracle's output field; the configured reduction
/// turns each prediction into a cost. When the run history holds no fields
/// (for instance after [`RunHistory::load`]) the model is fitted on scalar
/// costs instead.
///
/// The mean is the average over `n_inferences` reduced predictions and the
/// variance their population variance. For a deterministic model the
/// variance is always zero, so only exploitation acquisitions are
/// meaningful with it.
///
/// An optional [`DataLoader`] supplies an offline dataset of
/// `(raw configuration, flattened field)` rows. It is used by
/// [`warm_start`](Self::warm_start) and included in every refit.
pub struct NetworkSurrogate<M> {
    space: ConfigurationSpace,
    model: M,
    reduction: Arc<dyn Reduction>,
    n_inferences: usize,
    loader: Option<Box<dyn DataLoader>>,
    offline: Option<Dataset>,
    target: Option<Target>,
    version: u64,
}

/// Builder for [`NetworkSurrogate`].
///
/// Defaults:
/// - `reduction`: [`PNorm`] with `p = 4`
/// - `n_inferences`: 1
/// - `data_loader`: none
pub struct NetworkSurrogateBuilder<M> {
    space: ConfigurationSpace,
    model: M,
    reduction: Option<Arc<dyn Reduction>>,
    n_inferences: Option<usize>,
    loader: Option<Box<dyn DataLoader>>,
}

impl<M: PredictiveModel> NetworkSurrogateBuilder<M> {
    /// Sets the reduction applied to predicted fields.
    #[must_use]
    pub fn reduction(mut self, reduction: impl Reduction + 'static) -> Self {
        self.reduction = Some(Arc::new(reduction));
        self
    }

    /// Sets the number of prediction passes averaged per query (at least 1).
    #[must_use]
    pub fn n_inferences(mut self, n: usize) -> Self {
        self.n_inferences = Some(n.max(1));
        self
    }

    /// Sets the offline dataset source.
    #[must_use]
    pub fn data_loader(mut self, loader: impl DataLoader + 'static) -> Self {
        self.loader = Some(Box::new(loader));
        self
    }

    /// Builds an unfitted surrogate.
    #[must_use]
    pub fn build(self) -> NetworkSurrogate<M> {
        NetworkSurrogate {
            space: self.space,
            model: self.model,
            reduction: self.reduction.unwrap_or_else(|| Arc::new(PNorm::default())),
            n_inferences: self.n_inferences.unwrap_or(1),
            loader: self.loader,
            offline: None,
            target: None,
            version: 0,
        }
    }
}

impl<M: PredictiveModel> NetworkSurrogate<M> {
    /// Wraps `model` with default settings.
    #[must_use]
    pub fn new(space: ConfigurationSpace, model: M) -> Self {
        Self::builder(space, model).build()
    }

    /// Creates a builder.
    #[must_use]
    pub fn builder(space: ConfigurationSpace, model: M) -> NetworkSurrogateBuilder<M> {
        NetworkSurrogateBuilder {
            space,
            model,
            reduction: None,
            n_inferences: None,
            loader: None,
        }
    }

    /// The wrapped model.
    #[must_use]
    pub fn model(&self) -> &M {
        &self.model
    }

    /// Number of prediction passes per query.
    #[must_use]
    pub fn n_inferences(&self) -> usize {
        self.n_inferences
    }

    /// Fits the model on the offline dataset alone.
    ///
    /// The warm start makes the surrogate usable before the first refit but
    /// is not counted in [`fit_version`](SurrogateModel::fit_version).
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] without a data loader,
    /// [`Error::Data`] when the dataset cannot be loaded or does not match
    /// the space, and the model's error if fitting fails.
    pub fn warm_start(&mut self) -> Result<()> {
        let offline = self.offline_data()?;
        let Some(offline) = offline else {
            return Err(Error::InvalidConfig("warm start requires a data loader".into()));
        };
        if offline.is_empty() {
            return Err(Error::EmptyTrainingSet);
        }
        self.model.fit(&offline.features, &offline.targets)?;
        self.target = Some(Target::Field(offline.n_targets()));
        trace_info!(rows = offline.len(), "surrogate warm-started from offline data");
        self.log_fit_quality(&offline.features, &offline.targets);
        Ok(())
    }

    /// Writes the model weights.
    ///
    /// # Errors
    ///
    /// Propagates the model's save error.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        self.model.save(path.as_ref())
    }

    /// Restores model weights written by [`save`](Self::save). The restored
    /// model is assumed to predict fields of its stored output width.
    ///
    /// # Errors
    ///
    /// Propagates the model's load error.
    pub fn load(&mut self, path: impl AsRef<Path>) -> Result<()> {
        self.model.load(path.as_ref())?;
        self.target = Some(Target::Field(0));
        Ok(())
    }

    /// Loads and unit-encodes the offline dataset once.
    fn offline_data(&mut self) -> Result<Option<Dataset>> {
        if self.offline.is_none()
            && let Some(loader) = &self.loader
        {
            let raw = loader.load()?;
            let features = raw
                .features
                .iter()
                .map(|row| {
                    self.space
                        .configuration_from(row.clone())
                        .map(|c| self.space.to_unit(&c))
                        .map_err(|e| Error::Data(format!("offline row outside the space: {e}")))
                })
                .collect::<Result<Vec<_>>>()?;
            self.offline = Some(Dataset::new(features, raw.targets)?);
        }
        Ok(self.offline.clone())
    }

    #[cfg_attr(not(feature = "tracing"), allow(unused_variables))]
    fn log_fit_quality(&self, x: &[Vec<f64>], y: &[Vec<f64>]) {
        let pred: Vec<Vec<f64>> = x
            .iter()
            .filter_map(|row| self.model.predict(row, None).ok())
            .collect();
        if pred.len() != y.len() {
            return;
        }
        let rmse = metrics::rmse(y, &pred);
        let mae = metrics::mae(y, &pred);
        let objective_rmse = match self.target {
            Some(Target::Field(_)) => metrics::rmse_objective(y, &pred, self.reduction.as_ref()),
            _ => rmse,
        };
        let accuracy = metrics::tolerance_accuracy(y, &pred, FIT_TOLERANCE);
        trace_debug!(rmse, mae, objective_rmse, accuracy, "surrogate training fit");
    }

    fn reduce(&self, raw: &[f64]) -> f64 {
        match self.target {
            Some(Target::Cost) => raw.first().copied().unwrap_or(f64::NAN),
            _ => self.reduction.reduce_slice(raw),
        }
    }
}

impl<M: PredictiveModel> SurrogateModel for NetworkSurrogate<M> {
    fn train(&mut self, history: &RunHistory) -> Result<()> {
        let data = history.encode(&self.space);
        let offline = self.offline_data()?.unwrap_or_default();

        let field_width = data
            .outputs
            .iter()
            .map(|o| o.as_ref().map(|f| f.len()))
            .collect::<Option<Vec<_>>>()
            .and_then(|widths| {
                let w = widths.first().copied().unwrap_or_else(|| offline.n_targets());
                widths.iter().all(|&x| x == w).then_some(w)
            })
            .filter(|&w| w > 0 && (offline.is_empty() || offline.n_targets() == w));

        let (target, targets): (Target, Vec<Vec<f64>>) = match field_width {
            Some(w) => (
                Target::Field(w),
                offline
                    .targets
                    .iter()
                    .cloned()
                    .chain(data.outputs.iter().flatten().map(|f| f.as_slice().to_vec()))
                    .collect(),
            ),
            None => (
                Target::Cost,
                offline
                    .targets
                    .iter()
                    .map(|t| vec![self.reduction.reduce_slice(t)])
                    .chain(data.y.iter().map(|&c| vec![c]))
                    .collect(),
            ),
        };
        let inputs: Vec<Vec<f64>> = offline.features.iter().cloned().chain(data.x).collect();
        if inputs.is_empty() {
            return Err(Error::EmptyTrainingSet);
        }

        self.model.fit(&inputs, &targets)?;
        self.target = Some(target);
        self.version += 1;
        trace_debug!(rows = inputs.len(), version = self.version, "network surrogate refitted");
        self.log_fit_quality(&inputs, &targets);
        Ok(())
    }

    #[allow(clippy::cast_precision_loss)]
    fn predict_marginalized(&self, x: &[Vec<f64>]) -> Result<(Vec<f64>, Vec<f64>)> {
        if self.target.is_none() || !self.model.is_fitted() {
            return Err(Error::NotFitted);
        }
        check_rows(x, self.space.len())?;
        let passes = if self.model.is_stochastic() { self.n_inferences } else { 1 };

        let mut means = Vec::with_capacity(x.len());
        let mut variances = Vec::with_capacity(x.len());
        for row in x {
            let mut samples = Vec::with_capacity(passes);
            for pass in 0..passes {
                let pass = (passes > 1).then_some(pass as u64);
                samples.push(self.reduce(&self.model.predict(row, pass)?));
            }
            let n = samples.len() as f64;
            let mean = samples.iter().sum::<f64>() / n;
            let var = samples.iter().map(|s| (s - mean).powi(2)).sum::<f64>() / n;
            means.push(mean);
            variances.push(var);
        }
        Ok((means, variances))
    }

    fn is_fitted(&self) -> bool {
        self.target.is_some() && self.model.is_fitted()
    }

    fn fit_version(&self) -> u64 {
        self.version
    }

    fn is_probabilistic(&self) -> bool {
        self.model.is_stochastic() && self.n_inferences > 1
    }

    fn n_dims(&self) -> usize {
        self.space.len()
    }
}
