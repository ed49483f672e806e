//! The append-only log of every true-objective evaluation.
//!
//! Each oracle call becomes one [`TrialRecord`]. Records are never edited
//! or removed; insertion order is the evaluation order. Configurations are
//! deduplicated by value and receive a dense `config_id`, so repeated
//! evaluations of the same configuration can be aggregated.
//!
//! The history is the only input to incumbent selection and to surrogate
//! refits ([`RunHistory::encode`]). It can be written to and restored from
//! a JSON document.

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::oracle::Field;
use crate::space::{Configuration, ConfigurationSpace};
use crate::types::{ConfigOrigin, TrialState};

/// One true-objective evaluation.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TrialRecord {
    /// Zero-based position in the history.
    pub trial: usize,
    /// Dense identifier of the configuration.
    pub config_id: usize,
    /// The evaluated configuration.
    pub config: Configuration,
    /// Seed the trial ran under.
    pub seed: u64,
    /// Observed cost; `+inf` for failed trials, stored as `null`.
    #[serde(with = "cost_or_null")]
    pub cost: f64,
    /// Evaluations of this configuration so far, this one included.
    pub n_evals: usize,
    /// Whether the evaluation produced a finite cost.
    pub state: TrialState,
    /// Where the configuration came from.
    pub origin: ConfigOrigin,
    /// Oracle field of the evaluation, kept in memory only.
    #[serde(skip)]
    pub output: Option<Arc<Field>>,
}

/// Surrogate training data derived from a [`RunHistory`].
#[derive(Clone, Debug, Default)]
pub struct TrainingData {
    /// Config ids, one per row.
    pub config_ids: Vec<usize>,
    /// Unit-cube encoded configurations.
    pub x: Vec<Vec<f64>>,
    /// Aggregated costs.
    pub y: Vec<f64>,
    /// Most recent oracle field per row, when one was kept.
    pub outputs: Vec<Option<Arc<Field>>>,
}

impl TrainingData {
    /// Number of rows.
    #[must_use]
    pub fn len(&self) -> usize {
        self.y.len()
    }

    /// Whether there are no rows.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.y.is_empty()
    }
}

/// Append-only evaluation log.
#[derive(Clone, Debug, Default)]
pub struct RunHistory {
    records: Vec<TrialRecord>,
    configs: Vec<Configuration>,
    ids: HashMap<Vec<u64>, usize>,
    evals: Vec<Vec<usize>>,
}

// JSON has no infinity: failed costs are written as `null` and read back as
// `+inf`.
mod cost_or_null {
    use serde::{Deserialize, Deserializer, Serializer};

    #[allow(clippy::trivially_copy_pass_by_ref)]
    pub(super) fn serialize<S: Serializer>(cost: &f64, serializer: S) -> Result<S::Ok, S::Error> {
        if cost.is_finite() {
            serializer.serialize_some(cost)
        } else {
            serializer.serialize_none()
        }
    }

    pub(super) fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
        Ok(Option::<f64>::deserialize(deserializer)?.unwrap_or(f64::INFINITY))
    }
}

#[derive(Serialize, Deserialize)]
struct RunHistorySnapshot {
    records: Vec<TrialRecord>,
}

impl RunHistory {
    /// Creates an empty history.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an evaluation and returns the stored record.
    ///
    /// A non-finite cost is stored as `+inf` with state
    /// [`TrialState::Failed`].
    pub fn push(
        &mut self,
        config: Configuration,
        seed: u64,
        cost: f64,
        origin: ConfigOrigin,
        output: Option<Arc<Field>>,
    ) -> &TrialRecord {
        let config_id = self.intern(&config);
        let trial = self.records.len();
        self.evals[config_id].push(trial);
        let (cost, state) = if cost.is_finite() {
            (cost, TrialState::Complete)
        } else {
            (f64::INFINITY, TrialState::Failed)
        };
        self.records.push(TrialRecord {
            trial,
            config_id,
            config,
            seed,
            cost,
            n_evals: self.evals[config_id].len(),
            state,
            origin,
            output,
        });
        &self.records[trial]
    }

    fn intern(&mut self, config: &Configuration) -> usize {
        let key = config.key();
        if let Some(&id) = self.ids.get(&key) {
            return id;
        }
        let id = self.configs.len();
        self.ids.insert(key, id);
        self.configs.push(config.clone());
        self.evals.push(Vec::new());
        id
    }

    /// Number of records (oracle calls).
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether nothing has been evaluated.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// All records in evaluation order.
    #[must_use]
    pub fn records(&self) -> &[TrialRecord] {
        &self.records
    }

    /// Distinct configurations, indexed by config id.
    #[must_use]
    pub fn configs(&self) -> &[Configuration] {
        &self.configs
    }

    /// The id of an already evaluated configuration.
    #[must_use]
    pub fn config_id(&self, config: &Configuration) -> Option<usize> {
        self.ids.get(&config.key()).copied()
    }

    /// Whether `config` has been evaluated at least once.
    #[must_use]
    pub fn contains(&self, config: &Configuration) -> bool {
        self.config_id(config).is_some()
    }

    /// Number of evaluations of a configuration.
    #[must_use]
    pub fn n_evals(&self, config_id: usize) -> usize {
        self.evals.get(config_id).map_or(0, Vec::len)
    }

    /// Costs observed for a configuration, in evaluation order.
    pub fn costs(&self, config_id: usize) -> impl Iterator<Item = f64> + '_ {
        self.evals
            .get(config_id)
            .into_iter()
            .flatten()
            .map(|&t| self.records[t].cost)
    }

    /// Mean cost of the first `n` evaluations of a configuration.
    ///
    /// Returns `None` when fewer than `n` evaluations exist (or `n == 0`),
    /// and `+inf` if any of them failed.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn mean_cost_of_first(&self, config_id: usize, n: usize) -> Option<f64> {
        if n == 0 || self.n_evals(config_id) < n {
            return None;
        }
        let mut sum = 0.0;
        for cost in self.costs(config_id).take(n) {
            if !cost.is_finite() {
                return Some(f64::INFINITY);
            }
            sum += cost;
        }
        Some(sum / n as f64)
    }

    /// Mean cost over all evaluations of a configuration.
    #[must_use]
    pub fn aggregated_cost(&self, config_id: usize) -> Option<f64> {
        self.mean_cost_of_first(config_id, self.n_evals(config_id))
    }

    /// Builds surrogate training data: one row per configuration with a
    /// finite aggregated cost, inputs encoded into the unit hypercube.
    #[must_use]
    pub fn encode(&self, space: &ConfigurationSpace) -> TrainingData {
        let mut data = TrainingData::default();
        for (id, config) in self.configs.iter().enumerate() {
            let Some(cost) = self.aggregated_cost(id).filter(|c| c.is_finite()) else {
                continue;
            };
            let output = self.evals[id]
                .iter()
                .rev()
                .find_map(|&t| self.records[t].output.clone());
            data.config_ids.push(id);
            data.x.push(space.to_unit(config));
            data.y.push(cost);
            data.outputs.push(output);
        }
        data
    }

    /// Writes the history as a JSON document. Oracle fields are not saved.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Storage`] if the file cannot be written.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let file = File::create(path)?;
        let snapshot = RunHistorySnapshot {
            records: self.records.clone(),
        };
        serde_json::to_writer_pretty(BufWriter::new(file), &snapshot)?;
        Ok(())
    }

    /// Restores a history written by [`save`](Self::save).
    ///
    /// # Errors
    ///
    /// Returns [`Error::Storage`] if the file cannot be read or parsed, and
    /// [`Error::InvalidConfig`] if a stored configuration does not belong
    /// to `space`.
    pub fn load(path: impl AsRef<Path>, space: &ConfigurationSpace) -> Result<Self> {
        let file = File::open(path)?;
        let snapshot: RunHistorySnapshot = serde_json::from_reader(BufReader::new(file))?;
        let mut history = Self::new();
        for record in snapshot.records {
            if !space.contains(&record.config) {
                return Err(Error::InvalidConfig(format!(
                    "stored configuration {} is outside the configuration space",
                    record.config
                )));
            }
            let config = space.configuration_from(record.config.values().to_vec())?;
            history.push(config, record.seed, record.cost, record.origin, None);
        }
        Ok(history)
    }
}
