//! Repeated-evaluation policy and incumbent tracking.
//!
//! Every configuration must be evaluated `max_config_calls` times before it
//! may join the incumbent set. After each evaluation the intensifier
//! compares the challenger's running mean with the best incumbent's mean
//! over the same number of evaluations:
//!
//! - non-finite, or strictly worse: the challenger is rejected and no more
//!   evaluations are spent on it;
//! - otherwise, if it still lacks evaluations, the driver is asked to
//!   repeat it under the next seed ([`Intensifier::next_repeat`]);
//! - once complete, it joins the bounded incumbent set, evicting the worst
//!   member when the set is full.
//!
//! The best incumbent cost never increases. Every change of the best
//! incumbent is appended to the [`trajectory`](Intensifier::trajectory).

use serde::{Deserialize, Serialize};

use crate::runhistory::{RunHistory, TrialRecord};
use crate::space::Configuration;

/// Default number of evaluations per configuration.
pub const DEFAULT_MAX_CONFIG_CALLS: usize = 3;
/// Default size of the incumbent set.
pub const DEFAULT_MAX_INCUMBENTS: usize = 20;

/// A change of the best incumbent.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TrajectoryEntry {
    /// Trial after which the change happened.
    pub trial: usize,
    /// Config id of the new best incumbent.
    pub config_id: usize,
    /// The new best incumbent.
    pub config: Configuration,
    /// Its aggregated cost.
    pub cost: f64,
}

/// Repeated-evaluation and incumbent policy.
#[derive(Clone, Debug)]
pub struct Intensifier {
    max_config_calls: usize,
    max_incumbents: usize,
    base_seed: u64,
    deterministic: bool,
    challenger: Option<usize>,
    incumbents: Vec<(usize, f64)>,
    trajectory: Vec<TrajectoryEntry>,
}

impl Default for Intensifier {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_CONFIG_CALLS, DEFAULT_MAX_INCUMBENTS, 0)
    }
}

impl Intensifier {
    /// Creates an intensifier. Zero limits are raised to one.
    ///
    /// Evaluation `k` of a configuration runs under seed `base_seed + k`,
    /// unless the objective is marked [`deterministic`](Self::deterministic).
    #[must_use]
    pub fn new(max_config_calls: usize, max_incumbents: usize, base_seed: u64) -> Self {
        Self {
            max_config_calls: max_config_calls.max(1),
            max_incumbents: max_incumbents.max(1),
            base_seed,
            deterministic: false,
            challenger: None,
            incumbents: Vec::new(),
            trajectory: Vec::new(),
        }
    }

    /// Marks the objective as deterministic: every evaluation then runs
    /// under the base seed.
    #[must_use]
    pub fn deterministic(mut self, deterministic: bool) -> Self {
        self.deterministic = deterministic;
        self
    }

    /// Evaluations required before a configuration can become an incumbent.
    #[must_use]
    pub fn max_config_calls(&self) -> usize {
        self.max_config_calls
    }

    /// Capacity of the incumbent set.
    #[must_use]
    pub fn max_incumbents(&self) -> usize {
        self.max_incumbents
    }

    /// Seed for the next evaluation of `config_id`.
    #[must_use]
    pub fn seed_for(&self, history: &RunHistory, config_id: Option<usize>) -> u64 {
        if self.deterministic {
            return self.base_seed;
        }
        let k = config_id.map_or(0, |id| history.n_evals(id));
        self.base_seed.wrapping_add(k as u64)
    }

    /// The challenger that needs another evaluation, with the seed to use.
    #[must_use]
    pub fn next_repeat(&self, history: &RunHistory) -> Option<(Configuration, u64)> {
        let id = self.challenger?;
        let config = history.configs().get(id)?.clone();
        Some((config, self.seed_for(history, Some(id))))
    }

    /// Updates the policy with a freshly recorded evaluation.
    ///
    /// Returns `true` when the best incumbent changed.
    pub fn observe(&mut self, record: &TrialRecord, history: &RunHistory) -> bool {
        let id = record.config_id;
        let n = history.n_evals(id);
        self.challenger = None;

        let Some(mean) = history.aggregated_cost(id).filter(|c| c.is_finite()) else {
            self.incumbents.retain(|&(i, _)| i != id);
            trace_debug!(config_id = id, "challenger rejected: non-finite cost");
            return false;
        };

        if let Some(&(best_id, best_cost)) = self.incumbents.first()
            && best_id != id
        {
            let reference = history.mean_cost_of_first(best_id, n).unwrap_or(best_cost);
            if mean > reference {
                trace_debug!(config_id = id, mean, reference, "challenger rejected");
                return false;
            }
        }

        if n < self.max_config_calls {
            self.challenger = Some(id);
            return false;
        }

        let previous_best = self.best_cost();
        self.incumbents.retain(|&(i, _)| i != id);
        self.incumbents.push((id, mean));
        self.incumbents.sort_by(|a, b| a.1.total_cmp(&b.1));
        self.incumbents.truncate(self.max_incumbents);

        if mean < previous_best {
            self.trajectory.push(TrajectoryEntry {
                trial: record.trial,
                config_id: id,
                config: record.config.clone(),
                cost: mean,
            });
            trace_info!(trial = record.trial, config_id = id, cost = mean, "new incumbent");
            return true;
        }
        false
    }

    /// The best incumbent.
    #[must_use]
    pub fn incumbent<'h>(&self, history: &'h RunHistory) -> Option<&'h Configuration> {
        self.incumbents
            .first()
            .and_then(|&(id, _)| history.configs().get(id))
    }

    /// The incumbent set as `(config_id, aggregated cost)`, best first.
    #[must_use]
    pub fn incumbents(&self) -> &[(usize, f64)] {
        &self.incumbents
    }

    /// Cost of the best incumbent, `+inf` when there is none.
    #[must_use]
    pub fn best_cost(&self) -> f64 {
        self.incumbents.first().map_or(f64::INFINITY, |&(_, c)| c)
    }

    /// Every change of the best incumbent, oldest first.
    #[must_use]
    pub fn trajectory(&self) -> &[TrajectoryEntry] {
        &self.trajectory
    }
}
