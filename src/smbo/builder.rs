use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use crate::acquisition::{AcquisitionFunction, AcquisitionKind};
use crate::callback::Callback;
use crate::error::{Error, Result};
use crate::initial_design::SobolInitialDesign;
use crate::intensifier::{DEFAULT_MAX_CONFIG_CALLS, DEFAULT_MAX_INCUMBENTS, Intensifier};
use crate::maximizer::DifferentialEvolution;
use crate::objective::{PNorm, Reduction, TargetFunction};
use crate::oracle::Oracle;
use crate::random_design::{DEFAULT_PROBABILITY, ProbabilityRandomDesign};
use crate::rng_util;
use crate::runhistory::RunHistory;
use crate::scenario::Scenario;
use crate::space::ConfigurationSpace;
use crate::surrogate::{GaussianProcessSurrogate, SurrogateModel};

use super::Smbo;

const DEFAULT_RETRAIN_AFTER: usize = 10;

// RNG streams derived from the scenario seed.
const RANDOM_CONFIG_STREAM: u64 = 1;
const RANDOM_DESIGN_STREAM: u64 = 2;

/// A builder for [`Smbo`] with a fluent API.
///
/// Created via [`Smbo::builder()`]. The space and the oracle are required;
/// everything else has a default tied to the scenario seed.
///
/// # Defaults
///
/// - Scenario: [`Scenario::default()`]
/// - Reduction: [`PNorm::default()`] (p = 4)
/// - Surrogate: [`GaussianProcessSurrogate`] over the space
/// - Acquisition: [`AcquisitionKind::PredictedMean`]
/// - Maximizer: [`DifferentialEvolution`] with 1000 challengers
/// - Initial design: [`SobolInitialDesign`] with 100 configurations
/// - Random design probability: `0.0845`
/// - `max_config_calls`: 3, `max_incumbents`: 20
/// - `retrain_after`: 10
pub struct SmboBuilder {
    scenario: Option<Scenario>,
    space: Option<ConfigurationSpace>,
    oracle: Option<Arc<dyn Oracle>>,
    reduction: Option<Arc<dyn Reduction>>,
    surrogate: Option<Box<dyn SurrogateModel>>,
    acquisition: AcquisitionKind,
    maximizer: Option<DifferentialEvolution>,
    initial_design: Option<SobolInitialDesign>,
    random_design: Option<ProbabilityRandomDesign>,
    max_config_calls: usize,
    max_incumbents: usize,
    retrain_after: usize,
    callbacks: Vec<Box<dyn Callback>>,
}

impl SmboBuilder {
    pub(super) fn new() -> Self {
        Self {
            scenario: None,
            space: None,
            oracle: None,
            reduction: None,
            surrogate: None,
            acquisition: AcquisitionKind::default(),
            maximizer: None,
            initial_design: None,
            random_design: None,
            max_config_calls: DEFAULT_MAX_CONFIG_CALLS,
            max_incumbents: DEFAULT_MAX_INCUMBENTS,
            retrain_after: DEFAULT_RETRAIN_AFTER,
            callbacks: Vec::new(),
        }
    }

    /// Sets the run settings.
    #[must_use]
    pub fn scenario(mut self, scenario: Scenario) -> Self {
        self.scenario = Some(scenario);
        self
    }

    /// Sets the configuration space. Required.
    #[must_use]
    pub fn space(mut self, space: ConfigurationSpace) -> Self {
        self.space = Some(space);
        self
    }

    /// Sets the simulation oracle. Required.
    ///
    /// Pass an `Arc` to keep a handle on the oracle, for example to read
    /// the call count of a [`CountingOracle`](crate::oracle::CountingOracle).
    #[must_use]
    pub fn oracle(mut self, oracle: impl Oracle + 'static) -> Self {
        self.oracle = Some(Arc::new(oracle));
        self
    }

    /// Sets the reduction from oracle field to cost.
    #[must_use]
    pub fn reduction(mut self, reduction: impl Reduction + 'static) -> Self {
        self.reduction = Some(Arc::new(reduction));
        self
    }

    /// Sets the surrogate model.
    #[must_use]
    pub fn surrogate(mut self, surrogate: impl SurrogateModel + 'static) -> Self {
        self.surrogate = Some(Box::new(surrogate));
        self
    }

    /// Sets the acquisition scoring rule.
    ///
    /// [`ExpectedImprovement`](AcquisitionKind::ExpectedImprovement)
    /// requires a probabilistic surrogate.
    #[must_use]
    pub fn acquisition(mut self, kind: AcquisitionKind) -> Self {
        self.acquisition = kind;
        self
    }

    /// Sets the acquisition maximizer.
    #[must_use]
    pub fn maximizer(mut self, maximizer: DifferentialEvolution) -> Self {
        self.maximizer = Some(maximizer);
        self
    }

    /// Sets the initial design.
    #[must_use]
    pub fn initial_design(mut self, design: SobolInitialDesign) -> Self {
        self.initial_design = Some(design);
        self
    }

    /// Sets the random design.
    #[must_use]
    pub fn random_design(mut self, design: ProbabilityRandomDesign) -> Self {
        self.random_design = Some(design);
        self
    }

    /// Sets how many evaluations a configuration needs before it can
    /// become an incumbent.
    #[must_use]
    pub fn max_config_calls(mut self, n: usize) -> Self {
        self.max_config_calls = n;
        self
    }

    /// Sets the capacity of the incumbent set.
    #[must_use]
    pub fn max_incumbents(mut self, n: usize) -> Self {
        self.max_incumbents = n;
        self
    }

    /// Sets the refit cadence, in trials.
    #[must_use]
    pub fn retrain_after(mut self, n: usize) -> Self {
        self.retrain_after = n;
        self
    }

    /// Adds a callback. Callbacks are notified in insertion order.
    #[must_use]
    pub fn callback(mut self, callback: impl Callback + 'static) -> Self {
        self.callbacks.push(Box::new(callback));
        self
    }

    /// Validates the wiring and builds the driver. No oracle call is made.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidConfig`] when the space or oracle is missing, when
    ///   `n_trials`, `retrain_after`, `max_config_calls` or
    ///   `max_incumbents` is zero, or when an uncertainty-based acquisition
    ///   is paired with a deterministic surrogate.
    /// - [`Error::DimensionMismatch`] when the space, oracle and surrogate
    ///   disagree on the number of parameters.
    pub fn build(self) -> Result<Smbo> {
        let scenario = self.scenario.unwrap_or_default();
        let space = self
            .space
            .ok_or_else(|| Error::InvalidConfig("a configuration space is required".into()))?;
        let oracle = self
            .oracle
            .ok_or_else(|| Error::InvalidConfig("an oracle is required".into()))?;

        if space.is_empty() {
            return Err(Error::InvalidConfig("the configuration space is empty".into()));
        }
        if oracle.input_dim() != space.len() {
            return Err(Error::DimensionMismatch {
                expected: space.len(),
                got: oracle.input_dim(),
            });
        }
        for (name, value) in [
            ("n_trials", scenario.n_trials),
            ("retrain_after", self.retrain_after),
            ("max_config_calls", self.max_config_calls),
            ("max_incumbents", self.max_incumbents),
        ] {
            if value == 0 {
                return Err(Error::InvalidConfig(format!("{name} must be at least 1")));
            }
        }

        let surrogate: Box<dyn SurrogateModel> = match self.surrogate {
            Some(surrogate) => surrogate,
            None => Box::new(GaussianProcessSurrogate::new(space.clone())),
        };
        if surrogate.n_dims() != space.len() {
            return Err(Error::DimensionMismatch {
                expected: space.len(),
                got: surrogate.n_dims(),
            });
        }
        if self.acquisition.requires_uncertainty() && !surrogate.is_probabilistic() {
            return Err(Error::InvalidConfig(
                "expected improvement needs a probabilistic surrogate".into(),
            ));
        }
        let probe = vec![vec![0.5; space.len()]];
        if !matches!(
            AcquisitionFunction::new(self.acquisition).compute(&probe),
            Err(Error::NotFitted)
        ) {
            return Err(Error::Internal("unbound acquisition function produced scores"));
        }

        let seed = scenario.seed;
        let maximizer = self
            .maximizer
            .unwrap_or_else(|| DifferentialEvolution::builder().seed(seed).build());
        let initial_design = self
            .initial_design
            .unwrap_or_else(|| SobolInitialDesign::builder().seed(seed).build())
            .select(&space, scenario.n_trials);
        let random_design = match self.random_design {
            Some(design) => design,
            None => ProbabilityRandomDesign::new(
                DEFAULT_PROBABILITY,
                rng_util::derived(seed, RANDOM_DESIGN_STREAM).u64(..),
            )?,
        };
        let reduction: Arc<dyn Reduction> = match self.reduction {
            Some(reduction) => reduction,
            None => Arc::new(PNorm::default()),
        };

        trace_debug!(
            name = %scenario.name,
            seed,
            n_trials = scenario.n_trials,
            initial_design = initial_design.len(),
            "smbo configured"
        );

        Ok(Smbo {
            intensifier: Intensifier::new(self.max_config_calls, self.max_incumbents, seed)
                .deterministic(scenario.deterministic),
            rng: rng_util::derived(seed, RANDOM_CONFIG_STREAM),
            target: TargetFunction::from_parts(oracle, reduction),
            scenario,
            space,
            surrogate,
            acquisition: self.acquisition,
            maximizer,
            initial_design: VecDeque::from(initial_design),
            random_design,
            retrain_after: self.retrain_after,
            callbacks: self.callbacks,
            history: RunHistory::new(),
            random_design_count: 0,
            prefetched: HashMap::new(),
            started: false,
        })
    }
}
