//! The SMBO driver.
//!
//! [`Smbo`] owns every component of a run and spends the trial budget one
//! oracle call at a time. Each iteration picks the next configuration from,
//! in order of priority:
//!
//! 1. a repeat requested by the [`Intensifier`],
//! 2. the Sobol initial design,
//! 3. a proposal: uniformly random with the random-design probability,
//!    otherwise the best not-yet-evaluated point found by maximizing the
//!    acquisition function over the current surrogate.
//!
//! The surrogate is refitted every `retrain_after` trials.

mod builder;
mod optimize;

#[cfg(feature = "async")]
mod async_impl;

use std::collections::{HashMap, VecDeque};

pub use builder::SmboBuilder;

use crate::acquisition::AcquisitionKind;
use crate::callback::Callback;
use crate::error::Result;
use crate::intensifier::{Intensifier, TrajectoryEntry};
use crate::maximizer::DifferentialEvolution;
use crate::objective::{Evaluation, TargetFunction};
use crate::random_design::ProbabilityRandomDesign;
use crate::runhistory::RunHistory;
use crate::scenario::Scenario;
use crate::space::{Configuration, ConfigurationSpace};
use crate::surrogate::SurrogateModel;

/// A surrogate-assisted optimization run.
///
/// Created with [`Smbo::builder()`]; see the crate-level docs for a
/// complete example.
pub struct Smbo {
    scenario: Scenario,
    space: ConfigurationSpace,
    target: TargetFunction,
    surrogate: Box<dyn SurrogateModel>,
    acquisition: AcquisitionKind,
    maximizer: DifferentialEvolution,
    initial_design: VecDeque<Configuration>,
    random_design: ProbabilityRandomDesign,
    intensifier: Intensifier,
    retrain_after: usize,
    callbacks: Vec<Box<dyn Callback>>,
    history: RunHistory,
    rng: fastrand::Rng,
    random_design_count: usize,
    // First evaluations of initial-design configurations computed ahead of
    // the loop, keyed by configuration.
    prefetched: HashMap<Vec<u64>, Result<Evaluation>>,
    started: bool,
}

impl Smbo {
    /// Creates a builder.
    #[must_use]
    pub fn builder() -> SmboBuilder {
        SmboBuilder::new()
    }

    /// The run settings.
    #[must_use]
    pub fn scenario(&self) -> &Scenario {
        &self.scenario
    }

    /// The configuration space.
    #[must_use]
    pub fn space(&self) -> &ConfigurationSpace {
        &self.space
    }

    /// Every evaluation so far.
    #[must_use]
    pub fn runhistory(&self) -> &RunHistory {
        &self.history
    }

    /// The best configuration that has completed all its evaluations.
    #[must_use]
    pub fn incumbent(&self) -> Option<&Configuration> {
        self.intensifier.incumbent(&self.history)
    }

    /// Every change of the best incumbent, oldest first.
    #[must_use]
    pub fn trajectory(&self) -> &[TrajectoryEntry] {
        self.intensifier.trajectory()
    }

    /// The intensification policy and incumbent set.
    #[must_use]
    pub fn intensifier(&self) -> &Intensifier {
        &self.intensifier
    }

    /// The surrogate model.
    #[must_use]
    pub fn surrogate(&self) -> &dyn SurrogateModel {
        &*self.surrogate
    }

    /// How many proposals were drawn by the random design.
    #[must_use]
    pub fn random_design_count(&self) -> usize {
        self.random_design_count
    }

    /// The true cost of `config`, outside the trial budget and history.
    ///
    /// Calling it twice with the same configuration yields the same cost.
    ///
    /// # Errors
    ///
    /// Propagates oracle errors such as
    /// [`Error::InvalidInput`](crate::Error::InvalidInput).
    pub fn validate(&self, config: &Configuration) -> Result<f64> {
        let cost = self.target.cost(config)?;
        trace_info!(%config, cost, "validated configuration");
        Ok(cost)
    }
}
