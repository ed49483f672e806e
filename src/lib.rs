#![forbid(unsafe_code)]
#![deny(clippy::all)]
#![deny(unreachable_pub)]
#![deny(clippy::correctness)]
#![deny(clippy::suspicious)]
#![deny(clippy::style)]
#![deny(clippy::complexity)]
#![deny(clippy::perf)]
#![deny(clippy::pedantic)]
#![deny(clippy::std_instead_of_core)]

//! Surrogate-assisted sequential model-based optimization (SMBO) for
//! expensive simulation oracles.
//!
//! An [`Oracle`](oracle::Oracle) maps a parameter vector to an output field
//! and is the scarce resource: every call counts against a fixed trial
//! budget. A [`Reduction`](objective::Reduction) (a p-norm by default)
//! turns the field into the scalar cost the optimizer minimizes. The
//! [`Smbo`] driver spends the budget on a Sobol initial design first, then
//! proposes candidates by maximizing an
//! [`AcquisitionFunction`](acquisition::AcquisitionFunction) scored against
//! a cheap learned [`SurrogateModel`](surrogate::SurrogateModel), mixing in
//! uniformly random configurations with a fixed probability.
//!
//! # Getting Started
//!
//! ```
//! use smbo::prelude::*;
//!
//! // f(x) = |x|, minimum at the lower bound.
//! let oracle = FnOracle::new(1, (1, 1), |x: &[f64]| Field::from_element(1, 1, x[0]));
//! let space = ConfigurationSpace::uniform(1, 0.01, 1.0).unwrap();
//!
//! let mut smbo = Smbo::builder()
//!     .scenario(Scenario::builder().name("doc").seed(0).n_trials(12).build())
//!     .space(space.clone())
//!     .oracle(oracle)
//!     .reduction(PNorm::new(1.0))
//!     .surrogate(GaussianProcessSurrogate::new(space.clone()))
//!     .initial_design(SobolInitialDesign::builder().n_configs(4).seed(0).build())
//!     .retrain_after(2)
//!     .max_config_calls(1)
//!     .build()
//!     .unwrap();
//!
//! let incumbent = smbo.optimize().unwrap();
//! assert_eq!(smbo.runhistory().len(), 12);
//! assert!(smbo.validate(&incumbent).unwrap() < 0.5);
//! ```
//!
//! # Core Concepts
//!
//! | Type | Role |
//! |------|------|
//! | [`Smbo`] | Drive the budgeted loop: initial design, proposals, intensification, retraining. |
//! | [`ConfigurationSpace`](space::ConfigurationSpace) | Bounded continuous dimensions with a default configuration. |
//! | [`RunHistory`](runhistory::RunHistory) | Append-only log of every oracle evaluation. |
//! | [`SurrogateModel`](surrogate::SurrogateModel) | Cheap approximation of the cost surface (network or Gaussian process). |
//! | [`AcquisitionFunction`](acquisition::AcquisitionFunction) | Scores candidates against a bound surrogate. |
//! | [`Intensifier`](intensifier::Intensifier) | Repeated-evaluation policy and bounded incumbent set. |
//! | [`Callback`](callback::Callback) | Side-effecting observers such as [`SaveAngleCallback`](callback::SaveAngleCallback). |
//!
//! # Feature Flags
//!
//! | Flag | What it enables | Default |
//! |------|----------------|---------|
//! | `tracing` | Structured log events via [`tracing`](https://docs.rs/tracing) at key optimization points | on |
//! | `async` | `Smbo::optimize_parallel`: concurrent initial-design evaluation via tokio | off |

/// Emit a `tracing::info!` event when the `tracing` feature is enabled.
/// No-op otherwise.
#[cfg(feature = "tracing")]
macro_rules! trace_info {
    ($($arg:tt)*) => { tracing::info!($($arg)*) };
}

#[cfg(not(feature = "tracing"))]
macro_rules! trace_info {
    ($($arg:tt)*) => {};
}

/// Emit a `tracing::debug!` event when the `tracing` feature is enabled.
/// No-op otherwise.
#[cfg(feature = "tracing")]
macro_rules! trace_debug {
    ($($arg:tt)*) => { tracing::debug!($($arg)*) };
}

#[cfg(not(feature = "tracing"))]
macro_rules! trace_debug {
    ($($arg:tt)*) => {};
}

/// Emit a `tracing::warn!` event when the `tracing` feature is enabled.
/// No-op otherwise.
#[cfg(feature = "tracing")]
macro_rules! trace_warn {
    ($($arg:tt)*) => { tracing::warn!($($arg)*) };
}

#[cfg(not(feature = "tracing"))]
macro_rules! trace_warn {
    ($($arg:tt)*) => {};
}

pub mod acquisition;
pub mod callback;
pub mod data;
mod error;
pub mod initial_design;
pub mod intensifier;
pub mod maximizer;
pub mod metrics;
pub mod model;
pub mod objective;
pub mod oracle;
pub mod random_design;
mod rng_util;
pub mod runhistory;
mod scenario;
mod smbo;
pub mod space;
pub mod surrogate;
mod types;

pub use error::{Error, Result};
pub use scenario::{Scenario, ScenarioBuilder};
pub use smbo::{Smbo, SmboBuilder};
pub use types::{ConfigOrigin, TrialState};

/// Convenient wildcard import for the most common types.
///
/// ```
/// use smbo::prelude::*;
/// ```
pub mod prelude {
    pub use crate::acquisition::{AcquisitionFunction, AcquisitionKind};
    pub use crate::callback::{Callback, SaveAngleCallback};
    pub use crate::data::{CsvDataLoader, DataLoader, Dataset, InMemoryDataLoader};
    pub use crate::error::{Error, Result};
    pub use crate::initial_design::SobolInitialDesign;
    pub use crate::intensifier::Intensifier;
    pub use crate::maximizer::{DifferentialEvolution, DifferentialEvolutionStrategy};
    pub use crate::model::{DenseModel, PredictiveModel};
    pub use crate::objective::{PNorm, Reduction, TargetFunction};
    pub use crate::oracle::{CountingOracle, Field, FnOracle, Oracle};
    pub use crate::random_design::ProbabilityRandomDesign;
    pub use crate::runhistory::{RunHistory, TrialRecord};
    pub use crate::scenario::{Scenario, ScenarioBuilder};
    pub use crate::smbo::{Smbo, SmboBuilder};
    pub use crate::space::{Configuration, ConfigurationSpace, FloatDimension};
    pub use crate::surrogate::{GaussianProcessSurrogate, NetworkSurrogate, SurrogateModel};
    pub use crate::types::{ConfigOrigin, TrialState};
}
