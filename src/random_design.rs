//! Interleaving uniformly random configurations with model-guided ones.

use crate::error::{Error, Result};

/// Baseline probability of proposing a random configuration.
pub const DEFAULT_PROBABILITY: f64 = 0.084_472_323_717_205_52;

/// Chooses a random configuration instead of the acquisition proposal with
/// a fixed probability.
///
/// ```
/// use smbo::random_design::ProbabilityRandomDesign;
///
/// let mut always = ProbabilityRandomDesign::new(1.0, 0).unwrap();
/// assert!(always.check());
/// assert!(ProbabilityRandomDesign::new(1.5, 0).is_err());
/// ```
#[derive(Clone, Debug)]
pub struct ProbabilityRandomDesign {
    probability: f64,
    rng: fastrand::Rng,
}

impl ProbabilityRandomDesign {
    /// Creates a design drawing from its own RNG stream.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] if `probability` is outside `[0, 1]`.
    pub fn new(probability: f64, seed: u64) -> Result<Self> {
        if !(0.0..=1.0).contains(&probability) {
            return Err(Error::InvalidConfig(format!(
                "random design probability must be in [0, 1], got {probability}"
            )));
        }
        Ok(Self {
            probability,
            rng: fastrand::Rng::with_seed(seed),
        })
    }

    /// The configured probability.
    #[must_use]
    pub fn probability(&self) -> f64 {
        self.probability
    }

    /// Whether the next proposal should be random.
    pub fn check(&mut self) -> bool {
        self.rng.f64() < self.probability
    }
}

impl Default for ProbabilityRandomDesign {
    fn default() -> Self {
        Self {
            probability: DEFAULT_PROBABILITY,
            rng: fastrand::Rng::with_seed(0),
        }
    }
}
