//! Space-filling initial design from a scrambled Sobol sequence.
//!
//! The design fills the parameter space more evenly than uniform random
//! sampling. Point `i` of the design is Sobol sequence index `i`, and each
//! configuration dimension maps to its own Sobol dimension (scrambled via
//! the Burley 2020 algorithm). The resulting point in `[0, 1)` is mapped
//! onto the configuration space.
//!
//! # Examples
//!
//! ```
//! use smbo::initial_design::SobolInitialDesign;
//! use smbo::space::ConfigurationSpace;
//!
//! let space = ConfigurationSpace::uniform(4, 0.01, 1.0).unwrap();
//! let design = SobolInitialDesign::builder().n_configs(100).max_ratio(0.25).build();
//! // The budget cap wins: floor(0.25 * 40) = 10.
//! assert_eq!(design.select(&space, 40).len(), 10);
//! ```

use sobol_burley::sample;

use crate::space::{Configuration, ConfigurationSpace};

const DEFAULT_N_CONFIGS: usize = 100;

/// Scrambled Sobol initial design.
#[derive(Clone, Debug)]
pub struct SobolInitialDesign {
    n_configs: usize,
    max_ratio: f64,
    seed: u32,
}

/// Builder for [`SobolInitialDesign`].
///
/// Defaults:
/// - `n_configs`: 100
/// - `max_ratio`: 1.0 (the design may use the whole trial budget)
/// - `seed`: 0
#[derive(Clone, Debug, Default)]
pub struct SobolInitialDesignBuilder {
    n_configs: Option<usize>,
    max_ratio: Option<f64>,
    seed: Option<u64>,
}

impl SobolInitialDesignBuilder {
    /// Sets the requested number of configurations.
    #[must_use]
    pub fn n_configs(mut self, n: usize) -> Self {
        self.n_configs = Some(n);
        self
    }

    /// Sets the largest share of the trial budget the design may take,
    /// clamped to `[0, 1]`.
    #[must_use]
    pub fn max_ratio(mut self, ratio: f64) -> Self {
        self.max_ratio = Some(ratio.clamp(0.0, 1.0));
        self
    }

    /// Sets the scrambling seed.
    ///
    /// Different seeds produce statistically independent sequences.
    #[must_use]
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Builds the design.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn build(self) -> SobolInitialDesign {
        SobolInitialDesign {
            n_configs: self.n_configs.unwrap_or(DEFAULT_N_CONFIGS),
            max_ratio: self.max_ratio.unwrap_or(1.0),
            seed: self.seed.unwrap_or(0) as u32,
        }
    }
}

impl Default for SobolInitialDesign {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl SobolInitialDesign {
    /// Creates a builder with default settings.
    #[must_use]
    pub fn builder() -> SobolInitialDesignBuilder {
        SobolInitialDesignBuilder::default()
    }

    /// Number of configurations the design yields for a trial budget:
    /// `min(n_configs, floor(max_ratio * n_trials))`, at least one when
    /// the budget is positive.
    #[must_use]
    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_precision_loss,
        clippy::cast_sign_loss
    )]
    pub fn size(&self, n_trials: usize) -> usize {
        if n_trials == 0 {
            return 0;
        }
        let cap = (self.max_ratio * n_trials as f64).floor() as usize;
        self.n_configs.min(cap).max(1)
    }

    /// Generates the design for `space` under a budget of `n_trials`.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn select(&self, space: &ConfigurationSpace, n_trials: usize) -> Vec<Configuration> {
        let n = self.size(n_trials);
        let configs: Vec<Configuration> = (0..n)
            .filter_map(|i| {
                let unit: Vec<f64> = (0..space.len())
                    .map(|d| f64::from(sample(i as u32, d as u32, self.seed)))
                    .collect();
                space.from_unit(&unit).ok()
            })
            .collect();
        trace_debug!(n = configs.len(), "sobol initial design generated");
        configs
    }
}
