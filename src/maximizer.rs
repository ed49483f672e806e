//! Differential Evolution (DE) maximizer for acquisition functions.
//!
//! DE maintains a population of points in the unit hypercube and creates
//! new candidates through **mutation** (combining difference vectors of
//! existing members) and **binomial crossover**. A trial vector replaces
//! its parent only if it scores at least as high, so the population never
//! gets worse.
//!
//! # Algorithm overview
//!
//! Each generation, for every population member *xᵢ*:
//! 1. **Mutation**: create a mutant vector *v* using the selected
//!    [`DifferentialEvolutionStrategy`]:
//!    - `Rand1`:  `v = x_r1 + F * (x_r2 - x_r3)`
//!    - `Best1`:  `v = x_best + F * (x_r1 - x_r2)`
//!    - `CurrentToBest1`:  `v = x_i + F * (x_best - x_i) + F * (x_r1 - x_r2)`
//! 2. **Crossover**: mix *v* and *xᵢ* dimension by dimension with
//!    probability CR, clamping to `[0, 1]`.
//! 3. **Selection**: replace *xᵢ* with *u* if `a(u) ≥ a(xᵢ)`.
//!
//! Acquisition evaluations are batched per generation. The total number of
//! evaluated points per call is bounded by `challengers`.
//!
//! # Configuration
//!
//! | Option | Default | Description |
//! |--------|---------|-------------|
//! | `challengers` | 1000 | Acquisition evaluations per call |
//! | `population_size` | `max(10n, 15)` | Candidates per generation |
//! | `mutation_factor` (F) | 0.8 | Differential amplification |
//! | `crossover_rate` (CR) | 0.9 | Probability of taking a dimension from the mutant |
//! | `strategy` | `Rand1` | Mutation strategy |
//! | `seed` | 0 | RNG seed |

use parking_lot::Mutex;

use crate::acquisition::AcquisitionFunction;
use crate::error::{Error, Result};
use crate::rng_util;

/// Differential Evolution mutation strategy.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum DifferentialEvolutionStrategy {
    /// DE/rand/1: `v = x_r1 + F * (x_r2 - x_r3)`
    ///
    /// The most robust strategy. Uses three random population members.
    #[default]
    Rand1,
    /// DE/best/1: `v = x_best + F * (x_r1 - x_r2)`
    ///
    /// Greedier strategy that biases toward the current best solution.
    Best1,
    /// DE/current-to-best/1: `v = x_i + F * (x_best - x_i) + F * (x_r1 - x_r2)`
    CurrentToBest1,
}

const DEFAULT_CHALLENGERS: usize = 1000;
const MIN_POPULATION: usize = 5;

/// Maximizes an [`AcquisitionFunction`] over the unit hypercube.
///
/// # Examples
///
/// ```
/// use smbo::maximizer::{DifferentialEvolution, DifferentialEvolutionStrategy};
///
/// let de = DifferentialEvolution::builder()
///     .challengers(500)
///     .strategy(DifferentialEvolutionStrategy::Best1)
///     .seed(42)
///     .build();
/// assert_eq!(de.challengers(), 500);
/// ```
pub struct DifferentialEvolution {
    challengers: usize,
    population_size: Option<usize>,
    mutation_factor: f64,
    crossover_rate: f64,
    strategy: DifferentialEvolutionStrategy,
    rng: Mutex<fastrand::Rng>,
}

/// Builder for [`DifferentialEvolution`].
#[derive(Clone, Debug)]
pub struct DifferentialEvolutionBuilder {
    challengers: usize,
    population_size: Option<usize>,
    mutation_factor: f64,
    crossover_rate: f64,
    strategy: DifferentialEvolutionStrategy,
    seed: u64,
}

impl Default for DifferentialEvolutionBuilder {
    fn default() -> Self {
        Self {
            challengers: DEFAULT_CHALLENGERS,
            population_size: None,
            mutation_factor: 0.8,
            crossover_rate: 0.9,
            strategy: DifferentialEvolutionStrategy::Rand1,
            seed: 0,
        }
    }
}

impl DifferentialEvolutionBuilder {
    /// Sets the number of acquisition evaluations per call.
    ///
    /// Default: 1000.
    #[must_use]
    pub fn challengers(mut self, n: usize) -> Self {
        self.challengers = n.max(MIN_POPULATION);
        self
    }

    /// Sets the population size.
    ///
    /// Default: `max(10 * n_dims, 15)`, capped at `challengers`.
    #[must_use]
    pub fn population_size(mut self, size: usize) -> Self {
        self.population_size = Some(size.max(MIN_POPULATION));
        self
    }

    /// Sets the mutation factor (F).
    ///
    /// Typical values are in `[0.5, 1.0]`. Higher values explore more.
    #[must_use]
    pub fn mutation_factor(mut self, f: f64) -> Self {
        self.mutation_factor = f;
        self
    }

    /// Sets the crossover rate (CR).
    #[must_use]
    pub fn crossover_rate(mut self, cr: f64) -> Self {
        self.crossover_rate = cr;
        self
    }

    /// Sets the mutation strategy.
    #[must_use]
    pub fn strategy(mut self, strategy: DifferentialEvolutionStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    /// Sets the RNG seed.
    #[must_use]
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Builds the maximizer.
    #[must_use]
    pub fn build(self) -> DifferentialEvolution {
        DifferentialEvolution {
            challengers: self.challengers,
            population_size: self.population_size,
            mutation_factor: self.mutation_factor,
            crossover_rate: self.crossover_rate,
            strategy: self.strategy,
            rng: Mutex::new(fastrand::Rng::with_seed(self.seed)),
        }
    }
}

impl Default for DifferentialEvolution {
    fn default() -> Self {
        Self::builder().build()
    }
}

/// Select `count` distinct random indices from `0..n`, all different from `exclude`.
fn select_random_indices(rng: &mut fastrand::Rng, n: usize, count: usize, exclude: usize) -> Vec<usize> {
    let mut selected = Vec::with_capacity(count);
    while selected.len() < count {
        let idx = rng.usize(0..n);
        if idx != exclude && !selected.contains(&idx) {
            selected.push(idx);
        }
    }
    selected
}

fn sanitize(score: f64) -> f64 {
    if score.is_nan() { f64::NEG_INFINITY } else { score }
}

impl DifferentialEvolution {
    /// Creates a builder with default settings.
    #[must_use]
    pub fn builder() -> DifferentialEvolutionBuilder {
        DifferentialEvolutionBuilder::default()
    }

    /// Acquisition evaluations per call.
    #[must_use]
    pub fn challengers(&self) -> usize {
        self.challengers
    }

    fn resolved_population(&self, n_dims: usize) -> usize {
        self.population_size
            .unwrap_or_else(|| (10 * n_dims).max(15))
            .min(self.challengers)
            .max(MIN_POPULATION)
    }

    /// Maximizes `acquisition` over `[0, 1]^n_dims`.
    ///
    /// `seeds` (for example the incumbents' encodings) are placed in the
    /// initial population before the random members. Returns the final
    /// population as `(point, score)` pairs sorted by descending score.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DimensionMismatch`] for a seed of the wrong width
    /// and propagates acquisition errors such as
    /// [`Error::NotFitted`](crate::Error::NotFitted).
    pub fn maximize(
        &self,
        acquisition: &AcquisitionFunction<'_>,
        n_dims: usize,
        seeds: &[Vec<f64>],
    ) -> Result<Vec<(Vec<f64>, f64)>> {
        if let Some(bad) = seeds.iter().find(|s| s.len() != n_dims) {
            return Err(Error::DimensionMismatch {
                expected: n_dims,
                got: bad.len(),
            });
        }
        let mut rng = self.rng.lock();
        let pop_size = self.resolved_population(n_dims);

        let mut population: Vec<Vec<f64>> = seeds
            .iter()
            .take(pop_size)
            .map(|s| s.iter().map(|v| v.clamp(0.0, 1.0)).collect())
            .collect();
        while population.len() < pop_size {
            population.push((0..n_dims).map(|_| rng_util::f64_range(&mut rng, 0.0, 1.0)).collect());
        }
        let mut scores: Vec<f64> = acquisition.compute(&population)?.into_iter().map(sanitize).collect();
        let mut spent = pop_size;
        let mut generations = 0_usize;

        while spent + pop_size <= self.challengers && n_dims > 0 {
            let best_idx = scores
                .iter()
                .enumerate()
                .max_by(|a, b| a.1.total_cmp(b.1))
                .map_or(0, |(i, _)| i);
            let trials: Vec<Vec<f64>> = (0..pop_size)
                .map(|i| self.trial_vector(&mut rng, &population, i, best_idx))
                .collect();
            let trial_scores = acquisition.compute(&trials)?;
            for (i, (trial, score)) in trials.into_iter().zip(trial_scores).enumerate() {
                let score = sanitize(score);
                if score >= scores[i] {
                    population[i] = trial;
                    scores[i] = score;
                }
            }
            spent += pop_size;
            generations += 1;
        }
        trace_debug!(generations, evaluations = spent, "acquisition maximized");

        let mut ranked: Vec<(Vec<f64>, f64)> = population.into_iter().zip(scores).collect();
        ranked.sort_by(|a, b| b.1.total_cmp(&a.1));
        Ok(ranked)
    }

    /// Mutation plus binomial crossover for population member `i`.
    fn trial_vector(
        &self,
        rng: &mut fastrand::Rng,
        pop: &[Vec<f64>],
        i: usize,
        best_idx: usize,
    ) -> Vec<f64> {
        let n_dims = pop[i].len();
        let f = self.mutation_factor;
        let mutant: Vec<f64> = match self.strategy {
            DifferentialEvolutionStrategy::Rand1 => {
                let r = select_random_indices(rng, pop.len(), 3, i);
                (0..n_dims)
                    .map(|j| pop[r[0]][j] + f * (pop[r[1]][j] - pop[r[2]][j]))
                    .collect()
            }
            DifferentialEvolutionStrategy::Best1 => {
                let r = select_random_indices(rng, pop.len(), 2, i);
                (0..n_dims)
                    .map(|j| pop[best_idx][j] + f * (pop[r[0]][j] - pop[r[1]][j]))
                    .collect()
            }
            DifferentialEvolutionStrategy::CurrentToBest1 => {
                let r = select_random_indices(rng, pop.len(), 2, i);
                (0..n_dims)
                    .map(|j| {
                        pop[i][j] + f * (pop[best_idx][j] - pop[i][j]) + f * (pop[r[0]][j] - pop[r[1]][j])
                    })
                    .collect()
            }
        };
        let j_rand = rng.usize(0..n_dims);
        (0..n_dims)
            .map(|j| {
                let v = if j == j_rand || rng.f64() < self.crossover_rate {
                    mutant[j]
                } else {
                    pop[i][j]
                };
                v.clamp(0.0, 1.0)
            })
            .collect()
    }
}
