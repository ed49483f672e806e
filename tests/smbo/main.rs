#![allow(clippy::cast_precision_loss)]

mod builder;
mod callbacks;
mod optimization;
#[cfg(feature = "async")]
mod parallel;
mod persistence;
#[path = "../../benches/test_functions.rs"]
#[allow(dead_code)]
mod test_functions;

use smbo::prelude::*;

/// Oracle returning its input as a `1 x d` field, so that a p = 1 norm
/// gives `sum(x)` and the optimum sits at the lower bounds.
pub fn identity_oracle(d: usize) -> impl Oracle {
    FnOracle::new(d, (1, d), move |x: &[f64]| Field::from_row_slice(1, d, x))
}

/// Fails outright on the left half of `[0, 1]`.
pub struct HalfBroken;

impl Oracle for HalfBroken {
    fn input_dim(&self) -> usize {
        1
    }

    fn output_shape(&self) -> (usize, usize) {
        (1, 1)
    }

    fn simulate(&self, x: &[f64]) -> smbo::Result<Field> {
        if x[0] < 0.5 {
            Err(Error::InvalidInput {
                expected: 1,
                got: 0,
            })
        } else {
            Ok(Field::from_element(1, 1, x[0]))
        }
    }
}

pub fn space(d: usize) -> ConfigurationSpace {
    ConfigurationSpace::uniform(d, 0.01, 1.0).unwrap()
}

/// A fast maximizer for tests.
pub fn small_maximizer(seed: u64) -> DifferentialEvolution {
    DifferentialEvolution::builder()
        .challengers(200)
        .seed(seed)
        .build()
}

/// A builder wired with the identity oracle, an L1 reduction and a small
/// maximizer. Callers set the budget and any override they need.
pub fn base_builder(d: usize, n_trials: usize, seed: u64) -> SmboBuilder {
    Smbo::builder()
        .scenario(
            Scenario::builder()
                .name("test")
                .seed(seed)
                .n_trials(n_trials)
                .build(),
        )
        .space(space(d))
        .oracle(identity_oracle(d))
        .reduction(PNorm::new(1.0))
        .maximizer(small_maximizer(seed))
}
