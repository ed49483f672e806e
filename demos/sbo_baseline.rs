//! The baseline SMBO pipeline on a synthetic field oracle.
//!
//! A 14-parameter oracle produces an 8x8 field; the cost is the field's
//! 4-norm. A dense network surrogate is warm-started from an offline
//! dataset, then the driver spends 150 oracle calls with every baseline
//! default: Sobol initial design of 100, DE maximizer with 1000
//! challengers, random-design probability 0.0845, three calls per
//! configuration and a refit every 10 trials. Field angles are logged
//! under `smbo_output/test_baseline/0/`.
//!
//! Run with: `cargo run --release --example sbo_baseline`
//! (set `RUST_LOG=smbo=debug` for per-trial events).

use std::f64::consts::PI;
use std::sync::Arc;

use smbo::prelude::*;
use tracing_subscriber::EnvFilter;

const N_PARAMS: usize = 14;
const ROWS: usize = 8;
const COLS: usize = 8;
const OFFLINE_ROWS: usize = 120;

/// Superposition of oriented cosine modes. Parameter `k` weighs mode `k`,
/// whose direction rotates with `k`; the field is never identically zero.
#[allow(clippy::cast_precision_loss)]
fn simulate(x: &[f64]) -> Field {
    Field::from_fn(ROWS, COLS, |i, j| {
        let (u, v) = (i as f64 / ROWS as f64, j as f64 / COLS as f64);
        let modes: f64 = x
            .iter()
            .enumerate()
            .map(|(k, &w)| {
                let theta = PI * k as f64 / N_PARAMS as f64;
                let freq = 1.0 + (k % 4) as f64;
                w * (2.0 * PI * freq * (u * theta.cos() + v * theta.sin())).cos()
            })
            .sum();
        0.05 + modes / N_PARAMS as f64
    })
}

fn offline_dataset(space: &ConfigurationSpace, seed: u64) -> Dataset {
    let mut rng = fastrand::Rng::with_seed(seed);
    let (features, targets): (Vec<Vec<f64>>, Vec<Vec<f64>>) = (0..OFFLINE_ROWS)
        .map(|_| {
            let config = space.sample_random(&mut rng);
            let field = simulate(config.values());
            (config.values().to_vec(), field.as_slice().to_vec())
        })
        .unzip();
    Dataset::new(features, targets).expect("generated rows are rectangular")
}

fn main() -> smbo::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("smbo=info")),
        )
        .init();

    let scenario = Scenario::builder()
        .name("test_baseline")
        .seed(0)
        .n_trials(150)
        .deterministic(true)
        .build();
    let space = ConfigurationSpace::uniform(N_PARAMS, 0.01, 1.0)?;
    let oracle: Arc<dyn Oracle> = Arc::new(FnOracle::new(N_PARAMS, (ROWS, COLS), simulate));

    let model = DenseModel::builder().hidden(32).epochs(300).seed(scenario.seed).build();
    let mut surrogate = NetworkSurrogate::builder(space.clone(), model)
        .reduction(PNorm::default())
        .n_inferences(1)
        .data_loader(InMemoryDataLoader::new(offline_dataset(&space, 42)))
        .build();
    surrogate.warm_start()?;

    let callback = SaveAngleCallback::new(&scenario.output_directory, &scenario.namespace())
        .with_oracle(Arc::clone(&oracle));

    let mut smbo = Smbo::builder()
        .scenario(scenario.clone())
        .space(space.clone())
        .oracle(oracle)
        .reduction(PNorm::default())
        .surrogate(surrogate)
        .acquisition(AcquisitionKind::PredictedMean)
        .maximizer(DifferentialEvolution::builder().challengers(1000).seed(scenario.seed).build())
        .initial_design(
            SobolInitialDesign::builder()
                .n_configs(100)
                .max_ratio(1.0)
                .seed(scenario.seed)
                .build(),
        )
        .random_design(ProbabilityRandomDesign::new(
            smbo::random_design::DEFAULT_PROBABILITY,
            scenario.seed,
        )?)
        .max_config_calls(3)
        .max_incumbents(20)
        .retrain_after(10)
        .callback(callback)
        .build()?;

    let incumbent = smbo.optimize()?;

    let default_cost = smbo.validate(&space.default_configuration())?;
    println!("Default cost: {default_cost}");
    let incumbent_cost = smbo.validate(&incumbent)?;
    println!("Incumbent cost: {incumbent_cost}");
    println!(
        "{} trials, {} random proposals, {} incumbent changes",
        smbo.runhistory().len(),
        smbo.random_design_count(),
        smbo.trajectory().len()
    );
    Ok(())
}
