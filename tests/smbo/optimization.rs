use std::sync::Arc;

use smbo::prelude::*;

use crate::{HalfBroken, base_builder, identity_oracle, space};

#[test]
fn one_dimensional_baseline_run() {
    let space = ConfigurationSpace::uniform(1, 0.01, 1.0).unwrap();
    let mut smbo = Smbo::builder()
        .scenario(Scenario::builder().n_trials(10).build())
        .space(space.clone())
        .oracle(identity_oracle(1))
        .reduction(PNorm::new(1.0))
        .build()
        .unwrap();

    let default_cost = smbo.validate(&space.default_configuration()).unwrap();
    assert!((default_cost - 0.505).abs() < 1e-12);

    let incumbent = smbo.optimize().unwrap();
    assert_eq!(smbo.runhistory().len(), 10);
    // The first two Sobol points straddle the midpoint, and the lower one
    // always wins its three evaluations.
    assert!(incumbent.values()[0] < 0.505);
    assert!(smbo.intensifier().best_cost() < default_cost);
    assert!((smbo.validate(&incumbent).unwrap() - smbo.intensifier().best_cost()).abs() < 1e-12);
}

#[test]
fn spends_exactly_the_budget() {
    let oracle = Arc::new(CountingOracle::new(identity_oracle(2)));
    let mut smbo = base_builder(2, 150, 0)
        .oracle(Arc::clone(&oracle))
        .build()
        .unwrap();
    smbo.optimize().unwrap();
    assert_eq!(oracle.calls(), 150);
    assert_eq!(smbo.runhistory().len(), 150);

    // Already at budget: a second call only reports the incumbent.
    smbo.optimize().unwrap();
    assert_eq!(oracle.calls(), 150);
}

#[test]
fn incumbent_beats_default_configuration() {
    let mut smbo = base_builder(2, 30, 0).build().unwrap();
    let incumbent = smbo.optimize().unwrap();
    let default = smbo.space().default_configuration();
    assert!(smbo.validate(&incumbent).unwrap() < smbo.validate(&default).unwrap());
    assert_eq!(smbo.runhistory().n_evals(smbo.runhistory().config_id(&incumbent).unwrap()), 3);
}

#[test]
fn single_call_run_finds_low_region() {
    let mut smbo = base_builder(1, 24, 3)
        .initial_design(SobolInitialDesign::builder().n_configs(8).seed(3).build())
        .max_config_calls(1)
        .retrain_after(4)
        .build()
        .unwrap();
    let incumbent = smbo.optimize().unwrap();
    assert!(smbo.validate(&incumbent).unwrap() < 0.2);
}

#[test]
fn interior_optimum_is_approached() {
    let mut smbo = base_builder(1, 16, 0)
        .oracle(crate::test_functions::offset_oracle(1))
        .initial_design(SobolInitialDesign::builder().n_configs(8).build())
        .max_config_calls(1)
        .retrain_after(4)
        .build()
        .unwrap();
    let incumbent = smbo.optimize().unwrap();
    let default = smbo.space().default_configuration();
    assert!(smbo.validate(&incumbent).unwrap() < 0.1);
    assert!(smbo.validate(&default).unwrap() > 0.2);
}

#[test]
fn trajectory_strictly_improves() {
    let mut smbo = base_builder(3, 60, 1).build().unwrap();
    let incumbent = smbo.optimize().unwrap();
    let trajectory = smbo.trajectory();
    assert!(!trajectory.is_empty());
    for pair in trajectory.windows(2) {
        assert!(pair[1].cost < pair[0].cost);
        assert!(pair[1].trial > pair[0].trial);
    }
    let last = trajectory.last().unwrap();
    assert_eq!(last.config, incumbent);
    assert_eq!(last.cost, smbo.intensifier().best_cost());
}

#[test]
fn initial_design_comes_first() {
    let mut smbo = base_builder(2, 20, 0)
        .initial_design(SobolInitialDesign::builder().n_configs(5).build())
        .max_config_calls(1)
        .build()
        .unwrap();
    smbo.optimize().unwrap();
    let origins: Vec<ConfigOrigin> = smbo.runhistory().records().iter().map(|r| r.origin).collect();
    assert!(origins[..5].iter().all(|&o| o == ConfigOrigin::InitialDesign));
    assert!(origins[5..].iter().all(|&o| o != ConfigOrigin::InitialDesign));
}

#[test]
fn retrains_on_trial_cadence() {
    let mut smbo = base_builder(2, 25, 0)
        .initial_design(SobolInitialDesign::builder().n_configs(6).build())
        .max_config_calls(1)
        .retrain_after(5)
        .build()
        .unwrap();
    smbo.optimize().unwrap();
    assert_eq!(smbo.surrogate().fit_version(), 5);
    assert!(smbo.surrogate().is_fitted());
}

#[test]
fn random_design_probability_one_is_always_random() {
    let mut smbo = base_builder(2, 40, 0)
        .initial_design(SobolInitialDesign::builder().n_configs(5).build())
        .random_design(ProbabilityRandomDesign::new(1.0, 0).unwrap())
        .max_config_calls(1)
        .build()
        .unwrap();
    smbo.optimize().unwrap();
    assert_eq!(smbo.random_design_count(), 35);
    let random = smbo
        .runhistory()
        .records()
        .iter()
        .filter(|r| r.origin == ConfigOrigin::Random)
        .count();
    assert_eq!(random, 35);
}

#[test]
fn random_design_probability_zero_uses_acquisition() {
    let mut smbo = base_builder(2, 30, 0)
        .initial_design(SobolInitialDesign::builder().n_configs(5).build())
        .random_design(ProbabilityRandomDesign::new(0.0, 0).unwrap())
        .max_config_calls(1)
        .retrain_after(5)
        .build()
        .unwrap();
    smbo.optimize().unwrap();
    assert_eq!(smbo.random_design_count(), 0);
    let records = smbo.runhistory().records();
    assert!(records[5..].iter().any(|r| r.origin == ConfigOrigin::Acquisition));
    // Proposals are never re-evaluations of known configurations.
    assert_eq!(smbo.runhistory().configs().len(), 30);
}

#[test]
fn random_design_rate_follows_probability() {
    let mut smbo = base_builder(1, 400, 0)
        .initial_design(SobolInitialDesign::builder().n_configs(1).build())
        .random_design(ProbabilityRandomDesign::new(0.5, 9).unwrap())
        .maximizer(
            DifferentialEvolution::builder()
                .challengers(30)
                .seed(0)
                .build(),
        )
        .max_config_calls(1)
        .retrain_after(50)
        .build()
        .unwrap();
    smbo.optimize().unwrap();
    let rate = smbo.random_design_count() as f64 / 399.0;
    assert!((rate - 0.5).abs() < 0.1, "rate {rate}");
}

#[test]
fn same_seed_same_run() {
    let run = |seed| {
        let mut smbo = base_builder(2, 30, seed).max_config_calls(1).build().unwrap();
        smbo.optimize().unwrap();
        smbo.runhistory()
            .records()
            .iter()
            .map(|r| (r.config.values().to_vec(), r.cost))
            .collect::<Vec<_>>()
    };
    assert_eq!(run(4), run(4));
    assert_ne!(run(4), run(5));
}

#[test]
fn validate_is_idempotent_and_off_budget() {
    let oracle = Arc::new(CountingOracle::new(identity_oracle(2)));
    let mut smbo = base_builder(2, 12, 0)
        .oracle(Arc::clone(&oracle))
        .build()
        .unwrap();
    let incumbent = smbo.optimize().unwrap();
    let a = smbo.validate(&incumbent).unwrap();
    let b = smbo.validate(&incumbent).unwrap();
    assert_eq!(a, b);
    assert_eq!(smbo.runhistory().len(), 12);
    assert_eq!(oracle.calls(), 14);
}

#[test]
fn expected_improvement_with_gaussian_process() {
    let mut smbo = base_builder(2, 30, 2)
        .surrogate(GaussianProcessSurrogate::new(space(2)))
        .acquisition(AcquisitionKind::ExpectedImprovement { xi: 0.01 })
        .initial_design(SobolInitialDesign::builder().n_configs(8).build())
        .max_config_calls(1)
        .retrain_after(4)
        .build()
        .unwrap();
    let incumbent = smbo.optimize().unwrap();
    assert!(smbo.validate(&incumbent).unwrap() < 1.01);
    assert!(smbo.surrogate().fit_version() > 0);
}

#[test]
fn network_surrogate_drives_proposals() {
    let model = DenseModel::builder().hidden(8).epochs(60).seed(1).build();
    let mut smbo = base_builder(2, 20, 0)
        .surrogate(NetworkSurrogate::new(space(2), model))
        .initial_design(SobolInitialDesign::builder().n_configs(5).build())
        .random_design(ProbabilityRandomDesign::new(0.0, 0).unwrap())
        .max_config_calls(1)
        .retrain_after(5)
        .build()
        .unwrap();
    smbo.optimize().unwrap();
    assert_eq!(smbo.surrogate().fit_version(), 4);
    let proposals = smbo
        .runhistory()
        .records()
        .iter()
        .filter(|r| r.origin == ConfigOrigin::Acquisition)
        .count();
    assert!(proposals > 0);
}

#[test]
fn deterministic_flag_controls_repeat_seeds() {
    let run = |deterministic: bool| {
        let scenario = Scenario::builder()
            .seed(5)
            .n_trials(12)
            .deterministic(deterministic)
            .build();
        let mut smbo = base_builder(1, 12, 5).scenario(scenario).build().unwrap();
        smbo.optimize().unwrap();
        smbo.runhistory()
            .records()
            .iter()
            .map(|r| (r.n_evals, r.seed))
            .collect::<Vec<_>>()
    };

    let fixed = run(true);
    assert!(fixed.iter().all(|&(_, seed)| seed == 5));

    let varying = run(false);
    assert!(varying.iter().any(|&(n, _)| n > 1));
    assert!(varying.iter().all(|&(n, seed)| seed == 5 + n as u64 - 1));
}

#[test]
fn failed_trials_are_recorded_and_skipped() {
    let mut smbo = base_builder(1, 30, 0)
        .oracle(HalfBroken)
        .max_config_calls(1)
        .build()
        .unwrap();
    let incumbent = smbo.optimize().unwrap();
    let records = smbo.runhistory().records();
    assert_eq!(records.len(), 30);
    let failed: Vec<_> = records
        .iter()
        .filter(|r| r.state == TrialState::Failed)
        .collect();
    assert!(!failed.is_empty());
    assert!(failed.iter().all(|r| r.cost == f64::INFINITY && r.output.is_none()));
    assert!(incumbent.values()[0] >= 0.5);
}

#[test]
fn non_finite_costs_fail_the_trial() {
    let oracle = FnOracle::new(1, (1, 1), |x: &[f64]| {
        let v = if x[0] > 0.5 { f64::NAN } else { x[0] };
        Field::from_element(1, 1, v)
    });
    let mut smbo = base_builder(1, 20, 0)
        .oracle(oracle)
        .max_config_calls(1)
        .build()
        .unwrap();
    let incumbent = smbo.optimize().unwrap();
    assert!(incumbent.values()[0] <= 0.5);
    assert!(
        smbo.runhistory()
            .records()
            .iter()
            .filter(|r| r.state == TrialState::Failed)
            .all(|r| r.config.values()[0] > 0.5)
    );
}

#[test]
fn all_failures_mean_no_incumbent() {
    let oracle = FnOracle::new(1, (1, 1), |_: &[f64]| Field::from_element(1, 1, f64::INFINITY));
    let mut smbo = base_builder(1, 10, 0).oracle(oracle).build().unwrap();
    assert!(matches!(smbo.optimize(), Err(Error::NoCompletedTrials)));
    assert_eq!(smbo.runhistory().len(), 10);
    assert!(smbo.trajectory().is_empty());
}
