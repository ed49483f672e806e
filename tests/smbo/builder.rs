use smbo::prelude::*;

use crate::{base_builder, identity_oracle, space};

#[test]
fn builds_with_defaults() {
    let smbo = Smbo::builder()
        .space(space(2))
        .oracle(identity_oracle(2))
        .build()
        .unwrap();
    assert_eq!(smbo.scenario().n_trials, 150);
    assert_eq!(smbo.intensifier().max_config_calls(), 3);
    assert_eq!(smbo.intensifier().max_incumbents(), 20);
    assert!(smbo.runhistory().is_empty());
    assert!(smbo.incumbent().is_none());
    assert!(!smbo.surrogate().is_fitted());
}

#[test]
fn build_makes_no_oracle_call() {
    let oracle = std::sync::Arc::new(CountingOracle::new(identity_oracle(2)));
    let _smbo = Smbo::builder()
        .space(space(2))
        .oracle(std::sync::Arc::clone(&oracle))
        .build()
        .unwrap();
    assert_eq!(oracle.calls(), 0);
}

#[test]
fn missing_space_or_oracle() {
    assert!(matches!(
        Smbo::builder().oracle(identity_oracle(1)).build(),
        Err(Error::InvalidConfig(_))
    ));
    assert!(matches!(
        Smbo::builder().space(space(1)).build(),
        Err(Error::InvalidConfig(_))
    ));
}

#[test]
fn oracle_dimension_must_match_space() {
    let result = Smbo::builder()
        .space(space(3))
        .oracle(identity_oracle(2))
        .build();
    assert!(matches!(
        result,
        Err(Error::DimensionMismatch {
            expected: 3,
            got: 2
        })
    ));
}

#[test]
fn surrogate_dimension_must_match_space() {
    let result = base_builder(2, 10, 0)
        .surrogate(GaussianProcessSurrogate::new(space(3)))
        .build();
    assert!(matches!(
        result,
        Err(Error::DimensionMismatch {
            expected: 2,
            got: 3
        })
    ));
}

#[test]
fn zero_counts_are_rejected() {
    assert!(matches!(
        base_builder(1, 0, 0).build(),
        Err(Error::InvalidConfig(_))
    ));
    assert!(matches!(
        base_builder(1, 10, 0).retrain_after(0).build(),
        Err(Error::InvalidConfig(_))
    ));
    assert!(matches!(
        base_builder(1, 10, 0).max_config_calls(0).build(),
        Err(Error::InvalidConfig(_))
    ));
    assert!(matches!(
        base_builder(1, 10, 0).max_incumbents(0).build(),
        Err(Error::InvalidConfig(_))
    ));
}

#[test]
fn expected_improvement_needs_uncertainty() {
    let deterministic = NetworkSurrogate::new(space(2), DenseModel::builder().epochs(5).build());
    let result = base_builder(2, 10, 0)
        .surrogate(deterministic)
        .acquisition(AcquisitionKind::ExpectedImprovement { xi: 0.0 })
        .build();
    assert!(matches!(result, Err(Error::InvalidConfig(_))));

    let gp = base_builder(2, 10, 0)
        .surrogate(GaussianProcessSurrogate::new(space(2)))
        .acquisition(AcquisitionKind::ExpectedImprovement { xi: 0.0 })
        .build();
    assert!(gp.is_ok());
}

#[test]
fn fresh_acquisition_is_not_fitted() {
    let acquisition = AcquisitionFunction::new(AcquisitionKind::PredictedMean);
    assert!(!acquisition.is_bound());
    assert!(matches!(
        acquisition.compute(&[vec![0.5]]),
        Err(Error::NotFitted)
    ));
}
