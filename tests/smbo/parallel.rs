use std::sync::Arc;

use smbo::prelude::*;

use crate::{base_builder, identity_oracle};

fn trace(smbo: &Smbo) -> Vec<(Vec<f64>, f64, u64)> {
    smbo.runhistory()
        .records()
        .iter()
        .map(|r| (r.config.values().to_vec(), r.cost, r.seed))
        .collect()
}

#[tokio::test]
async fn parallel_design_matches_sequential_run() {
    let mut sequential = base_builder(2, 40, 3).build().unwrap();
    sequential.optimize().unwrap();

    let oracle = Arc::new(CountingOracle::new(identity_oracle(2)));
    let mut parallel = base_builder(2, 40, 3)
        .oracle(Arc::clone(&oracle))
        .build()
        .unwrap();
    let incumbent = parallel.optimize_parallel(4).await.unwrap();

    assert_eq!(oracle.calls(), 40);
    assert_eq!(trace(&parallel), trace(&sequential));
    assert_eq!(Some(&incumbent), sequential.incumbent());
}

#[tokio::test]
async fn zero_concurrency_is_rejected() {
    let mut smbo = base_builder(1, 5, 0).build().unwrap();
    assert!(matches!(
        smbo.optimize_parallel(0).await,
        Err(Error::InvalidConfig(_))
    ));
    assert!(smbo.runhistory().is_empty());
}
