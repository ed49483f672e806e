use core::sync::atomic::{AtomicU64, Ordering};
use std::path::PathBuf;

use smbo::prelude::*;

use crate::{HalfBroken, base_builder, space};

static COUNTER: AtomicU64 = AtomicU64::new(0);

fn temp_file(stem: &str) -> PathBuf {
    let n = COUNTER.fetch_add(1, Ordering::Relaxed);
    std::env::temp_dir().join(format!("smbo_{stem}_{}_{n}.json", std::process::id()))
}

#[test]
fn runhistory_survives_a_round_trip() {
    let mut smbo = base_builder(2, 20, 0).build().unwrap();
    smbo.optimize().unwrap();

    let path = temp_file("history");
    smbo.runhistory().save(&path).unwrap();
    let loaded = RunHistory::load(&path, &space(2));
    let _ = std::fs::remove_file(&path);
    let loaded = loaded.unwrap();

    let original = smbo.runhistory();
    assert_eq!(loaded.len(), original.len());
    assert_eq!(loaded.configs().len(), original.configs().len());
    for (a, b) in loaded.records().iter().zip(original.records()) {
        assert_eq!(a.config, b.config);
        assert_eq!(a.cost, b.cost);
        assert_eq!(a.seed, b.seed);
        assert_eq!(a.origin, b.origin);
        assert!(a.output.is_none());
    }
}

#[test]
fn failed_trials_survive_a_round_trip() {
    let mut smbo = base_builder(1, 30, 0)
        .oracle(HalfBroken)
        .max_config_calls(1)
        .build()
        .unwrap();
    smbo.optimize().unwrap();
    let original = smbo.runhistory();
    assert!(original.records().iter().any(|r| r.state == TrialState::Failed));

    let path = temp_file("failed");
    original.save(&path).unwrap();
    let loaded = RunHistory::load(&path, &space(1));
    let _ = std::fs::remove_file(&path);
    let loaded = loaded.unwrap();

    assert_eq!(loaded.len(), original.len());
    for (a, b) in loaded.records().iter().zip(original.records()) {
        assert_eq!(a.state, b.state);
        assert_eq!(a.cost, b.cost);
    }
    let data = loaded.encode(&space(1));
    assert!(data.y.iter().all(|c| c.is_finite()));
    assert_eq!(data.len(), original.encode(&space(1)).len());
}

#[test]
fn loaded_history_trains_a_surrogate() {
    let mut smbo = base_builder(2, 20, 0).max_config_calls(1).build().unwrap();
    smbo.optimize().unwrap();
    let path = temp_file("train");
    smbo.runhistory().save(&path).unwrap();
    let loaded = RunHistory::load(&path, &space(2));
    let _ = std::fs::remove_file(&path);

    let mut gp = GaussianProcessSurrogate::new(space(2));
    gp.train(&loaded.unwrap()).unwrap();
    let (mean, _) = gp.predict_marginalized(&[vec![0.0, 0.0], vec![1.0, 1.0]]).unwrap();
    assert!(mean[0] < mean[1]);
}

#[test]
fn history_from_another_space_is_rejected() {
    let mut smbo = base_builder(2, 10, 0).build().unwrap();
    smbo.optimize().unwrap();
    let path = temp_file("other");
    smbo.runhistory().save(&path).unwrap();
    let narrow = ConfigurationSpace::uniform(2, 0.5, 0.6).unwrap();
    let result = RunHistory::load(&path, &narrow);
    let _ = std::fs::remove_file(&path);
    assert!(result.is_err());
}

#[test]
fn scenario_file_drives_a_run() {
    let path = temp_file("scenario");
    std::fs::write(&path, r#"{ "name": "from_file", "seed": 7, "n_trials": 9 }"#).unwrap();
    let scenario = Scenario::from_json_file(&path);
    let _ = std::fs::remove_file(&path);
    let scenario = scenario.unwrap();

    let mut smbo = base_builder(2, 1, 0).scenario(scenario).build().unwrap();
    smbo.optimize().unwrap();
    assert_eq!(smbo.runhistory().len(), 9);
    assert_eq!(smbo.scenario().namespace(), "from_file/7");
}
