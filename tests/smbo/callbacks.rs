use core::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::path::PathBuf;
use std::sync::Arc;

use smbo::callback::AngleRecord;
use smbo::prelude::*;

use crate::{base_builder, identity_oracle};

static COUNTER: AtomicU64 = AtomicU64::new(0);

fn temp_root() -> PathBuf {
    let n = COUNTER.fetch_add(1, Ordering::Relaxed);
    std::env::temp_dir().join(format!("smbo_cb_{}_{n}", std::process::id()))
}

#[derive(Default)]
struct Counts {
    starts: AtomicUsize,
    trials: AtomicUsize,
    ends: AtomicUsize,
}

struct Counting(Arc<Counts>);

impl Callback for Counting {
    fn on_start(&mut self, _scenario: &Scenario) -> smbo::Result<()> {
        self.0.starts.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    fn on_trial_end(&mut self, _record: &TrialRecord) -> smbo::Result<()> {
        self.0.trials.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    fn on_end(&mut self, incumbent: Option<&Configuration>) -> smbo::Result<()> {
        assert!(incumbent.is_some());
        self.0.ends.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}

struct AlwaysFails;

impl Callback for AlwaysFails {
    fn on_start(&mut self, _scenario: &Scenario) -> smbo::Result<()> {
        Err(Error::Storage("disk full".into()))
    }

    fn on_trial_end(&mut self, _record: &TrialRecord) -> smbo::Result<()> {
        Err(Error::Storage("disk full".into()))
    }

    fn on_end(&mut self, _incumbent: Option<&Configuration>) -> smbo::Result<()> {
        Err(Error::Storage("disk full".into()))
    }
}

#[test]
fn hooks_fire_once_per_event() {
    let counts = Arc::new(Counts::default());
    let mut smbo = base_builder(2, 15, 0)
        .callback(Counting(Arc::clone(&counts)))
        .build()
        .unwrap();
    smbo.optimize().unwrap();
    assert_eq!(counts.starts.load(Ordering::Relaxed), 1);
    assert_eq!(counts.trials.load(Ordering::Relaxed), 15);
    assert_eq!(counts.ends.load(Ordering::Relaxed), 1);
}

#[test]
fn failing_callback_does_not_stop_the_run() {
    let counts = Arc::new(Counts::default());
    let mut smbo = base_builder(2, 15, 0)
        .callback(AlwaysFails)
        .callback(Counting(Arc::clone(&counts)))
        .build()
        .unwrap();
    assert!(smbo.optimize().is_ok());
    assert_eq!(smbo.runhistory().len(), 15);
    assert_eq!(counts.trials.load(Ordering::Relaxed), 15);
}

#[test]
fn angle_log_has_one_line_per_trial() {
    let root = temp_root();
    let scenario = Scenario::builder().name("angles").seed(2).n_trials(12).build();
    let oracle: Arc<dyn Oracle> = Arc::new(identity_oracle(2));
    let callback = SaveAngleCallback::new(&root, &scenario.namespace()).with_oracle(Arc::clone(&oracle));
    let log = callback.log_path();
    let dir = callback.dir().to_path_buf();

    let mut smbo = base_builder(2, 12, 2)
        .scenario(scenario)
        .oracle(oracle)
        .callback(callback)
        .build()
        .unwrap();
    smbo.optimize().unwrap();

    let text = std::fs::read_to_string(&log).unwrap();
    let lines: Vec<AngleRecord> = text
        .lines()
        .map(|l| serde_json::from_str(l).unwrap())
        .collect();
    let incumbent_written = dir.join("incumbent.json").exists();
    let _ = std::fs::remove_dir_all(&root);

    assert_eq!(dir, root.join("angles").join("2"));
    assert_eq!(lines.len(), 12);
    for (i, line) in lines.iter().enumerate() {
        assert_eq!(line.trial, i);
        // A 1 x 2 row with positive entries is horizontal.
        assert!(line.angle.unwrap().abs() < 1e-9);
    }
    assert!(incumbent_written);
}
