//! Side-effecting observers of the optimization loop.
//!
//! A [`Callback`] is notified when the run starts, after every trial, and
//! when the run ends. Callbacks cannot influence the loop: any error they
//! return is logged by the driver and otherwise ignored.
//!
//! [`SaveAngleCallback`] records the orientation of each trial's output
//! field as JSON lines under `{root}/{experiment_name}/{seed}/angles.jsonl`.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use fs2::FileExt;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::oracle::{Field, Oracle};
use crate::runhistory::TrialRecord;
use crate::scenario::Scenario;
use crate::space::Configuration;

/// Observer of the optimization loop. Every hook defaults to a no-op.
pub trait Callback: Send {
    /// Called once before the first trial.
    ///
    /// # Errors
    ///
    /// Any error is logged and ignored by the driver.
    fn on_start(&mut self, scenario: &Scenario) -> Result<()> {
        let _ = scenario;
        Ok(())
    }

    /// Called after every trial has been recorded.
    ///
    /// # Errors
    ///
    /// Any error is logged and ignored by the driver.
    fn on_trial_end(&mut self, record: &TrialRecord) -> Result<()> {
        let _ = record;
        Ok(())
    }

    /// Called once after the budget is spent, with the final incumbent.
    ///
    /// # Errors
    ///
    /// Any error is logged and ignored by the driver.
    fn on_end(&mut self, incumbent: Option<&Configuration>) -> Result<()> {
        let _ = incumbent;
        Ok(())
    }
}

/// Orientation of a field in degrees, in `(-90, 90]`.
///
/// Computed from the second-order central moments of `|field|`, with
/// columns as the x axis and rows as the y axis. Returns `None` for an
/// all-zero or non-finite field.
///
/// ```
/// use smbo::callback::field_orientation;
/// use smbo::oracle::Field;
///
/// let diagonal = Field::identity(3, 3);
/// assert!((field_orientation(&diagonal).unwrap() - 45.0).abs() < 1e-9);
/// ```
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn field_orientation(field: &Field) -> Option<f64> {
    if field.iter().any(|v| !v.is_finite()) {
        return None;
    }
    let cells = || {
        (0..field.nrows()).flat_map(move |i| {
            (0..field.ncols()).map(move |j| (j as f64, i as f64, field[(i, j)].abs()))
        })
    };
    let total: f64 = cells().map(|(_, _, w)| w).sum();
    if total <= 0.0 {
        return None;
    }
    let cx = cells().map(|(x, _, w)| x * w).sum::<f64>() / total;
    let cy = cells().map(|(_, y, w)| y * w).sum::<f64>() / total;
    let (mut mu20, mut mu02, mut mu11) = (0.0, 0.0, 0.0);
    for (x, y, w) in cells() {
        mu20 += w * (x - cx).powi(2);
        mu02 += w * (y - cy).powi(2);
        mu11 += w * (x - cx) * (y - cy);
    }
    Some(0.5 * (2.0 * mu11).atan2(mu20 - mu02).to_degrees())
}

/// One line of the angle log.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AngleRecord {
    /// Trial index.
    pub trial: usize,
    /// Config id of the trial.
    pub config_id: usize,
    /// Observed cost; `None` for failed trials.
    pub cost: Option<f64>,
    /// Field orientation in degrees; `None` when no field is available.
    pub angle: Option<f64>,
}

/// Records the field orientation of every trial.
///
/// With an oracle attached ([`with_oracle`](Self::with_oracle)) the final
/// incumbent is simulated once more at the end of the run and its angle is
/// written to `incumbent.json` next to the log.
pub struct SaveAngleCallback {
    dir: PathBuf,
    oracle: Option<Arc<dyn Oracle>>,
    recorded: Vec<AngleRecord>,
}

impl SaveAngleCallback {
    /// Creates a callback writing under `root/namespace`, where the
    /// namespace is `{experiment_name}/{seed}` (see
    /// [`Scenario::namespace`]).
    pub fn new(root: impl AsRef<Path>, namespace: &str) -> Self {
        Self {
            dir: root.as_ref().join(namespace),
            oracle: None,
            recorded: Vec::new(),
        }
    }

    /// Attaches the oracle used to measure the final incumbent.
    #[must_use]
    pub fn with_oracle(mut self, oracle: Arc<dyn Oracle>) -> Self {
        self.oracle = Some(oracle);
        self
    }

    /// Directory the callback writes into.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the JSONL angle log.
    #[must_use]
    pub fn log_path(&self) -> PathBuf {
        self.dir.join("angles.jsonl")
    }

    /// Records written so far.
    #[must_use]
    pub fn recorded(&self) -> &[AngleRecord] {
        &self.recorded
    }

    fn append(&self, record: &AngleRecord) -> Result<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.log_path())?;
        file.lock_exclusive()?;
        let line = serde_json::to_string(record)?;
        writeln!(file, "{line}")?;
        file.flush()?;
        file.unlock()?;
        Ok(())
    }
}

impl Callback for SaveAngleCallback {
    fn on_start(&mut self, _scenario: &Scenario) -> Result<()> {
        fs::create_dir_all(&self.dir)?;
        Ok(())
    }

    fn on_trial_end(&mut self, record: &TrialRecord) -> Result<()> {
        let entry = AngleRecord {
            trial: record.trial,
            config_id: record.config_id,
            cost: Some(record.cost).filter(|c| c.is_finite()),
            angle: record.output.as_deref().and_then(field_orientation),
        };
        self.recorded.push(entry.clone());
        self.append(&entry)
    }

    fn on_end(&mut self, incumbent: Option<&Configuration>) -> Result<()> {
        let (Some(oracle), Some(config)) = (&self.oracle, incumbent) else {
            return Ok(());
        };
        let angle = field_orientation(&oracle.simulate(config.values())?);
        let summary = serde_json::json!({ "config": config, "angle": angle });
        fs::write(self.dir.join("incumbent.json"), serde_json::to_vec_pretty(&summary)?)?;
        Ok(())
    }
}
