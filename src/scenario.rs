use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Run-level settings: experiment identity and budget.
///
/// Every field has a default, so a JSON scenario file only needs the
/// fields it changes:
///
/// ```
/// use smbo::Scenario;
///
/// let s: Scenario = serde_json::from_str(r#"{ "name": "sbo", "seed": 3 }"#).unwrap();
/// assert_eq!(s.n_trials, 150);
/// assert_eq!(s.namespace(), "sbo/3");
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Scenario {
    /// Experiment name.
    pub name: String,
    /// Seed for every stochastic component of the run.
    pub seed: u64,
    /// Number of oracle evaluations.
    pub n_trials: usize,
    /// Whether the objective is deterministic. Repeated evaluations then
    /// all run under `seed`; otherwise evaluation `k` runs under `seed + k`.
    pub deterministic: bool,
    /// Directory for run artifacts (history, telemetry).
    pub output_directory: PathBuf,
}

impl Default for Scenario {
    fn default() -> Self {
        Self {
            name: "smbo".into(),
            seed: 0,
            n_trials: 150,
            deterministic: true,
            output_directory: PathBuf::from("smbo_output"),
        }
    }
}

impl Scenario {
    /// Creates a builder starting from the defaults.
    #[must_use]
    pub fn builder() -> ScenarioBuilder {
        ScenarioBuilder::default()
    }

    /// `{name}/{seed}`, unique per run.
    #[must_use]
    pub fn namespace(&self) -> String {
        format!("{}/{}", self.name, self.seed)
    }

    /// Directory for this run's artifacts: `output_directory/name/seed`.
    #[must_use]
    pub fn run_directory(&self) -> PathBuf {
        self.output_directory.join(&self.name).join(self.seed.to_string())
    }

    /// Reads a scenario from a JSON file.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Storage`](crate::Error::Storage) if the file cannot
    /// be read or parsed.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path)?;
        Ok(serde_json::from_reader(BufReader::new(file))?)
    }
}

/// Builder for [`Scenario`].
///
/// Defaults:
/// - `name`: `"smbo"`
/// - `seed`: 0
/// - `n_trials`: 150
/// - `deterministic`: true
/// - `output_directory`: `"smbo_output"`
#[derive(Clone, Debug, Default)]
pub struct ScenarioBuilder {
    scenario: Scenario,
}

impl ScenarioBuilder {
    /// Sets the experiment name.
    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.scenario.name = name.into();
        self
    }

    /// Sets the seed.
    #[must_use]
    pub fn seed(mut self, seed: u64) -> Self {
        self.scenario.seed = seed;
        self
    }

    /// Sets the number of oracle evaluations.
    #[must_use]
    pub fn n_trials(mut self, n: usize) -> Self {
        self.scenario.n_trials = n;
        self
    }

    /// Marks the objective as deterministic or not.
    #[must_use]
    pub fn deterministic(mut self, deterministic: bool) -> Self {
        self.scenario.deterministic = deterministic;
        self
    }

    /// Sets the artifact directory.
    #[must_use]
    pub fn output_directory(mut self, dir: impl Into<PathBuf>) -> Self {
        self.scenario.output_directory = dir.into();
        self
    }

    /// Finishes the scenario.
    #[must_use]
    pub fn build(self) -> Scenario {
        self.scenario
    }
}
