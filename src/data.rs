//! Offline datasets used to warm-start a learned surrogate.
//!
//! A [`DataLoader`] produces a [`Dataset`] of `(features, targets)` rows.
//! [`CsvDataLoader`] reads a numeric CSV file in which the first
//! `n_features` columns are the simulation parameters and the remaining
//! columns are the flattened output field. [`InMemoryDataLoader`] serves a
//! dataset built in code.

use std::fs;
use std::path::PathBuf;

use crate::error::{Error, Result};

/// Paired feature/target rows.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Dataset {
    /// Input rows.
    pub features: Vec<Vec<f64>>,
    /// Target rows, one per input row.
    pub targets: Vec<Vec<f64>>,
}

impl Dataset {
    /// Creates a dataset, checking that rows pair up and are rectangular.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Data`] when the row counts differ or a row has a
    /// different width than the first one.
    pub fn new(features: Vec<Vec<f64>>, targets: Vec<Vec<f64>>) -> Result<Self> {
        if features.len() != targets.len() {
            return Err(Error::Data(format!(
                "{} feature rows but {} target rows",
                features.len(),
                targets.len()
            )));
        }
        check_rectangular("feature", &features)?;
        check_rectangular("target", &targets)?;
        Ok(Self { features, targets })
    }

    /// Number of rows.
    #[must_use]
    pub fn len(&self) -> usize {
        self.features.len()
    }

    /// Whether the dataset has no rows.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    /// Width of a feature row (0 for an empty dataset).
    #[must_use]
    pub fn n_features(&self) -> usize {
        self.features.first().map_or(0, Vec::len)
    }

    /// Width of a target row (0 for an empty dataset).
    #[must_use]
    pub fn n_targets(&self) -> usize {
        self.targets.first().map_or(0, Vec::len)
    }
}

fn check_rectangular(what: &str, rows: &[Vec<f64>]) -> Result<()> {
    let Some(first) = rows.first() else {
        return Ok(());
    };
    if let Some((i, row)) = rows.iter().enumerate().find(|(_, r)| r.len() != first.len()) {
        return Err(Error::Data(format!(
            "{what} row {i} has {} columns, expected {}",
            row.len(),
            first.len()
        )));
    }
    Ok(())
}

/// Source of an offline dataset.
pub trait DataLoader: Send + Sync {
    /// Loads the dataset.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Data`] when the source cannot be read or parsed.
    fn load(&self) -> Result<Dataset>;
}

/// Reads a numeric CSV file.
///
/// Empty lines are skipped. Every other line must contain more than
/// `n_features` comma-separated numbers.
#[derive(Clone, Debug)]
pub struct CsvDataLoader {
    path: PathBuf,
    n_features: usize,
    has_header: bool,
}

impl CsvDataLoader {
    /// Creates a loader for `path` whose first `n_features` columns are
    /// inputs. A header line is expected by default.
    pub fn new(path: impl Into<PathBuf>, n_features: usize) -> Self {
        Self {
            path: path.into(),
            n_features,
            has_header: true,
        }
    }

    /// Sets whether the first line is a header.
    #[must_use]
    pub fn has_header(mut self, has_header: bool) -> Self {
        self.has_header = has_header;
        self
    }

    fn parse(&self, text: &str) -> Result<Dataset> {
        let mut features = Vec::new();
        let mut targets = Vec::new();
        let lines = text.lines().enumerate().skip(usize::from(self.has_header));
        for (lineno, line) in lines {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let row = line
                .split(',')
                .map(|cell| {
                    cell.trim().parse::<f64>().map_err(|e| {
                        Error::Data(format!("line {}: '{}': {e}", lineno + 1, cell.trim()))
                    })
                })
                .collect::<Result<Vec<f64>>>()?;
            if row.len() <= self.n_features {
                return Err(Error::Data(format!(
                    "line {}: {} columns, need more than {} feature columns",
                    lineno + 1,
                    row.len(),
                    self.n_features
                )));
            }
            let (x, y) = row.split_at(self.n_features);
            features.push(x.to_vec());
            targets.push(y.to_vec());
        }
        Dataset::new(features, targets)
    }
}

impl DataLoader for CsvDataLoader {
    fn load(&self) -> Result<Dataset> {
        let text = fs::read_to_string(&self.path)
            .map_err(|e| Error::Data(format!("{}: {e}", self.path.display())))?;
        self.parse(&text)
    }
}

/// Serves a dataset held in memory.
#[derive(Clone, Debug, Default)]
pub struct InMemoryDataLoader {
    dataset: Dataset,
}

impl InMemoryDataLoader {
    /// Wraps an existing dataset.
    #[must_use]
    pub fn new(dataset: Dataset) -> Self {
        Self { dataset }
    }
}

impl DataLoader for InMemoryDataLoader {
    fn load(&self) -> Result<Dataset> {
        Ok(self.dataset.clone())
    }
}
