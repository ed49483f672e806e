#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Returned when the oracle receives an input of the wrong dimensionality.
    #[error("invalid input: expected {expected} components, got {got}")]
    InvalidInput {
        /// The oracle's declared input dimensionality.
        expected: usize,
        /// The length of the rejected input.
        got: usize,
    },

    /// Returned when an acquisition function is computed before a fitted
    /// surrogate has been bound to it, or when an unfitted surrogate is
    /// asked for predictions.
    #[error("acquisition function or surrogate used before a fitted model was attached")]
    NotFitted,

    /// Returned when the lower bound is greater than the upper bound, or a
    /// bound is not finite.
    #[error("invalid bounds: low ({low}) must be finite and less than or equal to high ({high})")]
    InvalidBounds {
        /// The lower bound value.
        low: f64,
        /// The upper bound value.
        high: f64,
    },

    /// Returned when two collaborators disagree on a dimensionality.
    #[error("dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch {
        /// The expected dimensionality.
        expected: usize,
        /// The dimensionality actually provided.
        got: usize,
    },

    /// Returned when a surrogate refit has no usable observations.
    #[error("surrogate training set is empty")]
    EmptyTrainingSet,

    /// Returned when fitting the surrogate's internal model fails.
    #[error("surrogate fit failed: {0}")]
    SurrogateFit(String),

    /// Returned by builders when the optimizer is wired incorrectly.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Returned when a dataset cannot be read or parsed.
    #[error("data error: {0}")]
    Data(String),

    /// Returned when a persistence operation fails.
    #[error("storage error: {0}")]
    Storage(String),

    /// Returned when requesting an incumbent but no trial has completed.
    #[error("no completed trials available")]
    NoCompletedTrials,

    /// Returned when an async task fails.
    #[cfg(feature = "async")]
    #[error("async task error: {0}")]
    TaskError(String),

    /// Returned when an internal invariant is violated.
    #[error("internal error: {0}")]
    Internal(&'static str),
}

pub type Result<T> = core::result::Result<T, Error>;

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Storage(e.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Storage(e.to_string())
    }
}
