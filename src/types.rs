//! Core types shared across the optimizer.

use serde::{Deserialize, Serialize};

/// The state of a trial once the oracle call has returned.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum TrialState {
    /// The oracle produced a finite cost.
    Complete,
    /// The oracle rejected the input or produced a non-finite cost.
    Failed,
}

/// Where the configuration of a trial came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConfigOrigin {
    /// Proposed by the space-filling initial design.
    InitialDesign,
    /// Selected by maximizing the acquisition function.
    Acquisition,
    /// Drawn uniformly at random by the random design.
    Random,
    /// A repeated evaluation requested by the intensifier.
    Intensification,
}
