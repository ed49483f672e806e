//! The expensive ground-truth simulation.
//!
//! An [`Oracle`] maps a parameter vector to an output [`Field`] of fixed
//! shape. It must be pure and deterministic: the only state it may carry is
//! bookkeeping such as the call counter kept by [`CountingOracle`].
//!
//! ```
//! use smbo::oracle::{Field, FnOracle, Oracle};
//!
//! let oracle = FnOracle::new(2, (1, 2), |x: &[f64]| Field::from_row_slice(1, 2, x));
//! assert_eq!(oracle.simulate(&[0.1, 0.2]).unwrap()[(0, 1)], 0.2);
//! assert!(oracle.simulate(&[0.1]).is_err());
//! ```

use core::fmt;
use core::sync::atomic::{AtomicU64, Ordering};

use crate::error::{Error, Result};

/// The output of one simulation.
pub type Field = nalgebra::DMatrix<f64>;

/// A deterministic simulation oracle.
///
/// The trait requires `Send + Sync` so the initial design can be evaluated
/// concurrently under the `async` feature.
pub trait Oracle: Send + Sync {
    /// Number of scalar parameters the simulation expects.
    fn input_dim(&self) -> usize;

    /// `(rows, cols)` of every field returned by [`simulate`](Oracle::simulate).
    fn output_shape(&self) -> (usize, usize);

    /// Runs the simulation.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] when `x.len() != self.input_dim()`.
    fn simulate(&self, x: &[f64]) -> Result<Field>;
}

/// Rejects inputs whose length does not match the oracle's dimensionality.
///
/// # Errors
///
/// Returns [`Error::InvalidInput`] on a length mismatch.
pub fn check_input(oracle: &(impl Oracle + ?Sized), x: &[f64]) -> Result<()> {
    if x.len() == oracle.input_dim() {
        Ok(())
    } else {
        Err(Error::InvalidInput {
            expected: oracle.input_dim(),
            got: x.len(),
        })
    }
}

/// An oracle backed by a closure.
pub struct FnOracle<F> {
    input_dim: usize,
    output_shape: (usize, usize),
    f: F,
}

impl<F> FnOracle<F>
where
    F: Fn(&[f64]) -> Field + Send + Sync,
{
    /// Wraps `f`, declaring its input dimensionality and output shape.
    pub fn new(input_dim: usize, output_shape: (usize, usize), f: F) -> Self {
        Self {
            input_dim,
            output_shape,
            f,
        }
    }
}

impl<F> fmt::Debug for FnOracle<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnOracle")
            .field("input_dim", &self.input_dim)
            .field("output_shape", &self.output_shape)
            .finish_non_exhaustive()
    }
}

impl<F> Oracle for FnOracle<F>
where
    F: Fn(&[f64]) -> Field + Send + Sync,
{
    fn input_dim(&self) -> usize {
        self.input_dim
    }

    fn output_shape(&self) -> (usize, usize) {
        self.output_shape
    }

    fn simulate(&self, x: &[f64]) -> Result<Field> {
        check_input(self, x)?;
        let field = (self.f)(x);
        if field.shape() != self.output_shape {
            return Err(Error::Internal("oracle closure returned a field of the wrong shape"));
        }
        Ok(field)
    }
}

/// Counts calls to the wrapped oracle.
///
/// Rejected inputs are counted too: the call was made.
#[derive(Debug)]
pub struct CountingOracle<O> {
    inner: O,
    calls: AtomicU64,
}

impl<O: Oracle> CountingOracle<O> {
    /// Wraps `inner` with a zeroed counter.
    pub fn new(inner: O) -> Self {
        Self {
            inner,
            calls: AtomicU64::new(0),
        }
    }

    /// Number of `simulate` calls so far.
    #[must_use]
    pub fn calls(&self) -> u64 {
        self.calls.load(Ordering::SeqCst)
    }
}

impl<O: Oracle> Oracle for CountingOracle<O> {
    fn input_dim(&self) -> usize {
        self.inner.input_dim()
    }

    fn output_shape(&self) -> (usize, usize) {
        self.inner.output_shape()
    }

    fn simulate(&self, x: &[f64]) -> Result<Field> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.simulate(x)
    }
}

impl<O: Oracle + ?Sized> Oracle for std::sync::Arc<O> {
    fn input_dim(&self) -> usize {
        (**self).input_dim()
    }

    fn output_shape(&self) -> (usize, usize) {
        (**self).output_shape()
    }

    fn simulate(&self, x: &[f64]) -> Result<Field> {
        (**self).simulate(x)
    }
}
