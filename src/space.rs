//! Search domain: bounded continuous dimensions and the configurations
//! drawn from them.
//!
//! A [`ConfigurationSpace`] holds one [`FloatDimension`] per oracle input
//! component. [`ConfigurationSpace::uniform`] names the dimensions with
//! zero-padded indices (`"00"`, `"01"`, ...) so that lexical and positional
//! order agree.
//!
//! ```
//! use smbo::space::ConfigurationSpace;
//!
//! let space = ConfigurationSpace::uniform(3, 0.0, 2.0).unwrap();
//! let default = space.default_configuration();
//! assert_eq!(default.get("01"), Some(1.0));
//! assert_eq!(space.to_unit(&default), vec![0.5, 0.5, 0.5]);
//! ```

use core::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::rng_util;

/// A bounded continuous dimension.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FloatDimension {
    /// Dimension identifier.
    pub name: String,
    /// Lower bound (inclusive).
    pub low: f64,
    /// Upper bound (inclusive).
    pub high: f64,
    /// Value used by the default configuration.
    pub default: f64,
}

impl FloatDimension {
    /// Creates a dimension whose default is the midpoint of its bounds.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidBounds`] if a bound is not finite or
    /// `low > high`.
    pub fn new(name: impl Into<String>, low: f64, high: f64) -> Result<Self> {
        if !low.is_finite() || !high.is_finite() || low > high {
            return Err(Error::InvalidBounds { low, high });
        }
        Ok(Self {
            name: name.into(),
            low,
            high,
            default: low + 0.5 * (high - low),
        })
    }

    /// Overrides the default value, clamped into the bounds.
    #[must_use]
    pub fn with_default(mut self, default: f64) -> Self {
        self.default = default.clamp(self.low, self.high);
        self
    }

    fn to_unit(&self, value: f64) -> f64 {
        if (self.high - self.low).abs() < 1e-15 {
            0.5
        } else {
            (value - self.low) / (self.high - self.low)
        }
    }

    fn from_unit(&self, u: f64) -> f64 {
        (self.low + u.clamp(0.0, 1.0) * (self.high - self.low)).clamp(self.low, self.high)
    }
}

/// The search domain.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ConfigurationSpace {
    dimensions: Vec<FloatDimension>,
    names: Arc<[String]>,
}

impl ConfigurationSpace {
    /// Creates an empty space.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates `n` dimensions named `"00"`, `"01"`, ... sharing the same bounds.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidBounds`] for invalid bounds.
    pub fn uniform(n: usize, low: f64, high: f64) -> Result<Self> {
        let mut space = Self::new();
        for i in 0..n {
            space.add(FloatDimension::new(format!("{i:02}"), low, high)?)?;
        }
        Ok(space)
    }

    /// Appends a dimension.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] if a dimension with the same name exists.
    pub fn add(&mut self, dimension: FloatDimension) -> Result<()> {
        if self.dimensions.iter().any(|d| d.name == dimension.name) {
            return Err(Error::InvalidConfig(format!(
                "duplicate dimension name '{}'",
                dimension.name
            )));
        }
        self.dimensions.push(dimension);
        self.names = self.dimensions.iter().map(|d| d.name.clone()).collect();
        Ok(())
    }

    /// Number of dimensions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.dimensions.len()
    }

    /// Whether the space has no dimensions.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.dimensions.is_empty()
    }

    /// The dimensions in declaration order.
    #[must_use]
    pub fn dimensions(&self) -> &[FloatDimension] {
        &self.dimensions
    }

    /// Dimension names in declaration order.
    #[must_use]
    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// The configuration holding every dimension's default value.
    #[must_use]
    pub fn default_configuration(&self) -> Configuration {
        self.configuration(self.dimensions.iter().map(|d| d.default).collect())
    }

    /// Draws a configuration uniformly at random.
    pub fn sample_random(&self, rng: &mut fastrand::Rng) -> Configuration {
        self.configuration(
            self.dimensions
                .iter()
                .map(|d| rng_util::f64_range(rng, d.low, d.high))
                .collect(),
        )
    }

    /// Maps a point of the unit hypercube onto the space, clamping
    /// out-of-range coordinates.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DimensionMismatch`] if `unit` has the wrong length.
    pub fn from_unit(&self, unit: &[f64]) -> Result<Configuration> {
        if unit.len() != self.len() {
            return Err(Error::DimensionMismatch {
                expected: self.len(),
                got: unit.len(),
            });
        }
        Ok(self.configuration(
            self.dimensions
                .iter()
                .zip(unit)
                .map(|(d, &u)| d.from_unit(u))
                .collect(),
        ))
    }

    /// Encodes a configuration into the unit hypercube.
    #[must_use]
    pub fn to_unit(&self, config: &Configuration) -> Vec<f64> {
        self.dimensions
            .iter()
            .zip(config.values())
            .map(|(d, &v)| d.to_unit(v))
            .collect()
    }

    /// Builds a configuration from raw values.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DimensionMismatch`] for a wrong number of values and
    /// [`Error::InvalidBounds`] if a value lies outside its dimension.
    pub fn configuration_from(&self, values: Vec<f64>) -> Result<Configuration> {
        if values.len() != self.len() {
            return Err(Error::DimensionMismatch {
                expected: self.len(),
                got: values.len(),
            });
        }
        for (d, &v) in self.dimensions.iter().zip(&values) {
            if !(d.low..=d.high).contains(&v) {
                return Err(Error::InvalidBounds {
                    low: d.low,
                    high: d.high,
                });
            }
        }
        Ok(self.configuration(values))
    }

    /// Whether the configuration belongs to this space.
    #[must_use]
    pub fn contains(&self, config: &Configuration) -> bool {
        config.len() == self.len()
            && self
                .dimensions
                .iter()
                .zip(config.iter())
                .all(|(d, (name, v))| d.name == name && (d.low..=d.high).contains(&v))
    }

    fn configuration(&self, values: Vec<f64>) -> Configuration {
        Configuration {
            names: Arc::clone(&self.names),
            values,
        }
    }
}

/// An immutable assignment of a value to every dimension of a space.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Configuration {
    names: Arc<[String]>,
    values: Vec<f64>,
}

impl Configuration {
    /// The value for the named dimension.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<f64> {
        self.names
            .iter()
            .position(|n| n == name)
            .map(|i| self.values[i])
    }

    /// Values in dimension order; this is what the oracle receives.
    #[must_use]
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Number of dimensions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether the configuration is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// `(name, value)` pairs in dimension order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.names
            .iter()
            .map(String::as_str)
            .zip(self.values.iter().copied())
    }

    /// Bit-exact key used to deduplicate configurations.
    pub(crate) fn key(&self) -> Vec<u64> {
        self.values.iter().map(|v| v.to_bits()).collect()
    }
}

impl fmt::Display for Configuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("{")?;
        for (i, (name, value)) in self.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{name}: {value:.6}")?;
        }
        f.write_str("}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uniform_names_are_zero_padded() {
        let space = ConfigurationSpace::uniform(12, 0.01, 1.0).unwrap();
        assert_eq!(space.names()[0], "00");
        assert_eq!(space.names()[11], "11");
    }

    #[test]
    fn default_is_midpoint() {
        let space = ConfigurationSpace::uniform(2, 0.0, 2.0).unwrap();
        assert_eq!(space.default_configuration().values(), &[1.0, 1.0]);
    }

    #[test]
    fn rejects_inverted_bounds() {
        assert!(matches!(
            FloatDimension::new("x", 1.0, 0.0),
            Err(Error::InvalidBounds { .. })
        ));
        assert!(FloatDimension::new("x", f64::NAN, 1.0).is_err());
    }

    #[test]
    fn rejects_duplicate_names() {
        let mut space = ConfigurationSpace::new();
        space.add(FloatDimension::new("a", 0.0, 1.0).unwrap()).unwrap();
        assert!(space.add(FloatDimension::new("a", 0.0, 1.0).unwrap()).is_err());
    }

    #[test]
    fn random_samples_stay_in_bounds() {
        let space = ConfigurationSpace::uniform(4, 0.01, 1.0).unwrap();
        let mut rng = fastrand::Rng::with_seed(7);
        for _ in 0..200 {
            let c = space.sample_random(&mut rng);
            assert!(space.contains(&c));
        }
    }

    #[test]
    fn unit_mapping_clamps() {
        let space = ConfigurationSpace::uniform(2, 0.0, 2.0).unwrap();
        let c = space.from_unit(&[-0.5, 1.5]).unwrap();
        assert_eq!(c.values(), &[0.0, 2.0]);
        assert!(space.from_unit(&[0.5]).is_err());
    }

    #[test]
    fn configuration_from_checks_bounds() {
        let space = ConfigurationSpace::uniform(1, 0.01, 1.0).unwrap();
        assert!(space.configuration_from(vec![0.5]).is_ok());
        assert!(space.configuration_from(vec![2.0]).is_err());
        assert!(space.configuration_from(vec![0.5, 0.5]).is_err());
    }

    #[test]
    fn display_lists_named_values() {
        let space = ConfigurationSpace::uniform(2, 0.0, 1.0).unwrap();
        let c = space.default_configuration();
        assert_eq!(c.to_string(), "{00: 0.500000, 01: 0.500000}");
    }
}
