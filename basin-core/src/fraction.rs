use std::fmt;

use thiserror::Error;

use crate::expr::Expr;

/// A value in `[0, 1]`, such as an efficiency or a replacement rate.
///
/// A `Fraction` converts into a constant [`Expr`], so it can appear
/// directly in constraint bodies:
///
/// ```
/// use basin_core::{Fraction, expr::Expr};
///
/// let efficiency = Fraction::new(0.9).unwrap();
/// let derated: Expr = Expr::Const(100.0) * efficiency;
/// assert!((derated.eval(&basin_core::model::Model::steady_state("m")) - 90.0).abs() < 1e-12);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
#[cfg_attr(
    feature = "serde-derive",
    derive(serde::Serialize, serde::Deserialize)
)]
#[cfg_attr(feature = "serde-derive", serde(try_from = "f64", into = "f64"))]
pub struct Fraction(f64);

/// Error returned when constructing an invalid [`Fraction`].
#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum FractionError {
    #[error("fraction must be finite, got {0}")]
    NotFinite(f64),
    #[error("fraction must lie in [0, 1], got {0}")]
    OutOfRange(f64),
}

impl Fraction {
    pub const ZERO: Self = Self(0.0);
    pub const ONE: Self = Self(1.0);

    /// Creates a fraction.
    ///
    /// # Errors
    ///
    /// Returns [`FractionError::NotFinite`] for `NaN` or infinite values and
    /// [`FractionError::OutOfRange`] for values outside `[0, 1]`.
    pub fn new(value: f64) -> Result<Self, FractionError> {
        if !value.is_finite() {
            return Err(FractionError::NotFinite(value));
        }
        if !(0.0..=1.0).contains(&value) {
            return Err(FractionError::OutOfRange(value));
        }
        Ok(Self(value))
    }

    /// Creates a fraction from a percentage.
    ///
    /// # Errors
    ///
    /// Same as [`Fraction::new`] applied to `percent / 100`.
    pub fn from_percent(percent: f64) -> Result<Self, FractionError> {
        Self::new(percent / 100.0)
    }

    #[must_use]
    pub fn get(self) -> f64 {
        self.0
    }

    /// Returns `1 - self`.
    #[must_use]
    pub fn complement(self) -> Self {
        Self(1.0 - self.0)
    }

    #[must_use]
    pub fn is_zero(self) -> bool {
        self.0 == 0.0
    }
}

impl TryFrom<f64> for Fraction {
    type Error = FractionError;

    fn try_from(value: f64) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Fraction> for f64 {
    fn from(fraction: Fraction) -> Self {
        fraction.0
    }
}

impl From<Fraction> for Expr {
    fn from(fraction: Fraction) -> Self {
        Expr::Const(fraction.0)
    }
}

impl fmt::Display for Fraction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}%", self.0 * 100.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use approx::assert_relative_eq;

    #[test]
    fn accepts_closed_unit_interval() {
        assert_eq!(Fraction::new(0.0).unwrap(), Fraction::ZERO);
        assert_eq!(Fraction::new(1.0).unwrap(), Fraction::ONE);
        assert_relative_eq!(Fraction::from_percent(90.0).unwrap().get(), 0.9);
    }

    #[test]
    fn rejects_values_outside_unit_interval() {
        assert_eq!(Fraction::new(1.01), Err(FractionError::OutOfRange(1.01)));
        assert_eq!(Fraction::new(-0.2), Err(FractionError::OutOfRange(-0.2)));
        assert!(matches!(
            Fraction::try_from(f64::NAN),
            Err(FractionError::NotFinite(_))
        ));
    }

    #[test]
    fn complement_and_display() {
        let f = Fraction::new(0.25).unwrap();
        assert_relative_eq!(f.complement().get(), 0.75);
        assert_eq!(f.to_string(), "25%");
        assert!(Fraction::ZERO.is_zero());
    }
}
