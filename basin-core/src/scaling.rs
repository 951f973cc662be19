//! Scaling factors for solver conditioning.
//!
//! A scaling factor multiplies a variable or a constraint residual so that
//! the quantities a solver sees are of order one. Factors never change the
//! solution of a model, only how well-conditioned it is.

use std::collections::BTreeMap;

use thiserror::Error;
use tracing::warn;

use crate::model::{Model, VarId};

/// Error returned when constructing an invalid [`ScalingFactor`].
#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum ScalingError {
    #[error("scaling factor must be finite, got {0}")]
    NotFinite(f64),
    #[error("scaling factor must be positive, got {0}")]
    NotPositive(f64),
}

/// A strictly positive, finite multiplier.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
#[cfg_attr(
    feature = "serde-derive",
    derive(serde::Serialize, serde::Deserialize)
)]
pub struct ScalingFactor(f64);

impl ScalingFactor {
    pub const ONE: Self = Self(1.0);

    /// Creates a scaling factor.
    ///
    /// # Errors
    ///
    /// Returns an error if `value` is not finite or not strictly positive.
    pub fn new(value: f64) -> Result<Self, ScalingError> {
        if !value.is_finite() {
            return Err(ScalingError::NotFinite(value));
        }
        if value <= 0.0 {
            return Err(ScalingError::NotPositive(value));
        }
        Ok(Self(value))
    }

    /// Creates a scaling factor from a literal known to be valid.
    ///
    /// # Panics
    ///
    /// Panics if `value` is not finite and strictly positive, which also
    /// makes an invalid literal in a `const` context a compile error.
    #[must_use]
    pub const fn of(value: f64) -> Self {
        assert!(value.is_finite() && value > 0.0, "invalid scaling factor");
        Self(value)
    }

    #[must_use]
    pub fn get(self) -> f64 {
        self.0
    }
}

impl Default for ScalingFactor {
    fn default() -> Self {
        Self::ONE
    }
}

/// Per-variable scaling factors.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScalingFactors {
    vars: BTreeMap<VarId, ScalingFactor>,
}

impl ScalingFactors {
    /// Sets the factor for `var`, replacing any previous value.
    pub fn set(&mut self, var: VarId, factor: ScalingFactor) {
        self.vars.insert(var, factor);
    }

    /// Sets the factor for `var` unless one is already present.
    ///
    /// Default hints go through this so that user-supplied factors win.
    pub fn set_if_unset(&mut self, var: VarId, factor: ScalingFactor) {
        self.vars.entry(var).or_insert(factor);
    }

    #[must_use]
    pub fn get(&self, var: VarId) -> Option<ScalingFactor> {
        self.vars.get(&var).copied()
    }

    pub fn remove(&mut self, var: VarId) -> Option<ScalingFactor> {
        self.vars.remove(&var)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.vars.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }
}

/// Returns the scaling factor of `var`, or `default` if none is set.
///
/// When `warn_if_missing` is true a missing factor is logged as a warning.
#[must_use]
pub fn get_scaling_factor(
    model: &Model,
    var: VarId,
    default: ScalingFactor,
    warn_if_missing: bool,
) -> ScalingFactor {
    if let Some(factor) = model.scaling().get(var) {
        return factor;
    }
    if warn_if_missing {
        warn!(
            variable = %model.var(var).full_name(),
            default = default.get(),
            "missing scaling factor, using default"
        );
    }
    default
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::{model::Variable, units::Units};

    #[test]
    fn rejects_invalid_factors() {
        assert_eq!(ScalingFactor::new(0.0), Err(ScalingError::NotPositive(0.0)));
        assert_eq!(ScalingFactor::new(-1.0), Err(ScalingError::NotPositive(-1.0)));
        assert!(matches!(
            ScalingFactor::new(f64::NAN),
            Err(ScalingError::NotFinite(_))
        ));
        assert_eq!(ScalingFactor::new(1e-2).unwrap().get(), 1e-2);
    }

    #[test]
    fn user_factors_survive_default_hints() {
        let mut model = Model::steady_state("test");
        let v = model.add_var(Variable::new("volume", Units::cubic_meter()));

        model.scaling_mut().set(v, ScalingFactor::of(5.0));
        model.scaling_mut().set_if_unset(v, ScalingFactor::of(1e-2));
        assert_eq!(model.scaling().get(v), Some(ScalingFactor::of(5.0)));
    }

    #[test]
    fn missing_factor_falls_back_to_default() {
        let mut model = Model::steady_state("test");
        let v = model.add_var(Variable::new("pressure", Units::pascal()));

        let factor = get_scaling_factor(&model, v, ScalingFactor::ONE, true);
        assert_eq!(factor, ScalingFactor::ONE);

        model.scaling_mut().set(v, ScalingFactor::of(1e-5));
        let factor = get_scaling_factor(&model, v, ScalingFactor::ONE, true);
        assert_eq!(factor.get(), 1e-5);
    }
}
