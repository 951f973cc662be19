use crate::{
    expr::{Expr, Values},
    scaling::ScalingFactor,
};

use super::{Index, VarId};

/// An equality constraint `lhs == rhs`.
///
/// The residual is `lhs - rhs`. A constraint may carry a scaling factor that
/// multiplies its residual for solver conditioning; setting a new factor
/// replaces the old one rather than compounding with it.
#[derive(Debug, Clone, PartialEq)]
pub struct Constraint {
    name: String,
    index: Index,
    lhs: Expr,
    rhs: Expr,
    active: bool,
    scaling: Option<ScalingFactor>,
    incidence: Vec<VarId>,
}

impl Constraint {
    /// Creates an active, unscaled equality constraint.
    pub fn equality(name: impl Into<String>, lhs: impl Into<Expr>, rhs: impl Into<Expr>) -> Self {
        let lhs = lhs.into();
        let rhs = rhs.into();
        let mut vars = lhs.variables();
        vars.extend(rhs.variables());
        Self {
            name: name.into(),
            index: Index::Scalar,
            lhs,
            rhs,
            active: true,
            scaling: None,
            incidence: vars.into_iter().collect(),
        }
    }

    #[must_use]
    pub fn with_index(mut self, index: Index) -> Self {
        self.index = index;
        self
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn index(&self) -> &Index {
        &self.index
    }

    #[must_use]
    pub fn full_name(&self) -> String {
        format!("{}{}", self.name, self.index)
    }

    #[must_use]
    pub fn lhs(&self) -> &Expr {
        &self.lhs
    }

    #[must_use]
    pub fn rhs(&self) -> &Expr {
        &self.rhs
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Returns the residual scaling factor, if one has been set.
    #[must_use]
    pub fn scaling(&self) -> Option<ScalingFactor> {
        self.scaling
    }

    /// Variables referenced by either side, sorted and deduplicated.
    #[must_use]
    pub fn incidence(&self) -> &[VarId] {
        &self.incidence
    }

    #[must_use]
    pub fn involves(&self, var: VarId) -> bool {
        self.incidence.binary_search(&var).is_ok()
    }

    /// Returns `lhs - rhs`.
    pub fn residual<V: Values + ?Sized>(&self, values: &V) -> f64 {
        self.lhs.eval(values) - self.rhs.eval(values)
    }

    /// Returns the residual multiplied by the scaling factor (1 if unset).
    pub fn scaled_residual<V: Values + ?Sized>(&self, values: &V) -> f64 {
        self.scaling.map_or(1.0, ScalingFactor::get) * self.residual(values)
    }

    /// Returns the residual and its partial derivative with respect to `wrt`.
    pub fn residual_with_derivative<V: Values + ?Sized>(
        &self,
        wrt: VarId,
        values: &V,
    ) -> (f64, f64) {
        let (l, dl) = self.lhs.eval_with_derivative(wrt, values);
        let (r, dr) = self.rhs.eval_with_derivative(wrt, values);
        (l - r, dl - dr)
    }

    /// Returns the defining expression if the constraint reads `var == expr`
    /// (or `expr == var`) and `expr` does not itself involve `var`.
    #[must_use]
    pub fn explicit_definition(&self, var: VarId) -> Option<&Expr> {
        match (&self.lhs, &self.rhs) {
            (Expr::Var(v), other) | (other, Expr::Var(v)) if *v == var && !other.contains(var) => {
                Some(other)
            }
            _ => None,
        }
    }

    pub(super) fn set_active(&mut self, active: bool) {
        self.active = active;
    }

    pub(super) fn set_scaling(&mut self, factor: ScalingFactor) {
        self.scaling = Some(factor);
    }
}
