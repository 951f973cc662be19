//! An arena-backed, equation-oriented model.
//!
//! A [`Model`] owns every variable, parameter, and constraint of a flowsheet.
//! Components refer to entries through the copyable ids [`VarId`], [`ParamId`],
//! and [`ConstraintId`], which are only meaningful for the model that issued
//! them.

mod constraint;
mod index;
mod parameter;
mod variable;

pub use constraint::Constraint;
pub use index::Index;
pub use parameter::Parameter;
pub use variable::{Bounds, Variable};

use thiserror::Error;

use crate::{
    expr::Values,
    scaling::{ScalingFactor, ScalingFactors},
    time::TimeSet,
};

macro_rules! define_id {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
        pub struct $name(usize);

        impl $name {
            pub(crate) const fn new(index: usize) -> Self {
                Self(index)
            }

            /// Returns the arena position.
            #[must_use]
            pub const fn index(self) -> usize {
                self.0
            }
        }
    };
}

define_id!(
    /// Handle to a [`Variable`] in a [`Model`].
    VarId
);
define_id!(
    /// Handle to a [`Parameter`] in a [`Model`].
    ParamId
);
define_id!(
    /// Handle to a [`Constraint`] in a [`Model`].
    ConstraintId
);

const CALCULATE_MAX_ITERS: usize = 50;
const CALCULATE_TOL: f64 = 1e-10;

/// Errors raised by model operations.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ModelError {
    #[error("parameter `{name}` is immutable")]
    ImmutableParameter { name: String },

    #[error("constraint `{constraint}` does not involve variable `{variable}`")]
    NotIncident {
        constraint: String,
        variable: String,
    },

    #[error("could not calculate `{variable}` from constraint `{constraint}`: {reason}")]
    Calculation {
        variable: String,
        constraint: String,
        reason: &'static str,
    },
}

/// A collection of variables, parameters, and equality constraints.
#[derive(Debug, Clone)]
pub struct Model {
    name: String,
    time: TimeSet,
    vars: Vec<Variable>,
    params: Vec<Parameter>,
    constraints: Vec<Constraint>,
    scaling: ScalingFactors,
}

impl Model {
    /// Creates an empty model over the given time set.
    pub fn new(name: impl Into<String>, time: TimeSet) -> Self {
        Self {
            name: name.into(),
            time,
            vars: Vec::new(),
            params: Vec::new(),
            constraints: Vec::new(),
            scaling: ScalingFactors::default(),
        }
    }

    /// Creates an empty model with a single steady-state time point.
    pub fn steady_state(name: impl Into<String>) -> Self {
        Self::new(name, TimeSet::steady_state())
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn time(&self) -> &TimeSet {
        &self.time
    }

    pub fn add_var(&mut self, var: Variable) -> VarId {
        self.vars.push(var);
        VarId::new(self.vars.len() - 1)
    }

    /// Returns the variable behind `id`.
    ///
    /// # Panics
    ///
    /// Panics if `id` was issued by a different model.
    #[must_use]
    pub fn var(&self, id: VarId) -> &Variable {
        &self.vars[id.index()]
    }

    /// Returns the variable behind `id` mutably.
    ///
    /// # Panics
    ///
    /// Panics if `id` was issued by a different model.
    pub fn var_mut(&mut self, id: VarId) -> &mut Variable {
        &mut self.vars[id.index()]
    }

    #[must_use]
    pub fn value(&self, id: VarId) -> f64 {
        self.var(id).value()
    }

    pub fn set_value(&mut self, id: VarId, value: f64) {
        self.var_mut(id).set_value(value);
    }

    pub fn fix(&mut self, id: VarId) {
        self.var_mut(id).fix();
    }

    /// Sets the value and fixes the variable.
    pub fn fix_at(&mut self, id: VarId, value: f64) {
        let var = self.var_mut(id);
        var.set_value(value);
        var.fix();
    }

    pub fn unfix(&mut self, id: VarId) {
        self.var_mut(id).unfix();
    }

    #[must_use]
    pub fn is_fixed(&self, id: VarId) -> bool {
        self.var(id).is_fixed()
    }

    /// Iterates over all variables in creation order.
    pub fn vars(&self) -> impl Iterator<Item = (VarId, &Variable)> {
        self.vars
            .iter()
            .enumerate()
            .map(|(i, var)| (VarId::new(i), var))
    }

    /// Finds a variable by its full (indexed) name.
    #[must_use]
    pub fn find_var(&self, full_name: &str) -> Option<VarId> {
        self.vars()
            .find(|(_, var)| var.full_name() == full_name)
            .map(|(id, _)| id)
    }

    pub fn add_param(&mut self, param: Parameter) -> ParamId {
        self.params.push(param);
        ParamId::new(self.params.len() - 1)
    }

    /// Returns the parameter behind `id`.
    ///
    /// # Panics
    ///
    /// Panics if `id` was issued by a different model.
    #[must_use]
    pub fn param(&self, id: ParamId) -> &Parameter {
        &self.params[id.index()]
    }

    /// Changes the value of a mutable parameter.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::ImmutableParameter`] if the parameter is immutable.
    pub fn set_param(&mut self, id: ParamId, value: f64) -> Result<(), ModelError> {
        let param = &mut self.params[id.index()];
        if !param.is_mutable() {
            return Err(ModelError::ImmutableParameter {
                name: param.full_name(),
            });
        }
        param.set_value(value);
        Ok(())
    }

    pub fn add_constraint(&mut self, constraint: Constraint) -> ConstraintId {
        self.constraints.push(constraint);
        ConstraintId::new(self.constraints.len() - 1)
    }

    /// Returns the constraint behind `id`.
    ///
    /// # Panics
    ///
    /// Panics if `id` was issued by a different model.
    #[must_use]
    pub fn constraint(&self, id: ConstraintId) -> &Constraint {
        &self.constraints[id.index()]
    }

    /// Iterates over all constraints in creation order.
    pub fn constraints(&self) -> impl Iterator<Item = (ConstraintId, &Constraint)> {
        self.constraints
            .iter()
            .enumerate()
            .map(|(i, c)| (ConstraintId::new(i), c))
    }

    /// Iterates over active constraints in creation order.
    pub fn active_constraints(&self) -> impl Iterator<Item = (ConstraintId, &Constraint)> {
        self.constraints().filter(|(_, c)| c.is_active())
    }

    pub fn set_active(&mut self, id: ConstraintId, active: bool) {
        self.constraints[id.index()].set_active(active);
    }

    /// Sets the residual scaling factor of a constraint.
    ///
    /// The factor always applies to the unscaled residual, so applying the
    /// same transform repeatedly leaves the constraint unchanged.
    pub fn constraint_scaling_transform(&mut self, id: ConstraintId, factor: ScalingFactor) {
        self.constraints[id.index()].set_scaling(factor);
    }

    #[must_use]
    pub fn residual(&self, id: ConstraintId) -> f64 {
        self.constraint(id).residual(self)
    }

    #[must_use]
    pub fn scaled_residual(&self, id: ConstraintId) -> f64 {
        self.constraint(id).scaled_residual(self)
    }

    /// Variable scaling factors.
    #[must_use]
    pub fn scaling(&self) -> &ScalingFactors {
        &self.scaling
    }

    pub fn scaling_mut(&mut self) -> &mut ScalingFactors {
        &mut self.scaling
    }

    /// Sets `var` to the value that satisfies `constraint`, holding every
    /// other variable at its current value.
    ///
    /// A constraint of the form `var == expr` is evaluated directly; any other
    /// form is solved with a one-dimensional Newton iteration starting from the
    /// current value of `var`. Returns the new value.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::NotIncident`] if the constraint does not involve
    /// `var`, or [`ModelError::Calculation`] if the iteration fails.
    pub fn calculate_variable_from_constraint(
        &mut self,
        var: VarId,
        constraint: ConstraintId,
    ) -> Result<f64, ModelError> {
        let con = self.constraint(constraint);
        if !con.involves(var) {
            return Err(ModelError::NotIncident {
                constraint: con.full_name(),
                variable: self.var(var).full_name(),
            });
        }

        if let Some(definition) = con.explicit_definition(var) {
            let value = definition.eval(self);
            self.set_value(var, value);
            return Ok(value);
        }

        let con = con.clone();
        let failure = |model: &Self, reason| ModelError::Calculation {
            variable: model.var(var).full_name(),
            constraint: con.full_name(),
            reason,
        };

        for _ in 0..CALCULATE_MAX_ITERS {
            let (residual, slope) = con.residual_with_derivative(var, self);
            if !residual.is_finite() {
                return Err(failure(self, "non-finite residual"));
            }
            let x = self.value(var);
            if residual.abs() <= CALCULATE_TOL * (1.0 + x.abs()) {
                return Ok(x);
            }
            if slope == 0.0 || !slope.is_finite() {
                return Err(failure(self, "zero or non-finite derivative"));
            }
            self.set_value(var, x - residual / slope);
        }

        Err(failure(self, "iteration limit reached"))
    }
}

impl Values for Model {
    fn var(&self, id: VarId) -> f64 {
        self.vars[id.index()].value()
    }

    fn param(&self, id: ParamId) -> f64 {
        self.params[id.index()].value()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use approx::assert_relative_eq;

    use crate::units::Units;

    fn model_with_xy() -> (Model, VarId, VarId) {
        let mut model = Model::steady_state("test");
        let x = model.add_var(Variable::new("x", Units::dimensionless()).with_value(2.0));
        let y = model.add_var(Variable::new("y", Units::dimensionless()).with_value(1.0));
        (model, x, y)
    }

    #[test]
    fn explicit_definitions_are_evaluated_directly() {
        let (mut model, x, y) = model_with_xy();
        let k = model.add_param(Parameter::new("k", 3.0, Units::dimensionless()));
        let c = model.add_constraint(Constraint::equality("def_y", y, k * x + 1.0));

        let value = model.calculate_variable_from_constraint(y, c).unwrap();
        assert_relative_eq!(value, 7.0);
        assert_relative_eq!(model.residual(c), 0.0);
    }

    #[test]
    fn implicit_constraints_use_newton() {
        let (mut model, x, y) = model_with_xy();
        model.set_value(y, 9.0);
        let c = model.add_constraint(Constraint::equality("square", x * x, y));

        let value = model.calculate_variable_from_constraint(x, c).unwrap();
        assert_relative_eq!(value, 3.0, epsilon = 1e-9);
    }

    #[test]
    fn calculation_requires_incidence() {
        let (mut model, x, y) = model_with_xy();
        let c = model.add_constraint(Constraint::equality("only_x", x, 1.0));
        assert!(matches!(
            model.calculate_variable_from_constraint(y, c),
            Err(ModelError::NotIncident { .. })
        ));
    }

    #[test]
    fn immutable_parameters_reject_updates() {
        let mut model = Model::steady_state("test");
        let fixed = model.add_param(Parameter::new("R", 8.314, Units::dimensionless()));
        let tunable = model.add_param(Parameter::new("k_p", 5e4, Units::dimensionless()).mutable());

        assert!(model.set_param(tunable, 6e4).is_ok());
        assert_relative_eq!(model.param(tunable).value(), 6e4);
        assert_eq!(
            model.set_param(fixed, 1.0),
            Err(ModelError::ImmutableParameter { name: "R".into() })
        );
    }

    #[test]
    fn constraint_scaling_replaces_previous_factor() {
        let (mut model, x, _) = model_with_xy();
        let c = model.add_constraint(Constraint::equality("c", x, 0.0));

        let factor = ScalingFactor::new(10.0).unwrap();
        model.constraint_scaling_transform(c, factor);
        model.constraint_scaling_transform(c, factor);
        assert_relative_eq!(model.scaled_residual(c), 20.0);
    }

    #[test]
    fn finds_variables_by_full_name() {
        let mut model = Model::steady_state("test");
        let id = model.add_var(
            Variable::new("conc", Units::dimensionless()).with_index(Index::time_member(0, "S_h2")),
        );
        assert_eq!(model.find_var("conc[0,S_h2]"), Some(id));
        assert_eq!(model.find_var("conc[0,S_ch4]"), None);
    }
}
