//! Degrees-of-freedom analysis.
//!
//! The degrees of freedom of a model are the number of unfixed variables that
//! appear in at least one active constraint, minus the number of active
//! equality constraints. A square model (zero degrees of freedom) is fully
//! determined by its constraints.

use std::collections::BTreeSet;

use crate::model::{Model, VarId};

/// Computes the degrees of freedom of a model.
pub trait DofAnalyzer {
    fn degrees_of_freedom(&self, model: &Model) -> i64;
}

/// Counts degrees of freedom from constraint incidence.
#[derive(Debug, Clone, Copy, Default)]
pub struct IncidenceDof;

impl DofAnalyzer for IncidenceDof {
    fn degrees_of_freedom(&self, model: &Model) -> i64 {
        degrees_of_freedom(model)
    }
}

impl<F: Fn(&Model) -> i64> DofAnalyzer for F {
    fn degrees_of_freedom(&self, model: &Model) -> i64 {
        self(model)
    }
}

/// Returns the unfixed variables referenced by active constraints, in id order.
#[must_use]
pub fn free_variables(model: &Model) -> Vec<VarId> {
    model
        .active_constraints()
        .flat_map(|(_, c)| c.incidence().iter().copied())
        .filter(|&v| !model.is_fixed(v))
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Returns the incidence-based degrees of freedom of `model`.
#[must_use]
pub fn degrees_of_freedom(model: &Model) -> i64 {
    let vars = free_variables(model).len();
    let equations = model.active_constraints().count();
    i64::try_from(vars).unwrap_or(i64::MAX) - i64::try_from(equations).unwrap_or(i64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::{
        model::{Constraint, Variable},
        units::Units,
    };

    #[test]
    fn counts_free_variables_minus_active_equations() {
        let mut model = Model::steady_state("test");
        let a = model.add_var(Variable::new("a", Units::dimensionless()));
        let b = model.add_var(Variable::new("b", Units::dimensionless()));
        let c = model.add_var(Variable::new("c", Units::dimensionless()));
        let _unused = model.add_var(Variable::new("unused", Units::dimensionless()));

        let sum = model.add_constraint(Constraint::equality("sum", a + b, c));
        assert_eq!(degrees_of_freedom(&model), 2);

        model.fix_at(a, 1.0);
        assert_eq!(degrees_of_freedom(&model), 1);

        model.add_constraint(Constraint::equality("pin", b, 2.0));
        assert_eq!(degrees_of_freedom(&model), 0);
        assert_eq!(free_variables(&model), vec![b, c]);

        model.set_active(sum, false);
        assert_eq!(IncidenceDof.degrees_of_freedom(&model), 0);
    }

    #[test]
    fn closures_are_analyzers() {
        let model = Model::steady_state("test");
        let analyzer = |_: &Model| 3_i64;
        assert_eq!(analyzer.degrees_of_freedom(&model), 3);
    }
}
