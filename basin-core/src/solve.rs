//! The interface between models and nonlinear solvers.

use std::error::Error as StdError;

use crate::model::Model;

/// How a solver run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(
    feature = "serde-derive",
    derive(serde::Serialize, serde::Deserialize)
)]
pub enum Termination {
    /// Converged to a point satisfying every active constraint.
    Optimal,
    /// Reached the iteration limit without converging.
    MaxIterations,
    /// Could not make progress toward a feasible point.
    Infeasible,
    /// Stopped early at the caller's request.
    Stopped,
}

impl Termination {
    #[must_use]
    pub fn is_optimal(self) -> bool {
        matches!(self, Termination::Optimal)
    }
}

/// A solver for the square system formed by a model's active constraints.
///
/// Implementations update variable values in place. Fixed variables and
/// inactive constraints are left untouched.
pub trait Solver {
    type Error: StdError + Send + Sync + 'static;

    /// Solves the model.
    ///
    /// # Errors
    ///
    /// Returns an error if the solver cannot be applied to the model at all,
    /// for example because the system is not square. A run that executes but
    /// does not converge is reported through [`Termination`] instead.
    fn solve(&mut self, model: &mut Model) -> Result<Termination, Self::Error>;
}

impl<S: Solver + ?Sized> Solver for &mut S {
    type Error = S::Error;

    fn solve(&mut self, model: &mut Model) -> Result<Termination, Self::Error> {
        (**self).solve(model)
    }
}
