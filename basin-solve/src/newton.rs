//! A damped Newton solver for square model systems.
//!
//! The unknowns are the unfixed variables that appear in active constraints,
//! and the equations are the active constraints. Rows are weighted by each
//! constraint's scaling factor and columns by each variable's scaling factor,
//! so a well-scaled model presents the solver with order-one quantities.
//!
//! Each iteration solves the linearized system with an LU factorization,
//! backtracks along the Newton direction until the scaled residual norm
//! decreases sufficiently, and projects the trial point onto variable bounds.

mod config;
mod error;

pub use config::Config;
pub use error::Error;

use std::collections::BTreeMap;

use basin_core::{
    Observer,
    dof::free_variables,
    model::{ConstraintId, Model, VarId},
    solve::{Solver, Termination},
};
use nalgebra::{DMatrix, DVector};
use tracing::{debug, warn};

/// Control actions supported by the Newton solver.
pub enum Action {
    /// Stop the solver after the current iteration.
    StopEarly,
}

/// Iteration event emitted by the Newton solver after each accepted step.
pub struct Event<'a> {
    /// Iteration counter (1-based).
    pub iter: usize,
    /// Largest scaled residual before the step.
    pub residual_norm: f64,
    /// Accepted fraction of the full Newton step.
    pub step: f64,
    /// Values of the unknowns after the step.
    pub values: &'a [f64],
}

/// Summary of a Newton run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Solution {
    pub termination: Termination,
    pub iters: usize,
    /// Largest scaled residual at the final point.
    pub residual_norm: f64,
}

/// A Newton solver with an attached observer.
///
/// Implements [`Solver`], so it can be handed to anything that drives a
/// model to a solution.
#[derive(Debug, Clone, Default)]
pub struct Newton<Obs = ()> {
    config: Config,
    observer: Obs,
}

impl Newton {
    #[must_use]
    pub fn new(config: Config) -> Self {
        Self {
            config,
            observer: (),
        }
    }
}

impl<Obs> Newton<Obs> {
    /// Replaces the observer.
    pub fn with_observer<O>(self, observer: O) -> Newton<O> {
        Newton {
            config: self.config,
            observer,
        }
    }

    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }
}

impl<Obs> Solver for Newton<Obs>
where
    Obs: for<'a> Observer<Event<'a>, Action>,
{
    type Error = Error;

    fn solve(&mut self, model: &mut Model) -> Result<Termination, Error> {
        run(model, &self.config, &mut self.observer).map(|solution| solution.termination)
    }
}

/// Solves the active square system of `model` in place.
///
/// # Errors
///
/// Returns an error if the config is invalid, the system is not square, or
/// a residual is non-finite at the starting point. Failure to converge is
/// reported through [`Solution::termination`].
pub fn solve<Obs>(model: &mut Model, config: &Config, mut observer: Obs) -> Result<Solution, Error>
where
    Obs: for<'a> Observer<Event<'a>, Action>,
{
    run(model, config, &mut observer)
}

/// Solves without observation.
///
/// # Errors
///
/// Same as [`solve`].
pub fn solve_unobserved(model: &mut Model, config: &Config) -> Result<Solution, Error> {
    solve(model, config, ())
}

/// The square system seen by the solver.
struct System {
    vars: Vec<VarId>,
    rows: Vec<ConstraintId>,
    columns: BTreeMap<VarId, usize>,
    row_scale: Vec<f64>,
    col_scale: Vec<f64>,
}

impl System {
    fn new(model: &Model) -> Result<Self, Error> {
        let vars = free_variables(model);
        let rows: Vec<_> = model.active_constraints().map(|(id, _)| id).collect();
        if vars.len() != rows.len() {
            return Err(Error::NotSquare {
                variables: vars.len(),
                equations: rows.len(),
            });
        }

        let columns = vars.iter().enumerate().map(|(j, &v)| (v, j)).collect();
        let row_scale = rows
            .iter()
            .map(|&c| model.constraint(c).scaling().map_or(1.0, |s| s.get()))
            .collect();
        let col_scale = vars
            .iter()
            .map(|&v| model.scaling().get(v).map_or(1.0, |s| s.get()))
            .collect();

        Ok(Self {
            vars,
            rows,
            columns,
            row_scale,
            col_scale,
        })
    }

    fn len(&self) -> usize {
        self.vars.len()
    }

    fn values(&self, model: &Model) -> Vec<f64> {
        self.vars.iter().map(|&v| model.value(v)).collect()
    }

    /// Writes `x` into the model, projected onto variable bounds.
    fn store(&self, model: &mut Model, x: &[f64]) {
        for (&v, &value) in self.vars.iter().zip(x) {
            let bounded = model.var(v).bounds().clamp(value);
            model.set_value(v, bounded);
        }
    }

    fn residuals(&self, model: &Model) -> DVector<f64> {
        DVector::from_iterator(
            self.len(),
            self.rows
                .iter()
                .zip(&self.row_scale)
                .map(|(&c, scale)| scale * model.residual(c)),
        )
    }

    /// Jacobian with respect to the scaled unknowns `s_j * x_j`.
    fn jacobian(&self, model: &Model) -> DMatrix<f64> {
        let mut jac = DMatrix::zeros(self.len(), self.len());
        for (i, &c) in self.rows.iter().enumerate() {
            let constraint = model.constraint(c);
            for v in constraint.incidence() {
                if let Some(&j) = self.columns.get(v) {
                    let (_, slope) = constraint.residual_with_derivative(*v, model);
                    jac[(i, j)] = self.row_scale[i] * slope / self.col_scale[j];
                }
            }
        }
        jac
    }
}

fn max_abs(v: &DVector<f64>) -> f64 {
    v.iter().fold(0.0, |acc: f64, r| acc.max(r.abs()))
}

fn run<Obs>(model: &mut Model, config: &Config, observer: &mut Obs) -> Result<Solution, Error>
where
    Obs: for<'a> Observer<Event<'a>, Action> + ?Sized,
{
    config
        .validate()
        .map_err(|reason| Error::InvalidConfig { reason })?;

    let system = System::new(model)?;
    if system.len() == 0 {
        return Ok(Solution {
            termination: Termination::Optimal,
            iters: 0,
            residual_norm: 0.0,
        });
    }

    let mut x = system.values(model);
    system.store(model, &x);
    x = system.values(model);

    let mut f = system.residuals(model);
    if let Some(i) = f.iter().position(|r| !r.is_finite()) {
        return Err(Error::NonFiniteResidual {
            constraint: model.constraint(system.rows[i]).full_name(),
            residual: f[i],
        });
    }

    for iter in 1..=config.max_iters {
        let norm = max_abs(&f);
        if norm <= config.residual_tol {
            return Ok(Solution {
                termination: Termination::Optimal,
                iters: iter - 1,
                residual_norm: norm,
            });
        }

        let jac = system.jacobian(model);
        let Some(scaled_step) = jac.lu().solve(&(-&f)) else {
            warn!(model = model.name(), iter, "singular Jacobian");
            return Ok(Solution {
                termination: Termination::Infeasible,
                iters: iter,
                residual_norm: norm,
            });
        };
        let dx: Vec<f64> = scaled_step
            .iter()
            .zip(&system.col_scale)
            .map(|(d, s)| d / s)
            .collect();

        let phi0 = 0.5 * f.norm_squared();
        let mut alpha = 1.0;
        let accepted = loop {
            let trial: Vec<f64> = x.iter().zip(&dx).map(|(xi, di)| xi + alpha * di).collect();
            system.store(model, &trial);
            let f_trial = system.residuals(model);
            let phi = 0.5 * f_trial.norm_squared();
            if phi.is_finite() && phi <= (1.0 - config.armijo * alpha) * phi0 {
                break Some(f_trial);
            }
            if alpha * 0.5 < config.min_step {
                break phi.is_finite().then_some(f_trial);
            }
            alpha *= 0.5;
        };

        let Some(f_next) = accepted else {
            system.store(model, &x);
            warn!(model = model.name(), iter, "line search found no finite point");
            return Ok(Solution {
                termination: Termination::Infeasible,
                iters: iter,
                residual_norm: norm,
            });
        };

        x = system.values(model);
        f = f_next;
        debug!(
            model = model.name(),
            iter,
            residual = norm,
            step = alpha,
            "newton iteration"
        );

        let event = Event {
            iter,
            residual_norm: norm,
            step: alpha,
            values: &x,
        };
        if let Some(Action::StopEarly) = observer.observe(&event) {
            return Ok(Solution {
                termination: Termination::Stopped,
                iters: iter,
                residual_norm: max_abs(&f),
            });
        }
    }

    let norm = max_abs(&f);
    let termination = if norm <= config.residual_tol {
        Termination::Optimal
    } else {
        Termination::MaxIterations
    };
    Ok(Solution {
        termination,
        iters: config.max_iters,
        residual_norm: norm,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    use approx::assert_relative_eq;
    use basin_core::{
        model::{Bounds, Constraint, Variable},
        scaling::ScalingFactor,
        units::Units,
    };

    /// Circle-line intersection: x^2 + y^2 = 25, y = x - 1.
    fn circle_line() -> (Model, VarId, VarId) {
        let mut model = Model::steady_state("circle");
        let x = model.add_var(Variable::new("x", Units::dimensionless()).with_value(5.0));
        let y = model.add_var(Variable::new("y", Units::dimensionless()).with_value(1.0));
        model.add_constraint(Constraint::equality("circle", x * x + y * y, 25.0));
        model.add_constraint(Constraint::equality("line", y, x - 1.0));
        (model, x, y)
    }

    #[test]
    fn solves_small_nonlinear_system() {
        let (mut model, x, y) = circle_line();
        let solution = solve_unobserved(&mut model, &Config::default()).unwrap();

        assert_eq!(solution.termination, Termination::Optimal);
        assert_relative_eq!(model.value(x), 4.0, epsilon = 1e-9);
        assert_relative_eq!(model.value(y), 3.0, epsilon = 1e-9);
    }

    #[test]
    fn scaling_changes_conditioning_not_solution() {
        let (mut model, x, y) = circle_line();
        let ids = model.constraints().map(|(id, _)| id).collect::<Vec<_>>();
        for id in ids {
            model.constraint_scaling_transform(id, ScalingFactor::of(1e-3));
        }
        model.scaling_mut().set(x, ScalingFactor::of(1e2));

        let solution = solve_unobserved(&mut model, &Config::default()).unwrap();
        assert_eq!(solution.termination, Termination::Optimal);
        assert_relative_eq!(model.value(x), 4.0, epsilon = 1e-6);
        assert_relative_eq!(model.value(y), 3.0, epsilon = 1e-6);
    }

    #[test]
    fn respects_lower_bounds() {
        let mut model = Model::steady_state("bounded");
        let x = model.add_var(
            Variable::new("x", Units::dimensionless())
                .with_value(0.5)
                .with_bounds(Bounds::NON_NEGATIVE),
        );
        model.add_constraint(Constraint::equality("square", x * x, 4.0));

        let solution = solve_unobserved(&mut model, &Config::default()).unwrap();
        assert_eq!(solution.termination, Termination::Optimal);
        assert_relative_eq!(model.value(x), 2.0, epsilon = 1e-9);
    }

    #[test]
    fn fixed_variables_are_data() {
        let (mut model, x, y) = circle_line();
        model.fix_at(x, 3.0);
        let line = model
            .constraints()
            .find(|(_, c)| c.name() == "line")
            .map(|(id, _)| id)
            .unwrap();
        model.set_active(line, false);

        let solution = solve_unobserved(&mut model, &Config::default()).unwrap();
        assert_eq!(solution.termination, Termination::Optimal);
        assert_relative_eq!(model.value(x), 3.0);
        assert_relative_eq!(model.value(y), 4.0, epsilon = 1e-9);
    }

    #[test]
    fn non_square_systems_are_rejected() {
        let (mut model, _, y) = circle_line();
        model.fix_at(y, 3.0);
        assert_eq!(
            solve_unobserved(&mut model, &Config::default()),
            Err(Error::NotSquare {
                variables: 1,
                equations: 2
            })
        );
    }

    #[test]
    fn singular_systems_are_infeasible() {
        let mut model = Model::steady_state("singular");
        let x = model.add_var(Variable::new("x", Units::dimensionless()).with_value(0.0));
        model.add_constraint(Constraint::equality("flat", x * x + 1.0, 0.0));

        let solution = solve_unobserved(&mut model, &Config::default()).unwrap();
        assert_eq!(solution.termination, Termination::Infeasible);
    }

    #[test]
    fn observer_can_stop_early() {
        let (mut model, _, _) = circle_line();
        let mut seen = Vec::new();
        let observer = |event: &Event<'_>| {
            seen.push(event.iter);
            Some(Action::StopEarly)
        };

        let solution = solve(&mut model, &Config::default(), observer).unwrap();
        assert_eq!(solution.termination, Termination::Stopped);
        assert_eq!(seen, vec![1]);
    }

    #[test]
    fn implements_solver_trait() {
        let (mut model, x, _) = circle_line();
        let mut newton = Newton::new(Config::default());
        assert_eq!(newton.solve(&mut model), Ok(Termination::Optimal));
        assert_relative_eq!(model.value(x), 4.0, epsilon = 1e-9);
    }
}
