use basin_core::{
    Observer,
    dof::{DofAnalyzer, IncidenceDof},
    model::Model,
    solve::{Solver, Termination},
};
use basin_thermo::{HeldState, StateArg, StateArgs, StateVar, ThermoError};
use tracing::{debug, error, info, warn};

use super::{AnaerobicDigester, InitializationError};

/// Multiplier from the liquid outlet flow to the vapor flow guess.
const VAPOR_FLOW_GUESS: f64 = 13.0;
/// Multiplier from the liquid outlet pressure to the vapor pressure guess.
const VAPOR_PRESSURE_GUESS: f64 = 1.05;
/// Multiplier from a liquid concentration to the vapor concentration guess.
const VAPOR_CONC_GUESS: f64 = 1e3;
/// Vapor concentration guess for components absent from the liquid, kg/m^3.
const VAPOR_CONC_DEFAULT: f64 = 0.5;

/// A step of the initialization sequence.
///
/// Observers passed to [`AnaerobicDigester::initialize_with`] see each stage
/// as it starts. `Release` is always reported once the liquid inlet has been
/// held, whether or not the coupled solve succeeded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Precheck,
    LiquidInit,
    VaporGuess,
    VaporInit,
    CoupledSolve { attempt: u8 },
    Release,
    Done,
    Failed,
}

/// Inputs to the initialization sequence.
#[derive(Debug, Clone)]
pub struct InitializeOptions<S> {
    pub solver: S,
    /// Initial guesses for the liquid phase state.
    pub liquid_state_args: Option<StateArgs>,
    /// Initial guesses for the vapor phase state; derived from the
    /// initialized liquid outlet when absent.
    pub vapor_state_args: Option<StateArgs>,
}

impl<S> InitializeOptions<S> {
    pub fn new(solver: S) -> Self {
        Self {
            solver,
            liquid_state_args: None,
            vapor_state_args: None,
        }
    }

    #[must_use]
    pub fn with_liquid_state_args(mut self, args: StateArgs) -> Self {
        self.liquid_state_args = Some(args);
        self
    }

    #[must_use]
    pub fn with_vapor_state_args(mut self, args: StateArgs) -> Self {
        self.vapor_state_args = Some(args);
        self
    }
}

impl AnaerobicDigester {
    /// Brings the digester to a converged point from its fixed inlet.
    ///
    /// # Errors
    ///
    /// See [`Self::initialize_with`].
    pub fn initialize<S: Solver>(
        &self,
        model: &mut Model,
        options: InitializeOptions<S>,
    ) -> Result<Termination, InitializationError> {
        self.initialize_with(model, options, &IncidenceDof, ())
    }

    /// Runs the initialization sequence with a custom degrees-of-freedom
    /// analyzer and stage observer.
    ///
    /// The liquid inlet is held fixed while the vapor phase is guessed and
    /// the coupled model is solved, with one retry. The hold is released on
    /// every path once taken.
    ///
    /// # Errors
    ///
    /// Returns [`InitializationError::DegreesOfFreedom`] before any solve if
    /// the model is not square, [`InitializationError::Failed`] if the solver
    /// does not converge after the retry, and the `State` or `Solver`
    /// variants if a block or the solver itself fails.
    pub fn initialize_with<S, D, O>(
        &self,
        model: &mut Model,
        mut options: InitializeOptions<S>,
        dof: &D,
        mut observer: O,
    ) -> Result<Termination, InitializationError>
    where
        S: Solver,
        D: DofAnalyzer + ?Sized,
        O: Observer<Stage, ()>,
    {
        observer.observe(&Stage::Precheck);
        let dof = dof.degrees_of_freedom(model);
        if dof != 0 {
            error!(unit = %self.name, dof, "degrees of freedom not zero before initialization");
            observer.observe(&Stage::Failed);
            return Err(InitializationError::DegreesOfFreedom {
                unit: self.name.clone(),
                dof,
            });
        }

        observer.observe(&Stage::LiquidInit);
        let flags = match self
            .liquid_phase
            .initialize(model, options.liquid_state_args.as_ref(), true)
        {
            Ok(flags) => flags,
            Err(source) => {
                observer.observe(&Stage::Failed);
                return Err(self.state_error(source));
            }
        };
        debug!(unit = %self.name, "liquid phase initialized");

        let mut held = HeldState::new(model, flags);
        let outcome = self.solve_coupled(&mut held, &mut options, &mut observer);

        observer.observe(&Stage::Release);
        held.release();

        match outcome {
            Ok(termination) if termination.is_optimal() => {
                observer.observe(&Stage::Done);
                info!(unit = %self.name, "initialization complete");
                Ok(termination)
            }
            Ok(termination) => {
                observer.observe(&Stage::Failed);
                error!(unit = %self.name, ?termination, "initialization failed");
                Err(InitializationError::Failed {
                    unit: self.name.clone(),
                    termination,
                })
            }
            Err(err) => {
                observer.observe(&Stage::Failed);
                error!(unit = %self.name, %err, "initialization failed");
                Err(err)
            }
        }
    }

    fn solve_coupled<S, O>(
        &self,
        model: &mut Model,
        options: &mut InitializeOptions<S>,
        observer: &mut O,
    ) -> Result<Termination, InitializationError>
    where
        S: Solver,
        O: Observer<Stage, ()>,
    {
        let vapor_args = match &options.vapor_state_args {
            Some(args) => args.clone(),
            None => {
                observer.observe(&Stage::VaporGuess);
                self.vapor_guess(model).map_err(|err| self.state_error(err))?
            }
        };

        observer.observe(&Stage::VaporInit);
        self.vapor_phase
            .initialize(model, &vapor_args)
            .map_err(|err| self.state_error(err))?;
        debug!(unit = %self.name, "vapor phase initialized");

        observer.observe(&Stage::CoupledSolve { attempt: 1 });
        let termination = self.run_solver(&mut options.solver, model)?;
        if termination.is_optimal() {
            return Ok(termination);
        }

        warn!("Trouble solving unit model {}, trying one more time", self.name);
        observer.observe(&Stage::CoupledSolve { attempt: 2 });
        self.run_solver(&mut options.solver, model)
    }

    fn run_solver<S: Solver>(
        &self,
        solver: &mut S,
        model: &mut Model,
    ) -> Result<Termination, InitializationError> {
        let termination = solver
            .solve(model)
            .map_err(|err| InitializationError::Solver {
                unit: self.name.clone(),
                source: Box::new(err),
            })?;
        debug!(unit = %self.name, ?termination, "coupled solve finished");
        Ok(termination)
    }

    /// Guesses the vapor state from the initialized liquid outlet at the first
    /// time point.
    fn vapor_guess(&self, model: &Model) -> Result<StateArgs, ThermoError> {
        let first = model.time().first();
        let liquid = self.liquid_phase.properties_out()?.at(first)?;
        let vapor = self.vapor_phase.at(first)?;

        let mut args = StateArgs::new();
        for (name, var) in vapor.state_vars() {
            match var {
                StateVar::Scalar(_) => {
                    let Some(StateVar::Scalar(source)) = liquid.state_var(name) else {
                        continue;
                    };
                    let value = model.value(source);
                    let guess = if name.contains("flow") {
                        value * VAPOR_FLOW_GUESS
                    } else if name.contains("pressure") {
                        value * VAPOR_PRESSURE_GUESS
                    } else {
                        value
                    };
                    args.insert(name, StateArg::Scalar(guess));
                }
                StateVar::Indexed(members) => {
                    let source = match liquid.state_var(name) {
                        Some(StateVar::Indexed(source)) => Some(source),
                        _ => None,
                    };
                    let guesses = members
                        .keys()
                        .map(|j| {
                            let guess = source
                                .and_then(|s| s.get(j))
                                .map_or(VAPOR_CONC_DEFAULT, |&id| {
                                    model.value(id) * VAPOR_CONC_GUESS
                                });
                            (j.clone(), guess)
                        })
                        .collect();
                    args.insert(name, StateArg::Indexed(guesses));
                }
            }
        }
        Ok(args)
    }

    fn state_error(&self, source: ThermoError) -> InitializationError {
        InitializationError::State {
            unit: self.name.clone(),
            source,
        }
    }
}
