use std::{
    collections::BTreeMap,
    ops::{Deref, DerefMut},
};

use basin_core::{
    Quantity,
    model::{ConstraintId, Model, VarId},
};

use crate::ThermoError;

/// State variables and property expressions of a material at one time point.
#[derive(Debug, Clone)]
pub struct StateData {
    /// Volumetric flow rate, m^3/s.
    pub flow_vol: VarId,
    /// Temperature, K.
    pub temperature: VarId,
    /// Pressure, Pa.
    pub pressure: VarId,
    /// Mass concentration by component, kg/m^3.
    pub conc_mass_comp: BTreeMap<String, VarId>,
    /// Saturation (partial) pressure by component, Pa.
    pub pressure_sat: BTreeMap<String, VarId>,
    /// Material flow term by component, in the package's flow basis.
    pub material_flow_terms: BTreeMap<String, Quantity>,
    /// Enthalpy flow relative to the package reference temperature.
    pub enthalpy_flow_term: Quantity,
    /// Property variables paired with the constraints that define them.
    pub definitions: Vec<(VarId, ConstraintId)>,
}

/// A state variable as seen by initialization routines.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum StateVar<'a> {
    Scalar(VarId),
    Indexed(&'a BTreeMap<String, VarId>),
}

impl StateData {
    /// The variables that define the state, by name.
    #[must_use]
    pub fn state_vars(&self) -> Vec<(&'static str, StateVar<'_>)> {
        vec![
            ("flow_vol", StateVar::Scalar(self.flow_vol)),
            ("conc_mass_comp", StateVar::Indexed(&self.conc_mass_comp)),
            ("temperature", StateVar::Scalar(self.temperature)),
            ("pressure", StateVar::Scalar(self.pressure)),
        ]
    }

    /// Looks up a state variable by name.
    #[must_use]
    pub fn state_var(&self, name: &str) -> Option<StateVar<'_>> {
        self.state_vars()
            .into_iter()
            .find(|(n, _)| *n == name)
            .map(|(_, var)| var)
    }

    /// Returns the material flow term of `component`.
    ///
    /// # Errors
    ///
    /// Returns [`ThermoError::UnknownComponent`] if the state has no flow
    /// term for `component`.
    pub fn material_flow_term(
        &self,
        package: &str,
        component: &str,
    ) -> Result<&Quantity, ThermoError> {
        self.material_flow_terms
            .get(component)
            .ok_or_else(|| ThermoError::UnknownComponent {
                package: package.to_owned(),
                component: component.to_owned(),
            })
    }

    fn all_state_vars(&self) -> impl Iterator<Item = VarId> + '_ {
        [self.flow_vol, self.temperature, self.pressure]
            .into_iter()
            .chain(self.conc_mass_comp.values().copied())
    }
}

/// Values used to seed a state block before a solve.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(
    feature = "serde-derive",
    derive(serde::Serialize, serde::Deserialize)
)]
pub enum StateArg {
    Scalar(f64),
    Indexed(BTreeMap<String, f64>),
}

/// Initial guesses for state variables, keyed by state variable name.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(
    feature = "serde-derive",
    derive(serde::Serialize, serde::Deserialize)
)]
pub struct StateArgs {
    entries: BTreeMap<String, StateArg>,
}

impl StateArgs {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Reads the current values of every state variable of `state`.
    #[must_use]
    pub fn from_state(model: &Model, state: &StateData) -> Self {
        let mut args = Self::new();
        for (name, var) in state.state_vars() {
            let arg = match var {
                StateVar::Scalar(id) => StateArg::Scalar(model.value(id)),
                StateVar::Indexed(members) => StateArg::Indexed(
                    members
                        .iter()
                        .map(|(j, &id)| (j.clone(), model.value(id)))
                        .collect(),
                ),
            };
            args.insert(name, arg);
        }
        args
    }

    #[must_use]
    pub fn with_scalar(mut self, name: impl Into<String>, value: f64) -> Self {
        self.insert(name, StateArg::Scalar(value));
        self
    }

    #[must_use]
    pub fn with_indexed<I, S>(mut self, name: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = (S, f64)>,
        S: Into<String>,
    {
        let values = values.into_iter().map(|(k, v)| (k.into(), v)).collect();
        self.insert(name, StateArg::Indexed(values));
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, arg: StateArg) {
        self.entries.insert(name.into(), arg);
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&StateArg> {
        self.entries.get(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &StateArg)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// A time-indexed collection of material states.
#[derive(Debug, Clone)]
pub struct StateBlock {
    name: String,
    package: String,
    points: Vec<StateData>,
}

impl StateBlock {
    /// Creates a state block from one [`StateData`] per time point.
    pub fn new(
        name: impl Into<String>,
        package: impl Into<String>,
        points: Vec<StateData>,
    ) -> Self {
        Self {
            name: name.into(),
            package: package.into(),
            points,
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Name of the package that built the block.
    #[must_use]
    pub fn package(&self) -> &str {
        &self.package
    }

    /// Returns the state at time position `t`.
    ///
    /// # Errors
    ///
    /// Returns [`ThermoError::MissingPart`] if `t` is outside the block.
    pub fn at(&self, t: usize) -> Result<&StateData, ThermoError> {
        self.points.get(t).ok_or_else(|| ThermoError::MissingPart {
            block: self.name.clone(),
            part: "state at the requested time",
            step: "build_state_block",
        })
    }

    /// Iterates over `(time position, state)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (usize, &StateData)> {
        self.points.iter().enumerate()
    }

    /// Material flow term of `component` at `t`.
    ///
    /// # Errors
    ///
    /// Returns an error if `t` or `component` is unknown.
    pub fn material_flow_term(&self, t: usize, component: &str) -> Result<&Quantity, ThermoError> {
        self.at(t)?.material_flow_term(&self.package, component)
    }

    /// Seeds unfixed state variables from `args` at every time point, then
    /// computes each defined property from its defining constraint.
    ///
    /// # Errors
    ///
    /// Returns an error if a defined property cannot be calculated.
    pub fn initialize(&self, model: &mut Model, args: &StateArgs) -> Result<(), ThermoError> {
        for state in &self.points {
            for (name, var) in state.state_vars() {
                match (var, args.get(name)) {
                    (StateVar::Scalar(id), Some(StateArg::Scalar(value))) => {
                        seed(model, id, *value);
                    }
                    (StateVar::Indexed(members), Some(StateArg::Indexed(values))) => {
                        for (j, &id) in members {
                            if let Some(&value) = values.get(j) {
                                seed(model, id, value);
                            }
                        }
                    }
                    _ => {}
                }
            }
            for &(var, constraint) in &state.definitions {
                if !model.is_fixed(var) {
                    model.calculate_variable_from_constraint(var, constraint)?;
                }
            }
        }
        Ok(())
    }

    /// Fixes every state variable that is currently free.
    ///
    /// The returned flags record exactly which variables were fixed, so that
    /// [`HoldFlags::release`] restores the original fixed/free status.
    #[must_use = "held state must be released"]
    pub fn hold(&self, model: &mut Model) -> HoldFlags {
        let mut vars = Vec::new();
        for var in self.points.iter().flat_map(StateData::all_state_vars) {
            if !model.is_fixed(var) {
                model.fix(var);
                vars.push(var);
            }
        }
        HoldFlags { vars }
    }
}

fn seed(model: &mut Model, id: VarId, value: f64) {
    if !model.is_fixed(id) {
        model.set_value(id, value);
    }
}

/// Record of the variables fixed by [`StateBlock::hold`].
///
/// The flags are neither `Clone` nor `Copy`, and releasing consumes them, so
/// a hold can be released at most once.
#[derive(Debug, PartialEq, Eq, Default)]
#[must_use = "held state must be released"]
pub struct HoldFlags {
    vars: Vec<VarId>,
}

impl HoldFlags {
    /// Variables that were fixed by the hold.
    #[must_use]
    pub fn vars(&self) -> &[VarId] {
        &self.vars
    }

    /// Unfixes the held variables.
    pub fn release(self, model: &mut Model) {
        for var in self.vars {
            model.unfix(var);
        }
    }
}

/// A model with held state that is released when the guard goes away.
///
/// The guard dereferences to the model, so solves can run while the hold is
/// active. Calling [`HeldState::release`] releases explicitly; otherwise the
/// flags are released on drop, including during unwinding.
#[derive(Debug)]
pub struct HeldState<'m> {
    model: &'m mut Model,
    flags: Option<HoldFlags>,
}

impl<'m> HeldState<'m> {
    pub fn new(model: &'m mut Model, flags: HoldFlags) -> Self {
        Self {
            model,
            flags: Some(flags),
        }
    }

    /// Releases the hold now.
    pub fn release(mut self) {
        self.release_flags();
    }

    fn release_flags(&mut self) {
        if let Some(flags) = self.flags.take() {
            flags.release(self.model);
        }
    }
}

impl Deref for HeldState<'_> {
    type Target = Model;

    fn deref(&self) -> &Model {
        self.model
    }
}

impl DerefMut for HeldState<'_> {
    fn deref_mut(&mut self) -> &mut Model {
        self.model
    }
}

impl Drop for HeldState<'_> {
    fn drop(&mut self) {
        self.release_flags();
    }
}
