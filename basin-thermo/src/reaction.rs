use std::{collections::BTreeMap, fmt};

use basin_core::model::{ConstraintId, Model, VarId};

use crate::{ThermoError, state::StateBlock};

/// Stoichiometry and heat of one reaction.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(
    feature = "serde-derive",
    derive(serde::Serialize, serde::Deserialize)
)]
pub struct Reaction {
    name: String,
    /// Mass of each component produced per unit reaction extent.
    stoichiometry: BTreeMap<String, f64>,
    /// Heat released per unit extent, J/kg. Negative values are exothermic.
    heat_of_reaction: f64,
}

impl Reaction {
    pub fn new<I, S>(name: impl Into<String>, stoichiometry: I) -> Self
    where
        I: IntoIterator<Item = (S, f64)>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            stoichiometry: stoichiometry
                .into_iter()
                .map(|(j, nu)| (j.into(), nu))
                .collect(),
            heat_of_reaction: 0.0,
        }
    }

    #[must_use]
    pub fn with_heat_of_reaction(mut self, dh: f64) -> Self {
        self.heat_of_reaction = dh;
        self
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Stoichiometric coefficient of `component`, zero if it does not take part.
    #[must_use]
    pub fn coefficient(&self, component: &str) -> f64 {
        self.stoichiometry.get(component).copied().unwrap_or(0.0)
    }

    pub fn stoichiometry(&self) -> impl Iterator<Item = (&str, f64)> {
        self.stoichiometry.iter().map(|(j, nu)| (j.as_str(), *nu))
    }

    #[must_use]
    pub fn heat_of_reaction(&self) -> f64 {
        self.heat_of_reaction
    }
}

/// Variables and constraints a reaction package adds at one time point.
#[derive(Debug, Clone, Default)]
pub struct ReactionData {
    /// Volumetric rate of each rate reaction, kg/m^3/s.
    pub reaction_rate: BTreeMap<String, VarId>,
    /// Dissolved carbon dioxide, kmol/m^3, if the package tracks it.
    pub conc_mol_co2: Option<VarId>,
    /// Equilibrium conditions, one per equilibrium reaction.
    pub equilibrium_constraints: BTreeMap<String, ConstraintId>,
    /// Property variables paired with the constraints that define them.
    pub definitions: Vec<(VarId, ConstraintId)>,
}

/// A time-indexed collection of reaction properties.
#[derive(Debug, Clone)]
pub struct ReactionBlock {
    name: String,
    points: Vec<ReactionData>,
}

impl ReactionBlock {
    pub fn new(name: impl Into<String>, points: Vec<ReactionData>) -> Self {
        Self {
            name: name.into(),
            points,
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the reaction data at time position `t`.
    ///
    /// # Errors
    ///
    /// Returns [`ThermoError::MissingPart`] if `t` is outside the block.
    pub fn at(&self, t: usize) -> Result<&ReactionData, ThermoError> {
        self.points.get(t).ok_or_else(|| ThermoError::MissingPart {
            block: self.name.clone(),
            part: "reaction data at the requested time",
            step: "build_reaction_block",
        })
    }

    /// Computes every defined property from its defining constraint.
    ///
    /// # Errors
    ///
    /// Returns an error if a defined property cannot be calculated.
    pub fn initialize(&self, model: &mut Model) -> Result<(), ThermoError> {
        for data in &self.points {
            for &(var, constraint) in &data.definitions {
                if !model.is_fixed(var) {
                    model.calculate_variable_from_constraint(var, constraint)?;
                }
            }
        }
        Ok(())
    }
}

/// Reaction definitions for a property package.
pub trait ReactionPackage: fmt::Debug + Send + Sync {
    fn name(&self) -> &str;

    fn rate_reactions(&self) -> &[Reaction];

    fn equilibrium_reactions(&self) -> &[Reaction];

    /// Adds a time-indexed reaction block over `state` to `model`.
    ///
    /// Equilibrium conditions are only added when `has_equilibrium` is set.
    ///
    /// # Errors
    ///
    /// Returns an error if a reaction refers to a component missing from
    /// `state`.
    fn build_reaction_block(
        &self,
        model: &mut Model,
        name: &str,
        state: &StateBlock,
        has_equilibrium: bool,
    ) -> Result<ReactionBlock, ThermoError>;
}
