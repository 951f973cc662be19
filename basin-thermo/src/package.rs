use std::fmt;

use basin_core::{Quantity, model::Model, scaling::ScalingFactor, units::Units};

use crate::{
    ThermoError,
    balance::{EnergyBalanceType, MaterialBalanceType},
    state::StateBlock,
};

/// Basis of the material flow terms a package produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(
    feature = "serde-derive",
    derive(serde::Serialize, serde::Deserialize)
)]
pub enum FlowBasis {
    Molar,
    Mass,
    Other,
}

impl FlowBasis {
    /// Units of a material flow term on this basis, if it has fixed units.
    #[must_use]
    pub fn flow_units(self) -> Option<Units> {
        match self {
            FlowBasis::Molar => Some(Units::mole() / Units::second()),
            FlowBasis::Mass => Some(Units::kilogram() / Units::second()),
            FlowBasis::Other => None,
        }
    }

    /// Expresses the mass flow of a component on this basis.
    #[must_use]
    pub fn material_flow(self, mass_flow: Quantity, molecular_weight: f64) -> Quantity {
        match self {
            FlowBasis::Molar => {
                mass_flow
                    / Quantity::constant(molecular_weight, Units::kilogram() / Units::kilomole())
            }
            FlowBasis::Mass | FlowBasis::Other => mass_flow,
        }
    }
}

impl fmt::Display for FlowBasis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FlowBasis::Molar => f.write_str("molar"),
            FlowBasis::Mass => f.write_str("mass"),
            FlowBasis::Other => f.write_str("other"),
        }
    }
}

/// A chemical component known to a property package.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(
    feature = "serde-derive",
    derive(serde::Serialize, serde::Deserialize)
)]
pub struct Component {
    name: String,
    /// Molecular weight in kg/kmol.
    molecular_weight: f64,
    solvent: bool,
}

impl Component {
    /// A dissolved or gaseous species.
    pub fn solute(name: impl Into<String>, molecular_weight: f64) -> Self {
        Self {
            name: name.into(),
            molecular_weight,
            solvent: false,
        }
    }

    /// The carrier of a liquid phase.
    pub fn solvent(name: impl Into<String>, molecular_weight: f64) -> Self {
        Self {
            solvent: true,
            ..Self::solute(name, molecular_weight)
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn molecular_weight(&self) -> f64 {
        self.molecular_weight
    }

    #[must_use]
    pub fn is_solvent(&self) -> bool {
        self.solvent
    }
}

/// A package-specific scaling rule applied on top of a unit's defaults.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(
    feature = "serde-derive",
    derive(serde::Serialize, serde::Deserialize)
)]
pub enum ScalingOverride {
    /// Scale the control volume heat duty.
    HeatDuty(ScalingFactor),
    /// Scale an outlet concentration at the first time point.
    OutletConcentration {
        component: String,
        factor: ScalingFactor,
    },
}

/// Thermophysical property definitions for one material.
///
/// A package describes its phases and components and knows how to add the
/// variables and constraints of a [`StateBlock`] to a model.
pub trait PropertyPackage: fmt::Debug + Send + Sync {
    fn name(&self) -> &str;

    fn phase_list(&self) -> &[String];

    fn components(&self) -> &[Component];

    fn flow_basis(&self) -> FlowBasis;

    /// Reference temperature for enthalpy and equilibrium correlations, in K.
    fn temperature_ref(&self) -> f64;

    fn component(&self, name: &str) -> Option<&Component> {
        self.components().iter().find(|c| c.name() == name)
    }

    fn has_component(&self, name: &str) -> bool {
        self.component(name).is_some()
    }

    fn component_names(&self) -> Vec<&str> {
        self.components().iter().map(Component::name).collect()
    }

    fn default_material_balance_type(&self) -> MaterialBalanceType {
        MaterialBalanceType::ComponentTotal
    }

    fn default_energy_balance_type(&self) -> EnergyBalanceType {
        EnergyBalanceType::EnthalpyTotal
    }

    /// Package-specific scaling rules for units built on this package.
    ///
    /// This is the single extension point for package-dependent scaling;
    /// units apply the returned rules after their own defaults.
    fn scaling_overrides(&self) -> Vec<ScalingOverride> {
        Vec::new()
    }

    /// Adds a time-indexed state block named `name` to `model`.
    ///
    /// # Errors
    ///
    /// Returns an error if the package cannot express its state in `model`.
    fn build_state_block(&self, model: &mut Model, name: &str) -> Result<StateBlock, ThermoError>;
}
