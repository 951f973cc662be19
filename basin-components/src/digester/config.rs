use std::sync::Arc;

use basin_core::scaling::ScalingFactor;
use basin_thermo::{
    PropertyPackage, ReactionPackage,
    balance::{EnergyBalanceType, MaterialBalanceType, MomentumBalanceType},
};
use uom::si::{
    f64::{Pressure, Volume},
    pressure::pascal,
    volume::cubic_meter,
};

/// Configuration for an [`AnaerobicDigester`](super::AnaerobicDigester).
///
/// Built with [`DigesterConfig::new`] from the three packages, then adjusted
/// with the `with_*` methods.
#[derive(Debug, Clone)]
pub struct DigesterConfig {
    pub material_balance_type: MaterialBalanceType,
    pub energy_balance_type: EnergyBalanceType,
    pub momentum_balance_type: MomentumBalanceType,
    pub has_heat_transfer: bool,
    pub has_pressure_change: bool,
    pub has_equilibrium_reactions: bool,
    pub has_phase_equilibrium: bool,
    pub has_heat_of_reaction: bool,
    pub liquid_property_package: Arc<dyn PropertyPackage>,
    pub vapor_property_package: Arc<dyn PropertyPackage>,
    pub reaction_package: Arc<dyn ReactionPackage>,
    /// Gases exchanged between the liquid and the headspace.
    pub volatile_species: Vec<VolatileSpecies>,
    /// Liquid inorganic carbon and the vapor species it leaves as, if any.
    pub carbon_species: Option<CarbonSpecies>,
    pub parameters: DigesterParameters,
}

impl DigesterConfig {
    pub fn new(
        liquid_property_package: Arc<dyn PropertyPackage>,
        vapor_property_package: Arc<dyn PropertyPackage>,
        reaction_package: Arc<dyn ReactionPackage>,
    ) -> Self {
        Self {
            material_balance_type: MaterialBalanceType::UseDefault,
            energy_balance_type: EnergyBalanceType::UseDefault,
            momentum_balance_type: MomentumBalanceType::PressureTotal,
            has_heat_transfer: false,
            has_pressure_change: false,
            has_equilibrium_reactions: false,
            has_phase_equilibrium: false,
            has_heat_of_reaction: false,
            liquid_property_package,
            vapor_property_package,
            reaction_package,
            volatile_species: VolatileSpecies::adm1(),
            carbon_species: Some(CarbonSpecies::default()),
            parameters: DigesterParameters::default(),
        }
    }

    #[must_use]
    pub fn with_material_balance_type(mut self, balance_type: MaterialBalanceType) -> Self {
        self.material_balance_type = balance_type;
        self
    }

    #[must_use]
    pub fn with_energy_balance_type(mut self, balance_type: EnergyBalanceType) -> Self {
        self.energy_balance_type = balance_type;
        self
    }

    #[must_use]
    pub fn with_momentum_balance_type(mut self, balance_type: MomentumBalanceType) -> Self {
        self.momentum_balance_type = balance_type;
        self
    }

    #[must_use]
    pub fn with_heat_transfer(mut self, enabled: bool) -> Self {
        self.has_heat_transfer = enabled;
        self
    }

    #[must_use]
    pub fn with_pressure_change(mut self, enabled: bool) -> Self {
        self.has_pressure_change = enabled;
        self
    }

    #[must_use]
    pub fn with_equilibrium_reactions(mut self, enabled: bool) -> Self {
        self.has_equilibrium_reactions = enabled;
        self
    }

    #[must_use]
    pub fn with_phase_equilibrium(mut self, enabled: bool) -> Self {
        self.has_phase_equilibrium = enabled;
        self
    }

    #[must_use]
    pub fn with_heat_of_reaction(mut self, enabled: bool) -> Self {
        self.has_heat_of_reaction = enabled;
        self
    }

    #[must_use]
    pub fn with_volatile_species(mut self, species: Vec<VolatileSpecies>) -> Self {
        self.volatile_species = species;
        self
    }

    #[must_use]
    pub fn with_carbon_species(mut self, carbon: Option<CarbonSpecies>) -> Self {
        self.carbon_species = carbon;
        self
    }

    #[must_use]
    pub fn with_parameters(mut self, parameters: DigesterParameters) -> Self {
        self.parameters = parameters;
        self
    }
}

/// A gas whose solubility follows Henry's law.
///
/// The Henry coefficient at temperature `T` is
/// `henry_ref * exp(dissolution_enthalpy / R * (1/T_ref - 1/T))`.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(
    feature = "serde-derive",
    derive(serde::Serialize, serde::Deserialize)
)]
pub struct VolatileSpecies {
    /// Vapor phase component.
    pub component: String,
    /// Henry coefficient at the reference temperature, kmol/(m^3 bar).
    pub henry_ref: f64,
    /// Enthalpy of dissolution, J/mol.
    pub dissolution_enthalpy: f64,
    /// Starting value of the Henry coefficient, kmol/(m^3 bar).
    pub henry_initial: f64,
    /// Default scaling factor of the Henry coefficient.
    pub scaling: ScalingFactor,
}

impl VolatileSpecies {
    /// Carbon dioxide, methane, and hydrogen.
    #[must_use]
    pub fn adm1() -> Vec<Self> {
        vec![
            Self {
                component: "S_co2".to_owned(),
                henry_ref: 0.035,
                dissolution_enthalpy: -19_410.0,
                henry_initial: 0.027_15,
                scaling: ScalingFactor::of(1e2),
            },
            Self {
                component: "S_ch4".to_owned(),
                henry_ref: 0.0014,
                dissolution_enthalpy: -14_240.0,
                henry_initial: 0.001_16,
                scaling: ScalingFactor::of(1e3),
            },
            Self {
                component: "S_h2".to_owned(),
                henry_ref: 7.8e-4,
                dissolution_enthalpy: -4180.0,
                henry_initial: 7.38e-4,
                scaling: ScalingFactor::of(1e4),
            },
        ]
    }
}

/// Maps the liquid inorganic carbon species onto its vapor counterpart.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(
    feature = "serde-derive",
    derive(serde::Serialize, serde::Deserialize)
)]
pub struct CarbonSpecies {
    pub liquid: String,
    pub vapor: String,
}

impl Default for CarbonSpecies {
    fn default() -> Self {
        Self {
            liquid: "S_IC".to_owned(),
            vapor: "S_co2".to_owned(),
        }
    }
}

/// Physical parameters of the digester.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(
    feature = "serde-derive",
    derive(serde::Serialize, serde::Deserialize)
)]
pub struct DigesterParameters {
    /// Headspace friction coefficient, m^3/(day bar).
    pub friction: f64,
    /// Gas-liquid transfer coefficient, 1/day.
    pub gas_liquid_transfer: f64,
    /// Electricity use per volume of feed, kWh/m^3.
    pub electricity_intensity: f64,
    /// Reference pressure of the vapor outflow, Pa.
    pub pressure_ref: f64,
    /// Starting value of the total volume, m^3.
    pub volume_total: f64,
    /// Starting value of the headspace volume, m^3.
    pub volume_vapor: f64,
}

impl Default for DigesterParameters {
    fn default() -> Self {
        Self {
            friction: 5e4,
            gas_liquid_transfer: 200.0,
            electricity_intensity: 0.029,
            pressure_ref: 101_325.0,
            volume_total: 3700.0,
            volume_vapor: 300.0,
        }
    }
}

impl DigesterParameters {
    #[must_use]
    pub fn with_pressure_ref(mut self, pressure: Pressure) -> Self {
        self.pressure_ref = pressure.get::<pascal>();
        self
    }

    #[must_use]
    pub fn with_volumes(mut self, total: Volume, vapor: Volume) -> Self {
        self.volume_total = total.get::<cubic_meter>();
        self.volume_vapor = vapor.get::<cubic_meter>();
        self
    }

    /// Starting value of the liquid volume, m^3.
    #[must_use]
    pub fn volume_liquid(&self) -> f64 {
        self.volume_total - self.volume_vapor
    }
}
