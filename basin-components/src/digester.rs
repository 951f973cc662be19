//! Two-phase anaerobic digester.
//!
//! The liquid phase is a [`ControlVolume0D`] with reactions, mass transfer,
//! and enthalpy transfer. The headspace is a bare vapor state block with no
//! holdup. Unit-level constraints couple the two through Henry's law, the
//! headspace pressure, and the vapor outflow.
//!
//! A digester is built once with [`AnaerobicDigester::build`], scaled with
//! [`AnaerobicDigester::calculate_scaling_factors`], and brought to a
//! converged point with [`AnaerobicDigester::initialize`].

mod config;
mod error;
mod initialize;
mod scaling;

use std::{collections::BTreeMap, sync::Arc};

use basin_core::{
    ConstraintFamily, Quantity, VarFamily,
    expr::Expr,
    model::{Constraint, Index, Model, ParamId, Parameter, VarId, Variable},
    scaling::ScalingFactor,
    units::Units,
};
use basin_thermo::{
    ControlVolume0D, FlowBasis, StateBlock, ThermoError,
    balance::{
        EnergyBalanceOptions, MaterialBalanceOptions, MomentumBalanceOptions, MomentumBalanceType,
    },
    model::GAS_CONSTANT,
};
use tracing::debug;

pub use config::{CarbonSpecies, DigesterConfig, DigesterParameters, VolatileSpecies};
pub use error::{ConfigurationError, InitializationError};
pub use initialize::{InitializeOptions, Stage};

/// Transfer assigned to components that never leave the liquid.
///
/// Nonzero so the liquid balances stay nonsingular.
const LIQUID_ONLY_TRANSFER: f64 = 1e-8;

/// How the unit-level material balance of a liquid component is closed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BalanceBranch {
    /// Present in both phases: transfer equals the vapor outflow.
    Shared,
    /// Inorganic carbon: transfer equals the outflow of the named vapor species.
    Carbon { vapor: String },
    /// Absent from the vapor: transfer is a small constant.
    LiquidOnly,
}

/// A two-phase anaerobic digester model.
#[derive(Debug, Clone)]
pub struct AnaerobicDigester {
    name: String,
    config: DigesterConfig,
    liquid_phase: ControlVolume0D,
    vapor_phase: StateBlock,

    k_p: ParamId,
    k_la: ParamId,
    electricity_intensity: ParamId,
    pressure_ref: ParamId,

    volume_ad: VarFamily<usize>,
    volume_vapor: VarFamily<usize>,
    henry: VarFamily<(usize, String)>,
    electricity_consumption: VarFamily<usize>,

    branches: BTreeMap<String, BalanceBranch>,
    /// Liquid component whose concentration drives each volatile species.
    transfer_sources: BTreeMap<String, String>,

    henry_law: ConstraintFamily<(usize, String)>,
    outlet_pressure: ConstraintFamily<usize>,
    unit_material_balance: ConstraintFamily<(usize, String)>,
    transfer: ConstraintFamily<(usize, String)>,
    flow_vol_vap: ConstraintFamily<usize>,
    total_volume: ConstraintFamily<usize>,
    performance: ConstraintFamily<(usize, String)>,
    temperature_equality: ConstraintFamily<usize>,
    pressure_balance: ConstraintFamily<usize>,
    enthalpy_balance: ConstraintFamily<usize>,
    electricity: ConstraintFamily<usize>,
}

impl AnaerobicDigester {
    /// Builds the digester into `model`.
    ///
    /// No solve happens here. Default scaling factors are recorded for the
    /// internal variables unless the caller already set them.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigurationError`] if the packages violate the phase,
    /// component, or flow basis requirements, or if any constraint mixes
    /// inconvertible units.
    pub fn build(
        model: &mut Model,
        name: impl Into<String>,
        config: DigesterConfig,
    ) -> Result<Self, ConfigurationError> {
        let name = name.into();
        validate(&name, &config)?;
        let to_config_error = |err| configuration_error(&name, err);

        let mut liquid_phase = ControlVolume0D::new(
            format!("{name}.liquid_phase"),
            Arc::clone(&config.liquid_property_package),
            Some(Arc::clone(&config.reaction_package)),
        );
        liquid_phase
            .add_state_blocks(model, config.has_phase_equilibrium)
            .map_err(to_config_error)?;
        liquid_phase
            .add_reaction_blocks(model, config.has_equilibrium_reactions)
            .map_err(to_config_error)?;
        liquid_phase.add_geometry(model, config.parameters.volume_liquid());
        liquid_phase
            .add_material_balances(
                model,
                &MaterialBalanceOptions {
                    balance_type: config.material_balance_type,
                    has_mass_transfer: true,
                    has_rate_reactions: true,
                    has_equilibrium_reactions: config.has_equilibrium_reactions,
                    has_phase_equilibrium: config.has_phase_equilibrium,
                },
            )
            .map_err(to_config_error)?;
        liquid_phase
            .add_energy_balances(
                model,
                &EnergyBalanceOptions {
                    balance_type: config.energy_balance_type,
                    has_heat_transfer: config.has_heat_transfer,
                    has_enthalpy_transfer: true,
                    has_heat_of_reaction: config.has_heat_of_reaction,
                },
            )
            .map_err(to_config_error)?;
        liquid_phase
            .add_momentum_balances(
                model,
                &MomentumBalanceOptions {
                    balance_type: config.momentum_balance_type,
                    has_pressure_change: config.has_pressure_change,
                },
            )
            .map_err(to_config_error)?;

        let vapor_phase = config
            .vapor_property_package
            .build_state_block(model, &format!("{name}.vapor_phase"))
            .map_err(to_config_error)?;

        let params = config.parameters;
        let k_p = model.add_param(
            Parameter::new(
                format!("{name}.k_p"),
                params.friction,
                Units::cubic_meter() / Units::day() / Units::bar(),
            )
            .mutable(),
        );
        let k_la = model.add_param(
            Parameter::new(
                format!("{name}.K_La"),
                params.gas_liquid_transfer,
                Units::dimensionless() / Units::day(),
            )
            .mutable(),
        );
        let electricity_intensity = model.add_param(
            Parameter::new(
                format!("{name}.energy_electric_flow_vol_inlet"),
                params.electricity_intensity,
                Units::kilowatt_hour() / Units::cubic_meter(),
            )
            .mutable(),
        );
        let pressure_ref = model.add_param(Parameter::new(
            format!("{name}.pressure_ref"),
            params.pressure_ref,
            Units::pascal(),
        ));

        let branches = config
            .liquid_property_package
            .components()
            .iter()
            .map(|c| {
                let branch = balance_branch(c.name(), &config);
                (c.name().to_owned(), branch)
            })
            .collect();

        let family = |suffix: &str| format!("{name}.{suffix}");
        let mut digester = Self {
            volume_ad: VarFamily::new(family("volume_AD")),
            volume_vapor: VarFamily::new(family("volume_vapor")),
            henry: VarFamily::new(family("KH")),
            electricity_consumption: VarFamily::new(family("electricity_consumption")),
            henry_law: ConstraintFamily::new(family("Henrys_law")),
            outlet_pressure: ConstraintFamily::new(family("outlet_P")),
            unit_material_balance: ConstraintFamily::new(family("unit_material_balance")),
            transfer: ConstraintFamily::new(family("gas_transfer")),
            flow_vol_vap: ConstraintFamily::new(family("flow_vol_vap")),
            total_volume: ConstraintFamily::new(family("ad_total_volume")),
            performance: ConstraintFamily::new(family("ad_performance_eqn")),
            temperature_equality: ConstraintFamily::new(family("unit_temperature_equality")),
            pressure_balance: ConstraintFamily::new(family("unit_pressure_balance")),
            enthalpy_balance: ConstraintFamily::new(family("unit_enthalpy_balance")),
            electricity: ConstraintFamily::new(family("unit_electricity_consumption")),
            branches,
            transfer_sources: BTreeMap::new(),
            k_p,
            k_la,
            electricity_intensity,
            pressure_ref,
            liquid_phase,
            vapor_phase,
            config,
            name,
        };

        if let Err(err) = digester.assemble(model) {
            return Err(configuration_error(&digester.name, err));
        }
        digester.record_default_scaling(model);

        debug!(
            unit = %digester.name,
            variables = model.vars().count(),
            "built anaerobic digester"
        );
        Ok(digester)
    }

    fn assemble(&mut self, model: &mut Model) -> Result<(), ThermoError> {
        let liquid_pkg = Arc::clone(&self.config.liquid_property_package);
        let vapor_pkg = Arc::clone(&self.config.vapor_property_package);
        let flow_units = liquid_pkg
            .flow_basis()
            .flow_units()
            .ok_or_else(|| self.unsupported("material flow basis"))?;
        let inlet = self.liquid_phase.properties_in()?.clone();
        let outlet = self.liquid_phase.properties_out()?.clone();
        let reactions = self.liquid_phase.reactions().cloned();
        let t_ref = vapor_pkg.temperature_ref();
        let params = self.config.parameters;

        let henry_units = Units::kilomole() / Units::cubic_meter() / Units::bar();
        let molar_mass = Units::kilogram() / Units::kilomole();
        let vol_flow = Units::cubic_meter() / Units::second();

        for t in model.time().indices() {
            let liq_in = inlet.at(t)?;
            let liq_out = outlet.at(t)?;
            let vap = self.vapor_phase.at(t)?.clone();
            let v_liq = self.cv_var(self.liquid_phase.volume().get(&t), "volume")?;

            let volume_ad = model.add_var(
                Variable::new(self.volume_ad.name(), Units::cubic_meter())
                    .with_index(Index::Time(t))
                    .with_value(params.volume_total)
                    .non_negative(),
            );
            let volume_vapor = model.add_var(
                Variable::new(self.volume_vapor.name(), Units::cubic_meter())
                    .with_index(Index::Time(t))
                    .with_value(params.volume_vapor)
                    .non_negative(),
            );
            let electricity = model.add_var(
                Variable::new(self.electricity_consumption.name(), Units::kilowatt())
                    .with_index(Index::Time(t))
                    .non_negative(),
            );
            self.volume_ad.insert(t, volume_ad);
            self.volume_vapor.insert(t, volume_vapor);
            self.electricity_consumption.insert(t, electricity);

            // Henry's law coefficients.
            for species in &self.config.volatile_species {
                let s = species.component.as_str();
                let index = Index::time_member(t, s);
                let kh = model.add_var(
                    Variable::new(self.henry.name(), henry_units.clone())
                        .with_index(index.clone())
                        .with_value(species.henry_initial)
                        .non_negative(),
                );
                let exponent = (species.dissolution_enthalpy / (GAS_CONSTANT * 1e-3))
                    * (1.0 / t_ref - 1.0 / vap.temperature);
                let law = model.add_constraint(
                    Constraint::equality(
                        self.henry_law.name(),
                        kh,
                        species.henry_ref * exponent.exp(),
                    )
                    .with_index(index),
                );
                self.henry.insert((t, s.to_owned()), kh);
                self.henry_law.insert((t, s.to_owned()), law);
            }

            // Headspace pressure is the sum of the partial pressures.
            let closure = model.add_constraint(
                Constraint::equality(
                    self.outlet_pressure.name(),
                    vap.pressure,
                    Expr::sum(vap.pressure_sat.values().copied()),
                )
                .with_index(Index::Time(t)),
            );
            self.outlet_pressure.insert(t, closure);

            // Unit-level material balances.
            for (j, branch) in &self.branches {
                let mt = self.cv_var(
                    self.liquid_phase.mass_transfer_term().member(t, j).as_ref(),
                    "mass transfer term",
                )?;
                let rhs = match branch {
                    BalanceBranch::Shared => -vap
                        .material_flow_term(vapor_pkg.name(), j)?
                        .clone()
                        .convert(&flow_units)?,
                    BalanceBranch::Carbon { vapor } => -vap
                        .material_flow_term(vapor_pkg.name(), vapor)?
                        .clone()
                        .convert(&flow_units)?,
                    BalanceBranch::LiquidOnly => Expr::Const(LIQUID_ONLY_TRANSFER),
                };
                let balance = model.add_constraint(
                    Constraint::equality(self.unit_material_balance.name(), mt, rhs)
                        .with_index(Index::time_member(t, j.as_str())),
                );
                self.unit_material_balance.insert((t, j.clone()), balance);
            }

            // Gas transfer driven by the departure from Henry equilibrium.
            let k_la = Quantity::of_param(model, self.k_la);
            let v_liq_q = Quantity::of_var(model, v_liq);
            for species in &self.config.volatile_species {
                let s = species.component.as_str();
                let kh = self.henry.member(t, s).ok_or_else(|| self.unknown(s))?;
                let kh = Quantity::of_var(model, kh);
                let psat = *vap.pressure_sat.get(s).ok_or_else(|| self.unknown(s))?;
                let psat = Quantity::of_var(model, psat);
                let mw = vapor_pkg.component(s).ok_or_else(|| self.unknown(s))?.molecular_weight();
                let mw = Quantity::constant(mw, molar_mass.clone());

                let (source, driving) = match self.transfer_source(s) {
                    Some(TransferSource::Shared) => {
                        let conc = *liq_out.conc_mass_comp.get(s).ok_or_else(|| self.unknown(s))?;
                        let equilibrium = mw * kh * psat;
                        let driving = Quantity::of_var(model, conc).checked_sub(equilibrium)?;
                        (s.to_owned(), driving)
                    }
                    Some(TransferSource::Carbon(liquid)) => {
                        let co2 = match &reactions {
                            Some(block) => block.at(t)?.conc_mol_co2,
                            None => None,
                        };
                        let dissolved = match co2 {
                            Some(co2) => Quantity::of_var(model, co2),
                            None => {
                                let conc = *liq_out
                                    .conc_mass_comp
                                    .get(&liquid)
                                    .ok_or_else(|| self.unknown(&liquid))?;
                                Quantity::of_var(model, conc) / mw.clone()
                            }
                        };
                        let driving = dissolved.checked_sub(kh * psat)? * mw;
                        (liquid, driving)
                    }
                    None => return Err(self.unknown(s)),
                };

                let mt = self.cv_var(
                    self.liquid_phase.mass_transfer_term().member(t, &source).as_ref(),
                    "mass transfer term",
                )?;
                let rate = -(k_la.clone() * driving * v_liq_q.clone());
                let rhs = rate.convert(model.var(mt).units())?;
                let transfer = model.add_constraint(
                    Constraint::equality(self.transfer.name(), mt, rhs)
                        .with_index(Index::time_member(t, s)),
                );
                self.transfer.insert((t, s.to_owned()), transfer);
                self.transfer_sources.insert(s.to_owned(), source);
            }

            // Vapor outflow through the headspace friction.
            let overpressure = Quantity::of_var(model, vap.pressure)
                .checked_sub(Quantity::of_param(model, self.pressure_ref))?;
            let outflow = (Quantity::of_param(model, self.k_p) * overpressure)
                .convert(&vol_flow)?
                * (Expr::from(vap.pressure) / Expr::from(self.pressure_ref));
            let outflow =
                Quantity::new(outflow, vol_flow.clone()).convert(model.var(vap.flow_vol).units())?;
            let flow = model.add_constraint(
                Constraint::equality(self.flow_vol_vap.name(), vap.flow_vol, outflow)
                    .with_index(Index::Time(t)),
            );
            self.flow_vol_vap.insert(t, flow);

            let total = model.add_constraint(
                Constraint::equality(self.total_volume.name(), volume_ad, v_liq + volume_vapor)
                    .with_index(Index::Time(t)),
            );
            self.total_volume.insert(t, total);

            // Reaction extents follow the volumetric rates.
            if let Some(reactions) = &reactions {
                for (r, &rate) in &reactions.at(t)?.reaction_rate {
                    let extent = self.cv_var(
                        self.liquid_phase.rate_reaction_extent().member(t, r).as_ref(),
                        "rate reaction extent",
                    )?;
                    let produced = (Quantity::of_var(model, v_liq) * Quantity::of_var(model, rate))
                        .convert(model.var(extent).units())?;
                    let performance = model.add_constraint(
                        Constraint::equality(self.performance.name(), extent, produced)
                            .with_index(Index::time_member(t, r.as_str())),
                    );
                    self.performance.insert((t, r.clone()), performance);
                }
            }

            let vapor_temperature = Quantity::of_var(model, vap.temperature)
                .convert(model.var(liq_out.temperature).units())?;
            let equality = model.add_constraint(
                Constraint::equality(
                    self.temperature_equality.name(),
                    liq_out.temperature,
                    vapor_temperature,
                )
                .with_index(Index::Time(t)),
            );
            self.temperature_equality.insert(t, equality);

            if self.config.has_pressure_change
                && self.config.momentum_balance_type != MomentumBalanceType::None
            {
                let delta_p = self.cv_var(self.liquid_phase.delta_p().get(&t), "pressure change")?;
                let drop = Quantity::of_var(model, vap.pressure)
                    .checked_sub(Quantity::of_var(model, liq_in.pressure))?
                    .convert(model.var(delta_p).units())?;
                let balance = model.add_constraint(
                    Constraint::equality(self.pressure_balance.name(), delta_p, drop)
                        .with_index(Index::Time(t)),
                );
                self.pressure_balance.insert(t, balance);
            }

            // Enthalpy carried off by the vapor equals the enthalpy transfer.
            let watt = Units::watt();
            let et = self.cv_var(
                self.liquid_phase.enthalpy_transfer().get(&t),
                "enthalpy transfer",
            )?;
            let h_in = liq_in.enthalpy_flow_term.clone().convert(&watt)?;
            let h_out = liq_out.enthalpy_flow_term.clone().convert(&watt)?;
            let h_vap = vap.enthalpy_flow_term.clone().convert(&watt)?;
            let enthalpy = model.add_constraint(
                Constraint::equality(self.enthalpy_balance.name(), et + h_in, h_out + h_vap)
                    .with_index(Index::Time(t)),
            );
            self.enthalpy_balance.insert(t, enthalpy);

            let demand = (Quantity::of_param(model, self.electricity_intensity)
                * Quantity::of_var(model, liq_in.flow_vol))
            .convert(model.var(electricity).units())?;
            let consumption = model.add_constraint(
                Constraint::equality(self.electricity.name(), electricity, demand)
                    .with_index(Index::Time(t)),
            );
            self.electricity.insert(t, consumption);
        }
        Ok(())
    }

    fn record_default_scaling(&self, model: &mut Model) {
        let cv = &self.liquid_phase;
        let defaults: [(&VarFamily<usize>, f64); 6] = [
            (&self.volume_ad, 1e-2),
            (&self.volume_vapor, 1e-2),
            (cv.volume(), 1e-2),
            (cv.heat(), 1e-2),
            (cv.enthalpy_transfer(), 1e-4),
            (&self.electricity_consumption, 1.0),
        ];
        let member_defaults: [(&VarFamily<(usize, String)>, f64); 3] = [
            (cv.rate_reaction_generation(), 1e4),
            (cv.mass_transfer_term(), 1e2),
            (cv.rate_reaction_extent(), 1e2),
        ];

        let scaling = model.scaling_mut();
        for (family, factor) in defaults {
            for &var in family.values() {
                scaling.set_if_unset(var, ScalingFactor::of(factor));
            }
        }
        for (family, factor) in member_defaults {
            for &var in family.values() {
                scaling.set_if_unset(var, ScalingFactor::of(factor));
            }
        }
        for ((_, component), &kh) in &self.henry {
            if let Some(species) = self
                .config
                .volatile_species
                .iter()
                .find(|s| s.component == *component)
            {
                scaling.set_if_unset(kh, species.scaling);
            }
        }
    }

    fn transfer_source(&self, species: &str) -> Option<TransferSource> {
        let liquid = &self.config.liquid_property_package;
        if liquid.has_component(species) {
            return Some(TransferSource::Shared);
        }
        match &self.config.carbon_species {
            Some(carbon) if carbon.vapor == species => {
                Some(TransferSource::Carbon(carbon.liquid.clone()))
            }
            _ => None,
        }
    }

    fn cv_var(&self, var: Option<&VarId>, part: &'static str) -> Result<VarId, ThermoError> {
        var.copied().ok_or_else(|| ThermoError::MissingPart {
            block: self.liquid_phase.name().to_owned(),
            part,
            step: "build",
        })
    }

    fn unknown(&self, component: &str) -> ThermoError {
        ThermoError::UnknownComponent {
            package: self.config.vapor_property_package.name().to_owned(),
            component: component.to_owned(),
        }
    }

    fn unsupported(&self, what: &str) -> ThermoError {
        ThermoError::Unsupported {
            block: self.name.clone(),
            what: what.to_owned(),
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn config(&self) -> &DigesterConfig {
        &self.config
    }

    #[must_use]
    pub fn liquid_phase(&self) -> &ControlVolume0D {
        &self.liquid_phase
    }

    #[must_use]
    pub fn vapor_phase(&self) -> &StateBlock {
        &self.vapor_phase
    }

    /// Headspace friction coefficient, m^3/(day bar).
    #[must_use]
    pub fn k_p(&self) -> ParamId {
        self.k_p
    }

    /// Gas-liquid transfer coefficient, 1/day.
    #[must_use]
    pub fn k_la(&self) -> ParamId {
        self.k_la
    }

    #[must_use]
    pub fn electricity_intensity(&self) -> ParamId {
        self.electricity_intensity
    }

    #[must_use]
    pub fn volume_ad(&self) -> &VarFamily<usize> {
        &self.volume_ad
    }

    #[must_use]
    pub fn volume_liquid(&self) -> &VarFamily<usize> {
        self.liquid_phase.volume()
    }

    #[must_use]
    pub fn volume_vapor(&self) -> &VarFamily<usize> {
        &self.volume_vapor
    }

    /// Henry's law coefficients by `(time, vapor component)`.
    #[must_use]
    pub fn henry_coefficients(&self) -> &VarFamily<(usize, String)> {
        &self.henry
    }

    #[must_use]
    pub fn electricity_consumption(&self) -> &VarFamily<usize> {
        &self.electricity_consumption
    }

    /// Heat duty of the liquid phase; empty without heat transfer.
    #[must_use]
    pub fn heat_duty(&self) -> &VarFamily<usize> {
        self.liquid_phase.heat()
    }

    /// Pressure change of the liquid phase; empty without pressure change.
    #[must_use]
    pub fn delta_p(&self) -> &VarFamily<usize> {
        self.liquid_phase.delta_p()
    }

    /// Balance branch of a liquid component.
    #[must_use]
    pub fn balance_branch(&self, component: &str) -> Option<&BalanceBranch> {
        self.branches.get(component)
    }

    #[must_use]
    pub fn unit_material_balance(&self) -> &ConstraintFamily<(usize, String)> {
        &self.unit_material_balance
    }

    /// Gas transfer constraints by `(time, vapor component)`.
    #[must_use]
    pub fn transfer_constraints(&self) -> &ConstraintFamily<(usize, String)> {
        &self.transfer
    }

    #[must_use]
    pub fn henry_law(&self) -> &ConstraintFamily<(usize, String)> {
        &self.henry_law
    }

    #[must_use]
    pub fn outlet_pressure(&self) -> &ConstraintFamily<usize> {
        &self.outlet_pressure
    }

    #[must_use]
    pub fn flow_vol_vap(&self) -> &ConstraintFamily<usize> {
        &self.flow_vol_vap
    }

    #[must_use]
    pub fn temperature_equality(&self) -> &ConstraintFamily<usize> {
        &self.temperature_equality
    }

    #[must_use]
    pub fn enthalpy_balance(&self) -> &ConstraintFamily<usize> {
        &self.enthalpy_balance
    }

    #[must_use]
    pub fn pressure_balance(&self) -> &ConstraintFamily<usize> {
        &self.pressure_balance
    }
}

enum TransferSource {
    Shared,
    Carbon(String),
}

fn balance_branch(component: &str, config: &DigesterConfig) -> BalanceBranch {
    if config.vapor_property_package.has_component(component) {
        return BalanceBranch::Shared;
    }
    match &config.carbon_species {
        Some(carbon) if carbon.liquid == component => BalanceBranch::Carbon {
            vapor: carbon.vapor.clone(),
        },
        _ => BalanceBranch::LiquidOnly,
    }
}

fn validate(unit: &str, config: &DigesterConfig) -> Result<(), ConfigurationError> {
    let liquid = &config.liquid_property_package;
    let vapor = &config.vapor_property_package;

    if vapor.phase_list() != ["Vap"] {
        return Err(ConfigurationError::PhaseList {
            unit: unit.to_owned(),
            phase: "vapor",
            expected: "Vap",
        });
    }
    if liquid.phase_list() != ["Liq"] {
        return Err(ConfigurationError::PhaseList {
            unit: unit.to_owned(),
            phase: "liquid",
            expected: "Liq",
        });
    }
    if !liquid.components().iter().any(|c| vapor.has_component(c.name())) {
        return Err(ConfigurationError::NoCommonComponent {
            unit: unit.to_owned(),
        });
    }
    if liquid.flow_basis() != vapor.flow_basis() {
        return Err(ConfigurationError::FlowBasisMismatch {
            unit: unit.to_owned(),
        });
    }
    if vapor.flow_basis() == FlowBasis::Other {
        return Err(ConfigurationError::UnsupportedFlowBasis {
            unit: unit.to_owned(),
        });
    }

    let unknown = |phase, component: &str| ConfigurationError::UnknownComponent {
        unit: unit.to_owned(),
        phase,
        component: component.to_owned(),
    };
    if let Some(carbon) = &config.carbon_species {
        if !liquid.has_component(&carbon.liquid) {
            return Err(unknown("liquid", &carbon.liquid));
        }
        if !vapor.has_component(&carbon.vapor) {
            return Err(unknown("vapor", &carbon.vapor));
        }
    }
    for species in &config.volatile_species {
        if !vapor.has_component(&species.component) {
            return Err(unknown("vapor", &species.component));
        }
        let is_carbon = config
            .carbon_species
            .as_ref()
            .is_some_and(|c| c.vapor == species.component);
        if !is_carbon && !liquid.has_component(&species.component) {
            return Err(unknown("liquid", &species.component));
        }
    }
    Ok(())
}

fn configuration_error(unit: &str, err: ThermoError) -> ConfigurationError {
    match err {
        ThermoError::Units(source) => ConfigurationError::Units(source),
        source => ConfigurationError::ControlVolume {
            unit: unit.to_owned(),
            source,
        },
    }
}
