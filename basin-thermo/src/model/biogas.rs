use std::collections::BTreeMap;

use basin_core::{
    Quantity,
    expr::Expr,
    model::{Bounds, Constraint, Index, Model, Variable},
    units::Units,
};
use uom::si::{
    f64::{MassDensity, Pressure, SpecificHeatCapacity, ThermodynamicTemperature},
    mass_density::kilogram_per_cubic_meter,
    pressure::pascal,
    specific_heat_capacity::joule_per_kilogram_kelvin,
    thermodynamic_temperature::kelvin,
};

use crate::{
    Component, FlowBasis, PropertyPackage, StateBlock, StateData, ThermoError,
    model::GAS_CONSTANT,
};

/// Latent heat over the gas constant in the water vapor correlation, K.
const WATER_VAPOR_SLOPE: f64 = 5290.0;

/// An ideal-gas headspace over a digesting liquid.
///
/// Each component carries a mass concentration and a partial pressure tied
/// by the ideal gas law. Components flagged as solvents condense, so their
/// partial pressure also follows a saturation correlation in temperature.
#[derive(Debug, Clone)]
pub struct BiogasPackage {
    name: String,
    phases: Vec<String>,
    components: Vec<Component>,
    flow_basis: FlowBasis,
    density: MassDensity,
    specific_heat: SpecificHeatCapacity,
    temperature_ref: ThermodynamicTemperature,
    water_vapor_ref: Pressure,
}

impl BiogasPackage {
    pub fn new(name: impl Into<String>, components: Vec<Component>) -> Self {
        Self {
            name: name.into(),
            phases: vec!["Vap".to_owned()],
            components,
            flow_basis: FlowBasis::Mass,
            density: MassDensity::new::<kilogram_per_cubic_meter>(1.0),
            specific_heat: SpecificHeatCapacity::new::<joule_per_kilogram_kelvin>(1000.0),
            temperature_ref: ThermodynamicTemperature::new::<kelvin>(298.15),
            water_vapor_ref: Pressure::new::<pascal>(3130.0),
        }
    }

    /// Water vapor, hydrogen, methane, and carbon dioxide on a COD basis,
    /// with carbon dioxide counted in kmol.
    pub fn adm1(name: impl Into<String>) -> Self {
        Self::new(
            name,
            vec![
                Component::solvent("H2O", 18.0),
                Component::solute("S_h2", 16.0),
                Component::solute("S_ch4", 64.0),
                Component::solute("S_co2", 1.0),
            ],
        )
    }

    #[must_use]
    pub fn with_phases<I, S>(mut self, phases: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.phases = phases.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn with_flow_basis(mut self, flow_basis: FlowBasis) -> Self {
        self.flow_basis = flow_basis;
        self
    }

    /// Saturation pressure of water at the reference temperature.
    #[must_use]
    pub fn with_water_vapor_ref(mut self, pressure: Pressure) -> Self {
        self.water_vapor_ref = pressure;
        self
    }
}

impl PropertyPackage for BiogasPackage {
    fn name(&self) -> &str {
        &self.name
    }

    fn phase_list(&self) -> &[String] {
        &self.phases
    }

    fn components(&self) -> &[Component] {
        &self.components
    }

    fn flow_basis(&self) -> FlowBasis {
        self.flow_basis
    }

    fn temperature_ref(&self) -> f64 {
        self.temperature_ref.get::<kelvin>()
    }

    fn build_state_block(&self, model: &mut Model, name: &str) -> Result<StateBlock, ThermoError> {
        let rho = self.density.get::<kilogram_per_cubic_meter>();
        let cp = self.specific_heat.get::<joule_per_kilogram_kelvin>();
        let t_ref = self.temperature_ref();
        let p_water_ref = self.water_vapor_ref.get::<pascal>();
        let mass_flow = Units::kilogram() / Units::second();

        let mut points = Vec::with_capacity(model.time().len());
        for t in model.time().indices() {
            let flow_vol = model.add_var(
                Variable::new(format!("{name}.flow_vol"), Units::cubic_meter() / Units::second())
                    .with_index(Index::Time(t))
                    .with_value(1e-3)
                    .non_negative(),
            );
            let temperature = model.add_var(
                Variable::new(format!("{name}.temperature"), Units::kelvin())
                    .with_index(Index::Time(t))
                    .with_value(t_ref)
                    .with_bounds(Bounds {
                        lower: Some(273.15),
                        upper: Some(373.15),
                    }),
            );
            let pressure = model.add_var(
                Variable::new(format!("{name}.pressure"), Units::pascal())
                    .with_index(Index::Time(t))
                    .with_value(101_325.0)
                    .non_negative(),
            );

            let mut conc_mass_comp = BTreeMap::new();
            let mut pressure_sat = BTreeMap::new();
            let mut material_flow_terms = BTreeMap::new();
            let mut definitions = Vec::new();
            for component in &self.components {
                let j = component.name();
                let index = Index::time_member(t, j);
                let conc = model.add_var(
                    Variable::new(
                        format!("{name}.conc_mass_comp"),
                        Units::kilogram() / Units::cubic_meter(),
                    )
                    .with_index(index.clone())
                    .with_value(0.5)
                    .non_negative(),
                );
                let psat = model.add_var(
                    Variable::new(format!("{name}.pressure_sat"), Units::pascal())
                        .with_index(index.clone())
                        .with_value(1e3)
                        .non_negative(),
                );

                if component.is_solvent() {
                    let saturation = p_water_ref
                        * (WATER_VAPOR_SLOPE * (1.0 / t_ref - 1.0 / temperature)).exp();
                    let correlation = model.add_constraint(
                        Constraint::equality(
                            format!("{name}.pressure_sat_correlation"),
                            psat,
                            saturation,
                        )
                        .with_index(index.clone()),
                    );
                    definitions.push((psat, correlation));
                }

                let ideal_gas: Expr =
                    conc * (GAS_CONSTANT / component.molecular_weight()) * temperature;
                let ideal_gas = model.add_constraint(
                    Constraint::equality(format!("{name}.pressure_sat_eqn"), psat, ideal_gas)
                        .with_index(index),
                );
                if component.is_solvent() {
                    definitions.push((conc, ideal_gas));
                } else {
                    definitions.push((psat, ideal_gas));
                }

                conc_mass_comp.insert(j.to_owned(), conc);
                pressure_sat.insert(j.to_owned(), psat);
                material_flow_terms.insert(
                    j.to_owned(),
                    self.flow_basis.material_flow(
                        Quantity::new(flow_vol * conc, mass_flow.clone()),
                        component.molecular_weight(),
                    ),
                );
            }

            let enthalpy_flow_term =
                Quantity::new(flow_vol * (rho * cp) * (temperature - t_ref), Units::watt());

            points.push(StateData {
                flow_vol,
                temperature,
                pressure,
                conc_mass_comp,
                pressure_sat,
                material_flow_terms,
                enthalpy_flow_term,
                definitions,
            });
        }

        Ok(StateBlock::new(name, &self.name, points))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use approx::assert_relative_eq;

    use crate::StateArgs;

    #[test]
    fn partial_pressures_follow_the_ideal_gas_law() {
        let mut model = Model::steady_state("test");
        let block = BiogasPackage::adm1("gas").build_state_block(&mut model, "gas").unwrap();

        let args = StateArgs::new()
            .with_scalar("temperature", 308.15)
            .with_indexed("conc_mass_comp", [("S_ch4", 1.6)]);
        block.initialize(&mut model, &args).unwrap();

        let state = block.at(0).unwrap();
        let expected = 1.6 * GAS_CONSTANT * 308.15 / 64.0;
        assert_relative_eq!(
            model.value(state.pressure_sat["S_ch4"]),
            expected,
            max_relative = 1e-12
        );
    }

    #[test]
    fn water_vapor_condenses_along_its_saturation_curve() {
        let mut model = Model::steady_state("test");
        let block = BiogasPackage::adm1("gas").build_state_block(&mut model, "gas").unwrap();

        let args = StateArgs::new().with_scalar("temperature", 308.15);
        block.initialize(&mut model, &args).unwrap();

        let state = block.at(0).unwrap();
        let psat = model.value(state.pressure_sat["H2O"]);
        let expected = 3130.0 * (5290.0 * (1.0 / 298.15 - 1.0 / 308.15_f64)).exp();
        assert_relative_eq!(psat, expected, max_relative = 1e-12);

        // The water concentration is then implied by the ideal gas law.
        let conc = model.value(state.conc_mass_comp["H2O"]);
        assert_relative_eq!(conc, psat * 18.0 / (GAS_CONSTANT * 308.15), max_relative = 1e-8);
    }
}
