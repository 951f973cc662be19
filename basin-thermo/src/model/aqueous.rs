use std::collections::BTreeMap;

use basin_core::{
    Quantity,
    model::{Bounds, Index, Model, Variable},
    units::Units,
};
use uom::si::{
    f64::{MassDensity, SpecificHeatCapacity, ThermodynamicTemperature},
    mass_density::kilogram_per_cubic_meter,
    specific_heat_capacity::joule_per_kilogram_kelvin,
    thermodynamic_temperature::kelvin,
};

use crate::{
    Component, FlowBasis, PropertyPackage, ScalingOverride, StateBlock, StateData, ThermoError,
};

/// An incompressible liquid with dissolved components.
///
/// The solvent flows at the liquid density and every solute is carried as a
/// mass concentration. Enthalpy uses a constant specific heat relative to
/// the reference temperature.
#[derive(Debug, Clone)]
pub struct AqueousPackage {
    name: String,
    phases: Vec<String>,
    components: Vec<Component>,
    flow_basis: FlowBasis,
    density: MassDensity,
    specific_heat: SpecificHeatCapacity,
    temperature_ref: ThermodynamicTemperature,
    scaling_overrides: Vec<ScalingOverride>,
}

impl AqueousPackage {
    pub fn new(name: impl Into<String>, components: Vec<Component>) -> Self {
        Self {
            name: name.into(),
            phases: vec!["Liq".to_owned()],
            components,
            flow_basis: FlowBasis::Mass,
            density: MassDensity::new::<kilogram_per_cubic_meter>(997.0),
            specific_heat: SpecificHeatCapacity::new::<joule_per_kilogram_kelvin>(4182.0),
            temperature_ref: ThermodynamicTemperature::new::<kelvin>(298.15),
            scaling_overrides: Vec::new(),
        }
    }

    /// Replaces the phase list.
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

    #[must_use]
    pub fn with_density(mut self, density: MassDensity) -> Self {
        self.density = density;
        self
    }

    #[must_use]
    pub fn with_specific_heat(mut self, specific_heat: SpecificHeatCapacity) -> Self {
        self.specific_heat = specific_heat;
        self
    }

    /// Adds a scaling rule reported by [`PropertyPackage::scaling_overrides`].
    #[must_use]
    pub fn with_scaling_override(mut self, rule: ScalingOverride) -> Self {
        self.scaling_overrides.push(rule);
        self
    }
}

impl PropertyPackage for AqueousPackage {
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

    fn scaling_overrides(&self) -> Vec<ScalingOverride> {
        self.scaling_overrides.clone()
    }

    fn build_state_block(&self, model: &mut Model, name: &str) -> Result<StateBlock, ThermoError> {
        let rho = self.density.get::<kilogram_per_cubic_meter>();
        let cp = self.specific_heat.get::<joule_per_kilogram_kelvin>();
        let t_ref = self.temperature_ref();
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
            let mut material_flow_terms = BTreeMap::new();
            for component in &self.components {
                let j = component.name();
                let term = if component.is_solvent() {
                    flow_vol * rho
                } else {
                    let conc = model.add_var(
                        Variable::new(
                            format!("{name}.conc_mass_comp"),
                            Units::kilogram() / Units::cubic_meter(),
                        )
                        .with_index(Index::time_member(t, j))
                        .with_value(1e-3)
                        .non_negative(),
                    );
                    conc_mass_comp.insert(j.to_owned(), conc);
                    flow_vol * conc
                };
                let mass = Quantity::new(term, mass_flow.clone());
                material_flow_terms.insert(
                    j.to_owned(),
                    self.flow_basis.material_flow(mass, component.molecular_weight()),
                );
            }

            let enthalpy_flow_term =
                Quantity::new(flow_vol * (rho * cp) * (temperature - t_ref), Units::watt());

            points.push(StateData {
                flow_vol,
                temperature,
                pressure,
                conc_mass_comp,
                pressure_sat: BTreeMap::new(),
                material_flow_terms,
                enthalpy_flow_term,
                definitions: Vec::new(),
            });
        }

        Ok(StateBlock::new(name, &self.name, points))
    }
}
