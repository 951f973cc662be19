use basin_core::{
    model::{ConstraintId, Model, VarId},
    scaling::{ScalingFactor, get_scaling_factor},
};
use basin_thermo::ScalingOverride;
use tracing::{debug, warn};

use super::{AnaerobicDigester, BalanceBranch};

impl AnaerobicDigester {
    /// Applies package scaling rules and scales the unit constraints.
    ///
    /// Constraint factors are always derived from the current variable
    /// factors, so calling this again gives the same scaled model.
    pub fn calculate_scaling_factors(&self, model: &mut Model) {
        let Ok(outlet) = self.liquid_phase.properties_out() else {
            warn!(unit = %self.name, "liquid phase has no outlet state, skipping scaling");
            return;
        };
        let first = model.time().first();

        for rule in self.config.liquid_property_package.scaling_overrides() {
            match rule {
                ScalingOverride::HeatDuty(factor) => {
                    for &heat in self.liquid_phase.heat().values() {
                        model.scaling_mut().set(heat, factor);
                    }
                }
                ScalingOverride::OutletConcentration { component, factor } => {
                    let conc = outlet
                        .at(first)
                        .ok()
                        .and_then(|state| state.conc_mass_comp.get(&component).copied());
                    if let Some(conc) = conc {
                        model.scaling_mut().set(conc, factor);
                    }
                }
            }
        }

        self.liquid_phase.calculate_scaling_factors(model);

        for (t, state) in outlet.iter() {
            scale_by(model, self.flow_vol_vap.get(&t), state.flow_vol);
            scale_by(model, self.temperature_equality.get(&t), state.temperature);
            scale_by(model, self.outlet_pressure.get(&t), state.pressure);
            if let Some(&et) = self.liquid_phase.enthalpy_transfer().get(&t) {
                scale_by(model, self.enthalpy_balance.get(&t), et);
            }
            if let Some(&volume) = self.volume_ad.get(&t) {
                scale_by(model, self.total_volume.get(&t), volume);
            }
            if let Some(&dp) = self.liquid_phase.delta_p().get(&t) {
                scale_by(model, self.pressure_balance.get(&t), dp);
            }
            if let Some(&elec) = self.electricity_consumption.get(&t) {
                scale_by(model, self.electricity.get(&t), elec);
            }

            let shared = self
                .branches
                .iter()
                .filter(|(_, branch)| **branch == BalanceBranch::Shared)
                .map(|(component, _)| component);
            for component in shared {
                if let Some(mt) = self.liquid_phase.mass_transfer_term().member(t, component) {
                    scale_by(model, self.unit_material_balance.member(t, component).as_ref(), mt);
                }
            }
            for (species, source) in &self.transfer_sources {
                if let Some(&conc) = state.conc_mass_comp.get(source) {
                    scale_by(model, self.transfer.member(t, species).as_ref(), conc);
                }
                if let Some(kh) = self.henry.member(t, species) {
                    scale_by(model, self.henry_law.member(t, species).as_ref(), kh);
                }
            }
            for ((_, reaction), &extent) in self
                .liquid_phase
                .rate_reaction_extent()
                .iter()
                .filter(|((time, _), _)| *time == t)
            {
                scale_by(model, self.performance.member(t, reaction).as_ref(), extent);
            }
        }

        debug!(unit = %self.name, "scaled anaerobic digester");
    }
}

fn scale_by(model: &mut Model, constraint: Option<&ConstraintId>, var: VarId) {
    if let Some(&constraint) = constraint {
        let factor = get_scaling_factor(model, var, ScalingFactor::ONE, true);
        model.constraint_scaling_transform(constraint, factor);
    }
}
