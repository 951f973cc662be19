use basin_core::{
    Fraction,
    model::{Constraint, Index, Model, VarId, Variable},
    units::Units,
};

use crate::{
    Reaction, ReactionBlock, ReactionData, ReactionPackage, StateBlock, StateData, ThermoError,
};

/// The dissolved carbon dioxide share of an inorganic carbon species.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(
    feature = "serde-derive",
    derive(serde::Serialize, serde::Deserialize)
)]
pub struct DissolvedCo2 {
    /// Liquid component holding the inorganic carbon.
    pub source: String,
    /// Share of the source present as free carbon dioxide.
    pub fraction: Fraction,
    /// Mass of source per kmol of carbon dioxide, kg/kmol.
    pub molecular_weight: f64,
}

impl DissolvedCo2 {
    /// Inorganic carbon `S_IC` measured in kg of carbon.
    #[must_use]
    pub fn inorganic_carbon(fraction: Fraction) -> Self {
        Self {
            source: "S_IC".to_owned(),
            fraction,
            molecular_weight: 12.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
struct RateLaw {
    substrate: String,
    rate_constant: f64,
}

#[derive(Debug, Clone, PartialEq)]
struct EquilibriumLaw {
    reactant: String,
    product: String,
    constant: f64,
}

/// Reactions whose rates are first order in one substrate concentration.
///
/// Each rate reaction proceeds at `k * c[substrate]` per unit liquid volume.
/// Equilibrium reactions hold `K * c[reactant] == c[product]`.
#[derive(Debug, Clone, Default)]
pub struct FirstOrderKinetics {
    name: String,
    rate_reactions: Vec<Reaction>,
    rate_laws: Vec<RateLaw>,
    equilibrium_reactions: Vec<Reaction>,
    equilibrium_laws: Vec<EquilibriumLaw>,
    dissolved_co2: Option<DissolvedCo2>,
}

impl FirstOrderKinetics {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Sugar uptake producing methane, hydrogen, and inorganic carbon.
    pub fn sugar_uptake(name: impl Into<String>) -> Self {
        Self::new(name).with_rate_reaction(
            Reaction::new(
                "R1",
                [("S_su", -1.0), ("S_ch4", 0.7), ("S_h2", 0.01), ("S_IC", 0.005)],
            ),
            "S_su",
            1e-5,
        )
    }

    /// Adds a rate reaction with rate `rate_constant * c[substrate]`, 1/s.
    #[must_use]
    pub fn with_rate_reaction(
        mut self,
        reaction: Reaction,
        substrate: impl Into<String>,
        rate_constant: f64,
    ) -> Self {
        self.rate_reactions.push(reaction);
        self.rate_laws.push(RateLaw {
            substrate: substrate.into(),
            rate_constant,
        });
        self
    }

    #[must_use]
    pub fn with_equilibrium_reaction(
        mut self,
        reaction: Reaction,
        reactant: impl Into<String>,
        product: impl Into<String>,
        constant: f64,
    ) -> Self {
        self.equilibrium_reactions.push(reaction);
        self.equilibrium_laws.push(EquilibriumLaw {
            reactant: reactant.into(),
            product: product.into(),
            constant,
        });
        self
    }

    #[must_use]
    pub fn with_dissolved_co2(mut self, dissolved_co2: DissolvedCo2) -> Self {
        self.dissolved_co2 = Some(dissolved_co2);
        self
    }

    fn conc(&self, state: &StateData, component: &str) -> Result<VarId, ThermoError> {
        state
            .conc_mass_comp
            .get(component)
            .copied()
            .ok_or_else(|| ThermoError::UnknownComponent {
                package: self.name.clone(),
                component: component.to_owned(),
            })
    }
}

impl ReactionPackage for FirstOrderKinetics {
    fn name(&self) -> &str {
        &self.name
    }

    fn rate_reactions(&self) -> &[Reaction] {
        &self.rate_reactions
    }

    fn equilibrium_reactions(&self) -> &[Reaction] {
        &self.equilibrium_reactions
    }

    fn build_reaction_block(
        &self,
        model: &mut Model,
        name: &str,
        state: &StateBlock,
        has_equilibrium: bool,
    ) -> Result<ReactionBlock, ThermoError> {
        let rate_units = Units::kilogram() / Units::cubic_meter() / Units::second();

        let mut points = Vec::new();
        for (t, state) in state.iter() {
            let mut data = ReactionData::default();

            for (reaction, law) in self.rate_reactions.iter().zip(&self.rate_laws) {
                let index = Index::time_member(t, reaction.name());
                let substrate = self.conc(state, &law.substrate)?;
                let rate = model.add_var(
                    Variable::new(format!("{name}.reaction_rate"), rate_units.clone())
                        .with_index(index.clone())
                        .non_negative(),
                );
                let definition = model.add_constraint(
                    Constraint::equality(
                        format!("{name}.rate_expression"),
                        rate,
                        law.rate_constant * substrate,
                    )
                    .with_index(index),
                );
                data.reaction_rate.insert(reaction.name().to_owned(), rate);
                data.definitions.push((rate, definition));
            }

            if has_equilibrium {
                let laws = self.equilibrium_reactions.iter().zip(&self.equilibrium_laws);
                for (reaction, law) in laws {
                    let reactant = self.conc(state, &law.reactant)?;
                    let product = self.conc(state, &law.product)?;
                    let condition = model.add_constraint(
                        Constraint::equality(
                            format!("{name}.equilibrium_constraint"),
                            law.constant * reactant,
                            product,
                        )
                        .with_index(Index::time_member(t, reaction.name())),
                    );
                    data.equilibrium_constraints
                        .insert(reaction.name().to_owned(), condition);
                }
            }

            if let Some(co2) = &self.dissolved_co2 {
                let source = self.conc(state, &co2.source)?;
                let conc_mol_co2 = model.add_var(
                    Variable::new(
                        format!("{name}.conc_mol_co2"),
                        Units::kilomole() / Units::cubic_meter(),
                    )
                    .with_index(Index::Time(t))
                    .non_negative(),
                );
                let definition = model.add_constraint(
                    Constraint::equality(
                        format!("{name}.conc_mol_co2_eqn"),
                        conc_mol_co2,
                        (co2.fraction.get() / co2.molecular_weight) * source,
                    )
                    .with_index(Index::Time(t)),
                );
                data.conc_mol_co2 = Some(conc_mol_co2);
                data.definitions.push((conc_mol_co2, definition));
            }

            points.push(data);
        }

        Ok(ReactionBlock::new(name, points))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use approx::assert_relative_eq;

    use crate::{Component, PropertyPackage, StateArgs, model::AqueousPackage};

    fn liquor() -> AqueousPackage {
        AqueousPackage::new(
            "liquor",
            vec![
                Component::solvent("H2O", 18.0),
                Component::solute("S_su", 180.0),
                Component::solute("S_IC", 12.0),
                Component::solute("S_ch4", 64.0),
                Component::solute("S_h2", 16.0),
            ],
        )
    }

    #[test]
    fn rates_are_first_order_in_the_substrate() {
        let mut model = Model::steady_state("test");
        let state = liquor().build_state_block(&mut model, "out").unwrap();
        let args = StateArgs::new().with_indexed("conc_mass_comp", [("S_su", 2.0)]);
        state.initialize(&mut model, &args).unwrap();

        let kinetics = FirstOrderKinetics::sugar_uptake("kinetics");
        let block = kinetics.build_reaction_block(&mut model, "rxn", &state, false).unwrap();
        block.initialize(&mut model).unwrap();

        let rate = block.at(0).unwrap().reaction_rate["R1"];
        assert_relative_eq!(model.value(rate), 2e-5);
    }

    #[test]
    fn dissolved_co2_is_a_share_of_inorganic_carbon() {
        let mut model = Model::steady_state("test");
        let state = liquor().build_state_block(&mut model, "out").unwrap();
        let args = StateArgs::new().with_indexed("conc_mass_comp", [("S_IC", 0.12)]);
        state.initialize(&mut model, &args).unwrap();

        let fraction = Fraction::new(0.25).unwrap();
        let kinetics = FirstOrderKinetics::sugar_uptake("kinetics")
            .with_dissolved_co2(DissolvedCo2::inorganic_carbon(fraction));
        let block = kinetics.build_reaction_block(&mut model, "rxn", &state, false).unwrap();
        block.initialize(&mut model).unwrap();

        let co2 = block.at(0).unwrap().conc_mol_co2.unwrap();
        assert_relative_eq!(model.value(co2), 0.25 * 0.12 / 12.0);
    }

    #[test]
    fn equilibrium_conditions_need_the_flag() {
        let mut model = Model::steady_state("test");
        let state = liquor().build_state_block(&mut model, "out").unwrap();
        let kinetics = FirstOrderKinetics::new("kinetics").with_equilibrium_reaction(
            Reaction::new("E1", [("S_h2", -1.0), ("S_ch4", 1.0)]),
            "S_h2",
            "S_ch4",
            4.0,
        );

        let without = kinetics.build_reaction_block(&mut model, "a", &state, false).unwrap();
        assert!(without.at(0).unwrap().equilibrium_constraints.is_empty());
        let with = kinetics.build_reaction_block(&mut model, "b", &state, true).unwrap();
        assert_eq!(with.at(0).unwrap().equilibrium_constraints.len(), 1);
    }

    #[test]
    fn missing_substrate_is_an_error() {
        let mut model = Model::steady_state("test");
        let package = AqueousPackage::new("thin", vec![Component::solvent("H2O", 18.0)]);
        let state = package.build_state_block(&mut model, "out").unwrap();

        let err = FirstOrderKinetics::sugar_uptake("kinetics")
            .build_reaction_block(&mut model, "rxn", &state, false)
            .unwrap_err();
        assert!(matches!(
            err,
            ThermoError::UnknownComponent { component, .. } if component == "S_su"
        ));
    }
}
