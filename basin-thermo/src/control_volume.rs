use std::sync::Arc;

use basin_core::{
    ConstraintFamily, Quantity, VarFamily,
    expr::Expr,
    model::{Constraint, Index, Model, Variable},
    scaling::ScalingFactor,
    units::Units,
};
use tracing::debug;

use crate::{
    PropertyPackage, ReactionBlock, ReactionPackage, StateArgs, StateBlock, ThermoError,
    balance::{
        EnergyBalanceOptions, EnergyBalanceType, MaterialBalanceOptions, MaterialBalanceType,
        MomentumBalanceOptions, MomentumBalanceType,
    },
    state::HoldFlags,
};

/// A well-mixed, lumped control volume with one inlet and one outlet.
///
/// The outlet state is the internal state. The volume is assembled step by
/// step: state blocks first, then optional reaction blocks and geometry, then
/// the material, energy, and momentum balances. At steady state each balance
/// reads `0 = in - out + sources`.
#[derive(Debug, Clone)]
pub struct ControlVolume0D {
    name: String,
    package: Arc<dyn PropertyPackage>,
    reaction_package: Option<Arc<dyn ReactionPackage>>,
    properties_in: Option<StateBlock>,
    properties_out: Option<StateBlock>,
    reactions: Option<ReactionBlock>,
    volume: VarFamily<usize>,
    mass_transfer_term: VarFamily<(usize, String)>,
    rate_reaction_extent: VarFamily<(usize, String)>,
    rate_reaction_generation: VarFamily<(usize, String)>,
    equilibrium_reaction_extent: VarFamily<(usize, String)>,
    equilibrium_reaction_generation: VarFamily<(usize, String)>,
    heat: VarFamily<usize>,
    enthalpy_transfer: VarFamily<usize>,
    delta_p: VarFamily<usize>,
    material_balances: ConstraintFamily<(usize, String)>,
    rate_reaction_stoichiometry: ConstraintFamily<(usize, String)>,
    equilibrium_reaction_stoichiometry: ConstraintFamily<(usize, String)>,
    enthalpy_balances: ConstraintFamily<usize>,
    pressure_balance: ConstraintFamily<usize>,
}

impl ControlVolume0D {
    pub fn new(
        name: impl Into<String>,
        package: Arc<dyn PropertyPackage>,
        reaction_package: Option<Arc<dyn ReactionPackage>>,
    ) -> Self {
        let name = name.into();
        let family = |suffix: &str| format!("{name}.{suffix}");
        Self {
            volume: VarFamily::new(family("volume")),
            mass_transfer_term: VarFamily::new(family("mass_transfer_term")),
            rate_reaction_extent: VarFamily::new(family("rate_reaction_extent")),
            rate_reaction_generation: VarFamily::new(family("rate_reaction_generation")),
            equilibrium_reaction_extent: VarFamily::new(family("equilibrium_reaction_extent")),
            equilibrium_reaction_generation: VarFamily::new(family(
                "equilibrium_reaction_generation",
            )),
            heat: VarFamily::new(family("heat")),
            enthalpy_transfer: VarFamily::new(family("enthalpy_transfer")),
            delta_p: VarFamily::new(family("deltaP")),
            material_balances: ConstraintFamily::new(family("material_balances")),
            rate_reaction_stoichiometry: ConstraintFamily::new(family(
                "rate_reaction_stoichiometry_constraint",
            )),
            equilibrium_reaction_stoichiometry: ConstraintFamily::new(family(
                "equilibrium_reaction_stoichiometry_constraint",
            )),
            enthalpy_balances: ConstraintFamily::new(family("enthalpy_balances")),
            pressure_balance: ConstraintFamily::new(family("pressure_balance")),
            name,
            package,
            reaction_package,
            properties_in: None,
            properties_out: None,
            reactions: None,
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn package(&self) -> &Arc<dyn PropertyPackage> {
        &self.package
    }

    /// Inlet state block.
    ///
    /// # Errors
    ///
    /// Returns [`ThermoError::MissingPart`] before [`Self::add_state_blocks`].
    pub fn properties_in(&self) -> Result<&StateBlock, ThermoError> {
        self.properties_in
            .as_ref()
            .ok_or_else(|| self.missing("inlet state block", "add_state_blocks"))
    }

    /// Outlet (internal) state block.
    ///
    /// # Errors
    ///
    /// Returns [`ThermoError::MissingPart`] before [`Self::add_state_blocks`].
    pub fn properties_out(&self) -> Result<&StateBlock, ThermoError> {
        self.properties_out
            .as_ref()
            .ok_or_else(|| self.missing("outlet state block", "add_state_blocks"))
    }

    #[must_use]
    pub fn reactions(&self) -> Option<&ReactionBlock> {
        self.reactions.as_ref()
    }

    #[must_use]
    pub fn volume(&self) -> &VarFamily<usize> {
        &self.volume
    }

    #[must_use]
    pub fn mass_transfer_term(&self) -> &VarFamily<(usize, String)> {
        &self.mass_transfer_term
    }

    #[must_use]
    pub fn rate_reaction_extent(&self) -> &VarFamily<(usize, String)> {
        &self.rate_reaction_extent
    }

    #[must_use]
    pub fn rate_reaction_generation(&self) -> &VarFamily<(usize, String)> {
        &self.rate_reaction_generation
    }

    #[must_use]
    pub fn equilibrium_reaction_extent(&self) -> &VarFamily<(usize, String)> {
        &self.equilibrium_reaction_extent
    }

    #[must_use]
    pub fn heat(&self) -> &VarFamily<usize> {
        &self.heat
    }

    #[must_use]
    pub fn enthalpy_transfer(&self) -> &VarFamily<usize> {
        &self.enthalpy_transfer
    }

    #[must_use]
    pub fn delta_p(&self) -> &VarFamily<usize> {
        &self.delta_p
    }

    #[must_use]
    pub fn material_balances(&self) -> &ConstraintFamily<(usize, String)> {
        &self.material_balances
    }

    #[must_use]
    pub fn enthalpy_balances(&self) -> &ConstraintFamily<usize> {
        &self.enthalpy_balances
    }

    #[must_use]
    pub fn pressure_balance(&self) -> &ConstraintFamily<usize> {
        &self.pressure_balance
    }

    /// Adds inlet and outlet state blocks.
    ///
    /// # Errors
    ///
    /// Returns [`ThermoError::Unsupported`] if phase equilibrium is requested
    /// for a single-phase package, or any error from the package.
    pub fn add_state_blocks(
        &mut self,
        model: &mut Model,
        has_phase_equilibrium: bool,
    ) -> Result<(), ThermoError> {
        if has_phase_equilibrium && self.package.phase_list().len() < 2 {
            return Err(self.unsupported(format!(
                "phase equilibrium with single-phase package `{}`",
                self.package.name()
            )));
        }
        let inlet = self
            .package
            .build_state_block(model, &format!("{}.properties_in", self.name))?;
        let outlet = self
            .package
            .build_state_block(model, &format!("{}.properties_out", self.name))?;
        self.properties_in = Some(inlet);
        self.properties_out = Some(outlet);
        Ok(())
    }

    /// Adds a reaction block over the outlet state.
    ///
    /// # Errors
    ///
    /// Returns an error if no reaction package was supplied, the state blocks
    /// are missing, or the package fails to build.
    pub fn add_reaction_blocks(
        &mut self,
        model: &mut Model,
        has_equilibrium: bool,
    ) -> Result<(), ThermoError> {
        let package = self
            .reaction_package
            .clone()
            .ok_or_else(|| self.unsupported("reaction blocks without a reaction package".into()))?;
        let block = package.build_reaction_block(
            model,
            &format!("{}.reactions", self.name),
            self.properties_out()?,
            has_equilibrium,
        )?;
        self.reactions = Some(block);
        Ok(())
    }

    /// Adds a volume variable at every time point.
    pub fn add_geometry(&mut self, model: &mut Model, initial_volume: f64) {
        for t in model.time().indices() {
            let id = model.add_var(
                Variable::new(self.volume.name(), Units::cubic_meter())
                    .with_index(Index::Time(t))
                    .with_value(initial_volume)
                    .non_negative(),
            );
            self.volume.insert(t, id);
        }
    }

    /// Adds one material balance per time point and component.
    ///
    /// # Errors
    ///
    /// Returns an error for unsupported balance types or flow bases, when
    /// reactions are requested without reaction blocks, or when a flow term
    /// has inconsistent units.
    pub fn add_material_balances(
        &mut self,
        model: &mut Model,
        options: &MaterialBalanceOptions,
    ) -> Result<(), ThermoError> {
        let balance_type = match options.balance_type {
            MaterialBalanceType::UseDefault => self.package.default_material_balance_type(),
            other => other,
        };
        match balance_type {
            MaterialBalanceType::None => return Ok(()),
            MaterialBalanceType::ComponentPhase | MaterialBalanceType::ComponentTotal => {}
            other => return Err(self.unsupported(format!("material balance type {other:?}"))),
        }
        if options.has_phase_equilibrium && self.package.phase_list().len() < 2 {
            return Err(self.unsupported("phase equilibrium with a single phase".into()));
        }
        let flow_units = self.package.flow_basis().flow_units().ok_or_else(|| {
            self.unsupported(format!("flow basis {}", self.package.flow_basis()))
        })?;

        let reactions = self.reaction_package.clone();
        let needs_reactions = options.has_rate_reactions || options.has_equilibrium_reactions;
        if needs_reactions && self.reactions.is_none() {
            return Err(self.missing("reaction block", "add_reaction_blocks"));
        }
        let rate_reactions = match (&reactions, options.has_rate_reactions) {
            (Some(package), true) => package.rate_reactions().to_vec(),
            _ => Vec::new(),
        };
        let equilibrium_reactions = match (&reactions, options.has_equilibrium_reactions) {
            (Some(package), true) => package.equilibrium_reactions().to_vec(),
            _ => Vec::new(),
        };

        let inlet = self.properties_in()?.clone();
        let outlet = self.properties_out()?.clone();
        let components: Vec<String> = self
            .package
            .component_names()
            .into_iter()
            .map(str::to_owned)
            .collect();

        for t in model.time().indices() {
            for reaction in &rate_reactions {
                let extent = model.add_var(
                    Variable::new(self.rate_reaction_extent.name(), flow_units.clone())
                        .with_index(Index::time_member(t, reaction.name())),
                );
                self.rate_reaction_extent.insert((t, reaction.name().to_owned()), extent);
            }
            for reaction in &equilibrium_reactions {
                let extent = model.add_var(
                    Variable::new(self.equilibrium_reaction_extent.name(), flow_units.clone())
                        .with_index(Index::time_member(t, reaction.name())),
                );
                self.equilibrium_reaction_extent
                    .insert((t, reaction.name().to_owned()), extent);
            }

            for j in &components {
                let key = (t, j.clone());
                let index = Index::time_member(t, j.as_str());

                let flow_in = inlet.material_flow_term(t, j)?.clone().convert(&flow_units)?;
                let flow_out = outlet.material_flow_term(t, j)?.clone().convert(&flow_units)?;
                let mut body = flow_in - flow_out;

                if !rate_reactions.is_empty() {
                    let generation = model.add_var(
                        Variable::new(self.rate_reaction_generation.name(), flow_units.clone())
                            .with_index(index.clone()),
                    );
                    let produced = Expr::sum(rate_reactions.iter().map(|r| {
                        let extent = self.rate_reaction_extent.member(t, r.name());
                        r.coefficient(j) * extent.map_or(Expr::ZERO, Expr::from)
                    }));
                    let stoich = model.add_constraint(
                        Constraint::equality(
                            self.rate_reaction_stoichiometry.name(),
                            generation,
                            produced,
                        )
                        .with_index(index.clone()),
                    );
                    self.rate_reaction_generation.insert(key.clone(), generation);
                    self.rate_reaction_stoichiometry.insert(key.clone(), stoich);
                    body = body + generation;
                }

                if !equilibrium_reactions.is_empty() {
                    let generation = model.add_var(
                        Variable::new(
                            self.equilibrium_reaction_generation.name(),
                            flow_units.clone(),
                        )
                        .with_index(index.clone()),
                    );
                    let produced = Expr::sum(equilibrium_reactions.iter().map(|r| {
                        let extent = self.equilibrium_reaction_extent.member(t, r.name());
                        r.coefficient(j) * extent.map_or(Expr::ZERO, Expr::from)
                    }));
                    let stoich = model.add_constraint(
                        Constraint::equality(
                            self.equilibrium_reaction_stoichiometry.name(),
                            generation,
                            produced,
                        )
                        .with_index(index.clone()),
                    );
                    self.equilibrium_reaction_generation.insert(key.clone(), generation);
                    self.equilibrium_reaction_stoichiometry.insert(key.clone(), stoich);
                    body = body + generation;
                }

                if options.has_mass_transfer {
                    let transfer = model.add_var(
                        Variable::new(self.mass_transfer_term.name(), flow_units.clone())
                            .with_index(index.clone()),
                    );
                    self.mass_transfer_term.insert(key.clone(), transfer);
                    body = body + transfer;
                }

                let balance = model.add_constraint(
                    Constraint::equality(self.material_balances.name(), body, 0.0)
                        .with_index(index),
                );
                self.material_balances.insert(key, balance);
            }
        }

        debug!(
            control_volume = %self.name,
            balances = self.material_balances.len(),
            "added material balances"
        );
        Ok(())
    }

    /// Adds one enthalpy balance per time point.
    ///
    /// # Errors
    ///
    /// Returns an error for unsupported balance types, for heat of reaction
    /// without rate reactions, or when an enthalpy term has inconsistent units.
    pub fn add_energy_balances(
        &mut self,
        model: &mut Model,
        options: &EnergyBalanceOptions,
    ) -> Result<(), ThermoError> {
        let balance_type = match options.balance_type {
            EnergyBalanceType::UseDefault => self.package.default_energy_balance_type(),
            other => other,
        };
        match balance_type {
            EnergyBalanceType::None => return Ok(()),
            EnergyBalanceType::EnthalpyTotal | EnergyBalanceType::EnthalpyPhase => {}
            other => return Err(self.unsupported(format!("energy balance type {other:?}"))),
        }
        if options.has_heat_of_reaction && self.rate_reaction_extent.is_empty() {
            return Err(self.unsupported("heat of reaction without rate reactions".into()));
        }

        let rate_reactions = self
            .reaction_package
            .as_ref()
            .map(|p| p.rate_reactions().to_vec())
            .unwrap_or_default();
        let inlet = self.properties_in()?.clone();
        let outlet = self.properties_out()?.clone();
        let watt = Units::watt();

        for t in model.time().indices() {
            let h_in = inlet.at(t)?.enthalpy_flow_term.clone().convert(&watt)?;
            let h_out = outlet.at(t)?.enthalpy_flow_term.clone().convert(&watt)?;
            let mut body = h_in - h_out;

            if options.has_heat_transfer {
                let heat = model.add_var(
                    Variable::new(self.heat.name(), watt.clone()).with_index(Index::Time(t)),
                );
                self.heat.insert(t, heat);
                body = body + heat;
            }
            if options.has_enthalpy_transfer {
                let transfer = model.add_var(
                    Variable::new(self.enthalpy_transfer.name(), watt.clone())
                        .with_index(Index::Time(t)),
                );
                self.enthalpy_transfer.insert(t, transfer);
                body = body + transfer;
            }
            if options.has_heat_of_reaction {
                let released = Expr::sum(rate_reactions.iter().filter_map(|r| {
                    let extent = self.rate_reaction_extent.member(t, r.name())?;
                    Some(r.heat_of_reaction() * extent)
                }));
                body = body - released;
            }

            let balance = model.add_constraint(
                Constraint::equality(self.enthalpy_balances.name(), body, 0.0)
                    .with_index(Index::Time(t)),
            );
            self.enthalpy_balances.insert(t, balance);
        }
        Ok(())
    }

    /// Adds one pressure balance per time point.
    ///
    /// # Errors
    ///
    /// Returns an error for momentum balance types other than pressure
    /// balances, or for a pressure change without momentum balances.
    pub fn add_momentum_balances(
        &mut self,
        model: &mut Model,
        options: &MomentumBalanceOptions,
    ) -> Result<(), ThermoError> {
        match options.balance_type {
            MomentumBalanceType::None if options.has_pressure_change => {
                return Err(self.unsupported("pressure change without momentum balances".into()));
            }
            MomentumBalanceType::None => return Ok(()),
            MomentumBalanceType::PressureTotal | MomentumBalanceType::PressurePhase => {}
            other => return Err(self.unsupported(format!("momentum balance type {other:?}"))),
        }

        let inlet = self.properties_in()?.clone();
        let outlet = self.properties_out()?.clone();
        for t in model.time().indices() {
            let p_in = Quantity::of_var(model, inlet.at(t)?.pressure);
            let p_out = Quantity::of_var(model, outlet.at(t)?.pressure);
            let mut body = p_in.checked_sub(p_out)?;

            if options.has_pressure_change {
                let delta_p = model.add_var(
                    Variable::new(self.delta_p.name(), Units::pascal()).with_index(Index::Time(t)),
                );
                self.delta_p.insert(t, delta_p);
                body = body.checked_add(Quantity::of_var(model, delta_p))?;
            }

            let balance = model.add_constraint(
                Constraint::equality(self.pressure_balance.name(), body.expr().clone(), 0.0)
                    .with_index(Index::Time(t)),
            );
            self.pressure_balance.insert(t, balance);
        }
        Ok(())
    }

    /// Initializes the state and reaction blocks.
    ///
    /// The inlet is seeded from `state_args` and, when `hold_state` is set,
    /// its free state variables are fixed. The outlet is seeded from
    /// `state_args` if given and from the inlet otherwise. The returned flags
    /// must be passed to [`Self::release_state`].
    ///
    /// # Errors
    ///
    /// Returns an error if a block cannot be initialized. Any hold taken by
    /// this call has already been released when an error is returned.
    pub fn initialize(
        &self,
        model: &mut Model,
        state_args: Option<&StateArgs>,
        hold_state: bool,
    ) -> Result<HoldFlags, ThermoError> {
        let inlet = self.properties_in()?;
        inlet.initialize(model, state_args.unwrap_or(&StateArgs::new()))?;

        let flags = if hold_state {
            inlet.hold(model)
        } else {
            HoldFlags::default()
        };

        match self.initialize_interior(model, state_args) {
            Ok(()) => Ok(flags),
            Err(err) => {
                flags.release(model);
                Err(err)
            }
        }
    }

    fn initialize_interior(
        &self,
        model: &mut Model,
        state_args: Option<&StateArgs>,
    ) -> Result<(), ThermoError> {
        let first = model.time().first();
        let outlet_args = match state_args {
            Some(args) => args.clone(),
            None => StateArgs::from_state(model, self.properties_in()?.at(first)?),
        };
        self.properties_out()?.initialize(model, &outlet_args)?;
        if let Some(reactions) = &self.reactions {
            reactions.initialize(model)?;
        }
        Ok(())
    }

    /// Releases a hold taken by [`Self::initialize`].
    pub fn release_state(&self, model: &mut Model, flags: HoldFlags) {
        flags.release(model);
    }

    /// Scales balances by their natural source terms where factors are set.
    ///
    /// Material balances use the mass transfer term, enthalpy balances use the
    /// enthalpy transfer term (or the heat duty), and pressure balances use
    /// the outlet pressure.
    pub fn calculate_scaling_factors(&self, model: &mut Model) {
        for (key, &balance) in &self.material_balances {
            let factor = self
                .mass_transfer_term
                .get(key)
                .and_then(|&mt| model.scaling().get(mt));
            if let Some(factor) = factor {
                model.constraint_scaling_transform(balance, factor);
            }
        }
        for (key, &stoich) in &self.rate_reaction_stoichiometry {
            let factor = self
                .rate_reaction_generation
                .get(key)
                .and_then(|&g| model.scaling().get(g));
            if let Some(factor) = factor {
                model.constraint_scaling_transform(stoich, factor);
            }
        }
        for (t, &balance) in &self.enthalpy_balances {
            let factor = self
                .enthalpy_transfer
                .get(t)
                .or_else(|| self.heat.get(t))
                .and_then(|&v| model.scaling().get(v));
            if let Some(factor) = factor {
                model.constraint_scaling_transform(balance, factor);
            }
        }
        let outlet_pressure = |t: usize| {
            self.properties_out
                .as_ref()
                .and_then(|block| block.at(t).ok())
                .map(|state| state.pressure)
        };
        for (&t, &balance) in &self.pressure_balance {
            let factor: Option<ScalingFactor> =
                outlet_pressure(t).and_then(|p| model.scaling().get(p));
            if let Some(factor) = factor {
                model.constraint_scaling_transform(balance, factor);
            }
        }
    }

    fn unsupported(&self, what: String) -> ThermoError {
        ThermoError::Unsupported {
            block: self.name.clone(),
            what,
        }
    }

    fn missing(&self, part: &'static str, step: &'static str) -> ThermoError {
        ThermoError::MissingPart {
            block: self.name.clone(),
            part,
            step,
        }
    }
}
