use std::{convert::Infallible, sync::Arc};

use approx::assert_relative_eq;
use basin_components::digester::{
    AnaerobicDigester, BalanceBranch, ConfigurationError, DigesterConfig, InitializationError,
    InitializeOptions, Stage,
};
use basin_core::{
    Fraction,
    dof::degrees_of_freedom,
    model::Model,
    scaling::ScalingFactor,
    solve::{Solver, Termination},
};
use basin_solve::newton::{Config, Newton};
use basin_thermo::{
    Component, FlowBasis, Reaction, ScalingOverride, StateArgs, StateData,
    model::{AqueousPackage, BiogasPackage, DissolvedCo2, FirstOrderKinetics, GAS_CONSTANT},
};

const FEED_FLOW: f64 = 170.0 / 86_400.0;
const FEED_TEMPERATURE: f64 = 308.15;
const FEED_PRESSURE: f64 = 101_325.0;

fn liquor() -> AqueousPackage {
    AqueousPackage::new(
        "liquid",
        vec![
            Component::solvent("H2O", 18.0),
            Component::solute("S_su", 180.0),
            Component::solute("S_h2", 16.0),
            Component::solute("S_ch4", 64.0),
            Component::solute("S_IC", 12.0),
            Component::solute("S_I", 100.0),
        ],
    )
}

fn kinetics() -> FirstOrderKinetics {
    let fraction = Fraction::new(0.2).unwrap();
    FirstOrderKinetics::sugar_uptake("kinetics")
        .with_dissolved_co2(DissolvedCo2::inorganic_carbon(fraction))
}

fn config_with(
    liquid: AqueousPackage,
    vapor: BiogasPackage,
    reactions: FirstOrderKinetics,
) -> DigesterConfig {
    DigesterConfig::new(Arc::new(liquid), Arc::new(vapor), Arc::new(reactions))
        .with_heat_transfer(true)
}

fn config() -> DigesterConfig {
    config_with(liquor(), BiogasPackage::adm1("vapor"), kinetics())
}

fn inlet(ad: &AnaerobicDigester) -> StateData {
    ad.liquid_phase().properties_in().unwrap().at(0).unwrap().clone()
}

fn outlet(ad: &AnaerobicDigester) -> StateData {
    ad.liquid_phase().properties_out().unwrap().at(0).unwrap().clone()
}

/// Fixes the feed and the design volumes.
fn specify(model: &mut Model, ad: &AnaerobicDigester, fix_outlet_temperature: bool) {
    let feed = inlet(ad);
    model.fix_at(feed.flow_vol, FEED_FLOW);
    model.fix_at(feed.temperature, FEED_TEMPERATURE);
    model.fix_at(feed.pressure, FEED_PRESSURE);
    for (component, conc) in [
        ("S_su", 10.0),
        ("S_h2", 1e-4),
        ("S_ch4", 1e-3),
        ("S_IC", 0.01),
        ("S_I", 0.5),
    ] {
        model.fix_at(feed.conc_mass_comp[component], conc);
    }
    if fix_outlet_temperature {
        model.fix_at(outlet(ad).temperature, FEED_TEMPERATURE);
    }
    model.fix_at(ad.volume_liquid().get(&0).copied().unwrap(), 3400.0);
    model.fix_at(ad.volume_vapor().get(&0).copied().unwrap(), 300.0);
}

fn build(config: DigesterConfig) -> (Model, AnaerobicDigester) {
    let mut model = Model::steady_state("fs");
    let ad = AnaerobicDigester::build(&mut model, "AD", config).unwrap();
    specify(&mut model, &ad, true);
    (model, ad)
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

/// Replays a fixed sequence of outcomes without touching the model.
struct Scripted {
    outcomes: Vec<Termination>,
    calls: usize,
}

impl Scripted {
    fn new(outcomes: impl Into<Vec<Termination>>) -> Self {
        Self {
            outcomes: outcomes.into(),
            calls: 0,
        }
    }
}

impl Solver for Scripted {
    type Error = Infallible;

    fn solve(&mut self, _model: &mut Model) -> Result<Termination, Infallible> {
        let outcome = self.outcomes[self.calls.min(self.outcomes.len() - 1)];
        self.calls += 1;
        Ok(outcome)
    }
}

#[test]
fn specified_digester_is_square() {
    let (model, _) = build(config());
    assert_eq!(degrees_of_freedom(&model), 0);
}

#[test]
fn free_outlet_temperature_replaces_the_heat_duty() {
    let mut model = Model::steady_state("fs");
    let config = config().with_heat_transfer(false);
    let ad = AnaerobicDigester::build(&mut model, "AD", config).unwrap();
    specify(&mut model, &ad, false);

    assert!(ad.heat_duty().is_empty());
    assert_eq!(degrees_of_freedom(&model), 0);
}

#[test]
fn pressure_change_is_tied_to_the_headspace() {
    let (model, ad) = build(config().with_pressure_change(true));

    assert_eq!(ad.delta_p().len(), 1);
    assert_eq!(ad.pressure_balance().len(), 1);
    assert_eq!(degrees_of_freedom(&model), 0);
}

#[test]
fn equilibrium_reactions_keep_the_model_square() {
    let reactions = kinetics().with_equilibrium_reaction(
        Reaction::new("E1", [("S_h2", -1.0), ("S_ch4", 1.0)]),
        "S_h2",
        "S_ch4",
        10.0,
    );
    let config = config_with(liquor(), BiogasPackage::adm1("vapor"), reactions)
        .with_equilibrium_reactions(true);
    let (model, ad) = build(config);

    assert_eq!(ad.liquid_phase().equilibrium_reaction_extent().len(), 1);
    assert_eq!(degrees_of_freedom(&model), 0);
}

#[test]
fn liquid_package_must_have_a_single_liquid_phase() {
    let liquid = liquor().with_phases(["Liq", "Gas"]);
    let mut model = Model::steady_state("fs");
    let config = config_with(liquid, BiogasPackage::adm1("vapor"), kinetics());
    let err = AnaerobicDigester::build(&mut model, "AD", config).unwrap_err();

    assert!(matches!(err, ConfigurationError::PhaseList { phase: "liquid", .. }));
    assert_eq!(
        err.to_string(),
        "AD anaerobic digester model requires that the liquid phase property package have a single phase named 'Liq'"
    );
}

#[test]
fn vapor_package_must_have_a_single_vapor_phase() {
    let vapor = BiogasPackage::adm1("vapor").with_phases(["Vap", "Liq"]);
    let mut model = Model::steady_state("fs");
    let config = config_with(liquor(), vapor, kinetics());
    let err = AnaerobicDigester::build(&mut model, "AD", config).unwrap_err();

    assert!(matches!(err, ConfigurationError::PhaseList { phase: "vapor", expected: "Vap", .. }));
}

#[test]
fn packages_must_share_a_component() {
    let liquid = AqueousPackage::new(
        "liquid",
        vec![Component::solvent("Water", 18.0), Component::solute("S_su", 180.0)],
    );
    let config =
        config_with(liquid, BiogasPackage::adm1("vapor"), kinetics()).with_carbon_species(None);
    let mut model = Model::steady_state("fs");
    let err = AnaerobicDigester::build(&mut model, "AD", config).unwrap_err();

    assert!(matches!(err, ConfigurationError::NoCommonComponent { .. }));
    assert!(err.to_string().contains("at least one common component"));
}

#[test]
fn packages_must_share_a_flow_basis() {
    let vapor = BiogasPackage::adm1("vapor").with_flow_basis(FlowBasis::Molar);
    let mut model = Model::steady_state("fs");
    let config = config_with(liquor(), vapor, kinetics());
    let err = AnaerobicDigester::build(&mut model, "AD", config).unwrap_err();

    assert!(matches!(err, ConfigurationError::FlowBasisMismatch { .. }));
}

#[test]
fn other_flow_basis_is_unsupported() {
    let liquid = liquor().with_flow_basis(FlowBasis::Other);
    let vapor = BiogasPackage::adm1("vapor").with_flow_basis(FlowBasis::Other);
    let mut model = Model::steady_state("fs");
    let config = config_with(liquid, vapor, kinetics());
    let err = AnaerobicDigester::build(&mut model, "AD", config).unwrap_err();

    assert_eq!(
        err.to_string(),
        "AD anaerobic digester only supports mass or molar basis for the material flow"
    );
}

#[test]
fn components_are_sorted_into_balance_branches() {
    let (_, ad) = build(config());

    for shared in ["H2O", "S_h2", "S_ch4"] {
        assert_eq!(ad.balance_branch(shared), Some(&BalanceBranch::Shared));
    }
    assert_eq!(
        ad.balance_branch("S_IC"),
        Some(&BalanceBranch::Carbon {
            vapor: "S_co2".to_owned()
        })
    );
    assert_eq!(ad.balance_branch("S_su"), Some(&BalanceBranch::LiquidOnly));
    assert_eq!(ad.balance_branch("S_I"), Some(&BalanceBranch::LiquidOnly));
    assert_eq!(ad.unit_material_balance().len(), 6);
    assert_eq!(ad.transfer_constraints().len(), 3);
}

#[test]
fn build_records_default_variable_scaling() {
    let (model, ad) = build(config());

    let volume = ad.volume_ad().get(&0).copied().unwrap();
    assert_eq!(model.scaling().get(volume), Some(ScalingFactor::of(1e-2)));
    let kh_co2 = ad.henry_coefficients().member(0, "S_co2").unwrap();
    assert_eq!(model.scaling().get(kh_co2), Some(ScalingFactor::of(1e2)));
    let kh_h2 = ad.henry_coefficients().member(0, "S_h2").unwrap();
    assert_eq!(model.scaling().get(kh_h2), Some(ScalingFactor::of(1e4)));
}

#[test]
fn single_phase_balances_are_left_unscaled() {
    let (mut model, ad) = build(config());
    ad.calculate_scaling_factors(&mut model);

    let shared = ad.unit_material_balance().member(0, "S_ch4").unwrap();
    assert_eq!(model.constraint(shared).scaling(), Some(ScalingFactor::of(1e2)));
    for component in ["S_su", "S_IC"] {
        let balance = ad.unit_material_balance().member(0, component).unwrap();
        assert_eq!(model.constraint(balance).scaling(), None);
    }
}

#[test]
fn scaling_twice_matches_scaling_once() {
    let (mut once, ad) = build(config());
    ad.calculate_scaling_factors(&mut once);

    let mut twice = once.clone();
    ad.calculate_scaling_factors(&mut twice);

    let first: Vec<_> = once.constraints().map(|(_, c)| c.scaling()).collect();
    let second: Vec<_> = twice.constraints().map(|(_, c)| c.scaling()).collect();
    assert_eq!(first, second);
    assert_eq!(once.scaling(), twice.scaling());

    for model in [&mut once, &mut twice] {
        let termination = ad
            .initialize(model, InitializeOptions::new(Newton::new(Config::default())))
            .unwrap();
        assert_eq!(termination, Termination::Optimal);
    }
    for (id, var) in once.vars() {
        assert_relative_eq!(
            once.value(id),
            twice.value(id),
            epsilon = 1e-12,
            max_relative = 1e-10
        );
        assert_eq!(var.name(), twice.var(id).name());
    }
}

#[test]
fn package_scaling_overrides_are_applied() {
    let liquid = liquor()
        .with_scaling_override(ScalingOverride::HeatDuty(ScalingFactor::of(1e-6)))
        .with_scaling_override(ScalingOverride::OutletConcentration {
            component: "S_su".to_owned(),
            factor: ScalingFactor::of(1e-5),
        });
    let (mut model, ad) = build(config_with(liquid, BiogasPackage::adm1("vapor"), kinetics()));
    ad.calculate_scaling_factors(&mut model);

    let heat = ad.heat_duty().get(&0).copied().unwrap();
    assert_eq!(model.scaling().get(heat), Some(ScalingFactor::of(1e-6)));
    let conc = outlet(&ad).conc_mass_comp["S_su"];
    assert_eq!(model.scaling().get(conc), Some(ScalingFactor::of(1e-5)));
}

#[test]
fn initialization_converges_to_a_consistent_digester() {
    init_tracing();
    let (mut model, ad) = build(config());
    ad.calculate_scaling_factors(&mut model);

    let termination = ad
        .initialize(&mut model, InitializeOptions::new(Newton::new(Config::default())))
        .unwrap();
    assert_eq!(termination, Termination::Optimal);

    let vapor = ad.vapor_phase().at(0).unwrap().clone();
    let flow_vap = model.value(vapor.flow_vol);
    assert!(flow_vap > 0.0);
    assert!(model.value(vapor.pressure) > FEED_PRESSURE);

    // Shared components leave the liquid exactly as fast as the vapor carries them.
    for component in ["H2O", "S_h2", "S_ch4"] {
        let transfer = ad.liquid_phase().mass_transfer_term().member(0, component).unwrap();
        let carried = flow_vap * model.value(vapor.conc_mass_comp[component]);
        assert_relative_eq!(model.value(transfer), -carried, epsilon = 1e-9);
    }
    let carbon = ad.liquid_phase().mass_transfer_term().member(0, "S_IC").unwrap();
    let carried = flow_vap * model.value(vapor.conc_mass_comp["S_co2"]);
    assert_relative_eq!(model.value(carbon), -carried, epsilon = 1e-7);

    let exponent = -19_410.0 / (GAS_CONSTANT * 1e-3) * (1.0 / 298.15 - 1.0 / FEED_TEMPERATURE);
    let kh_co2 = ad.henry_coefficients().member(0, "S_co2").unwrap();
    assert_relative_eq!(model.value(kh_co2), 0.035 * exponent.exp(), max_relative = 1e-6);

    let electricity = ad.electricity_consumption().get(&0).copied().unwrap();
    assert_relative_eq!(model.value(electricity), 0.029 * 170.0 / 24.0, max_relative = 1e-6);
    let volume = ad.volume_ad().get(&0).copied().unwrap();
    assert_relative_eq!(model.value(volume), 3700.0, max_relative = 1e-9);

    let feed = inlet(&ad);
    assert!(model.is_fixed(feed.flow_vol));
    assert!(model.is_fixed(feed.conc_mass_comp["S_su"]));
}

#[test]
fn explicit_vapor_guesses_are_used() {
    let (mut model, ad) = build(config());
    let args = StateArgs::new()
        .with_scalar("flow_vol", 0.005)
        .with_scalar("pressure", 102_000.0);

    let mut solver = Scripted::new([Termination::Optimal]);
    ad.initialize(&mut model, InitializeOptions::new(&mut solver).with_vapor_state_args(args))
        .unwrap();

    let vapor = ad.vapor_phase().at(0).unwrap();
    assert_relative_eq!(model.value(vapor.flow_vol), 0.005);
    assert_relative_eq!(model.value(vapor.pressure), 102_000.0);
}

#[test]
fn vapor_guess_follows_the_liquid_outlet() {
    let (mut model, ad) = build(config());

    let mut solver = Scripted::new([Termination::Optimal]);
    ad.initialize(&mut model, InitializeOptions::new(&mut solver)).unwrap();

    let vapor = ad.vapor_phase().at(0).unwrap();
    assert_relative_eq!(model.value(vapor.flow_vol), FEED_FLOW * 13.0, max_relative = 1e-12);
    assert_relative_eq!(model.value(vapor.pressure), FEED_PRESSURE * 1.05, max_relative = 1e-12);
    assert_relative_eq!(model.value(vapor.temperature), FEED_TEMPERATURE);
}

#[test]
fn vapor_guess_uses_the_seeded_liquid_outlet() {
    let (mut model, ad) = build(config());
    let liquid_args = StateArgs::new()
        .with_scalar("flow_vol", 0.01)
        .with_scalar("pressure", 200_000.0);

    let mut solver = Scripted::new([Termination::Optimal]);
    let options = InitializeOptions::new(&mut solver).with_liquid_state_args(liquid_args);
    ad.initialize(&mut model, options).unwrap();

    let feed = inlet(&ad);
    assert_relative_eq!(model.value(feed.pressure), FEED_PRESSURE);
    let product = outlet(&ad);
    assert_relative_eq!(model.value(product.pressure), 200_000.0);

    let vapor = ad.vapor_phase().at(0).unwrap();
    assert_relative_eq!(model.value(vapor.flow_vol), 0.13, max_relative = 1e-12);
    assert_relative_eq!(model.value(vapor.pressure), 210_000.0, max_relative = 1e-12);
}

#[test]
fn explicit_vapor_guesses_skip_the_guess_stage() {
    let (mut model, ad) = build(config());
    let args = StateArgs::new().with_scalar("pressure", 102_000.0);
    let mut stages = Vec::new();
    let mut solver = Scripted::new([Termination::Optimal]);

    ad.initialize_with(
        &mut model,
        InitializeOptions::new(&mut solver).with_vapor_state_args(args),
        &basin_core::dof::IncidenceDof,
        |stage: &Stage| -> Option<()> {
            stages.push(*stage);
            None
        },
    )
    .unwrap();

    assert_eq!(
        stages,
        [
            Stage::Precheck,
            Stage::LiquidInit,
            Stage::VaporInit,
            Stage::CoupledSolve { attempt: 1 },
            Stage::Release,
            Stage::Done,
        ]
    );
}

#[test]
fn second_failure_reports_both_attempts() {
    init_tracing();
    let (mut model, ad) = build(config());
    let mut stages = Vec::new();
    let mut solver = Scripted::new([Termination::Infeasible, Termination::MaxIterations]);

    let err = ad
        .initialize_with(
            &mut model,
            InitializeOptions::new(&mut solver),
            &basin_core::dof::IncidenceDof,
            |stage: &Stage| -> Option<()> {
                stages.push(*stage);
                None
            },
        )
        .unwrap_err();

    assert!(matches!(
        err,
        InitializationError::Failed {
            termination: Termination::MaxIterations,
            ..
        }
    ));
    assert_eq!(
        err.to_string(),
        "AD failed to initialize successfully. Please check the output logs."
    );
    assert_eq!(solver.calls, 2);
    assert_eq!(
        stages,
        [
            Stage::Precheck,
            Stage::LiquidInit,
            Stage::VaporGuess,
            Stage::VaporInit,
            Stage::CoupledSolve { attempt: 1 },
            Stage::CoupledSolve { attempt: 2 },
            Stage::Release,
            Stage::Failed,
        ]
    );
}

#[test]
fn retry_recovers_from_a_first_failure() {
    let (mut model, ad) = build(config());
    let mut stages = Vec::new();
    let mut solver = Scripted::new([Termination::Infeasible, Termination::Optimal]);

    let termination = ad
        .initialize_with(
            &mut model,
            InitializeOptions::new(&mut solver),
            &basin_core::dof::IncidenceDof,
            |stage: &Stage| -> Option<()> {
                stages.push(*stage);
                None
            },
        )
        .unwrap();

    assert_eq!(termination, Termination::Optimal);
    assert_eq!(solver.calls, 2);
    assert_eq!(stages[stages.len() - 2..], [Stage::Release, Stage::Done]);
}

#[test]
fn held_inlet_is_released_on_success_and_failure() {
    for outcome in [Termination::Optimal, Termination::Infeasible] {
        let (mut model, ad) = build(config());
        let flow = inlet(&ad).flow_vol;
        model.unfix(flow);

        let mut solver = Scripted::new([outcome]);
        let options = InitializeOptions::new(&mut solver);
        let result = ad.initialize_with(&mut model, options, &|_: &Model| 0_i64, ());

        assert_eq!(result.is_ok(), outcome.is_optimal());
        assert!(!model.is_fixed(flow));
        assert!(model.is_fixed(inlet(&ad).temperature));
    }
}

#[test]
fn nonzero_degrees_of_freedom_stop_before_solving() {
    let (mut model, ad) = build(config());
    let mut stages = Vec::new();
    let mut solver = Scripted::new([Termination::Optimal]);

    let err = ad
        .initialize_with(
            &mut model,
            InitializeOptions::new(&mut solver),
            &|_: &Model| 3_i64,
            |stage: &Stage| -> Option<()> {
                stages.push(*stage);
                None
            },
        )
        .unwrap_err();

    assert!(matches!(err, InitializationError::DegreesOfFreedom { dof: 3, .. }));
    assert!(err.to_string().contains("DoF = 3"));
    assert_eq!(solver.calls, 0);
    assert_eq!(stages, [Stage::Precheck, Stage::Failed]);
}

#[test]
fn underspecified_digester_fails_the_precheck() {
    let (mut model, ad) = build(config());
    model.unfix(ad.volume_vapor().get(&0).copied().unwrap());

    let err = ad
        .initialize(&mut model, InitializeOptions::new(Scripted::new([Termination::Optimal])))
        .unwrap_err();
    assert!(matches!(err, InitializationError::DegreesOfFreedom { dof: 1, .. }));
}
