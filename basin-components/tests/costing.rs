use std::sync::atomic::{AtomicUsize, Ordering};

use approx::assert_relative_eq;
use basin_components::costing::{
    BuildFn, BuilderMeta, CostBlock, CostingError, CostingPackage, NamedBuilder, ParameterBlock,
    ParameterBlockBuilder, cost_by_flow_volume,
};
use basin_core::{
    Quantity,
    model::{Model, Variable},
    units::Units,
};

fn setup() -> (Model, CostingPackage) {
    let mut model = Model::steady_state("fs");
    let package = CostingPackage::new(&mut model, "costing").unwrap();
    (model, package)
}

fn add_price(model: &mut Model, block: &mut ParameterBlock, name: &str, value: f64) {
    let var = model.add_var(
        Variable::new(format!("{}.{name}", block.name()), Units::dimensionless()).with_value(value),
    );
    block.insert(name, var);
}

fn build_electricity_cost_a(
    model: &mut Model,
    block: &mut ParameterBlock,
) -> Result<(), CostingError> {
    add_price(model, block, "price", 0.07);
    Ok(())
}

fn build_electricity_cost_b(
    model: &mut Model,
    block: &mut ParameterBlock,
) -> Result<(), CostingError> {
    add_price(model, block, "price", 0.09);
    Ok(())
}

static BUILDS: AtomicUsize = AtomicUsize::new(0);

struct CountedBuilder;

impl ParameterBlockBuilder for CountedBuilder {
    fn build(&self, model: &mut Model, block: &mut ParameterBlock) -> Result<(), CostingError> {
        BUILDS.fetch_add(1, Ordering::SeqCst);
        add_price(model, block, "price", 1.0);
        Ok(())
    }
}

#[test]
fn repeated_registration_builds_once() {
    let (mut model, mut package) = setup();

    let first = package
        .register(&mut model, "counted", &CountedBuilder)
        .unwrap()
        .clone();
    for _ in 0..4 {
        let again = package.register(&mut model, "counted", &CountedBuilder).unwrap();
        assert_eq!(again, &first);
    }

    assert_eq!(BUILDS.load(Ordering::SeqCst), 1);
    let vars = model
        .vars()
        .filter(|(_, var)| var.name() == "costing.counted.price")
        .count();
    assert_eq!(vars, 1);
}

#[test]
fn conflicting_builders_name_the_original() {
    let (mut model, mut package) = setup();

    package
        .register(&mut model, "electricity_cost", &build_electricity_cost_a)
        .unwrap();
    let err = package
        .register(&mut model, "electricity_cost", &build_electricity_cost_b)
        .unwrap_err();

    let CostingError::Conflict { builder, module, .. } = &err else {
        panic!("expected a conflict, got {err:?}");
    };
    assert_eq!(builder, "build_electricity_cost_a");
    assert_eq!(module, BuilderMeta::of_val(&build_electricity_cost_a).module());

    let message = err.to_string();
    assert!(message.starts_with(
        "attempting to add identically named costing parameter blocks with different build rules to the costing package costing."
    ));
    assert!(message.contains(
        "Parameter block named electricity_cost was previously built by function build_electricity_cost_a"
    ));

    let price = package
        .parameter_block("electricity_cost")
        .unwrap()
        .var("price")
        .unwrap();
    assert_relative_eq!(model.value(price), 0.07);
}

#[test]
fn function_pointer_builders_are_rejected() {
    let (mut model, mut package) = setup();
    let a: BuildFn = build_electricity_cost_a;
    let b: BuildFn = build_electricity_cost_b;
    let vars = model.vars().count();

    for builder in [a, b] {
        let err = package
            .register(&mut model, "electricity_cost", &builder)
            .unwrap_err();
        assert!(matches!(
            err,
            CostingError::AnonymousBuilder { ref block, .. } if block == "electricity_cost"
        ));
    }
    assert!(package.parameter_block("electricity_cost").is_none());
    assert_eq!(model.vars().count(), vars);
}

#[test]
fn named_function_pointers_keep_distinct_identities() {
    let (mut model, mut package) = setup();
    let a = NamedBuilder::new("build_electricity_cost_a", module_path!(), build_electricity_cost_a);
    let b = NamedBuilder::new("build_electricity_cost_b", module_path!(), build_electricity_cost_b);

    package.register(&mut model, "electricity_cost", &a).unwrap();
    package.register(&mut model, "electricity_cost", &a).unwrap();
    let err = package
        .register(&mut model, "electricity_cost", &b)
        .unwrap_err();

    let CostingError::Conflict { builder, .. } = &err else {
        panic!("expected a conflict, got {err:?}");
    };
    assert_eq!(builder, "build_electricity_cost_a");
}

/// Builds a price block whose value is set per instance.
struct FixedPrice {
    key: &'static str,
    price: f64,
}

impl ParameterBlockBuilder for FixedPrice {
    fn build(&self, model: &mut Model, block: &mut ParameterBlock) -> Result<(), CostingError> {
        add_price(model, block, "price", self.price);
        Ok(())
    }

    fn meta(&self) -> BuilderMeta {
        BuilderMeta::named(self.key, module_path!())
    }
}

#[test]
fn configured_builders_of_one_type_conflict() {
    let (mut model, mut package) = setup();
    let grid = FixedPrice {
        key: "grid",
        price: 0.07,
    };
    let solar = FixedPrice {
        key: "solar",
        price: 0.04,
    };

    package.register(&mut model, "electricity_cost", &grid).unwrap();
    let err = package
        .register(&mut model, "electricity_cost", &solar)
        .unwrap_err();
    assert!(matches!(err, CostingError::Conflict { ref builder, .. } if builder == "grid"));
}

#[test]
fn blocks_without_a_builder_cannot_be_registered() {
    let (mut model, mut package) = setup();

    package.add_block(ParameterBlock::new("costing.legacy")).unwrap();
    let err = package
        .register(&mut model, "legacy", &build_electricity_cost_a)
        .unwrap_err();

    assert!(matches!(err, CostingError::Unregistered { ref block, .. } if block == "legacy"));
    assert!(package.builder_of("legacy").is_none());
}

#[test]
fn duplicate_blocks_are_rejected() {
    let (mut model, mut package) = setup();

    package
        .register(&mut model, "electricity_cost", &build_electricity_cost_a)
        .unwrap();
    let err = package
        .add_block(ParameterBlock::new("electricity_cost"))
        .unwrap_err();
    assert!(matches!(err, CostingError::Duplicate { .. }));
}

#[test]
fn flow_volume_cost_is_proportional_to_flow() {
    let (mut model, package) = setup();
    let mut block = CostBlock::new("screen");

    let usd = Units::usd(2018).unwrap();
    let per_flow = usd / (Units::cubic_meter() / Units::hour());
    let flow = model.add_var(
        Variable::new("screen.flow_vol", Units::cubic_meter() / Units::hour())
            .with_value(50.0)
            .fixed(),
    );
    let flow = Quantity::of_var(&model, flow);
    let flow_cost = Quantity::constant(2.0, per_flow);
    cost_by_flow_volume(&mut model, &package, &mut block, flow_cost, flow).unwrap();
    block.initialize(&mut model).unwrap();

    assert_eq!(block.name(), "screen.costing");
    assert!(block.fixed_operating_cost().is_none());
    assert_relative_eq!(
        model.value(block.capital_cost().unwrap()),
        100.0,
        max_relative = 1e-12
    );
}
