use basin_core::{
    Fraction, Quantity,
    expr::Expr,
    model::{Constraint, Index, Model, VarId, Variable},
    units::Units,
};

use uom::si::{f64::Power, power::kilowatt};

use super::{CostBlock, CostingError, CostingPackage, ParameterBlock, ParameterBlockBuilder};

/// Starting value of every cost variable, in base currency.
const COST_INITIAL: f64 = 1e5;

/// Rectifier cost correlation coefficients, USD_2021: `c1 + c0 * P[kW]`.
const RECTIFIER_COST_COEFF: [(&str, f64); 2] = [("0", 508.6), ("1", 2810.0)];
const RECTIFIER_COST_YEAR: u16 = 2021;

/// Declares `capital_cost` on `block`, in the package's base currency.
pub fn make_capital_cost_var(
    model: &mut Model,
    package: &CostingPackage,
    block: &mut CostBlock,
) -> VarId {
    let var = model.add_var(
        Variable::new(format!("{}.capital_cost", block.name), package.base_currency().clone())
            .with_value(COST_INITIAL)
            .non_negative(),
    );
    block.capital_cost = Some(var);
    var
}

/// Declares `fixed_operating_cost` on `block`, in base currency per base
/// period.
pub fn make_fixed_operating_cost_var(
    model: &mut Model,
    package: &CostingPackage,
    block: &mut CostBlock,
) -> VarId {
    let units = package.base_currency() / package.base_period();
    let var = model.add_var(
        Variable::new(format!("{}.fixed_operating_cost", block.name), units)
            .with_value(COST_INITIAL)
            .non_negative(),
    );
    block.fixed_operating_cost = Some(var);
    var
}

/// Costs a membrane by area.
///
/// `membrane_cost` is in currency per area and `replacement_factor` is the
/// share of membrane replaced per period.
///
/// # Errors
///
/// Returns a units error if either cost cannot be expressed in the
/// package's base units.
pub fn cost_membrane(
    model: &mut Model,
    package: &CostingPackage,
    block: &mut CostBlock,
    membrane_cost: Quantity,
    replacement_factor: Quantity,
    area: Quantity,
) -> Result<(), CostingError> {
    let membrane = membrane_cost * area;
    let capital = membrane.clone().convert(package.base_currency())?;
    let operating_units = package.base_currency() / package.base_period();
    let replacement = (replacement_factor * membrane).convert(&operating_units)?;

    let capital_cost = make_capital_cost_var(model, package, block);
    let fixed_operating_cost = make_fixed_operating_cost_var(model, package, block);
    let capital = model.add_constraint(Constraint::equality(
        format!("{}.capital_cost_constraint", block.name),
        capital_cost,
        capital,
    ));
    block.define(capital_cost, capital);
    let operating = model.add_constraint(Constraint::equality(
        format!("{}.fixed_operating_cost_constraint", block.name),
        fixed_operating_cost,
        replacement,
    ));
    block.define(fixed_operating_cost, operating);
    Ok(())
}

/// Costs a unit in proportion to the volumetric flow it handles.
///
/// # Errors
///
/// Returns a units error if `flow_cost * flow` is not a currency.
pub fn cost_by_flow_volume(
    model: &mut Model,
    package: &CostingPackage,
    block: &mut CostBlock,
    flow_cost: Quantity,
    flow: Quantity,
) -> Result<(), CostingError> {
    let capital = (flow_cost * flow).convert(package.base_currency())?;
    let capital_cost = make_capital_cost_var(model, package, block);
    let constraint = model.add_constraint(Constraint::equality(
        format!("{}.capital_cost_constraint", block.name),
        capital_cost,
        capital,
    ));
    block.define(capital_cost, constraint);
    Ok(())
}

/// Inputs to [`cost_rectifier`].
#[derive(Debug, Clone, PartialEq)]
pub struct RectifierOptions {
    /// Direct current demand of the unit.
    pub power: Quantity,
    /// Share of alternating current delivered as direct current.
    pub efficiency: f64,
}

impl Default for RectifierOptions {
    fn default() -> Self {
        Self {
            power: Quantity::constant(100.0, Units::kilowatt()),
            efficiency: 0.90,
        }
    }
}

impl RectifierOptions {
    /// Sets a fixed direct current demand.
    #[must_use]
    pub fn with_power(mut self, power: Power) -> Self {
        self.power = Quantity::constant(power.get::<kilowatt>(), Units::kilowatt());
        self
    }

    #[must_use]
    pub fn with_efficiency(mut self, efficiency: f64) -> Self {
        self.efficiency = efficiency;
        self
    }
}

/// Costs the rectifier feeding a unit that runs on direct current.
///
/// Adds an `ac_power` variable drawn from the grid, prices the rectifier
/// with an affine correlation in that power, and charges the power to the
/// package's electricity flow.
///
/// # Errors
///
/// Returns [`CostingError::Efficiency`] if the efficiency is not a nonzero
/// fraction, or a units error if `power` is not a power.
pub fn cost_rectifier(
    model: &mut Model,
    package: &mut CostingPackage,
    block: &mut CostBlock,
    options: RectifierOptions,
) -> Result<(), CostingError> {
    let efficiency = Fraction::new(options.efficiency)?;
    if efficiency.is_zero() {
        return Err(CostingError::Efficiency(basin_core::FractionError::OutOfRange(0.0)));
    }

    let dc_power = options.power.convert(&Units::kilowatt())?;
    let to_base = Units::usd(RECTIFIER_COST_YEAR)?.conversion_factor(package.base_currency())?;

    let capital_cost = make_capital_cost_var(model, package, block);
    let ac_power = model.add_var(
        Variable::new(format!("{}.ac_power", block.name), Units::kilowatt())
            .with_value(100.0)
            .non_negative(),
    );
    block.vars.insert("ac_power".to_owned(), ac_power);

    let conversion = model.add_constraint(Constraint::equality(
        format!("{}.power_conversion", block.name),
        ac_power * efficiency,
        dc_power,
    ));
    block.define(ac_power, conversion);

    let mut coeff = Vec::with_capacity(RECTIFIER_COST_COEFF.len());
    for (index, value) in RECTIFIER_COST_COEFF {
        let var = model.add_var(
            Variable::new(
                format!("{}.rectifier_cost_coeff", block.name),
                Units::dimensionless(),
            )
            .with_index(Index::Member(index.to_owned()))
            .with_value(value)
            .fixed(),
        );
        block.vars.insert(format!("rectifier_cost_coeff[{index}]"), var);
        coeff.push(var);
    }

    // The correlation takes AC power as a bare number of kW.
    let correlation = (Expr::from(coeff[1]) + Expr::from(coeff[0]) * ac_power) * to_base;
    let capital = model.add_constraint(Constraint::equality(
        format!("{}.capital_cost_constraint", block.name),
        capital_cost,
        correlation,
    ));
    block.define(capital_cost, capital);

    package.cost_flow(Quantity::of_var(model, ac_power), "electricity")
}

/// Shared membrane prices registered under [`MembraneCostParameters::BLOCK`].
#[derive(Debug, Clone, Copy, Default)]
pub struct MembraneCostParameters;

impl MembraneCostParameters {
    pub const BLOCK: &'static str = "membrane";
    /// Membrane price, USD_2018/m^2.
    pub const MEMBRANE_COST: f64 = 30.0;
    /// Share of membrane replaced each year.
    pub const REPLACEMENT_FACTOR: f64 = 0.2;
}

impl ParameterBlockBuilder for MembraneCostParameters {
    fn build(&self, model: &mut Model, block: &mut ParameterBlock) -> Result<(), CostingError> {
        let currency = Units::usd(2018)?;
        let membrane_cost = model.add_var(
            Variable::new(
                format!("{}.membrane_cost", block.name()),
                currency / Units::square_meter(),
            )
            .with_value(Self::MEMBRANE_COST),
        );
        let replacement = model.add_var(
            Variable::new(
                format!("{}.factor_membrane_replacement", block.name()),
                Units::dimensionless() / Units::year(),
            )
            .with_value(Self::REPLACEMENT_FACTOR),
        );
        block.insert("membrane_cost", membrane_cost);
        block.insert("factor_membrane_replacement", replacement);
        Ok(())
    }
}

/// Costs a membrane by area using the package-wide membrane prices.
///
/// # Errors
///
/// Returns a registry error if the `membrane` block was built by another
/// builder, or any error from [`cost_membrane`].
pub fn cost_registered_membrane(
    model: &mut Model,
    package: &mut CostingPackage,
    block: &mut CostBlock,
    area: Quantity,
) -> Result<(), CostingError> {
    let params = package.register(model, MembraneCostParameters::BLOCK, &MembraneCostParameters)?;
    let membrane_cost = params.var("membrane_cost")?;
    let replacement = params.var("factor_membrane_replacement")?;

    let membrane_cost = Quantity::of_var(model, membrane_cost);
    let replacement = Quantity::of_var(model, replacement);
    cost_membrane(model, package, block, membrane_cost, replacement, area)
}
