//! Capital and operating costs for process units.
//!
//! A [`CostingPackage`] is created once per flowsheet and passed explicitly to
//! every costed unit. It owns the shared parameter blocks (see
//! [`CostingPackage::register`]) and the flow types that units draw on, such
//! as electricity. Each unit gets a [`CostBlock`] filled in by one of the
//! templates in this module.

mod error;
mod registry;
mod templates;

use std::collections::BTreeMap;

use basin_core::{
    Quantity,
    expr::Expr,
    model::{ConstraintId, Model, VarId, Variable},
    units::Units,
};
use tracing::debug;

pub use error::CostingError;
pub use registry::{
    BuildFn, BuilderMeta, NamedBuilder, ParameterBlock, ParameterBlockBuilder,
};
pub use templates::{
    MembraneCostParameters, RectifierOptions, cost_by_flow_volume, cost_membrane, cost_rectifier,
    cost_registered_membrane, make_capital_cost_var, make_fixed_operating_cost_var,
};

use registry::Registered;

/// Default year of the base currency.
const BASE_CURRENCY_YEAR: u16 = 2018;
/// Default electricity price, USD_2018/kWh.
const ELECTRICITY_PRICE: f64 = 0.07;

/// A priced flow that units can draw on.
#[derive(Debug, Clone, PartialEq)]
pub struct FlowType {
    units: Units,
    price: VarId,
}

impl FlowType {
    /// Units every costed flow of this type is converted to.
    #[must_use]
    pub fn units(&self) -> &Units {
        &self.units
    }

    /// Fixed price per unit of flow.
    #[must_use]
    pub fn price(&self) -> VarId {
        self.price
    }
}

/// Shared costing context for one flowsheet.
#[derive(Debug, Clone)]
pub struct CostingPackage {
    name: String,
    base_currency: Units,
    base_period: Units,
    blocks: BTreeMap<String, Registered>,
    flow_types: BTreeMap<String, FlowType>,
    flows: BTreeMap<String, Vec<Expr>>,
}

impl CostingPackage {
    /// Creates a package in `USD_2018` per year with electricity registered
    /// as a flow type.
    ///
    /// # Errors
    ///
    /// Returns an error if the base currency is not tabulated.
    pub fn new(model: &mut Model, name: impl Into<String>) -> Result<Self, CostingError> {
        let base_currency = Units::usd(BASE_CURRENCY_YEAR)?;
        let mut package = Self {
            name: name.into(),
            base_period: Units::year(),
            flow_types: BTreeMap::new(),
            flows: BTreeMap::new(),
            blocks: BTreeMap::new(),
            base_currency: base_currency.clone(),
        };
        package.register_flow_type(
            model,
            "electricity",
            Units::kilowatt(),
            Quantity::constant(ELECTRICITY_PRICE, base_currency / Units::kilowatt_hour()),
        )?;
        Ok(package)
    }

    #[must_use]
    pub fn with_base_currency(mut self, currency: Units) -> Self {
        self.base_currency = currency;
        self
    }

    #[must_use]
    pub fn with_base_period(mut self, period: Units) -> Self {
        self.base_period = period;
        self
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn base_currency(&self) -> &Units {
        &self.base_currency
    }

    #[must_use]
    pub fn base_period(&self) -> &Units {
        &self.base_period
    }

    /// Adds a flow type with a fixed price.
    ///
    /// The price variable keeps the units of `price`.
    ///
    /// # Errors
    ///
    /// Returns [`CostingError::Duplicate`] if the name is taken, or a units
    /// error if `price` is not a constant.
    pub fn register_flow_type(
        &mut self,
        model: &mut Model,
        name: &str,
        units: Units,
        price: Quantity,
    ) -> Result<VarId, CostingError> {
        if self.flow_types.contains_key(name) {
            return Err(CostingError::Duplicate {
                package: self.name.clone(),
                block: name.to_owned(),
            });
        }
        let value = price.expr().eval(&*model);
        let price = model.add_var(
            Variable::new(format!("{}.{name}_cost", self.name), price.units().clone())
                .with_value(value)
                .fixed(),
        );
        self.flow_types
            .insert(name.to_owned(), FlowType { units, price });
        debug!(package = %self.name, flow = name, "registered flow type");
        Ok(price)
    }

    #[must_use]
    pub fn flow_type(&self, name: &str) -> Option<&FlowType> {
        self.flow_types.get(name)
    }

    /// Charges `flow` to the flow type `flow_type`.
    ///
    /// # Errors
    ///
    /// Returns [`CostingError::UnknownFlowType`] for an unregistered flow type
    /// or a units error if `flow` cannot be expressed in its units.
    pub fn cost_flow(&mut self, flow: Quantity, flow_type: &str) -> Result<(), CostingError> {
        let units = &self.flow_type_or_err(flow_type)?.units;
        let expr = flow.convert(units)?;
        self.flows.entry(flow_type.to_owned()).or_default().push(expr);
        Ok(())
    }

    /// Total of every flow charged to `flow_type`.
    ///
    /// # Errors
    ///
    /// Returns [`CostingError::UnknownFlowType`] for an unregistered flow type.
    pub fn aggregate_flow(&self, flow_type: &str) -> Result<Quantity, CostingError> {
        let units = self.flow_type_or_err(flow_type)?.units.clone();
        let terms = self.flows.get(flow_type).cloned().unwrap_or_default();
        Ok(Quantity::new(Expr::sum(terms), units))
    }

    fn flow_type_or_err(&self, name: &str) -> Result<&FlowType, CostingError> {
        self.flow_types
            .get(name)
            .ok_or_else(|| CostingError::UnknownFlowType {
                package: self.name.clone(),
                flow: name.to_owned(),
            })
    }
}

/// Cost variables and constraints of one unit.
#[derive(Debug, Clone, Default)]
pub struct CostBlock {
    name: String,
    capital_cost: Option<VarId>,
    fixed_operating_cost: Option<VarId>,
    vars: BTreeMap<String, VarId>,
    definitions: Vec<(VarId, ConstraintId)>,
}

impl CostBlock {
    /// An empty cost block for the unit `unit`.
    pub fn new(unit: &str) -> Self {
        Self {
            name: format!("{unit}.costing"),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn capital_cost(&self) -> Option<VarId> {
        self.capital_cost
    }

    #[must_use]
    pub fn fixed_operating_cost(&self) -> Option<VarId> {
        self.fixed_operating_cost
    }

    /// Returns a template-specific variable, such as `ac_power`.
    #[must_use]
    pub fn var(&self, name: &str) -> Option<VarId> {
        self.vars.get(name).copied()
    }

    /// Variables paired with the constraints that define them.
    #[must_use]
    pub fn definitions(&self) -> &[(VarId, ConstraintId)] {
        &self.definitions
    }

    /// Computes every cost variable from its defining constraint, in the
    /// order the template declared them.
    ///
    /// # Errors
    ///
    /// Returns an error if a variable cannot be calculated.
    pub fn initialize(&self, model: &mut Model) -> Result<(), CostingError> {
        for &(var, constraint) in &self.definitions {
            model.calculate_variable_from_constraint(var, constraint)?;
        }
        Ok(())
    }

    fn define(&mut self, var: VarId, constraint: ConstraintId) {
        self.definitions.push((var, constraint));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use approx::assert_relative_eq;

    #[test]
    fn electricity_is_registered_by_default() {
        let mut model = Model::steady_state("fs");
        let package = CostingPackage::new(&mut model, "costing").unwrap();

        let electricity = package.flow_type("electricity").unwrap();
        assert_eq!(electricity.units(), &Units::kilowatt());
        assert!(model.is_fixed(electricity.price()));
        assert_relative_eq!(model.value(electricity.price()), 0.07);
    }

    #[test]
    fn aggregate_flow_sums_converted_flows() {
        let mut model = Model::steady_state("fs");
        let mut package = CostingPackage::new(&mut model, "costing").unwrap();

        package
            .cost_flow(Quantity::constant(2.0, Units::kilowatt()), "electricity")
            .unwrap();
        package
            .cost_flow(Quantity::constant(500.0, Units::watt()), "electricity")
            .unwrap();

        let total = package.aggregate_flow("electricity").unwrap();
        assert_relative_eq!(total.expr().eval(&model), 2.5);
    }

    #[test]
    fn unknown_flow_types_are_rejected() {
        let mut model = Model::steady_state("fs");
        let mut package = CostingPackage::new(&mut model, "costing").unwrap();

        let err = package
            .cost_flow(Quantity::constant(1.0, Units::kilowatt()), "steam")
            .unwrap_err();
        assert!(matches!(err, CostingError::UnknownFlowType { flow, .. } if flow == "steam"));
    }
}
