use std::ops::{Div, Mul, Neg};

use uom::si::{
    area::square_meter,
    f64::{
        Area, Energy, MassDensity, MassRate, Power, Pressure, ThermodynamicTemperature, Time,
        Volume, VolumeRate,
    },
    energy::joule,
    mass_density::kilogram_per_cubic_meter,
    mass_rate::kilogram_per_second,
    power::watt,
    pressure::pascal,
    thermodynamic_temperature::kelvin,
    time::second,
    volume::cubic_meter,
    volume_rate::cubic_meter_per_second,
};

use crate::{
    expr::Expr,
    model::{Model, ParamId, VarId},
    units::{Units, UnitsError},
};

/// An expression paired with its units of measure.
///
/// Quantities are how dimensional consistency is enforced when building
/// constraints: two sides of an equality are brought into common units with
/// [`Quantity::convert`], which fails if the dimensions differ.
///
/// # Examples
///
/// ```
/// use basin_core::{Quantity, units::Units};
///
/// let flow = Quantity::constant(50.0, Units::cubic_meter() / Units::hour());
/// let si = flow.convert(&(Units::cubic_meter() / Units::second())).unwrap();
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Quantity {
    expr: Expr,
    units: Units,
}

impl Quantity {
    pub fn new(expr: impl Into<Expr>, units: Units) -> Self {
        Self {
            expr: expr.into(),
            units,
        }
    }

    #[must_use]
    pub fn constant(value: f64, units: Units) -> Self {
        Self::new(Expr::Const(value), units)
    }

    /// A variable in its declared units.
    #[must_use]
    pub fn of_var(model: &Model, id: VarId) -> Self {
        Self::new(id, model.var(id).units().clone())
    }

    /// A parameter in its declared units.
    #[must_use]
    pub fn of_param(model: &Model, id: ParamId) -> Self {
        Self::new(id, model.param(id).units().clone())
    }

    #[must_use]
    pub fn expr(&self) -> &Expr {
        &self.expr
    }

    #[must_use]
    pub fn units(&self) -> &Units {
        &self.units
    }

    /// Expresses the quantity in `to` and returns the resulting expression.
    ///
    /// # Errors
    ///
    /// Returns [`UnitsError::Inconvertible`] if the dimensions differ.
    pub fn convert(self, to: &Units) -> Result<Expr, UnitsError> {
        Ok(self.convert_to(to)?.expr)
    }

    /// Expresses the quantity in `to`.
    ///
    /// # Errors
    ///
    /// Returns [`UnitsError::Inconvertible`] if the dimensions differ.
    pub fn convert_to(self, to: &Units) -> Result<Quantity, UnitsError> {
        let factor = self.units.conversion_factor(to)?;
        #[allow(clippy::float_cmp)]
        let expr = if factor == 1.0 {
            self.expr
        } else {
            self.expr * factor
        };
        Ok(Quantity {
            expr,
            units: to.clone(),
        })
    }

    /// Adds `other` after converting it into the units of `self`.
    ///
    /// # Errors
    ///
    /// Returns [`UnitsError::Inconvertible`] if the dimensions differ.
    pub fn checked_add(self, other: Quantity) -> Result<Quantity, UnitsError> {
        let rhs = other.convert(&self.units)?;
        Ok(Quantity {
            expr: self.expr + rhs,
            units: self.units,
        })
    }

    /// Subtracts `other` after converting it into the units of `self`.
    ///
    /// # Errors
    ///
    /// Returns [`UnitsError::Inconvertible`] if the dimensions differ.
    pub fn checked_sub(self, other: Quantity) -> Result<Quantity, UnitsError> {
        let rhs = other.convert(&self.units)?;
        Ok(Quantity {
            expr: self.expr - rhs,
            units: self.units,
        })
    }

    /// Applies `f` to the expression, leaving units unchanged.
    #[must_use]
    pub fn map(self, f: impl FnOnce(Expr) -> Expr) -> Self {
        Self {
            expr: f(self.expr),
            units: self.units,
        }
    }
}

impl Mul for Quantity {
    type Output = Quantity;

    fn mul(self, rhs: Quantity) -> Quantity {
        Quantity {
            units: &self.units * &rhs.units,
            expr: self.expr * rhs.expr,
        }
    }
}

impl Div for Quantity {
    type Output = Quantity;

    fn div(self, rhs: Quantity) -> Quantity {
        Quantity {
            units: &self.units / &rhs.units,
            expr: self.expr / rhs.expr,
        }
    }
}

impl Mul<f64> for Quantity {
    type Output = Quantity;

    fn mul(self, rhs: f64) -> Quantity {
        self.map(|e| e * rhs)
    }
}

impl Neg for Quantity {
    type Output = Quantity;

    fn neg(self) -> Quantity {
        self.map(|e| -e)
    }
}

macro_rules! impl_from_uom {
    ($($quantity:ty => $unit:ty, $units:expr;)*) => {
        $(
            impl From<$quantity> for Quantity {
                fn from(value: $quantity) -> Self {
                    Quantity::constant(value.get::<$unit>(), $units)
                }
            }
        )*
    };
}

impl_from_uom! {
    Area => square_meter, Units::square_meter();
    Energy => joule, Units::joule();
    MassDensity => kilogram_per_cubic_meter, Units::kilogram() / Units::cubic_meter();
    MassRate => kilogram_per_second, Units::kilogram() / Units::second();
    Power => watt, Units::watt();
    Pressure => pascal, Units::pascal();
    ThermodynamicTemperature => kelvin, Units::kelvin();
    Time => second, Units::second();
    Volume => cubic_meter, Units::cubic_meter();
    VolumeRate => cubic_meter_per_second, Units::cubic_meter() / Units::second();
}

#[cfg(test)]
mod tests {
    use super::*;

    use approx::assert_relative_eq;
    use uom::si::volume_rate::cubic_meter_per_hour;

    use crate::model::Variable;

    #[test]
    fn converts_variables_into_target_units() {
        let mut model = Model::steady_state("test");
        let flow = model.add_var(
            Variable::new("flow_vol", Units::cubic_meter() / Units::second()).with_value(1.0),
        );

        let per_hour = Quantity::of_var(&model, flow)
            .convert(&(Units::cubic_meter() / Units::hour()))
            .unwrap();
        assert_relative_eq!(per_hour.eval(&model), 3600.0);
    }

    #[test]
    fn products_carry_units() {
        let per_flow = Units::usd_ce500() / (Units::cubic_meter() / Units::hour());
        let price = Quantity::constant(2.0, per_flow);
        let flow = Quantity::from(VolumeRate::new::<cubic_meter_per_hour>(50.0));

        let cost = (price * flow).convert(&Units::usd_ce500()).unwrap();
        assert_relative_eq!(cost.eval(&Model::steady_state("m")), 100.0, epsilon = 1e-9);
    }

    #[test]
    fn mismatched_dimensions_fail() {
        let power = Quantity::constant(1.0, Units::kilowatt());
        let err = power.checked_add(Quantity::constant(1.0, Units::kelvin()));
        assert!(matches!(err, Err(UnitsError::Inconvertible { .. })));
    }
}
