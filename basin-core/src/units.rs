//! Runtime units of measure for model variables, parameters, and expressions.
//!
//! Symbolic expressions are assembled at runtime, so their units are tracked
//! at runtime too. A [`Units`] value is a set of dimension exponents plus a
//! scale factor relative to the coherent SI unit of those dimensions.
//!
//! Currency is carried as its own dimension. Dollar amounts from different
//! years are made comparable through the Chemical Engineering Plant Cost Index
//! (CEPCI), with `USD_CE500` (an index value of 500) as the base unit.

use std::{
    fmt,
    ops::{Div, Mul},
};

use thiserror::Error;

/// Errors that can occur when working with units.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UnitsError {
    /// The two units have different dimensions.
    #[error("cannot convert units `{from}` to `{to}`")]
    Inconvertible { from: String, to: String },

    /// No cost index value is available for the requested currency year.
    #[error("no cost index is available for USD_{0}")]
    UnknownCurrencyYear(u16),
}

/// Annual CEPCI values used to index dollar amounts.
const CEPCI: [(u16, f64); 7] = [
    (2015, 556.8),
    (2016, 541.7),
    (2017, 567.5),
    (2018, 603.1),
    (2019, 607.5),
    (2020, 596.2),
    (2021, 708.0),
];

const BASE_CEPCI: f64 = 500.0;

/// Exponents of the seven base dimensions.
///
/// The slots are, in order: length, mass, time, temperature, amount of
/// substance, electric current, and currency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(
    feature = "serde-derive",
    derive(serde::Serialize, serde::Deserialize)
)]
pub struct Dimensions([i8; 7]);

impl Dimensions {
    pub const NONE: Self = Self([0, 0, 0, 0, 0, 0, 0]);
    pub const LENGTH: Self = Self([1, 0, 0, 0, 0, 0, 0]);
    pub const MASS: Self = Self([0, 1, 0, 0, 0, 0, 0]);
    pub const TIME: Self = Self([0, 0, 1, 0, 0, 0, 0]);
    pub const TEMPERATURE: Self = Self([0, 0, 0, 1, 0, 0, 0]);
    pub const AMOUNT: Self = Self([0, 0, 0, 0, 1, 0, 0]);
    pub const CURRENT: Self = Self([0, 0, 0, 0, 0, 1, 0]);
    pub const CURRENCY: Self = Self([0, 0, 0, 0, 0, 0, 1]);

    /// Returns the raw exponents.
    #[must_use]
    pub fn exponents(self) -> [i8; 7] {
        self.0
    }

    /// Returns `true` if every exponent is zero.
    #[must_use]
    pub fn is_dimensionless(self) -> bool {
        self == Self::NONE
    }

    fn combine(self, other: Self, sign: i8) -> Self {
        let mut exponents = self.0;
        for (exp, other) in exponents.iter_mut().zip(other.0) {
            *exp += sign * other;
        }
        Self(exponents)
    }

    fn scale(self, power: i8) -> Self {
        Self(self.0.map(|exp| exp * power))
    }
}

/// A unit of measure.
///
/// Two units are convertible when their [`Dimensions`] match, and the
/// conversion factor is the ratio of their scale factors.
///
/// # Examples
///
/// ```
/// use basin_core::units::Units;
///
/// let m3_per_hr = Units::cubic_meter() / Units::hour();
/// let m3_per_s = Units::cubic_meter() / Units::second();
///
/// let factor = m3_per_hr.conversion_factor(&m3_per_s).unwrap();
/// assert!((factor - 1.0 / 3600.0).abs() < 1e-15);
/// ```
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(
    feature = "serde-derive",
    derive(serde::Serialize, serde::Deserialize)
)]
pub struct Units {
    dimensions: Dimensions,
    factor: f64,
    symbol: String,
}

impl Units {
    fn base(dimensions: Dimensions, factor: f64, symbol: &str) -> Self {
        Self {
            dimensions,
            factor,
            symbol: symbol.to_owned(),
        }
    }

    #[must_use]
    pub fn dimensionless() -> Self {
        Self::base(Dimensions::NONE, 1.0, "dimensionless")
    }

    #[must_use]
    pub fn meter() -> Self {
        Self::base(Dimensions::LENGTH, 1.0, "m")
    }

    #[must_use]
    pub fn square_meter() -> Self {
        Self::base(Dimensions::LENGTH.scale(2), 1.0, "m^2")
    }

    #[must_use]
    pub fn cubic_meter() -> Self {
        Self::base(Dimensions::LENGTH.scale(3), 1.0, "m^3")
    }

    #[must_use]
    pub fn kilogram() -> Self {
        Self::base(Dimensions::MASS, 1.0, "kg")
    }

    #[must_use]
    pub fn second() -> Self {
        Self::base(Dimensions::TIME, 1.0, "s")
    }

    #[must_use]
    pub fn hour() -> Self {
        Self::base(Dimensions::TIME, 3600.0, "hr")
    }

    #[must_use]
    pub fn day() -> Self {
        Self::base(Dimensions::TIME, 86_400.0, "day")
    }

    /// A Julian year of 365.25 days.
    #[must_use]
    pub fn year() -> Self {
        Self::base(Dimensions::TIME, 365.25 * 86_400.0, "year")
    }

    #[must_use]
    pub fn kelvin() -> Self {
        Self::base(Dimensions::TEMPERATURE, 1.0, "K")
    }

    #[must_use]
    pub fn mole() -> Self {
        Self::base(Dimensions::AMOUNT, 1.0, "mol")
    }

    #[must_use]
    pub fn kilomole() -> Self {
        Self::base(Dimensions::AMOUNT, 1000.0, "kmol")
    }

    #[must_use]
    pub fn ampere() -> Self {
        Self::base(Dimensions::CURRENT, 1.0, "A")
    }

    #[must_use]
    pub fn pascal() -> Self {
        Self::base(pressure_dimensions(), 1.0, "Pa")
    }

    #[must_use]
    pub fn bar() -> Self {
        Self::base(pressure_dimensions(), 1e5, "bar")
    }

    #[must_use]
    pub fn joule() -> Self {
        Self::base(energy_dimensions(), 1.0, "J")
    }

    #[must_use]
    pub fn kilowatt_hour() -> Self {
        Self::base(energy_dimensions(), 3.6e6, "kWh")
    }

    #[must_use]
    pub fn watt() -> Self {
        Self::base(power_dimensions(), 1.0, "W")
    }

    #[must_use]
    pub fn kilowatt() -> Self {
        Self::base(power_dimensions(), 1e3, "kW")
    }

    /// The base currency unit, dollars at a CEPCI of 500.
    #[must_use]
    pub fn usd_ce500() -> Self {
        Self::base(Dimensions::CURRENCY, 1.0, "USD_CE500")
    }

    /// Dollars of the given year, indexed to [`Units::usd_ce500`] by CEPCI.
    ///
    /// # Errors
    ///
    /// Returns [`UnitsError::UnknownCurrencyYear`] if no index value is
    /// tabulated for `year`.
    pub fn usd(year: u16) -> Result<Self, UnitsError> {
        let (_, index) = CEPCI
            .iter()
            .find(|(y, _)| *y == year)
            .ok_or(UnitsError::UnknownCurrencyYear(year))?;
        Ok(Self::base(
            Dimensions::CURRENCY,
            BASE_CEPCI / index,
            &format!("USD_{year}"),
        ))
    }

    #[must_use]
    pub fn dimensions(&self) -> Dimensions {
        self.dimensions
    }

    /// Returns the scale factor relative to the coherent SI unit.
    #[must_use]
    pub fn factor(&self) -> f64 {
        self.factor
    }

    #[must_use]
    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    /// Raises the unit to an integer power.
    #[must_use]
    pub fn powi(&self, power: i8) -> Self {
        Self {
            dimensions: self.dimensions.scale(power),
            factor: self.factor.powi(i32::from(power)),
            symbol: format!("{}^{power}", grouped(&self.symbol)),
        }
    }

    /// Returns `true` if `self` and `to` share the same dimensions.
    #[must_use]
    pub fn is_convertible(&self, to: &Units) -> bool {
        self.dimensions == to.dimensions
    }

    /// Returns the factor that converts a value in `self` into `to`.
    ///
    /// # Errors
    ///
    /// Returns [`UnitsError::Inconvertible`] if the dimensions differ.
    pub fn conversion_factor(&self, to: &Units) -> Result<f64, UnitsError> {
        if !self.is_convertible(to) {
            return Err(UnitsError::Inconvertible {
                from: self.symbol.clone(),
                to: to.symbol.clone(),
            });
        }
        Ok(self.factor / to.factor)
    }
}

fn pressure_dimensions() -> Dimensions {
    Dimensions([-1, 1, -2, 0, 0, 0, 0])
}

fn energy_dimensions() -> Dimensions {
    Dimensions([2, 1, -2, 0, 0, 0, 0])
}

fn power_dimensions() -> Dimensions {
    Dimensions([2, 1, -3, 0, 0, 0, 0])
}

fn grouped(symbol: &str) -> String {
    if symbol.contains(['*', '/', '^']) {
        format!("({symbol})")
    } else {
        symbol.to_owned()
    }
}

impl fmt::Display for Units {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.symbol)
    }
}

impl Mul<&Units> for &Units {
    type Output = Units;

    fn mul(self, rhs: &Units) -> Units {
        Units {
            dimensions: self.dimensions.combine(rhs.dimensions, 1),
            factor: self.factor * rhs.factor,
            symbol: format!("{}*{}", self.symbol, grouped(&rhs.symbol)),
        }
    }
}

impl Div<&Units> for &Units {
    type Output = Units;

    fn div(self, rhs: &Units) -> Units {
        Units {
            dimensions: self.dimensions.combine(rhs.dimensions, -1),
            factor: self.factor / rhs.factor,
            symbol: format!("{}/{}", self.symbol, grouped(&rhs.symbol)),
        }
    }
}

impl Mul for Units {
    type Output = Units;

    fn mul(self, rhs: Units) -> Units {
        &self * &rhs
    }
}

impl Div for Units {
    type Output = Units;

    fn div(self, rhs: Units) -> Units {
        &self / &rhs
    }
}
