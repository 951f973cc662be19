use crate::units::Units;

use super::Index;

/// Optional lower and upper bounds on a variable.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(
    feature = "serde-derive",
    derive(serde::Serialize, serde::Deserialize)
)]
pub struct Bounds {
    pub lower: Option<f64>,
    pub upper: Option<f64>,
}

impl Bounds {
    /// Bounds of `[0, inf)`.
    pub const NON_NEGATIVE: Self = Self {
        lower: Some(0.0),
        upper: None,
    };

    /// Returns `true` if `value` satisfies both bounds.
    #[must_use]
    pub fn contains(&self, value: f64) -> bool {
        self.lower.is_none_or(|lo| value >= lo) && self.upper.is_none_or(|hi| value <= hi)
    }

    /// Returns `value` moved onto the nearest bound if it lies outside them.
    #[must_use]
    pub fn clamp(&self, value: f64) -> f64 {
        let value = self.lower.map_or(value, |lo| value.max(lo));
        self.upper.map_or(value, |hi| value.min(hi))
    }
}

/// A model variable.
///
/// A fixed variable is treated as data by solvers and by degrees-of-freedom
/// analysis; an unfixed one is an unknown.
#[derive(Debug, Clone, PartialEq)]
pub struct Variable {
    name: String,
    index: Index,
    units: Units,
    value: f64,
    bounds: Bounds,
    fixed: bool,
}

impl Variable {
    /// Creates an unbounded, unfixed scalar variable with a value of zero.
    pub fn new(name: impl Into<String>, units: Units) -> Self {
        Self {
            name: name.into(),
            index: Index::Scalar,
            units,
            value: 0.0,
            bounds: Bounds::default(),
            fixed: false,
        }
    }

    #[must_use]
    pub fn with_index(mut self, index: Index) -> Self {
        self.index = index;
        self
    }

    #[must_use]
    pub fn with_value(mut self, value: f64) -> Self {
        self.value = value;
        self
    }

    #[must_use]
    pub fn with_bounds(mut self, bounds: Bounds) -> Self {
        self.bounds = bounds;
        self
    }

    #[must_use]
    pub fn non_negative(self) -> Self {
        self.with_bounds(Bounds::NON_NEGATIVE)
    }

    /// Marks the variable as fixed at its current value.
    #[must_use]
    pub fn fixed(mut self) -> Self {
        self.fixed = true;
        self
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn index(&self) -> &Index {
        &self.index
    }

    /// Returns the name with its index, e.g. `flow_vol[0]`.
    #[must_use]
    pub fn full_name(&self) -> String {
        format!("{}{}", self.name, self.index)
    }

    #[must_use]
    pub fn units(&self) -> &Units {
        &self.units
    }

    #[must_use]
    pub fn value(&self) -> f64 {
        self.value
    }

    #[must_use]
    pub fn bounds(&self) -> Bounds {
        self.bounds
    }

    #[must_use]
    pub fn is_fixed(&self) -> bool {
        self.fixed
    }

    pub fn set_value(&mut self, value: f64) {
        self.value = value;
    }

    pub fn set_bounds(&mut self, bounds: Bounds) {
        self.bounds = bounds;
    }

    pub fn fix(&mut self) {
        self.fixed = true;
    }

    pub fn unfix(&mut self) {
        self.fixed = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_sets_fields() {
        let var = Variable::new("conc_mass_comp", Units::kilogram() / Units::cubic_meter())
            .with_index(Index::time_member(0, "S_su"))
            .with_value(10.0)
            .non_negative()
            .fixed();

        assert_eq!(var.full_name(), "conc_mass_comp[0,S_su]");
        assert_eq!(var.value(), 10.0);
        assert!(var.is_fixed());
        assert_eq!(var.bounds().lower, Some(0.0));
    }

    #[test]
    fn bounds_clamp_values() {
        let bounds = Bounds {
            lower: Some(0.0),
            upper: Some(1.0),
        };
        assert_eq!(bounds.clamp(-2.0), 0.0);
        assert_eq!(bounds.clamp(0.5), 0.5);
        assert_eq!(bounds.clamp(3.0), 1.0);
        assert!(!bounds.contains(1.5));
        assert!(Bounds::default().contains(f64::MAX));
    }
}
