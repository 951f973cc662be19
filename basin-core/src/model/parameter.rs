use crate::units::Units;

use super::Index;

/// A named constant in a model.
///
/// Parameters never count as unknowns. A mutable parameter may have its value
/// changed after construction; an immutable one may not.
#[derive(Debug, Clone, PartialEq)]
pub struct Parameter {
    name: String,
    index: Index,
    units: Units,
    value: f64,
    mutable: bool,
}

impl Parameter {
    /// Creates an immutable scalar parameter.
    pub fn new(name: impl Into<String>, value: f64, units: Units) -> Self {
        Self {
            name: name.into(),
            index: Index::Scalar,
            units,
            value,
            mutable: false,
        }
    }

    #[must_use]
    pub fn with_index(mut self, index: Index) -> Self {
        self.index = index;
        self
    }

    /// Allows the value to be changed after construction.
    #[must_use]
    pub fn mutable(mut self) -> Self {
        self.mutable = true;
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
    pub fn is_mutable(&self) -> bool {
        self.mutable
    }

    pub(super) fn set_value(&mut self, value: f64) {
        self.value = value;
    }
}
