//! Balance equation options for control volumes.

/// Form of the material balances.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(
    feature = "serde-derive",
    derive(serde::Serialize, serde::Deserialize)
)]
pub enum MaterialBalanceType {
    /// Use the property package's default.
    #[default]
    UseDefault,
    None,
    ComponentPhase,
    ComponentTotal,
    ElementTotal,
    Total,
}

/// Form of the energy balances.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(
    feature = "serde-derive",
    derive(serde::Serialize, serde::Deserialize)
)]
pub enum EnergyBalanceType {
    /// Use the property package's default.
    #[default]
    UseDefault,
    None,
    EnthalpyTotal,
    EnthalpyPhase,
    EnergyTotal,
    EnergyPhase,
}

/// Form of the momentum balances.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(
    feature = "serde-derive",
    derive(serde::Serialize, serde::Deserialize)
)]
pub enum MomentumBalanceType {
    None,
    #[default]
    PressureTotal,
    PressurePhase,
    MomentumTotal,
    MomentumPhase,
}

/// Terms to include in the material balances.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MaterialBalanceOptions {
    pub balance_type: MaterialBalanceType,
    pub has_mass_transfer: bool,
    pub has_rate_reactions: bool,
    pub has_equilibrium_reactions: bool,
    pub has_phase_equilibrium: bool,
}

/// Terms to include in the energy balances.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EnergyBalanceOptions {
    pub balance_type: EnergyBalanceType,
    pub has_heat_transfer: bool,
    pub has_enthalpy_transfer: bool,
    pub has_heat_of_reaction: bool,
}

/// Terms to include in the momentum balances.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MomentumBalanceOptions {
    pub balance_type: MomentumBalanceType,
    pub has_pressure_change: bool,
}
