//! Property packages, state blocks, and control volumes for Basin models.
//!
//! A [`PropertyPackage`] knows how to add the state of one material to a
//! [`Model`](basin_core::model::Model). A [`ControlVolume0D`] combines inlet
//! and outlet state blocks, optional reactions, and balance equations.

mod control_volume;
mod error;
mod package;
mod reaction;
mod state;

pub mod balance;
pub mod model;

pub use control_volume::ControlVolume0D;
pub use error::ThermoError;
pub use package::{Component, FlowBasis, PropertyPackage, ScalingOverride};
pub use reaction::{Reaction, ReactionBlock, ReactionData, ReactionPackage};
pub use state::{HeldState, HoldFlags, StateArg, StateArgs, StateBlock, StateData, StateVar};
