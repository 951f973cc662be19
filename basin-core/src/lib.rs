//! Equation-oriented modeling primitives for Basin.
//!
//! A [`Model`](model::Model) is an arena of variables, parameters, and
//! equality constraints built from symbolic [`Expr`](expr::Expr) trees.
//! Process units assemble their equations into a shared model; solvers
//! implementing [`Solver`](solve::Solver) then drive it to a solution.

mod family;
mod fraction;
mod observe;
mod quantity;
mod time;

pub mod dof;
pub mod expr;
pub mod model;
pub mod scaling;
pub mod solve;
pub mod units;

pub use family::{ConstraintFamily, Family, VarFamily};
pub use fraction::{Fraction, FractionError};
pub use observe::Observer;
pub use quantity::Quantity;
pub use time::{TimeSet, TimeSetError};
