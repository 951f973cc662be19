//! Nonlinear solvers for Basin models.

pub mod newton;

pub use newton::Newton;
