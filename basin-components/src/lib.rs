//! Water treatment unit models for Basin.
//!
//! - [`digester`]: a two-phase anaerobic digester with its scaling and
//!   initialization routines.
//! - [`costing`]: a flowsheet costing package, its shared parameter registry,
//!   and reusable cost templates.

pub mod costing;
pub mod digester;
