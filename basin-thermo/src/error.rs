use basin_core::{model::ModelError, units::UnitsError};
use thiserror::Error;

/// Errors raised while building or initializing property, reaction, and
/// control volume blocks.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ThermoError {
    /// The requested option or balance type is not supported.
    #[error("{what} is not supported by `{block}`")]
    Unsupported { block: String, what: String },

    /// A building step was called before the step it depends on.
    #[error("`{block}` has no {part}; call `{step}` first")]
    MissingPart {
        block: String,
        part: &'static str,
        step: &'static str,
    },

    /// A component name is not part of a package.
    #[error("component `{component}` is not in package `{package}`")]
    UnknownComponent { package: String, component: String },

    #[error(transparent)]
    Units(#[from] UnitsError),

    #[error(transparent)]
    Model(#[from] ModelError),
}
