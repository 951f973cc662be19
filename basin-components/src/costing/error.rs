use basin_core::{FractionError, model::ModelError, units::UnitsError};
use thiserror::Error;

/// Errors raised while building costing blocks.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CostingError {
    #[error(
        "attempting to add identically named costing parameter blocks with different build rules to the costing package {package}. Parameter block named {block} was previously built by function {builder} from module {module}"
    )]
    Conflict {
        package: String,
        block: String,
        builder: String,
        module: String,
    },

    #[error(
        "parameter block {block} in costing package {package} was not built by a registered builder; use `CostingPackage::register` for costing-package-level parameters"
    )]
    Unregistered { package: String, block: String },

    #[error(
        "parameter block {block} in costing package {package} cannot be registered by `{builder}`, which has no identity of its own; wrap it in `NamedBuilder`"
    )]
    AnonymousBuilder {
        package: String,
        block: String,
        builder: String,
    },

    #[error("costing package {package} already has a parameter block named {block}")]
    Duplicate { package: String, block: String },

    #[error("costing package {package} has no flow type named `{flow}`")]
    UnknownFlowType { package: String, flow: String },

    #[error("parameter block {block} has no variable named `{var}`")]
    UnknownParameter { block: String, var: String },

    #[error("conversion efficiency is not a valid fraction")]
    Efficiency(#[from] FractionError),

    #[error(transparent)]
    Units(#[from] UnitsError),

    #[error(transparent)]
    Model(#[from] ModelError),
}
