use basin_core::{solve::Termination, units::UnitsError};
use basin_thermo::ThermoError;
use thiserror::Error;

/// Errors raised while building an anaerobic digester.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigurationError {
    #[error(
        "{unit} anaerobic digester model requires that the {phase} phase property package have a single phase named '{expected}'"
    )]
    PhaseList {
        unit: String,
        phase: &'static str,
        expected: &'static str,
    },

    #[error(
        "{unit} anaerobic digester model requires that the liquid and vapor phase property packages have at least one common component"
    )]
    NoCommonComponent { unit: String },

    #[error(
        "{unit} anaerobic digester model requires that the liquid and vapor phase property packages use the same material flow basis"
    )]
    FlowBasisMismatch { unit: String },

    #[error("{unit} anaerobic digester only supports mass or molar basis for the material flow")]
    UnsupportedFlowBasis { unit: String },

    #[error(
        "{unit} anaerobic digester refers to component `{component}` missing from the {phase} phase property package"
    )]
    UnknownComponent {
        unit: String,
        phase: &'static str,
        component: String,
    },

    #[error("{unit} could not build its liquid phase")]
    ControlVolume {
        unit: String,
        #[source]
        source: ThermoError,
    },

    #[error(transparent)]
    Units(#[from] UnitsError),
}

/// Errors raised while initializing an anaerobic digester.
#[derive(Debug, Error)]
pub enum InitializationError {
    #[error("{unit} degrees of freedom were not 0 at the beginning of initialization. DoF = {dof}")]
    DegreesOfFreedom { unit: String, dof: i64 },

    #[error("{unit} failed to initialize successfully. Please check the output logs.")]
    Failed { unit: String, termination: Termination },

    #[error("{unit} could not initialize its state blocks")]
    State {
        unit: String,
        #[source]
        source: ThermoError,
    },

    #[error("solver could not be applied to {unit}")]
    Solver {
        unit: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}
