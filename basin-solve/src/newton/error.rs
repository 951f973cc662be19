use thiserror::Error;

/// Errors that prevent the Newton solver from running.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Error {
    #[error("invalid config: {reason}")]
    InvalidConfig { reason: &'static str },

    #[error("system is not square: {variables} free variables, {equations} active constraints")]
    NotSquare { variables: usize, equations: usize },

    #[error("non-finite residual {residual} in constraint `{constraint}` at the initial point")]
    NonFiniteResidual { constraint: String, residual: f64 },
}
