use thiserror::Error;

/// Failures reported by an LP backend
#[derive(Debug, Clone, PartialEq, Error)]
pub enum LpError {
    #[error("lp iteration limit of {0} reached")]
    IterationLimit(usize),
    #[error("numerical trouble in lp solve: {0}")]
    Numerical(String),
    #[error("lp backend failure: {0}")]
    Backend(String),
}

/// Error type of the branch-and-price engine.
///
/// Infeasibility and "nothing found" outcomes are not errors, they are
/// reported through the result values of the respective operations.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum BnpError {
    #[error(transparent)]
    Lp(#[from] LpError),
    #[error("invalid decomposition: {0}")]
    InvalidDecomposition(String),
    #[error("invalid settings: {0}")]
    InvalidSettings(String),
    #[error("unknown parameter <{0}>")]
    UnknownParameter(String),
    #[error("parameter <{name}> rejected value {value}")]
    InvalidParameter { name: String, value: String },
    #[error("master problem is unbounded")]
    UnboundedMaster,
}

impl BnpError {
    /// Whether the error originates from an LP solve
    /// (those are swallowed in non-essential resolves)
    pub fn is_lp_error(&self) -> bool {
        matches!(self, BnpError::Lp(_))
    }
}

pub type BnpResult<T> = Result<T, BnpError>;
