//! Error types for simulation operations.

use thiserror::Error;

/// Errors encountered during plant simulation.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SimError {
    #[error("Invalid argument: {what}")]
    InvalidArg { what: &'static str },

    #[error("Non-physical condition: {what}")]
    NonPhysical { what: &'static str },

    #[error("Backend error: {message}")]
    Backend { message: String },
}

pub type SimResult<T> = Result<T, SimError>;

impl From<lf_core::LfError> for SimError {
    fn from(e: lf_core::LfError) -> Self {
        SimError::Backend {
            message: e.to_string(),
        }
    }
}
