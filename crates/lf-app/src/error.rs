//! Error types for the lf-app service layer.

use std::path::PathBuf;

/// Application error type that wraps errors from the backend crates and
/// gives the CLI a single error interface.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Project error: {0}")]
    Project(String),

    #[error("Failed to write file: {path}")]
    FileWrite {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Project validation failed: {0}")]
    Validation(String),

    #[error("Compilation failed: {0}")]
    Compile(String),

    #[error("Controller error: {0}")]
    Control(String),

    #[error("Simulation error: {0}")]
    Simulation(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for lf-app operations.
pub type AppResult<T> = Result<T, AppError>;

// Conversions from backend error types
impl From<lf_project::ProjectError> for AppError {
    fn from(err: lf_project::ProjectError) -> Self {
        match err {
            lf_project::ProjectError::Validation(e) => AppError::Validation(e.to_string()),
            other => AppError::Project(other.to_string()),
        }
    }
}

impl From<lf_project::ValidationError> for AppError {
    fn from(err: lf_project::ValidationError) -> Self {
        AppError::Validation(err.to_string())
    }
}

impl From<lf_fuzzy::FuzzyError> for AppError {
    fn from(err: lf_fuzzy::FuzzyError) -> Self {
        AppError::Compile(err.to_string())
    }
}

impl From<lf_controls::ControlError> for AppError {
    fn from(err: lf_controls::ControlError) -> Self {
        AppError::Control(err.to_string())
    }
}

impl From<lf_sim::SimError> for AppError {
    fn from(err: lf_sim::SimError) -> Self {
        AppError::Simulation(err.to_string())
    }
}
