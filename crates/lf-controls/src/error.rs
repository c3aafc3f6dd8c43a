//! Error types for control operations.

use lf_fuzzy::FuzzyError;
use thiserror::Error;

/// Result type for control operations.
pub type ControlResult<T> = Result<T, ControlError>;

/// Errors that can occur in control operations.
///
/// None of these are raised from inside a control tick; they come from
/// configuration calls and from the process boundary.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ControlError {
    /// Invalid argument provided to a control function.
    #[error("Invalid argument: {what}")]
    InvalidArg { what: &'static str },

    /// Fuzzy configuration was rejected; the previous one stays active.
    #[error("Configuration rejected: {0}")]
    Configuration(#[from] FuzzyError),

    /// Gain multiplier outside its allowed range.
    #[error("Invalid gain for valve '{valve}': {value}")]
    InvalidGain { valve: String, value: f64 },

    /// Valve name not present in the active configuration.
    #[error("Unknown valve: {name}")]
    UnknownValve { name: String },

    /// Process read/write failed.
    #[error("Process I/O error: {what}")]
    Io { what: String },
}
