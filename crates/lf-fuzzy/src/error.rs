//! Error types for fuzzy configuration.

use thiserror::Error;

/// Result type for fuzzy configuration operations.
pub type FuzzyResult<T> = Result<T, FuzzyError>;

/// Errors raised while building or validating a fuzzy configuration.
///
/// Inference itself never fails; see [`crate::Inference`].
#[derive(Debug, Error, Clone, PartialEq)]
pub enum FuzzyError {
    /// Invalid argument provided to a constructor.
    #[error("Invalid argument: {what}")]
    InvalidArg { what: &'static str },

    /// Tuning parameters rejected before touching any live configuration.
    #[error("Configuration error: {what}")]
    Configuration { what: String },

    /// Triangle breakpoints are not ordered `left <= peak <= right`.
    #[error("Invalid membership function {label}: [{left}, {peak}, {right}]")]
    InvalidTriangle {
        label: String,
        left: f64,
        peak: f64,
        right: f64,
    },

    /// Rule table is incomplete or contains out-of-range values.
    #[error("Invalid rule table: {what}")]
    InvalidRules { what: String },

    /// Valve definition error.
    #[error("Invalid valve '{name}': {what}")]
    InvalidValve { name: String, what: &'static str },
}
