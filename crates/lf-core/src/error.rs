//! Errors shared by the numeric helpers.

use thiserror::Error;

pub type LfResult<T> = Result<T, LfError>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum LfError {
    /// A NaN or infinite value reached a place that needs a real number.
    #[error("{what} must be finite, got {value}")]
    NonFinite { what: &'static str, value: f64 },
}
