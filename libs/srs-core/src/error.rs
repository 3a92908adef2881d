//! Error types for srs-core.

use thiserror::Error;

/// Result type alias using CoreError.
pub type Result<T> = std::result::Result<T, CoreError>;

/// Errors raised while resolving configuration or validating caller input.
#[derive(Debug, Error, PartialEq)]
pub enum CoreError {
    #[error("unknown time unit {unit:?} in {key}")]
    UnknownUnit { key: String, unit: String },

    #[error("invalid number {value:?} in {key}")]
    InvalidNumber { key: String, value: String },

    #[error("invalid value for {key}: {reason}")]
    InvalidValue { key: String, reason: String },

    #[error("unknown config key {0}")]
    UnknownKey(String),

    #[error("unrecognized ease {0}")]
    InvalidEase(String),
}
