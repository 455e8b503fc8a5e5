//! Error types for time bucketing and batch forecasting.

use thiserror::Error;

/// Result type for salescast operations.
pub type Result<T> = std::result::Result<T, SalescastError>;

/// Error types for salescast operations.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SalescastError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Missing column: {0}")]
    MissingColumn(String),

    #[error("Column '{column}' has type {found}, expected {expected}")]
    TypeMismatch {
        column: String,
        expected: String,
        found: String,
    },

    #[error("Invalid frequency: {0}")]
    InvalidFrequency(String),

    #[error("Invalid parameter '{param}' = '{value}': {reason}")]
    InvalidParameter {
        param: String,
        value: String,
        reason: String,
    },

    #[error("Insufficient data: need at least {needed} observations, got {got}")]
    InsufficientData { needed: usize, got: usize },

    #[error("Model fitting failed for series {series}: {reason}")]
    ModelFit { series: String, reason: String },

    #[error("Computation error: {0}")]
    ComputationError(String),
}

impl SalescastError {
    /// Shorthand for an [`SalescastError::InvalidParameter`].
    pub(crate) fn invalid_param(
        param: impl Into<String>,
        value: impl ToString,
        reason: impl Into<String>,
    ) -> Self {
        SalescastError::InvalidParameter {
            param: param.into(),
            value: value.to_string(),
            reason: reason.into(),
        }
    }
}
