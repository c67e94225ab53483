//! Core error types used across the system

use thiserror::Error;
use crate::money::MoneyError;

/// Core error type for the kernel
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("Money error: {0}")]
    Money(#[from] MoneyError),

    #[error("Validation error: {0}")]
    Validation(String),

    /// A textual enum value read from storage or a request matched no variant
    #[error("Unknown {kind} '{value}'")]
    UnknownVariant { kind: String, value: String },
}

impl CoreError {
    pub fn validation(message: impl Into<String>) -> Self {
        CoreError::Validation(message.into())
    }

    pub fn unknown_variant(kind: &str, value: &str) -> Self {
        CoreError::UnknownVariant {
            kind: kind.to_string(),
            value: value.to_string(),
        }
    }
}
