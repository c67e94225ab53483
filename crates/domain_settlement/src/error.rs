//! Settlement domain errors

use core_kernel::{CoreError, Money, MoneyError, PortError};
use thiserror::Error;

/// Errors that can occur in the settlement domain
///
/// Validation and authorization failures are raised before any write.
/// `Conflict` tells the caller to retry against fresh state.
#[derive(Debug, Error)]
pub enum SettlementError {
    /// Input failed validation
    #[error("Validation error: {0}")]
    Validation(String),

    /// Missing or invalid configuration (e.g. no active commission rate)
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Concurrent or state conflict
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Requested amount exceeds the derived balance
    #[error("Insufficient balance: requested {requested}, available {available}")]
    InsufficientBalance {
        requested: Money,
        available: Money,
    },

    /// The acting identity may not perform the operation
    #[error("Not authorized: {0}")]
    Authorization(String),

    /// Entity not found
    #[error("{entity} not found: {id}")]
    NotFound {
        entity: String,
        id: String,
    },

    /// Persistence failure
    #[error("Storage error: {0}")]
    Storage(PortError),
}

impl SettlementError {
    pub fn validation(message: impl Into<String>) -> Self {
        SettlementError::Validation(message.into())
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        SettlementError::Configuration(message.into())
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        SettlementError::Conflict(message.into())
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        SettlementError::Authorization(message.into())
    }

    pub fn not_found(entity: impl Into<String>, id: impl std::fmt::Display) -> Self {
        SettlementError::NotFound {
            entity: entity.into(),
            id: id.to_string(),
        }
    }

    /// Returns true when retrying against fresh state may succeed
    pub fn is_retryable(&self) -> bool {
        match self {
            SettlementError::Conflict(_) => true,
            SettlementError::Storage(e) => e.is_transient(),
            _ => false,
        }
    }
}

impl From<PortError> for SettlementError {
    fn from(error: PortError) -> Self {
        match error {
            PortError::NotFound { entity_type, id } => SettlementError::NotFound {
                entity: entity_type,
                id,
            },
            PortError::Conflict { message } => SettlementError::Conflict(message),
            PortError::Validation { message, .. } => SettlementError::Validation(message),
            other => SettlementError::Storage(other),
        }
    }
}

impl From<MoneyError> for SettlementError {
    fn from(error: MoneyError) -> Self {
        match error {
            MoneyError::InvalidRate(msg) => SettlementError::Configuration(msg),
            other => SettlementError::Validation(other.to_string()),
        }
    }
}

impl From<CoreError> for SettlementError {
    fn from(error: CoreError) -> Self {
        match error {
            CoreError::Money(e) => e.into(),
            other => SettlementError::Validation(other.to_string()),
        }
    }
}
