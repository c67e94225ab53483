//! API error handling

use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;
use tracing::{error, warn};

use core_kernel::Money;
use domain_settlement::SettlementError;

/// API error types
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Unauthorized")]
    Unauthorized,

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Insufficient balance: requested {requested}, available {available}")]
    InsufficientBalance { requested: Money, available: Money },

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Validation error: {0}")]
    Validation(String, Vec<String>),
}

impl ApiError {
    pub fn validation(message: impl Into<String>) -> Self {
        ApiError::Validation(message.into(), Vec::new())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::InsufficientBalance { .. } | ApiError::Validation(..) => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            ApiError::Configuration(_) | ApiError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Error response body
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Vec<String>>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let (error_type, message, details) = match self {
            ApiError::NotFound(msg) => ("not_found", msg, None),
            ApiError::BadRequest(msg) => ("bad_request", msg, None),
            ApiError::Unauthorized => ("unauthorized", "Unauthorized".to_string(), None),
            ApiError::Forbidden(msg) => ("forbidden", msg, None),
            ApiError::Conflict(msg) => ("conflict", msg, None),
            ApiError::InsufficientBalance { requested, available } => (
                "insufficient_balance",
                format!("Requested {} exceeds available balance {}", requested, available),
                Some(vec![
                    format!("requested: {}", requested.amount()),
                    format!("available: {}", available.amount()),
                ]),
            ),
            ApiError::Configuration(msg) => ("configuration_error", msg, None),
            ApiError::Storage(msg) => {
                error!(error = %msg, "Storage failure");
                ("storage_error", "The settlement store is unavailable".to_string(), None)
            }
            ApiError::Validation(msg, details) => (
                "validation_error",
                msg,
                (!details.is_empty()).then_some(details),
            ),
        };

        let body = ErrorResponse {
            error: error_type.to_string(),
            message,
            details,
        };

        (status, Json(body)).into_response()
    }
}

impl From<SettlementError> for ApiError {
    fn from(err: SettlementError) -> Self {
        match err {
            SettlementError::Validation(msg) => ApiError::validation(msg),
            SettlementError::Configuration(msg) => ApiError::Configuration(msg),
            SettlementError::Conflict(msg) => {
                warn!(reason = %msg, "Request conflicted with current state");
                ApiError::Conflict(msg)
            }
            SettlementError::InsufficientBalance { requested, available } => {
                ApiError::InsufficientBalance { requested, available }
            }
            SettlementError::Authorization(msg) => ApiError::Forbidden(msg),
            SettlementError::NotFound { entity, id } => {
                ApiError::NotFound(format!("{} not found: {}", entity, id))
            }
            SettlementError::Storage(port) => ApiError::Storage(port.to_string()),
        }
    }
}

impl From<validator::ValidationErrors> for ApiError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let mut details: Vec<String> = errors
            .field_errors()
            .into_iter()
            .flat_map(|(field, errs)| {
                errs.iter().map(move |e| match &e.message {
                    Some(message) => format!("{}: {}", field, message),
                    None => format!("{}: {}", field, e.code),
                })
            })
            .collect();
        details.sort();
        ApiError::Validation("Request failed validation".to_string(), details)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::validation(rejection.body_text())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_kernel::{Currency, PortError};
    use rust_decimal_macros::dec;

    #[test]
    fn test_settlement_errors_map_to_status_codes() {
        let cases = [
            (SettlementError::validation("bad"), StatusCode::UNPROCESSABLE_ENTITY),
            (SettlementError::configuration("no rate"), StatusCode::INTERNAL_SERVER_ERROR),
            (SettlementError::conflict("open settlement"), StatusCode::CONFLICT),
            (SettlementError::unauthorized("agent"), StatusCode::FORBIDDEN),
            (SettlementError::not_found("Settlement", "x"), StatusCode::NOT_FOUND),
            (
                SettlementError::Storage(PortError::connection("down")),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
            (
                SettlementError::InsufficientBalance {
                    requested: Money::new(dec!(30000), Currency::IQD),
                    available: Money::new(dec!(20000), Currency::IQD),
                },
                StatusCode::UNPROCESSABLE_ENTITY,
            ),
        ];

        for (err, status) in cases {
            assert_eq!(ApiError::from(err).status(), status);
        }
    }

    #[test]
    fn test_configuration_error_keeps_its_own_code() {
        let response = ApiError::from(SettlementError::configuration("no rate")).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
