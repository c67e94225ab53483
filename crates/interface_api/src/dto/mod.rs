//! Request and response bodies
//!
//! Request DTOs derive [`Validate`] and are extracted through
//! [`ValidatedJson`], so malformed input is refused before the engine runs.
//! Amounts arrive as a decimal plus an optional currency that defaults to
//! the platform currency.

pub mod audit;
pub mod balance;
pub mod collection;
pub mod commission;
pub mod payment;
pub mod settlement;

use axum::{
    async_trait,
    extract::{FromRequest, Request},
    Json,
};
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use validator::{Validate, ValidationError};

use crate::error::ApiError;

/// JSON body that has passed its `Validate` rules
#[derive(Debug, Clone)]
pub struct ValidatedJson<T>(pub T);

#[async_trait]
impl<S, T> FromRequest<S> for ValidatedJson<T>
where
    S: Send + Sync,
    T: DeserializeOwned + Validate,
{
    type Rejection = ApiError;

    async fn from_request(request: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(request, state).await?;
        value.validate()?;
        Ok(ValidatedJson(value))
    }
}

pub(crate) fn positive_amount(amount: &Decimal) -> Result<(), ValidationError> {
    if amount.is_sign_positive() && !amount.is_zero() {
        Ok(())
    } else {
        Err(ValidationError::new("positive_amount"))
    }
}

pub(crate) fn non_negative_amount(amount: &Decimal) -> Result<(), ValidationError> {
    if amount.is_sign_negative() && !amount.is_zero() {
        Err(ValidationError::new("non_negative_amount"))
    } else {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_amount_rules() {
        assert!(positive_amount(&dec!(0.001)).is_ok());
        assert!(positive_amount(&Decimal::ZERO).is_err());
        assert!(positive_amount(&dec!(-5)).is_err());
        assert!(non_negative_amount(&Decimal::ZERO).is_ok());
        assert!(non_negative_amount(&dec!(-0.01)).is_err());
    }
}
