//! Commission DTOs

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use core_kernel::{Currency, Money};
use domain_settlement::{Commission, CommissionEventType};

#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct QuoteCommissionRequest {
    /// Defaults to the caller
    pub agent_id: Option<Uuid>,
    pub event_type: CommissionEventType,
    #[validate(custom(function = "super::non_negative_amount"))]
    pub base_amount: Decimal,
    pub currency: Option<Currency>,
}

#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct CancelCommissionRequest {
    #[validate(length(min = 1, max = 500))]
    pub reason: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CommissionResponse {
    pub id: Uuid,
    pub agent_id: Uuid,
    pub collection_id: Option<Uuid>,
    pub event_type: CommissionEventType,
    pub base_amount: Money,
    /// Percentage, two decimal places
    pub rate: Decimal,
    pub amount: Money,
    pub status: String,
    pub settlement_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

impl From<Commission> for CommissionResponse {
    fn from(c: Commission) -> Self {
        Self {
            id: c.id.into(),
            agent_id: c.agent_id.into(),
            collection_id: c.collection_id.map(Into::into),
            event_type: c.event_type,
            base_amount: c.base_amount,
            rate: c.rate.as_percentage(),
            amount: c.amount,
            status: c.status.as_str().to_string(),
            settlement_id: c.reserved_by.map(Into::into),
            created_at: c.created_at,
        }
    }
}
