//! Payment submission DTOs

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use core_kernel::{ActorId, Currency, Money};
use domain_settlement::{ActorContext, PaymentRequest, PaymentSubmission};

#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct SubmitPaymentRequest {
    /// Defaults to the caller
    pub agent_id: Option<Uuid>,
    pub accountant_id: Uuid,
    #[validate(custom(function = "super::positive_amount"))]
    pub amount: Decimal,
    pub currency: Option<Currency>,
    #[validate(length(max = 1000))]
    pub notes: Option<String>,
}

impl SubmitPaymentRequest {
    pub fn into_domain(self, caller: &ActorContext, currency: Currency) -> PaymentRequest {
        PaymentRequest {
            agent_id: self.agent_id.map(ActorId::from_uuid).unwrap_or(caller.actor_id),
            accountant_id: ActorId::from_uuid(self.accountant_id),
            amount: Money::new(self.amount, self.currency.unwrap_or(currency)),
            notes: self.notes,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PaymentResponse {
    pub id: Uuid,
    pub agent_id: Uuid,
    pub accountant_id: Uuid,
    pub amount: Money,
    pub notes: Option<String>,
    pub status: String,
    pub settlement_id: Option<Uuid>,
    pub submitted_at: DateTime<Utc>,
}

impl From<PaymentSubmission> for PaymentResponse {
    fn from(p: PaymentSubmission) -> Self {
        Self {
            id: p.id.into(),
            agent_id: p.agent_id.into(),
            accountant_id: p.accountant_id.into(),
            amount: p.amount,
            notes: p.notes,
            status: p.status.as_str().to_string(),
            settlement_id: p.reserved_by.map(Into::into),
            submitted_at: p.submitted_at,
        }
    }
}
