//! Collection DTOs

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use core_kernel::{ActorId, BusinessId, Currency, Money, PackageId};
use domain_settlement::{ActorContext, Collection, CommissionEventType, NewCollection};

use super::commission::CommissionResponse;

#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct RecordCollectionRequest {
    /// Defaults to the caller
    pub agent_id: Option<Uuid>,
    pub business_id: Uuid,
    pub package_id: Uuid,
    #[validate(custom(function = "super::positive_amount"))]
    pub amount: Decimal,
    pub currency: Option<Currency>,
    /// Defaults to the time of the request
    pub collected_at: Option<DateTime<Utc>>,
    pub event_type: Option<CommissionEventType>,
}

impl RecordCollectionRequest {
    pub fn into_domain(self, caller: &ActorContext, currency: Currency) -> NewCollection {
        NewCollection {
            agent_id: self.agent_id.map(ActorId::from_uuid).unwrap_or(caller.actor_id),
            business_id: BusinessId::from_uuid(self.business_id),
            package_id: PackageId::from_uuid(self.package_id),
            amount: Money::new(self.amount, self.currency.unwrap_or(currency)),
            collected_at: self.collected_at.unwrap_or_else(Utc::now),
            event_type: self.event_type.unwrap_or(CommissionEventType::NewSubscription),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CollectionResponse {
    pub id: Uuid,
    pub agent_id: Uuid,
    pub business_id: Uuid,
    pub package_id: Uuid,
    pub amount: Money,
    pub collected_at: DateTime<Utc>,
    pub status: String,
    pub settlement_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

impl From<Collection> for CollectionResponse {
    fn from(c: Collection) -> Self {
        Self {
            id: c.id.into(),
            agent_id: c.agent_id.into(),
            business_id: c.business_id.into(),
            package_id: c.package_id.into(),
            amount: c.amount,
            collected_at: c.collected_at,
            status: c.status.as_str().to_string(),
            settlement_id: c.reserved_by.map(Into::into),
            created_at: c.created_at,
        }
    }
}

/// A recorded collection with the commission earned on it
#[derive(Debug, Serialize, Deserialize)]
pub struct RecordCollectionResponse {
    pub collection: CollectionResponse,
    pub commission: CommissionResponse,
}
