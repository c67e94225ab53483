//! Settlement DTOs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use core_kernel::{ActorId, Money};
use domain_settlement::{Settlement, SettlementQuery, SettlementStatus};

#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct CreateSettlementRequest {
    pub agent_id: Uuid,
    /// Defaults to the caller
    pub manager_id: Option<Uuid>,
}

#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct RejectSettlementRequest {
    #[validate(length(min = 1, max = 500))]
    pub reason: String,
}

#[derive(Debug, Default, Deserialize, Validate)]
pub struct ListSettlementsParams {
    pub agent_id: Option<Uuid>,
    pub manager_id: Option<Uuid>,
    pub status: Option<SettlementStatus>,
    #[validate(range(min = 1, max = 1000))]
    pub limit: Option<u32>,
}

impl From<ListSettlementsParams> for SettlementQuery {
    fn from(p: ListSettlementsParams) -> Self {
        SettlementQuery {
            agent_id: p.agent_id.map(ActorId::from_uuid),
            manager_id: p.manager_id.map(ActorId::from_uuid),
            status: p.status,
            limit: p.limit,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SettlementResponse {
    pub id: Uuid,
    pub agent_id: Uuid,
    pub manager_id: Uuid,
    pub period_start: DateTime<Utc>,
    pub period_end: DateTime<Utc>,
    pub collection_ids: Vec<Uuid>,
    pub commission_ids: Vec<Uuid>,
    pub payment_ids: Vec<Uuid>,
    pub total_collected: Money,
    pub total_commissions: Money,
    pub amount_delivered: Money,
    pub total_prepaid: Money,
    pub status: String,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
    pub confirmed_by: Option<Uuid>,
    pub confirmed_at: Option<DateTime<Utc>>,
    pub rejected_by: Option<Uuid>,
    pub rejected_at: Option<DateTime<Utc>>,
    pub rejection_reason: Option<String>,
}

impl From<Settlement> for SettlementResponse {
    fn from(s: Settlement) -> Self {
        Self {
            id: s.id.into(),
            agent_id: s.agent_id.into(),
            manager_id: s.manager_id.into(),
            period_start: s.period_start,
            period_end: s.period_end,
            collection_ids: s.collection_ids.into_iter().map(Into::into).collect(),
            commission_ids: s.commission_ids.into_iter().map(Into::into).collect(),
            payment_ids: s.payment_ids.into_iter().map(Into::into).collect(),
            total_collected: s.total_collected,
            total_commissions: s.total_commissions,
            amount_delivered: s.amount_delivered,
            total_prepaid: s.total_prepaid,
            status: s.status.as_str().to_string(),
            created_by: s.created_by.into(),
            created_at: s.created_at,
            confirmed_by: s.confirmed_by.map(Into::into),
            confirmed_at: s.confirmed_at,
            rejected_by: s.rejected_by.map(Into::into),
            rejected_at: s.rejected_at,
            rejection_reason: s.rejection_reason,
        }
    }
}
