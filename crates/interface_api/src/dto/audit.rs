//! Audit log DTOs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use core_kernel::ActorId;
use domain_settlement::{AuditAction, AuditEntry, AuditQuery};

#[derive(Debug, Default, Deserialize, Validate)]
pub struct ListAuditParams {
    pub action: Option<AuditAction>,
    pub performed_by: Option<Uuid>,
    pub entity_id: Option<Uuid>,
    #[validate(range(min = 1, max = 1000))]
    pub limit: Option<u32>,
}

impl From<ListAuditParams> for AuditQuery {
    fn from(p: ListAuditParams) -> Self {
        AuditQuery {
            action: p.action,
            performed_by: p.performed_by.map(ActorId::from_uuid),
            entity_id: p.entity_id,
            limit: p.limit,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AuditEntryResponse {
    pub id: Uuid,
    pub action: AuditAction,
    pub entity_type: String,
    pub entity_id: Uuid,
    pub previous_status: Option<String>,
    pub new_status: Option<String>,
    pub performed_by: Uuid,
    pub timestamp: DateTime<Utc>,
    pub changes: serde_json::Value,
}

impl From<AuditEntry> for AuditEntryResponse {
    fn from(e: AuditEntry) -> Self {
        Self {
            id: e.id.into(),
            action: e.action,
            entity_type: e.entity_type,
            entity_id: e.entity_id,
            previous_status: e.previous_status,
            new_status: e.new_status,
            performed_by: e.performed_by.into(),
            timestamp: e.timestamp,
            changes: e.changes,
        }
    }
}
