//! Append-only audit log of balance-affecting actions
//!
//! Entries are always written through the transaction of the change they
//! describe, so a rolled-back change leaves no trace here either.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use core_kernel::{ActorId, AuditEntryId, CoreError};

/// What happened
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditAction {
    CollectionRecorded,
    CollectionSubmitted,
    CommissionCreated,
    CommissionApproved,
    CommissionCancelled,
    CommissionPaid,
    SettlementCreated,
    SettlementConfirmed,
    SettlementRejected,
    PaymentSubmitted,
    PaymentReconciled,
}

impl AuditAction {
    pub const ALL: [AuditAction; 11] = [
        AuditAction::CollectionRecorded,
        AuditAction::CollectionSubmitted,
        AuditAction::CommissionCreated,
        AuditAction::CommissionApproved,
        AuditAction::CommissionCancelled,
        AuditAction::CommissionPaid,
        AuditAction::SettlementCreated,
        AuditAction::SettlementConfirmed,
        AuditAction::SettlementRejected,
        AuditAction::PaymentSubmitted,
        AuditAction::PaymentReconciled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AuditAction::CollectionRecorded => "COLLECTION_RECORDED",
            AuditAction::CollectionSubmitted => "COLLECTION_SUBMITTED",
            AuditAction::CommissionCreated => "COMMISSION_CREATED",
            AuditAction::CommissionApproved => "COMMISSION_APPROVED",
            AuditAction::CommissionCancelled => "COMMISSION_CANCELLED",
            AuditAction::CommissionPaid => "COMMISSION_PAID",
            AuditAction::SettlementCreated => "SETTLEMENT_CREATED",
            AuditAction::SettlementConfirmed => "SETTLEMENT_CONFIRMED",
            AuditAction::SettlementRejected => "SETTLEMENT_REJECTED",
            AuditAction::PaymentSubmitted => "PAYMENT_SUBMITTED",
            AuditAction::PaymentReconciled => "PAYMENT_RECONCILED",
        }
    }

    /// Entity type the action is recorded against
    pub fn entity_type(&self) -> &'static str {
        match self {
            AuditAction::CollectionRecorded | AuditAction::CollectionSubmitted => "collection",
            AuditAction::CommissionCreated
            | AuditAction::CommissionApproved
            | AuditAction::CommissionCancelled
            | AuditAction::CommissionPaid => "commission",
            AuditAction::SettlementCreated
            | AuditAction::SettlementConfirmed
            | AuditAction::SettlementRejected => "settlement",
            AuditAction::PaymentSubmitted | AuditAction::PaymentReconciled => "payment_submission",
        }
    }
}

impl fmt::Display for AuditAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AuditAction {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        AuditAction::ALL
            .iter()
            .find(|a| a.as_str().eq_ignore_ascii_case(s.trim()))
            .copied()
            .ok_or_else(|| CoreError::unknown_variant("audit action", s))
    }
}

/// One immutable audit record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub id: AuditEntryId,
    pub action: AuditAction,
    pub entity_type: String,
    pub entity_id: Uuid,
    pub previous_status: Option<String>,
    pub new_status: Option<String>,
    pub performed_by: ActorId,
    pub timestamp: DateTime<Utc>,
    pub changes: serde_json::Value,
}

impl AuditEntry {
    pub fn new(
        action: AuditAction,
        entity_id: impl Into<Uuid>,
        previous_status: Option<&str>,
        new_status: Option<&str>,
        performed_by: ActorId,
        changes: serde_json::Value,
    ) -> Self {
        Self {
            id: AuditEntryId::new_v7(),
            action,
            entity_type: action.entity_type().to_string(),
            entity_id: entity_id.into(),
            previous_status: previous_status.map(str::to_string),
            new_status: new_status.map(str::to_string),
            performed_by,
            timestamp: Utc::now(),
            changes,
        }
    }
}

/// Filter for audit listings
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditQuery {
    pub action: Option<AuditAction>,
    pub performed_by: Option<ActorId>,
    pub entity_id: Option<Uuid>,
    pub limit: Option<u32>,
}

impl AuditQuery {
    pub const DEFAULT_LIMIT: u32 = 100;
    pub const MAX_LIMIT: u32 = 1000;

    pub fn effective_limit(&self) -> usize {
        self.limit
            .unwrap_or(Self::DEFAULT_LIMIT)
            .clamp(1, Self::MAX_LIMIT) as usize
    }

    pub fn matches(&self, entry: &AuditEntry) -> bool {
        self.action.map_or(true, |a| entry.action == a)
            && self.performed_by.map_or(true, |p| entry.performed_by == p)
            && self.entity_id.map_or(true, |id| entry.entity_id == id)
    }

    /// Filters, orders newest first and truncates to the limit
    pub fn apply<'a, I>(&self, entries: I) -> Vec<AuditEntry>
    where
        I: IntoIterator<Item = &'a AuditEntry>,
    {
        let mut selected: Vec<AuditEntry> = entries
            .into_iter()
            .filter(|e| self.matches(e))
            .cloned()
            .collect();
        selected.sort_by(|a, b| b.timestamp.cmp(&a.timestamp).then_with(|| b.id.cmp(&a.id)));
        selected.truncate(self.effective_limit());
        selected
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use core_kernel::SettlementId;
    use serde_json::json;

    #[test]
    fn test_action_text_round_trip() {
        for action in AuditAction::ALL {
            assert_eq!(action.as_str().parse::<AuditAction>().unwrap(), action);
        }
        assert_eq!(
            "settlement_confirmed".parse::<AuditAction>().unwrap(),
            AuditAction::SettlementConfirmed
        );
        assert!("SETTLEMENT_DELETED".parse::<AuditAction>().is_err());
    }

    #[test]
    fn test_entry_carries_entity_type() {
        let settlement = SettlementId::new();
        let entry = AuditEntry::new(
            AuditAction::SettlementRejected,
            settlement,
            Some("PENDING"),
            Some("REJECTED"),
            ActorId::new(),
            json!({ "reason": "short" }),
        );
        assert_eq!(entry.entity_type, "settlement");
        assert_eq!(entry.entity_id, *settlement.as_uuid());
        assert_eq!(entry.new_status.as_deref(), Some("REJECTED"));
    }

    #[test]
    fn test_query_orders_newest_first_and_limits() {
        let actor = ActorId::new();
        let base = Utc::now();
        let entries: Vec<AuditEntry> = (0..5)
            .map(|i| {
                let mut e = AuditEntry::new(
                    AuditAction::CollectionRecorded,
                    Uuid::new_v4(),
                    None,
                    Some("COLLECTED"),
                    actor,
                    json!({}),
                );
                e.timestamp = base + Duration::seconds(i);
                e
            })
            .collect();

        let query = AuditQuery {
            performed_by: Some(actor),
            limit: Some(3),
            ..Default::default()
        };
        let result = query.apply(&entries);
        assert_eq!(result.len(), 3);
        assert_eq!(result[0].timestamp, base + Duration::seconds(4));
        assert!(result.windows(2).all(|w| w[0].timestamp >= w[1].timestamp));

        let other = AuditQuery {
            performed_by: Some(ActorId::new()),
            ..Default::default()
        };
        assert!(other.apply(&entries).is_empty());
    }
}
