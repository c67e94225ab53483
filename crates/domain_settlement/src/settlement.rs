//! Settlement aggregate
//!
//! A settlement batches an agent's outstanding collections, commissions and
//! payment submissions into one reconciliation document.
//!
//! # Lifecycle
//!
//! ```text
//! DRAFT ──submit──▶ PENDING ──confirm──▶ CONFIRMED
//!                      │
//!                      └────reject────▶ REJECTED
//! ```
//!
//! CONFIRMED and REJECTED are terminal. A confirmed settlement is never
//! edited; corrections go through a new settlement.
//!
//! # Invariants
//!
//! - `amount_delivered + total_commissions == total_collected`
//! - at most one PENDING settlement per agent (enforced by the store)

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use core_kernel::{
    ActorId, CollectionId, CommissionId, CoreError, Currency, Money, PaymentSubmissionId,
    SettlementId,
};
use crate::collection::Collection;
use crate::commission::Commission;
use crate::error::SettlementError;
use crate::payment::PaymentSubmission;

/// Settlement status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SettlementStatus {
    Draft,
    Pending,
    Confirmed,
    Rejected,
}

impl SettlementStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SettlementStatus::Draft => "DRAFT",
            SettlementStatus::Pending => "PENDING",
            SettlementStatus::Confirmed => "CONFIRMED",
            SettlementStatus::Rejected => "REJECTED",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, SettlementStatus::Confirmed | SettlementStatus::Rejected)
    }
}

impl fmt::Display for SettlementStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SettlementStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "DRAFT" => Ok(SettlementStatus::Draft),
            "PENDING" => Ok(SettlementStatus::Pending),
            "CONFIRMED" => Ok(SettlementStatus::Confirmed),
            "REJECTED" => Ok(SettlementStatus::Rejected),
            other => Err(CoreError::unknown_variant("settlement status", other)),
        }
    }
}

/// Outcome of a lifecycle command
///
/// Retried confirm/reject calls land on `Unchanged` instead of failing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Applied { from: SettlementStatus, to: SettlementStatus },
    Unchanged,
}

impl Transition {
    pub fn is_applied(&self) -> bool {
        matches!(self, Transition::Applied { .. })
    }
}

/// A settlement document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settlement {
    pub id: SettlementId,
    pub agent_id: ActorId,
    pub manager_id: ActorId,
    /// Oldest included collection
    pub period_start: DateTime<Utc>,
    /// Creation time of the snapshot
    pub period_end: DateTime<Utc>,
    pub collection_ids: Vec<CollectionId>,
    pub commission_ids: Vec<CommissionId>,
    pub payment_ids: Vec<PaymentSubmissionId>,
    pub total_collected: Money,
    pub total_commissions: Money,
    pub amount_delivered: Money,
    /// Cash already handed to accountants via included payment submissions
    pub total_prepaid: Money,
    pub status: SettlementStatus,
    pub created_by: ActorId,
    pub created_at: DateTime<Utc>,
    pub confirmed_by: Option<ActorId>,
    pub confirmed_at: Option<DateTime<Utc>>,
    pub rejected_by: Option<ActorId>,
    pub rejected_at: Option<DateTime<Utc>>,
    pub rejection_reason: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl Settlement {
    /// Builds a DRAFT settlement from a snapshot of outstanding records
    ///
    /// # Errors
    ///
    /// - `Validation` if there are no collections, a record belongs to
    ///   another agent or is not outstanding, an amount is in a foreign
    ///   currency, or commissions exceed collections
    #[allow(clippy::too_many_arguments)]
    pub fn draft(
        agent_id: ActorId,
        manager_id: ActorId,
        created_by: ActorId,
        currency: Currency,
        collections: &[Collection],
        commissions: &[Commission],
        payments: &[PaymentSubmission],
        now: DateTime<Utc>,
    ) -> Result<Self, SettlementError> {
        if collections.is_empty() {
            return Err(SettlementError::validation(format!(
                "Agent {} has no outstanding collections to settle",
                agent_id
            )));
        }

        let foreign = collections.iter().any(|c| c.agent_id != agent_id || !c.is_outstanding())
            || commissions.iter().any(|c| c.agent_id != agent_id || !c.is_outstanding())
            || payments.iter().any(|p| p.agent_id != agent_id || !p.is_outstanding());
        if foreign {
            return Err(SettlementError::validation(format!(
                "Snapshot for agent {} contains records that are not outstanding for that agent",
                agent_id
            )));
        }

        let total_collected = Money::sum(currency, collections.iter().map(|c| &c.amount))?;
        let total_commissions = Money::sum(currency, commissions.iter().map(|c| &c.amount))?;
        let total_prepaid = Money::sum(currency, payments.iter().map(|p| &p.amount))?;
        let amount_delivered = total_collected.checked_sub(&total_commissions)?;

        if amount_delivered.is_negative() {
            return Err(SettlementError::validation(format!(
                "Commissions {} exceed collections {} for agent {}",
                total_commissions, total_collected, agent_id
            )));
        }

        let period_start = collections
            .iter()
            .map(|c| c.collected_at)
            .min()
            .unwrap_or(now);

        Ok(Self {
            id: SettlementId::new_v7(),
            agent_id,
            manager_id,
            period_start,
            period_end: now,
            collection_ids: collections.iter().map(|c| c.id).collect(),
            commission_ids: commissions.iter().map(|c| c.id).collect(),
            payment_ids: payments.iter().map(|p| p.id).collect(),
            total_collected,
            total_commissions,
            amount_delivered,
            total_prepaid,
            status: SettlementStatus::Draft,
            created_by,
            created_at: now,
            confirmed_by: None,
            confirmed_at: None,
            rejected_by: None,
            rejected_at: None,
            rejection_reason: None,
            updated_at: now,
        })
    }

    /// DRAFT -> PENDING, after re-checking the totals
    pub fn submit(&mut self) -> Result<Transition, SettlementError> {
        match self.status {
            SettlementStatus::Draft => {
                self.verify_totals()?;
                Ok(self.transition(SettlementStatus::Pending, Utc::now()))
            }
            SettlementStatus::Pending => Ok(Transition::Unchanged),
            other => Err(self.invalid_transition(other, SettlementStatus::Pending)),
        }
    }

    /// PENDING -> CONFIRMED; already CONFIRMED is a no-op
    pub fn confirm(&mut self, confirmed_by: ActorId, now: DateTime<Utc>) -> Result<Transition, SettlementError> {
        match self.status {
            SettlementStatus::Pending => {
                self.verify_totals()?;
                self.confirmed_by = Some(confirmed_by);
                self.confirmed_at = Some(now);
                Ok(self.transition(SettlementStatus::Confirmed, now))
            }
            SettlementStatus::Confirmed => Ok(Transition::Unchanged),
            other => Err(self.invalid_transition(other, SettlementStatus::Confirmed)),
        }
    }

    /// PENDING -> REJECTED; already REJECTED is a no-op
    pub fn reject(
        &mut self,
        rejected_by: ActorId,
        reason: &str,
        now: DateTime<Utc>,
    ) -> Result<Transition, SettlementError> {
        match self.status {
            SettlementStatus::Pending => {
                let reason = reason.trim();
                if reason.is_empty() {
                    return Err(SettlementError::validation("A rejection reason is required"));
                }
                self.rejected_by = Some(rejected_by);
                self.rejected_at = Some(now);
                self.rejection_reason = Some(reason.to_string());
                Ok(self.transition(SettlementStatus::Rejected, now))
            }
            SettlementStatus::Rejected => Ok(Transition::Unchanged),
            other => Err(self.invalid_transition(other, SettlementStatus::Rejected)),
        }
    }

    /// Checks `amount_delivered + total_commissions == total_collected`
    pub fn verify_totals(&self) -> Result<(), SettlementError> {
        let recomposed = self.amount_delivered.checked_add(&self.total_commissions)?;
        if recomposed != self.total_collected {
            return Err(SettlementError::validation(format!(
                "Settlement {} does not balance: delivered {} + commissions {} != collected {}",
                self.id, self.amount_delivered, self.total_commissions, self.total_collected
            )));
        }
        Ok(())
    }

    /// Cash still owed upward at confirmation; negative when the agent
    /// already handed over more than the delivered share
    pub fn net_cash_due(&self) -> Result<Money, SettlementError> {
        Ok(self.amount_delivered.checked_sub(&self.total_prepaid)?)
    }

    pub fn is_open(&self) -> bool {
        matches!(self.status, SettlementStatus::Draft | SettlementStatus::Pending)
    }

    fn transition(&mut self, to: SettlementStatus, now: DateTime<Utc>) -> Transition {
        let from = self.status;
        self.status = to;
        self.updated_at = now;
        Transition::Applied { from, to }
    }

    fn invalid_transition(&self, from: SettlementStatus, to: SettlementStatus) -> SettlementError {
        SettlementError::conflict(format!(
            "Settlement {} cannot move from {} to {}",
            self.id, from, to
        ))
    }
}

/// Filter for settlement listings
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettlementQuery {
    pub agent_id: Option<ActorId>,
    pub manager_id: Option<ActorId>,
    pub status: Option<SettlementStatus>,
    pub limit: Option<u32>,
}

impl SettlementQuery {
    pub fn for_agent(agent_id: ActorId) -> Self {
        Self {
            agent_id: Some(agent_id),
            ..Default::default()
        }
    }

    pub fn for_manager(manager_id: ActorId) -> Self {
        Self {
            manager_id: Some(manager_id),
            ..Default::default()
        }
    }

    pub fn matches(&self, settlement: &Settlement) -> bool {
        self.agent_id.map_or(true, |id| settlement.agent_id == id)
            && self.manager_id.map_or(true, |id| settlement.manager_id == id)
            && self.status.map_or(true, |s| settlement.status == s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collection::NewCollection;
    use crate::commission::{CommissionCalculator, CommissionEventType};
    use crate::directory::AgentProfile;
    use core_kernel::{BusinessId, PackageId, Rate};
    use rust_decimal_macros::dec;
    use std::collections::BTreeSet;

    fn snapshot(agent_id: ActorId, amount: Money) -> (Collection, Commission) {
        let collection = Collection::new(&NewCollection {
            agent_id,
            business_id: BusinessId::new(),
            package_id: PackageId::new(),
            amount,
            collected_at: Utc::now(),
            event_type: CommissionEventType::NewSubscription,
        })
        .unwrap();
        let agent = AgentProfile {
            agent_id,
            governorates: BTreeSet::new(),
            commission_rate: Some(Rate::from_percentage(dec!(10)).unwrap()),
            rate_active: true,
            base_salary: Money::zero(Currency::IQD),
        };
        let commission = CommissionCalculator::new(Currency::IQD)
            .compute(&agent, CommissionEventType::NewSubscription, amount)
            .unwrap()
            .for_collection(collection.id);
        (collection, commission)
    }

    fn pending(agent_id: ActorId) -> Settlement {
        let (collection, commission) = snapshot(agent_id, Money::new(dec!(50000), Currency::IQD));
        let mut s = Settlement::draft(
            agent_id,
            ActorId::new(),
            ActorId::new(),
            Currency::IQD,
            &[collection],
            &[commission],
            &[],
            Utc::now(),
        )
        .unwrap();
        s.submit().unwrap();
        s
    }

    #[test]
    fn test_draft_totals() {
        let agent_id = ActorId::new();
        let s = pending(agent_id);

        assert_eq!(s.status, SettlementStatus::Pending);
        assert_eq!(s.total_collected.amount(), dec!(50000));
        assert_eq!(s.total_commissions.amount(), dec!(5000));
        assert_eq!(s.amount_delivered.amount(), dec!(45000));
        assert!(s.verify_totals().is_ok());
    }

    #[test]
    fn test_empty_snapshot_rejected() {
        let result = Settlement::draft(
            ActorId::new(),
            ActorId::new(),
            ActorId::new(),
            Currency::IQD,
            &[],
            &[],
            &[],
            Utc::now(),
        );
        assert!(matches!(result, Err(SettlementError::Validation(_))));
    }

    #[test]
    fn test_foreign_records_rejected() {
        let (collection, _) = snapshot(ActorId::new(), Money::new(dec!(100), Currency::IQD));
        let result = Settlement::draft(
            ActorId::new(),
            ActorId::new(),
            ActorId::new(),
            Currency::IQD,
            &[collection],
            &[],
            &[],
            Utc::now(),
        );
        assert!(matches!(result, Err(SettlementError::Validation(_))));
    }

    #[test]
    fn test_confirm_is_idempotent() {
        let mut s = pending(ActorId::new());
        let accountant = ActorId::new();

        let first = s.confirm(accountant, Utc::now()).unwrap();
        assert!(first.is_applied());
        let snapshot = s.clone();

        let second = s.confirm(ActorId::new(), Utc::now()).unwrap();
        assert_eq!(second, Transition::Unchanged);
        assert_eq!(s, snapshot);
    }

    #[test]
    fn test_terminal_states_do_not_cross() {
        let mut confirmed = pending(ActorId::new());
        confirmed.confirm(ActorId::new(), Utc::now()).unwrap();
        assert!(matches!(
            confirmed.reject(ActorId::new(), "late", Utc::now()),
            Err(SettlementError::Conflict(_))
        ));

        let mut rejected = pending(ActorId::new());
        rejected.reject(ActorId::new(), "cash short", Utc::now()).unwrap();
        assert_eq!(rejected.rejection_reason.as_deref(), Some("cash short"));
        assert!(matches!(
            rejected.confirm(ActorId::new(), Utc::now()),
            Err(SettlementError::Conflict(_))
        ));
        assert_eq!(
            rejected.reject(ActorId::new(), "again", Utc::now()).unwrap(),
            Transition::Unchanged
        );
    }

    #[test]
    fn test_reject_requires_reason() {
        let mut s = pending(ActorId::new());
        assert!(matches!(
            s.reject(ActorId::new(), "   ", Utc::now()),
            Err(SettlementError::Validation(_))
        ));
        assert_eq!(s.status, SettlementStatus::Pending);
    }

    #[test]
    fn test_tampered_totals_fail_confirmation() {
        let mut s = pending(ActorId::new());
        s.amount_delivered = Money::new(dec!(45001), Currency::IQD);
        assert!(matches!(
            s.confirm(ActorId::new(), Utc::now()),
            Err(SettlementError::Validation(_))
        ));
        assert_eq!(s.status, SettlementStatus::Pending);
    }

    #[test]
    fn test_query_matching() {
        let agent_id = ActorId::new();
        let s = pending(agent_id);

        assert!(SettlementQuery::for_agent(agent_id).matches(&s));
        assert!(!SettlementQuery::for_agent(ActorId::new()).matches(&s));
        assert!(SettlementQuery {
            status: Some(SettlementStatus::Pending),
            ..Default::default()
        }
        .matches(&s));
    }
}
