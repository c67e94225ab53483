//! Cash-collection records
//!
//! A collection is one cash payment taken by an agent from a business for a
//! subscription package. It stays `Collected` (and counts toward the agent's
//! balance) until a confirmed settlement turns it `Submitted`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use core_kernel::{ActorId, BusinessId, CollectionId, CoreError, Money, PackageId, SettlementId};
use crate::commission::CommissionEventType;
use crate::error::SettlementError;

/// Collection status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CollectionStatus {
    /// Cash held by the agent, not yet reconciled
    Collected,
    /// Reconciled through a confirmed settlement (terminal)
    Submitted,
}

impl CollectionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CollectionStatus::Collected => "COLLECTED",
            CollectionStatus::Submitted => "SUBMITTED",
        }
    }
}

impl fmt::Display for CollectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CollectionStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "COLLECTED" => Ok(CollectionStatus::Collected),
            "SUBMITTED" => Ok(CollectionStatus::Submitted),
            other => Err(CoreError::unknown_variant("collection status", other)),
        }
    }
}

/// Payload for recording a new collection
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewCollection {
    pub agent_id: ActorId,
    pub business_id: BusinessId,
    pub package_id: PackageId,
    pub amount: Money,
    pub collected_at: DateTime<Utc>,
    /// Billable event the payment represents; drives the commission type
    pub event_type: CommissionEventType,
}

/// A recorded cash collection
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Collection {
    pub id: CollectionId,
    pub agent_id: ActorId,
    pub business_id: BusinessId,
    pub package_id: PackageId,
    pub amount: Money,
    pub collected_at: DateTime<Utc>,
    pub status: CollectionStatus,
    /// Open settlement currently holding this record
    pub reserved_by: Option<SettlementId>,
    pub created_at: DateTime<Utc>,
}

impl Collection {
    /// Creates a new `Collected` record
    ///
    /// # Errors
    ///
    /// Returns `SettlementError::Validation` when the amount is not positive
    /// or has digits below the currency's minor unit.
    pub fn new(request: &NewCollection) -> Result<Self, SettlementError> {
        if !request.amount.is_positive() {
            return Err(SettlementError::validation(format!(
                "Collection amount must be positive, got {}",
                request.amount
            )));
        }
        if !request.amount.is_minor_unit_exact() {
            return Err(SettlementError::validation(format!(
                "Collection amount {} is finer than the currency's minor unit",
                request.amount
            )));
        }

        Ok(Self {
            id: CollectionId::new_v7(),
            agent_id: request.agent_id,
            business_id: request.business_id,
            package_id: request.package_id,
            amount: request.amount,
            collected_at: request.collected_at,
            status: CollectionStatus::Collected,
            reserved_by: None,
            created_at: Utc::now(),
        })
    }

    /// Collected and not held by an open settlement
    pub fn is_outstanding(&self) -> bool {
        self.status == CollectionStatus::Collected && self.reserved_by.is_none()
    }

    pub fn reserve(&mut self, settlement_id: SettlementId) -> Result<(), SettlementError> {
        if !self.is_outstanding() {
            return Err(SettlementError::conflict(format!(
                "Collection {} is not outstanding",
                self.id
            )));
        }
        self.reserved_by = Some(settlement_id);
        Ok(())
    }

    /// Returns the record to the outstanding pool if `settlement_id` holds it
    pub fn release(&mut self, settlement_id: SettlementId) -> bool {
        if self.reserved_by == Some(settlement_id) && self.status == CollectionStatus::Collected {
            self.reserved_by = None;
            return true;
        }
        false
    }

    /// Marks the record reconciled by the confirming settlement
    pub fn mark_submitted(&mut self, settlement_id: SettlementId) -> Result<(), SettlementError> {
        if self.reserved_by != Some(settlement_id) || self.status != CollectionStatus::Collected {
            return Err(SettlementError::conflict(format!(
                "Collection {} is not held by settlement {}",
                self.id, settlement_id
            )));
        }
        self.status = CollectionStatus::Submitted;
        Ok(())
    }
}

/// Orders collections oldest-first, id as tie-break
pub fn sort_oldest_first(collections: &mut [Collection]) {
    collections.sort_by(|a, b| {
        a.collected_at
            .cmp(&b.collected_at)
            .then_with(|| a.id.cmp(&b.id))
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use core_kernel::Currency;
    use rust_decimal_macros::dec;

    fn request(amount: Money) -> NewCollection {
        NewCollection {
            agent_id: ActorId::new(),
            business_id: BusinessId::new(),
            package_id: PackageId::new(),
            amount,
            collected_at: Utc::now(),
            event_type: CommissionEventType::NewSubscription,
        }
    }

    #[test]
    fn test_rejects_non_positive_amount() {
        let zero = Collection::new(&request(Money::zero(Currency::IQD)));
        assert!(matches!(zero, Err(SettlementError::Validation(_))));

        let negative = Collection::new(&request(Money::new(dec!(-5), Currency::IQD)));
        assert!(matches!(negative, Err(SettlementError::Validation(_))));
    }

    #[test]
    fn test_rejects_sub_minor_amount() {
        let result = Collection::new(&request(Money::new(dec!(10.005), Currency::USD)));
        assert!(matches!(result, Err(SettlementError::Validation(_))));
    }

    #[test]
    fn test_reserve_release_cycle() {
        let mut c = Collection::new(&request(Money::new(dec!(100), Currency::IQD))).unwrap();
        let settlement = SettlementId::new();

        c.reserve(settlement).unwrap();
        assert!(!c.is_outstanding());
        assert!(c.reserve(SettlementId::new()).is_err());

        assert!(!c.release(SettlementId::new()));
        assert!(c.release(settlement));
        assert!(c.is_outstanding());
    }

    #[test]
    fn test_submitted_only_by_holder() {
        let mut c = Collection::new(&request(Money::new(dec!(100), Currency::IQD))).unwrap();
        let settlement = SettlementId::new();
        assert!(c.mark_submitted(settlement).is_err());

        c.reserve(settlement).unwrap();
        c.mark_submitted(settlement).unwrap();
        assert_eq!(c.status, CollectionStatus::Submitted);
        assert!(!c.release(settlement));
    }

    #[test]
    fn test_sort_oldest_first() {
        let now = Utc::now();
        let mut newer = Collection::new(&request(Money::new(dec!(1), Currency::IQD))).unwrap();
        newer.collected_at = now;
        let mut older = Collection::new(&request(Money::new(dec!(2), Currency::IQD))).unwrap();
        older.collected_at = now - Duration::days(2);

        let mut list = vec![newer.clone(), older.clone()];
        sort_oldest_first(&mut list);
        assert_eq!(list[0].id, older.id);
        assert_eq!(list[1].id, newer.id);
    }

    #[test]
    fn test_status_round_trips_through_text() {
        for status in [CollectionStatus::Collected, CollectionStatus::Submitted] {
            assert_eq!(status.as_str().parse::<CollectionStatus>().unwrap(), status);
        }
    }
}
