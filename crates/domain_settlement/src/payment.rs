//! Agent-to-accountant cash hand-offs
//!
//! A payment submission records physical cash an agent handed to an
//! accountant. It lowers the agent's derived balance immediately and is
//! later reconciled by the settlement that covers the same collections.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use core_kernel::{ActorId, CoreError, Money, PaymentSubmissionId, SettlementId};
use crate::error::SettlementError;

/// Payment submission status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentSubmissionStatus {
    /// Cash received by the accountant, not yet reconciled
    Received,
    /// Accounted for by a confirmed settlement
    Reconciled,
}

impl PaymentSubmissionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentSubmissionStatus::Received => "RECEIVED",
            PaymentSubmissionStatus::Reconciled => "RECONCILED",
        }
    }
}

impl fmt::Display for PaymentSubmissionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PaymentSubmissionStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "RECEIVED" => Ok(PaymentSubmissionStatus::Received),
            "RECONCILED" => Ok(PaymentSubmissionStatus::Reconciled),
            other => Err(CoreError::unknown_variant("payment submission status", other)),
        }
    }
}

/// A recorded cash hand-off
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentSubmission {
    pub id: PaymentSubmissionId,
    pub agent_id: ActorId,
    pub accountant_id: ActorId,
    pub amount: Money,
    pub notes: Option<String>,
    pub status: PaymentSubmissionStatus,
    pub reserved_by: Option<SettlementId>,
    pub submitted_at: DateTime<Utc>,
}

impl PaymentSubmission {
    pub fn new(
        agent_id: ActorId,
        accountant_id: ActorId,
        amount: Money,
        notes: Option<String>,
    ) -> Result<Self, SettlementError> {
        if !amount.is_positive() {
            return Err(SettlementError::validation(format!(
                "Payment amount must be positive, got {}",
                amount
            )));
        }
        if !amount.is_minor_unit_exact() {
            return Err(SettlementError::validation(format!(
                "Payment amount {} is finer than the currency's minor unit",
                amount
            )));
        }

        Ok(Self {
            id: PaymentSubmissionId::new_v7(),
            agent_id,
            accountant_id,
            amount,
            notes: notes.filter(|n| !n.trim().is_empty()),
            status: PaymentSubmissionStatus::Received,
            reserved_by: None,
            submitted_at: Utc::now(),
        })
    }

    /// Received and not held by an open settlement
    pub fn is_outstanding(&self) -> bool {
        self.status == PaymentSubmissionStatus::Received && self.reserved_by.is_none()
    }

    pub fn reserve(&mut self, settlement_id: SettlementId) -> Result<(), SettlementError> {
        if !self.is_outstanding() {
            return Err(SettlementError::conflict(format!(
                "Payment submission {} is not outstanding",
                self.id
            )));
        }
        self.reserved_by = Some(settlement_id);
        Ok(())
    }

    pub fn release(&mut self, settlement_id: SettlementId) -> bool {
        if self.reserved_by == Some(settlement_id) && self.status == PaymentSubmissionStatus::Received {
            self.reserved_by = None;
            return true;
        }
        false
    }

    pub fn reconcile(&mut self, settlement_id: SettlementId) -> Result<(), SettlementError> {
        if self.reserved_by != Some(settlement_id) || self.status != PaymentSubmissionStatus::Received {
            return Err(SettlementError::conflict(format!(
                "Payment submission {} is not held by settlement {}",
                self.id, settlement_id
            )));
        }
        self.status = PaymentSubmissionStatus::Reconciled;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_kernel::Currency;
    use rust_decimal_macros::dec;

    #[test]
    fn test_new_submission() {
        let p = PaymentSubmission::new(
            ActorId::new(),
            ActorId::new(),
            Money::new(dec!(20000), Currency::IQD),
            Some("  ".to_string()),
        )
        .unwrap();

        assert_eq!(p.status, PaymentSubmissionStatus::Received);
        assert!(p.notes.is_none());
        assert!(p.is_outstanding());
    }

    #[test]
    fn test_rejects_zero() {
        let result = PaymentSubmission::new(ActorId::new(), ActorId::new(), Money::zero(Currency::IQD), None);
        assert!(matches!(result, Err(SettlementError::Validation(_))));
    }

    #[test]
    fn test_reconcile_requires_reservation() {
        let mut p = PaymentSubmission::new(
            ActorId::new(),
            ActorId::new(),
            Money::new(dec!(1), Currency::IQD),
            None,
        )
        .unwrap();
        let settlement = SettlementId::new();

        assert!(p.reconcile(settlement).is_err());
        p.reserve(settlement).unwrap();
        p.reconcile(settlement).unwrap();
        assert_eq!(p.status, PaymentSubmissionStatus::Reconciled);
    }
}
