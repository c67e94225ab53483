//! Commissions and the commission calculator
//!
//! A commission is derived from a billable event amount and the agent's
//! configured percentage, rounded half-up to the smallest unit of the
//! currency. Zero-rate commissions are still created so the audit trail
//! shows every billable event.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use core_kernel::{ActorId, CollectionId, CommissionId, CoreError, Currency, Money, Rate, SettlementId};
use crate::directory::AgentProfile;
use crate::error::SettlementError;

/// The billable event a commission is earned on
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CommissionEventType {
    #[default]
    NewSubscription,
    Renewal,
    Upgrade,
}

impl CommissionEventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            CommissionEventType::NewSubscription => "NEW_SUBSCRIPTION",
            CommissionEventType::Renewal => "RENEWAL",
            CommissionEventType::Upgrade => "UPGRADE",
        }
    }
}

impl FromStr for CommissionEventType {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "NEW_SUBSCRIPTION" => Ok(CommissionEventType::NewSubscription),
            "RENEWAL" => Ok(CommissionEventType::Renewal),
            "UPGRADE" => Ok(CommissionEventType::Upgrade),
            other => Err(CoreError::unknown_variant("commission event type", other)),
        }
    }
}

/// Commission status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CommissionStatus {
    Pending,
    Approved,
    Paid,
    Cancelled,
}

impl CommissionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CommissionStatus::Pending => "PENDING",
            CommissionStatus::Approved => "APPROVED",
            CommissionStatus::Paid => "PAID",
            CommissionStatus::Cancelled => "CANCELLED",
        }
    }
}

impl fmt::Display for CommissionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CommissionStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(CommissionStatus::Pending),
            "APPROVED" => Ok(CommissionStatus::Approved),
            "PAID" => Ok(CommissionStatus::Paid),
            "CANCELLED" => Ok(CommissionStatus::Cancelled),
            other => Err(CoreError::unknown_variant("commission status", other)),
        }
    }
}

/// A commission earned by an agent
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Commission {
    pub id: CommissionId,
    pub agent_id: ActorId,
    /// Collection the commission was earned on, when it came from one
    pub collection_id: Option<CollectionId>,
    pub event_type: CommissionEventType,
    pub base_amount: Money,
    pub rate: Rate,
    pub amount: Money,
    pub status: CommissionStatus,
    pub reserved_by: Option<SettlementId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Commission {
    /// Pending or approved, and not held by an open settlement
    pub fn is_outstanding(&self) -> bool {
        matches!(self.status, CommissionStatus::Pending | CommissionStatus::Approved)
            && self.reserved_by.is_none()
    }

    /// Counts toward the agent's accumulated commission
    pub fn is_earned(&self) -> bool {
        matches!(self.status, CommissionStatus::Approved | CommissionStatus::Paid)
    }

    /// Links the commission to the collection it was earned on
    pub fn for_collection(mut self, collection_id: CollectionId) -> Self {
        self.collection_id = Some(collection_id);
        self
    }

    /// PENDING -> APPROVED; approving an approved commission is a no-op
    pub fn approve(&mut self) -> Result<bool, SettlementError> {
        match self.status {
            CommissionStatus::Pending => {
                self.ensure_not_reserved("approve")?;
                self.set_status(CommissionStatus::Approved);
                Ok(true)
            }
            CommissionStatus::Approved => Ok(false),
            other => Err(self.invalid_transition(other, CommissionStatus::Approved)),
        }
    }

    /// PENDING|APPROVED -> CANCELLED; cancelling twice is a no-op
    pub fn cancel(&mut self) -> Result<bool, SettlementError> {
        match self.status {
            CommissionStatus::Pending | CommissionStatus::Approved => {
                self.ensure_not_reserved("cancel")?;
                self.set_status(CommissionStatus::Cancelled);
                Ok(true)
            }
            CommissionStatus::Cancelled => Ok(false),
            other => Err(self.invalid_transition(other, CommissionStatus::Cancelled)),
        }
    }

    pub fn reserve(&mut self, settlement_id: SettlementId) -> Result<(), SettlementError> {
        if !self.is_outstanding() {
            return Err(SettlementError::conflict(format!(
                "Commission {} is not outstanding",
                self.id
            )));
        }
        self.reserved_by = Some(settlement_id);
        Ok(())
    }

    pub fn release(&mut self, settlement_id: SettlementId) -> bool {
        if self.reserved_by == Some(settlement_id) && self.status != CommissionStatus::Paid {
            self.reserved_by = None;
            return true;
        }
        false
    }

    /// Marks the commission paid by the confirming settlement
    pub fn mark_paid(&mut self, settlement_id: SettlementId) -> Result<(), SettlementError> {
        if self.reserved_by != Some(settlement_id) {
            return Err(SettlementError::conflict(format!(
                "Commission {} is not held by settlement {}",
                self.id, settlement_id
            )));
        }
        match self.status {
            CommissionStatus::Pending | CommissionStatus::Approved => {
                self.set_status(CommissionStatus::Paid);
                Ok(())
            }
            other => Err(self.invalid_transition(other, CommissionStatus::Paid)),
        }
    }

    fn set_status(&mut self, status: CommissionStatus) {
        self.status = status;
        self.updated_at = Utc::now();
    }

    fn ensure_not_reserved(&self, operation: &str) -> Result<(), SettlementError> {
        match self.reserved_by {
            Some(settlement_id) => Err(SettlementError::conflict(format!(
                "Cannot {} commission {} while settlement {} is open",
                operation, self.id, settlement_id
            ))),
            None => Ok(()),
        }
    }

    fn invalid_transition(&self, from: CommissionStatus, to: CommissionStatus) -> SettlementError {
        SettlementError::conflict(format!(
            "Commission {} cannot move from {} to {}",
            self.id, from, to
        ))
    }
}

/// Derives commissions from event amounts and agent rates
#[derive(Debug, Clone, Copy)]
pub struct CommissionCalculator {
    currency: Currency,
    auto_approve: bool,
}

impl CommissionCalculator {
    pub fn new(currency: Currency) -> Self {
        Self {
            currency,
            auto_approve: false,
        }
    }

    /// Creates commissions directly in `Approved`
    pub fn auto_approve(mut self, enabled: bool) -> Self {
        self.auto_approve = enabled;
        self
    }

    /// Computes the commission for a billable event
    ///
    /// amount = round_half_up(base × rate / 100) in the currency's minor unit.
    ///
    /// # Errors
    ///
    /// - `Configuration` if the agent has no active rate
    /// - `Validation` if the base is negative or in a foreign currency
    pub fn compute(
        &self,
        agent: &AgentProfile,
        event_type: CommissionEventType,
        base_amount: Money,
    ) -> Result<Commission, SettlementError> {
        if base_amount.currency() != self.currency {
            return Err(SettlementError::validation(format!(
                "Expected amount in {}, got {}",
                self.currency,
                base_amount.currency()
            )));
        }
        if base_amount.is_negative() {
            return Err(SettlementError::validation(format!(
                "Commission base must not be negative, got {}",
                base_amount
            )));
        }

        let rate = agent.active_rate().ok_or_else(|| {
            SettlementError::configuration(format!(
                "No active commission rate configured for agent {}",
                agent.agent_id
            ))
        })?;

        let now = Utc::now();
        Ok(Commission {
            id: CommissionId::new_v7(),
            agent_id: agent.agent_id,
            collection_id: None,
            event_type,
            base_amount,
            rate,
            amount: rate.apply_half_up(&base_amount),
            status: if self.auto_approve {
                CommissionStatus::Approved
            } else {
                CommissionStatus::Pending
            },
            reserved_by: None,
            created_at: now,
            updated_at: now,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;
    use std::collections::BTreeSet;

    fn agent(rate: Option<Decimal>, active: bool) -> AgentProfile {
        AgentProfile {
            agent_id: ActorId::new(),
            governorates: BTreeSet::new(),
            commission_rate: rate.map(|r| Rate::from_percentage(r).unwrap()),
            rate_active: active,
            base_salary: Money::zero(Currency::IQD),
        }
    }

    #[test]
    fn test_event_type_defaults_to_new_subscription() {
        assert_eq!(CommissionEventType::default(), CommissionEventType::NewSubscription);
        assert_eq!(
            "RENEWAL".parse::<CommissionEventType>().unwrap(),
            CommissionEventType::Renewal
        );
    }

    #[test]
    fn test_ten_percent_commission() {
        let calc = CommissionCalculator::new(Currency::IQD);
        let c = calc
            .compute(
                &agent(Some(dec!(10)), true),
                CommissionEventType::NewSubscription,
                Money::new(dec!(50000), Currency::IQD),
            )
            .unwrap();

        assert_eq!(c.amount.amount(), dec!(5000));
        assert_eq!(c.status, CommissionStatus::Pending);
    }

    #[test]
    fn test_zero_rate_still_creates_commission() {
        let calc = CommissionCalculator::new(Currency::IQD);
        let c = calc
            .compute(
                &agent(Some(dec!(0)), true),
                CommissionEventType::Renewal,
                Money::new(dec!(50000), Currency::IQD),
            )
            .unwrap();

        assert!(c.amount.is_zero());
        assert_eq!(c.event_type, CommissionEventType::Renewal);
    }

    #[test]
    fn test_missing_or_inactive_rate_is_configuration_error() {
        let calc = CommissionCalculator::new(Currency::IQD);
        let base = Money::new(dec!(100), Currency::IQD);

        let missing = calc.compute(&agent(None, true), CommissionEventType::Upgrade, base);
        assert!(matches!(missing, Err(SettlementError::Configuration(_))));

        let inactive = calc.compute(&agent(Some(dec!(5)), false), CommissionEventType::Upgrade, base);
        assert!(matches!(inactive, Err(SettlementError::Configuration(_))));
    }

    #[test]
    fn test_half_up_to_minor_unit() {
        let calc = CommissionCalculator::new(Currency::USD);
        // 10.05 * 7.5% = 0.75375 -> 0.75 ; 10.10 * 7.5% = 0.7575 -> 0.76
        let a = calc
            .compute(&agent(Some(dec!(7.5)), true), CommissionEventType::NewSubscription, Money::new(dec!(10.05), Currency::USD))
            .unwrap();
        let b = calc
            .compute(&agent(Some(dec!(7.5)), true), CommissionEventType::NewSubscription, Money::new(dec!(10.10), Currency::USD))
            .unwrap();
        assert_eq!(a.amount.amount(), dec!(0.75));
        assert_eq!(b.amount.amount(), dec!(0.76));
    }

    #[test]
    fn test_foreign_currency_rejected() {
        let calc = CommissionCalculator::new(Currency::IQD);
        let result = calc.compute(
            &agent(Some(dec!(10)), true),
            CommissionEventType::NewSubscription,
            Money::new(dec!(100), Currency::USD),
        );
        assert!(matches!(result, Err(SettlementError::Validation(_))));
    }

    #[test]
    fn test_auto_approve() {
        let calc = CommissionCalculator::new(Currency::IQD).auto_approve(true);
        let c = calc
            .compute(&agent(Some(dec!(10)), true), CommissionEventType::NewSubscription, Money::new(dec!(10), Currency::IQD))
            .unwrap();
        assert_eq!(c.status, CommissionStatus::Approved);
        assert!(c.is_earned());
    }

    #[test]
    fn test_lifecycle_transitions() {
        let calc = CommissionCalculator::new(Currency::IQD);
        let mut c = calc
            .compute(&agent(Some(dec!(10)), true), CommissionEventType::NewSubscription, Money::new(dec!(10), Currency::IQD))
            .unwrap();

        assert!(c.approve().unwrap());
        assert!(!c.approve().unwrap());

        let settlement = SettlementId::new();
        c.reserve(settlement).unwrap();
        assert!(matches!(c.cancel(), Err(SettlementError::Conflict(_))));

        c.mark_paid(settlement).unwrap();
        assert_eq!(c.status, CommissionStatus::Paid);
        assert!(!c.release(settlement));
    }
}
