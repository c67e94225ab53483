//! Pre-built Test Fixtures
//!
//! Provides ready-to-use test data for the settlement domain. Fixtures are
//! deterministic so assertions can compare against literal values.

use chrono::{DateTime, TimeZone, Utc};
use core_kernel::{
    ActorId, BusinessId, Currency, GovernorateId, Money, PackageId, Rate,
};
use domain_settlement::{ActorProfile, AgentProfile, Business, Package, Role};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::collections::BTreeSet;
use uuid::Uuid;

/// Fixture for Money test data
pub struct MoneyFixtures;

impl MoneyFixtures {
    /// A typical subscription payment
    pub fn iqd_50000() -> Money {
        Money::new(dec!(50000), Currency::IQD)
    }

    /// List price of the standard test package
    pub fn iqd_package_price() -> Money {
        Money::new(dec!(100000), Currency::IQD)
    }

    pub fn iqd_zero() -> Money {
        Money::zero(Currency::IQD)
    }

    /// An amount in a currency other than the engine's
    pub fn usd_100() -> Money {
        Money::new(dec!(100.00), Currency::USD)
    }

    /// Amount finer than the IQD minor unit
    pub fn iqd_sub_minor() -> Money {
        Money::new(dec!(10.0005), Currency::IQD)
    }

    pub fn iqd(amount: Decimal) -> Money {
        Money::new(amount, Currency::IQD)
    }
}

/// Fixture for rates
pub struct RateFixtures;

impl RateFixtures {
    pub fn ten_percent() -> Rate {
        Rate::from_percentage(dec!(10)).unwrap()
    }

    pub fn zero() -> Rate {
        Rate::from_percentage(Decimal::ZERO).unwrap()
    }

    pub fn twelve_and_a_half() -> Rate {
        Rate::from_percentage(dec!(12.5)).unwrap()
    }
}

/// Fixture for temporal test data
pub struct TemporalFixtures;

impl TemporalFixtures {
    /// Start of the test collection window (Jan 1, 2026)
    pub fn period_start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 1, 1, 8, 0, 0).unwrap()
    }

    /// A collection taken mid-month
    pub fn mid_month() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 1, 15, 12, 30, 0).unwrap()
    }

    /// End of the test collection window
    pub fn period_end() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 1, 31, 18, 0, 0).unwrap()
    }
}

/// Fixture for identifier test data
pub struct IdFixtures;

impl IdFixtures {
    pub fn governorate_id() -> GovernorateId {
        GovernorateId::from_uuid(Uuid::parse_str("0190a000-0000-7000-8000-000000000001").unwrap())
    }

    pub fn other_governorate_id() -> GovernorateId {
        GovernorateId::from_uuid(Uuid::parse_str("0190a000-0000-7000-8000-000000000002").unwrap())
    }

    pub fn agent_id() -> ActorId {
        ActorId::from_uuid(Uuid::parse_str("0190a000-0000-7000-8000-000000000010").unwrap())
    }

    pub fn manager_id() -> ActorId {
        ActorId::from_uuid(Uuid::parse_str("0190a000-0000-7000-8000-000000000011").unwrap())
    }

    pub fn accountant_id() -> ActorId {
        ActorId::from_uuid(Uuid::parse_str("0190a000-0000-7000-8000-000000000012").unwrap())
    }

    pub fn admin_id() -> ActorId {
        ActorId::from_uuid(Uuid::parse_str("0190a000-0000-7000-8000-000000000013").unwrap())
    }

    pub fn business_id() -> BusinessId {
        BusinessId::from_uuid(Uuid::parse_str("0190a000-0000-7000-8000-000000000020").unwrap())
    }

    pub fn package_id() -> PackageId {
        PackageId::from_uuid(Uuid::parse_str("0190a000-0000-7000-8000-000000000030").unwrap())
    }
}

/// Fixture for directory records
pub struct DirectoryFixtures;

impl DirectoryFixtures {
    /// An active actor assigned to the given governorates
    pub fn actor(id: ActorId, role: Role, governorates: &[GovernorateId]) -> ActorProfile {
        ActorProfile {
            id,
            role,
            display_name: format!("{} {}", role, id),
            governorates: governorates.iter().copied().collect(),
            is_active: true,
        }
    }

    /// An agent with an active rate in one governorate
    pub fn agent(agent_id: ActorId, governorate: GovernorateId, rate: Option<Rate>) -> AgentProfile {
        AgentProfile {
            agent_id,
            governorates: BTreeSet::from([governorate]),
            commission_rate: rate,
            rate_active: true,
            base_salary: Money::new(dec!(500000), Currency::IQD),
        }
    }

    pub fn business(id: BusinessId, governorate: GovernorateId) -> Business {
        Business {
            id,
            name: "Al-Rasheed Pharmacy".to_string(),
            governorate_id: governorate,
        }
    }

    pub fn package(id: PackageId) -> Package {
        Package {
            id,
            name: "Gold listing".to_string(),
            price: MoneyFixtures::iqd_package_price(),
            is_active: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_money_fixtures() {
        assert_eq!(MoneyFixtures::iqd_50000().currency(), Currency::IQD);
        assert!(MoneyFixtures::iqd_zero().is_zero());
        assert!(!MoneyFixtures::iqd_sub_minor().is_minor_unit_exact());
    }

    #[test]
    fn test_temporal_ordering() {
        assert!(TemporalFixtures::period_start() < TemporalFixtures::mid_month());
        assert!(TemporalFixtures::mid_month() < TemporalFixtures::period_end());
    }

    #[test]
    fn test_ids_are_deterministic() {
        assert_eq!(IdFixtures::agent_id(), IdFixtures::agent_id());
        assert_ne!(IdFixtures::agent_id(), IdFixtures::manager_id());
        assert_ne!(IdFixtures::governorate_id(), IdFixtures::other_governorate_id());
    }

    #[test]
    fn test_agent_fixture_is_assigned() {
        let agent = DirectoryFixtures::agent(
            IdFixtures::agent_id(),
            IdFixtures::governorate_id(),
            Some(RateFixtures::ten_percent()),
        );
        assert!(agent.is_assigned_to(IdFixtures::governorate_id()));
        assert_eq!(agent.active_rate(), Some(RateFixtures::ten_percent()));
    }
}
