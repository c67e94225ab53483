//! Property-Based Test Generators
//!
//! Provides proptest strategies for generating random test data
//! that maintains domain invariants.

use core_kernel::{ActorId, Currency, Money, Rate};
use domain_settlement::{CommissionEventType, Role};
use proptest::prelude::*;
use rust_decimal::Decimal;

/// Strategy for generating supported Currency values
pub fn currency_strategy() -> impl Strategy<Value = Currency> {
    prop_oneof![
        Just(Currency::IQD),
        Just(Currency::SYP),
        Just(Currency::EGP),
        Just(Currency::JOD),
        Just(Currency::SAR),
        Just(Currency::USD),
        Just(Currency::EUR),
    ]
}

/// Strategy for generating valid positive amounts in minor units
pub fn positive_amount_minor_strategy() -> impl Strategy<Value = i64> {
    1i64..1_000_000_000i64
}

/// Strategy for generating positive Money in any supported currency
pub fn positive_money_strategy() -> impl Strategy<Value = Money> {
    (positive_amount_minor_strategy(), currency_strategy())
        .prop_map(|(amount, currency)| Money::from_minor(amount, currency))
}

/// Strategy for generating positive IQD amounts exact to the fils
pub fn iqd_money_strategy() -> impl Strategy<Value = Money> {
    positive_amount_minor_strategy().prop_map(|amount| Money::from_minor(amount, Currency::IQD))
}

/// Strategy for generating commission percentages (0.00% to 100.00%)
pub fn percentage_strategy() -> impl Strategy<Value = Decimal> {
    (0u32..=10000u32).prop_map(|n| Decimal::new(n as i64, 2))
}

/// Strategy for generating valid commission rates
pub fn rate_strategy() -> impl Strategy<Value = Rate> {
    percentage_strategy().prop_filter_map("rate out of range", |p| Rate::from_percentage(p).ok())
}

pub fn event_type_strategy() -> impl Strategy<Value = CommissionEventType> {
    prop_oneof![
        Just(CommissionEventType::NewSubscription),
        Just(CommissionEventType::Renewal),
        Just(CommissionEventType::Upgrade),
    ]
}

pub fn role_strategy() -> impl Strategy<Value = Role> {
    prop_oneof![
        Just(Role::Admin),
        Just(Role::Manager),
        Just(Role::Agent),
        Just(Role::Accountant),
    ]
}

/// Strategy for generating ActorId
pub fn actor_id_strategy() -> impl Strategy<Value = ActorId> {
    any::<[u8; 16]>().prop_map(|bytes| ActorId::from_uuid(uuid::Uuid::from_bytes(bytes)))
}

/// Strategy for generating a batch of collection amounts
pub fn collection_batch_strategy(max: usize) -> impl Strategy<Value = Vec<Money>> {
    proptest::collection::vec(iqd_money_strategy(), 1..=max)
}
