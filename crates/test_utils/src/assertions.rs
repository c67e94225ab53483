//! Custom Test Assertions
//!
//! Provides specialized assertion helpers for settlement types that give
//! more meaningful error messages than standard assertions.

use core_kernel::Money;
use domain_settlement::{AuditAction, AuditEntry, Settlement, SettlementError};
use rust_decimal::Decimal;

/// Asserts that a Money value has the given amount, ignoring trailing zeros
///
/// # Panics
///
/// Panics if the amounts differ
pub fn assert_money_eq(actual: &Money, expected: Decimal) {
    assert_eq!(
        actual.amount().normalize(),
        expected.normalize(),
        "Expected {} {}, got {}",
        actual.currency(),
        expected,
        actual
    );
}

/// Asserts that a Money value is zero
pub fn assert_money_zero(money: &Money) {
    assert!(money.is_zero(), "Expected zero money, got {}", money);
}

/// Asserts that money values sum to a total
///
/// # Panics
///
/// Panics if the sum doesn't equal the total or currencies are mixed
pub fn assert_money_sum_equals(parts: &[Money], total: &Money) {
    let sum = Money::sum(total.currency(), parts).expect("Currency mismatch in sum");

    assert_eq!(
        sum.amount(),
        total.amount(),
        "Sum of parts ({}) doesn't equal total ({})",
        sum,
        total
    );
}

/// Asserts the settlement totals identity
///
/// `amount_delivered + total_commissions == total_collected`
pub fn assert_settlement_balanced(settlement: &Settlement) {
    let recombined = settlement
        .amount_delivered
        .checked_add(&settlement.total_commissions)
        .expect("Currency mismatch in settlement totals");

    assert_eq!(
        recombined.amount(),
        settlement.total_collected.amount(),
        "Settlement {} is unbalanced: delivered {} + commissions {} != collected {}",
        settlement.id,
        settlement.amount_delivered,
        settlement.total_commissions,
        settlement.total_collected
    );
}

/// Asserts the audit entries hold exactly these actions, oldest first
///
/// `entries` are expected newest first, as audit listings return them.
pub fn assert_audit_actions(entries: &[AuditEntry], expected: &[AuditAction]) {
    let actual: Vec<AuditAction> = entries.iter().rev().map(|e| e.action).collect();
    assert_eq!(actual, expected, "Unexpected audit trail");
}

/// Asserts that an engine result failed with a conflict
pub fn assert_conflict<T: std::fmt::Debug>(result: Result<T, SettlementError>) {
    match result {
        Err(SettlementError::Conflict(_)) => {}
        other => panic!("Expected Conflict, got {:?}", other),
    }
}

/// Asserts that an engine result failed authorization
pub fn assert_unauthorized<T: std::fmt::Debug>(result: Result<T, SettlementError>) {
    match result {
        Err(SettlementError::Authorization(_)) => {}
        other => panic!("Expected Authorization error, got {:?}", other),
    }
}

/// Asserts that an engine result failed validation
pub fn assert_validation<T: std::fmt::Debug>(result: Result<T, SettlementError>) {
    match result {
        Err(SettlementError::Validation(_)) => {}
        other => panic!("Expected Validation error, got {:?}", other),
    }
}
