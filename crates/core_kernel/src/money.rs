//! Money types with precise decimal arithmetic
//!
//! This module provides a type-safe representation of monetary values
//! using rust_decimal for precise calculations without floating-point errors.
//! The engine runs on a single configured currency; the currency tag on
//! every amount lets it reject foreign amounts instead of converting them.

use rust_decimal::{Decimal, RoundingStrategy};
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, Neg, Sub};
use std::str::FromStr;
use thiserror::Error;

/// Currency codes following ISO 4217
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Currency {
    IQD,
    SYP,
    EGP,
    JOD,
    SAR,
    USD,
    EUR,
}

impl Currency {
    /// Returns the number of decimal places (ISO 4217 minor unit exponent)
    pub fn decimal_places(&self) -> u32 {
        match self {
            Currency::IQD | Currency::JOD => 3,
            _ => 2,
        }
    }

    /// Returns the ISO 4217 code
    pub fn code(&self) -> &'static str {
        match self {
            Currency::IQD => "IQD",
            Currency::SYP => "SYP",
            Currency::EGP => "EGP",
            Currency::JOD => "JOD",
            Currency::SAR => "SAR",
            Currency::USD => "USD",
            Currency::EUR => "EUR",
        }
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

impl FromStr for Currency {
    type Err = MoneyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "IQD" => Ok(Currency::IQD),
            "SYP" => Ok(Currency::SYP),
            "EGP" => Ok(Currency::EGP),
            "JOD" => Ok(Currency::JOD),
            "SAR" => Ok(Currency::SAR),
            "USD" => Ok(Currency::USD),
            "EUR" => Ok(Currency::EUR),
            other => Err(MoneyError::UnknownCurrency(other.to_string())),
        }
    }
}

/// Errors that can occur during money operations
#[derive(Debug, Error, PartialEq, Eq)]
pub enum MoneyError {
    #[error("Currency mismatch: cannot operate on {0} and {1}")]
    CurrencyMismatch(String, String),

    #[error("Unknown currency: {0}")]
    UnknownCurrency(String),

    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error("Invalid rate: {0}")]
    InvalidRate(String),
}

/// A monetary amount with associated currency
///
/// Amounts are kept at up to 4 decimal places internally; anything that is
/// persisted or compared for settlement purposes is first rounded to the
/// currency's minor unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Money {
    amount: Decimal,
    currency: Currency,
}

impl Money {
    /// Creates a new Money value
    pub fn new(amount: Decimal, currency: Currency) -> Self {
        Self {
            amount: amount.round_dp(4),
            currency,
        }
    }

    /// Creates Money from an integer amount in minor units (e.g., fils, cents)
    pub fn from_minor(minor_units: i64, currency: Currency) -> Self {
        let divisor = Decimal::new(10_i64.pow(currency.decimal_places()), 0);
        Self::new(Decimal::new(minor_units, 0) / divisor, currency)
    }

    /// Creates a zero amount in the specified currency
    pub fn zero(currency: Currency) -> Self {
        Self {
            amount: dec!(0),
            currency,
        }
    }

    /// Returns the amount
    pub fn amount(&self) -> Decimal {
        self.amount
    }

    /// Returns the currency
    pub fn currency(&self) -> Currency {
        self.currency
    }

    /// Returns true if the amount is zero
    pub fn is_zero(&self) -> bool {
        self.amount.is_zero()
    }

    /// Returns true if the amount is positive
    pub fn is_positive(&self) -> bool {
        self.amount.is_sign_positive() && !self.amount.is_zero()
    }

    /// Returns true if the amount is negative
    pub fn is_negative(&self) -> bool {
        self.amount.is_sign_negative() && !self.amount.is_zero()
    }

    /// Returns the absolute value
    pub fn abs(&self) -> Self {
        Self {
            amount: self.amount.abs(),
            currency: self.currency,
        }
    }

    /// Rounds half-up (midpoint away from zero) to the currency's minor unit
    pub fn round_half_up(&self) -> Self {
        Self {
            amount: self.amount.round_dp_with_strategy(
                self.currency.decimal_places(),
                RoundingStrategy::MidpointAwayFromZero,
            ),
            currency: self.currency,
        }
    }

    /// Returns true if the amount has no digits below the currency's minor unit
    pub fn is_minor_unit_exact(&self) -> bool {
        self.amount.round_dp(self.currency.decimal_places()) == self.amount
    }

    /// Checked addition that returns an error on currency mismatch
    pub fn checked_add(&self, other: &Money) -> Result<Money, MoneyError> {
        self.ensure_same_currency(other)?;
        Ok(Self::new(self.amount + other.amount, self.currency))
    }

    /// Checked subtraction that returns an error on currency mismatch
    pub fn checked_sub(&self, other: &Money) -> Result<Money, MoneyError> {
        self.ensure_same_currency(other)?;
        Ok(Self::new(self.amount - other.amount, self.currency))
    }

    /// Sums an iterator of amounts, all of which must be in `currency`
    pub fn sum<'a, I>(currency: Currency, amounts: I) -> Result<Money, MoneyError>
    where
        I: IntoIterator<Item = &'a Money>,
    {
        amounts
            .into_iter()
            .try_fold(Money::zero(currency), |acc, m| acc.checked_add(m))
    }

    fn ensure_same_currency(&self, other: &Money) -> Result<(), MoneyError> {
        if self.currency != other.currency {
            return Err(MoneyError::CurrencyMismatch(
                self.currency.to_string(),
                other.currency.to_string(),
            ));
        }
        Ok(())
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let dp = self.currency.decimal_places();
        write!(
            f,
            "{} {:.dp$}",
            self.currency.code(),
            self.amount,
            dp = dp as usize
        )
    }
}

impl Add for Money {
    type Output = Self;

    fn add(self, other: Self) -> Self {
        self.checked_add(&other)
            .expect("Currency mismatch in Money::add")
    }
}

impl Sub for Money {
    type Output = Self;

    fn sub(self, other: Self) -> Self {
        self.checked_sub(&other)
            .expect("Currency mismatch in Money::sub")
    }
}

impl Neg for Money {
    type Output = Self;

    fn neg(self) -> Self {
        Self::new(-self.amount, self.currency)
    }
}

/// A percentage rate with at most two decimal places (e.g., 12.5%)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Decimal", into = "Decimal")]
pub struct Rate {
    /// The rate as a percentage (e.g., 10.00 for 10%)
    percentage: Decimal,
}

impl Rate {
    /// Maximum number of decimal places accepted on a percentage
    pub const PRECISION: u32 = 2;

    /// Creates a rate from a percentage (e.g., 10 for 10%)
    ///
    /// # Errors
    ///
    /// Returns `MoneyError::InvalidRate` when the percentage is outside
    /// 0..=100 or carries more than two decimal places.
    pub fn from_percentage(percentage: Decimal) -> Result<Self, MoneyError> {
        if percentage.is_sign_negative() && !percentage.is_zero() {
            return Err(MoneyError::InvalidRate(format!("{} is negative", percentage)));
        }
        if percentage > dec!(100) {
            return Err(MoneyError::InvalidRate(format!("{} exceeds 100%", percentage)));
        }
        if percentage.round_dp(Self::PRECISION) != percentage {
            return Err(MoneyError::InvalidRate(format!(
                "{} has more than {} decimal places",
                percentage,
                Self::PRECISION
            )));
        }
        Ok(Self { percentage: percentage.normalize() })
    }

    /// Returns the rate as a percentage
    pub fn as_percentage(&self) -> Decimal {
        self.percentage
    }

    /// Returns the rate as a fraction (e.g., 0.10 for 10%)
    pub fn as_fraction(&self) -> Decimal {
        self.percentage / dec!(100)
    }

    /// Returns true for a 0% rate
    pub fn is_zero(&self) -> bool {
        self.percentage.is_zero()
    }

    /// Applies this rate and rounds half-up to the currency's minor unit
    ///
    /// The product is computed on the raw decimal so that only one rounding
    /// step happens.
    pub fn apply_half_up(&self, money: &Money) -> Money {
        let raw = money.amount() * self.percentage / dec!(100);
        let rounded = raw.round_dp_with_strategy(
            money.currency().decimal_places(),
            RoundingStrategy::MidpointAwayFromZero,
        );
        Money::new(rounded, money.currency())
    }
}

impl TryFrom<Decimal> for Rate {
    type Error = MoneyError;

    fn try_from(value: Decimal) -> Result<Self, Self::Error> {
        Rate::from_percentage(value)
    }
}

impl From<Rate> for Decimal {
    fn from(rate: Rate) -> Decimal {
        rate.percentage
    }
}

impl fmt::Display for Rate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}%", self.percentage)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_money_creation() {
        let m = Money::new(dec!(100.50), Currency::USD);
        assert_eq!(m.amount(), dec!(100.50));
        assert_eq!(m.currency(), Currency::USD);
    }

    #[test]
    fn test_money_from_minor() {
        let m = Money::from_minor(10050, Currency::USD);
        assert_eq!(m.amount(), dec!(100.50));

        let iqd = Money::from_minor(1500, Currency::IQD);
        assert_eq!(iqd.amount(), dec!(1.5));
    }

    #[test]
    fn test_currency_mismatch() {
        let usd = Money::new(dec!(100.00), Currency::USD);
        let iqd = Money::new(dec!(100.00), Currency::IQD);

        let result = usd.checked_add(&iqd);
        assert!(matches!(result, Err(MoneyError::CurrencyMismatch(_, _))));
    }

    #[test]
    fn test_rate_half_up_rounding() {
        let rate = Rate::from_percentage(dec!(2.5)).unwrap();
        // 0.25 * 2.5% = 0.00625 -> 0.01
        let commission = rate.apply_half_up(&Money::new(dec!(0.25), Currency::USD));
        assert_eq!(commission.amount(), dec!(0.01));

        // 0.19 * 2.5% = 0.00475 -> 0.00
        let commission = rate.apply_half_up(&Money::new(dec!(0.19), Currency::USD));
        assert_eq!(commission.amount(), dec!(0.00));
    }

    #[test]
    fn test_rate_rejects_excess_precision() {
        assert!(Rate::from_percentage(dec!(10.125)).is_err());
        assert!(Rate::from_percentage(dec!(100.01)).is_err());
        assert!(Rate::from_percentage(dec!(-1)).is_err());
        assert!(Rate::from_percentage(dec!(0)).is_ok());
    }

    #[test]
    fn test_currency_parse() {
        assert_eq!("iqd".parse::<Currency>().unwrap(), Currency::IQD);
        assert!("XXX".parse::<Currency>().is_err());
    }
}
