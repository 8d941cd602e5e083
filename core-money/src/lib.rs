//! Currency-tagged, fixed-point money arithmetic.
//!
//! Every [`MoneyValue`] carries a [`Currency`] whose `exponent` fixes the
//! number of fractional digits kept after rounding. All arithmetic that
//! produces a new amount rounds half-to-even (banker's rounding) to that
//! exponent; arithmetic between values of different currencies is a
//! programming error surfaced as [`MoneyError::CurrencyMismatch`] rather
//! than silently coerced.

use std::cmp::Ordering;
use std::fmt;

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// An ISO-4217-shaped currency tag: a code plus the number of minor-unit
/// decimal digits it is quantized to (2 for USD/EUR, 0 for JPY, ...).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Currency {
    pub code: String,
    pub exponent: u32,
}

impl Currency {
    pub fn new(code: impl Into<String>, exponent: u32) -> Self {
        Currency {
            code: code.into(),
            exponent,
        }
    }

    pub fn usd() -> Self {
        Currency::new("USD", 2)
    }

    pub fn eur() -> Self {
        Currency::new("EUR", 2)
    }

    pub fn jpy() -> Self {
        Currency::new("JPY", 0)
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code)
    }
}

#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum MoneyError {
    #[error("currency mismatch: {left} vs {right}")]
    CurrencyMismatch { left: String, right: String },
    #[error("arithmetic overflow while computing a money value")]
    Overflow,
    #[error("division by zero")]
    DivisionByZero,
}

pub type MoneyResult<T> = Result<T, MoneyError>;

/// A decimal amount quantized to its currency's exponent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MoneyValue {
    amount: Decimal,
    currency: Currency,
}

fn quantize(amount: Decimal, currency: &Currency) -> Decimal {
    amount.round_dp_with_strategy(currency.exponent, RoundingStrategy::MidpointNearestEven)
}

impl MoneyValue {
    /// Construct a value, rounding `amount` half-to-even to the currency's
    /// exponent. Zero values still carry their currency.
    pub fn new(amount: Decimal, currency: Currency) -> Self {
        MoneyValue {
            amount: quantize(amount, &currency),
            currency,
        }
    }

    pub fn zero(currency: Currency) -> Self {
        MoneyValue::new(Decimal::ZERO, currency)
    }

    /// Construct from an integer count of minor units (cents, yen, ...),
    /// the representation `spec.md` mandates for persisted amounts.
    pub fn from_minor_units(minor: i64, currency: Currency) -> Self {
        let scale = 10i64
            .checked_pow(currency.exponent)
            .unwrap_or(1);
        let amount = Decimal::from(minor) / Decimal::from(scale);
        MoneyValue::new(amount, currency)
    }

    pub fn amount(&self) -> Decimal {
        self.amount
    }

    pub fn currency(&self) -> &Currency {
        &self.currency
    }

    pub fn minor_units(&self) -> i64 {
        let scale = Decimal::from(10i64.checked_pow(self.currency.exponent).unwrap_or(1));
        // amount is already quantized to currency.exponent, so this is exact.
        (self.amount * scale)
            .trunc()
            .try_into()
            .unwrap_or(i64::MAX)
    }

    pub fn is_zero(&self) -> bool {
        self.amount.is_zero()
    }

    pub fn is_positive(&self) -> bool {
        self.amount.is_sign_positive() && !self.amount.is_zero()
    }

    pub fn is_negative(&self) -> bool {
        self.amount.is_sign_negative() && !self.amount.is_zero()
    }

    pub fn negate(&self) -> Self {
        MoneyValue::new(-self.amount, self.currency.clone())
    }

    pub fn abs(&self) -> Self {
        MoneyValue::new(self.amount.abs(), self.currency.clone())
    }

    fn check_currency(&self, other: &MoneyValue) -> MoneyResult<()> {
        if self.currency != other.currency {
            return Err(MoneyError::CurrencyMismatch {
                left: self.currency.code.clone(),
                right: other.currency.code.clone(),
            });
        }
        Ok(())
    }

    pub fn add(&self, other: &MoneyValue) -> MoneyResult<MoneyValue> {
        self.check_currency(other)?;
        Ok(MoneyValue::new(
            self.amount + other.amount,
            self.currency.clone(),
        ))
    }

    pub fn sub(&self, other: &MoneyValue) -> MoneyResult<MoneyValue> {
        self.check_currency(other)?;
        Ok(MoneyValue::new(
            self.amount - other.amount,
            self.currency.clone(),
        ))
    }

    /// Multiply by a dimensionless rational (a rate, a percentage, a unit
    /// count). The result is rounded to the currency's exponent.
    pub fn multiply_by_rational(&self, factor: Decimal) -> MoneyValue {
        MoneyValue::new(self.amount * factor, self.currency.clone())
    }

    pub fn divide_by_rational(&self, divisor: Decimal) -> MoneyResult<MoneyValue> {
        if divisor.is_zero() {
            return Err(MoneyError::DivisionByZero);
        }
        Ok(MoneyValue::new(self.amount / divisor, self.currency.clone()))
    }

    pub fn min(&self, other: &MoneyValue) -> MoneyResult<MoneyValue> {
        self.check_currency(other)?;
        Ok(if self.amount <= other.amount {
            self.clone()
        } else {
            other.clone()
        })
    }

    pub fn max(&self, other: &MoneyValue) -> MoneyResult<MoneyValue> {
        self.check_currency(other)?;
        Ok(if self.amount >= other.amount {
            self.clone()
        } else {
            other.clone()
        })
    }

    pub fn compare(&self, other: &MoneyValue) -> MoneyResult<Ordering> {
        self.check_currency(other)?;
        Ok(self.amount.cmp(&other.amount))
    }
}

impl PartialEq for MoneyValue {
    fn eq(&self, other: &Self) -> bool {
        self.currency == other.currency && self.amount == other.amount
    }
}
impl Eq for MoneyValue {}

impl fmt::Display for MoneyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.amount, self.currency.code)
    }
}

/// A dimensionless rate (an interest rate, a percentage, a waterfall
/// proportion). Carried at full decimal precision; only converted to a
/// [`MoneyValue`] at output boundaries via [`MoneyValue::multiply_by_rational`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Default)]
pub struct Rate(Decimal);

impl Rate {
    pub const ZERO: Rate = Rate(Decimal::ZERO);

    pub fn from_decimal(d: Decimal) -> Self {
        Rate(d)
    }

    pub fn from_percentage(p: Decimal) -> Self {
        Rate(p / Decimal::from(100))
    }

    pub fn from_bps(bps: i64) -> Self {
        Rate(Decimal::from(bps) / Decimal::from(10_000))
    }

    pub fn as_decimal(&self) -> Decimal {
        self.0
    }

    /// Daily rate implied by this value as an *annual* rate, under the
    /// given day-count convention's yearly basis.
    pub fn daily_rate(&self, days_in_year: u32) -> Rate {
        Rate(self.0 / Decimal::from(days_in_year))
    }
}

impl fmt::Display for Rate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}%", self.0 * Decimal::from(100))
    }
}
