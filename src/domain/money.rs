//! Money type
//!
//! Exact two-place decimal used for amounts, commissions and totals.
//! Every value is quantized at construction, so two `Money` values that
//! compare equal also print and persist identically.

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::Add;
use std::str::FromStr;

use super::DomainError;

/// Number of fractional digits kept for every monetary value
pub const MONEY_SCALE: u32 = 2;

/// Money represents a monetary value quantized to cents.
///
/// # Invariants
/// - Exactly 2 decimal places
/// - Rounded half-up (midpoint away from zero) when quantized
/// - Zero is never negative
///
/// # Example
/// ```
/// use rust_decimal::Decimal;
/// use commission_ledger::domain::Money;
///
/// let money = Money::new(Decimal::new(12345, 3));
/// assert_eq!(money.to_string(), "12.35");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Money(Decimal);

impl Money {
    pub const ZERO: Money = Money(Decimal::from_parts(0, 0, 0, false, MONEY_SCALE));

    /// Largest amount a single entry may carry: `NUMERIC(10, 2)`, i.e.
    /// 99 999 999.99 (9 999 999 999 cents split into 32-bit words).
    pub const MAX_AMOUNT: Money =
        Money(Decimal::from_parts(1_410_065_407, 2, 0, false, MONEY_SCALE));

    /// Quantize a decimal to cents.
    pub fn new(value: Decimal) -> Self {
        let mut quantized =
            value.round_dp_with_strategy(MONEY_SCALE, RoundingStrategy::MidpointAwayFromZero);
        quantized.rescale(MONEY_SCALE);
        if quantized.is_zero() {
            quantized.set_sign_positive(true);
        }
        Self(quantized)
    }

    /// Get the underlying Decimal value.
    pub fn value(&self) -> Decimal {
        self.0
    }

    pub fn is_positive(&self) -> bool {
        self.0 > Decimal::ZERO
    }

    /// Multiply by a rate, rounding once on the product.
    pub fn times_rate(&self, rate: Decimal) -> Money {
        Money::new(self.0 * rate)
    }
}

impl Default for Money {
    fn default() -> Self {
        Money::ZERO
    }
}

/// Parse raw user input into [`Money`].
///
/// Accepts plain (`"100.5"`) and scientific (`"1e3"`) notation, ignoring
/// surrounding whitespace.
pub fn to_money(raw: &str) -> Result<Money, DomainError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(DomainError::InvalidAmount("amount is empty".to_string()));
    }

    let decimal = Decimal::from_str(trimmed)
        .or_else(|_| Decimal::from_scientific(trimmed))
        .map_err(|_| DomainError::InvalidAmount(trimmed.to_string()))?;

    Ok(Money::new(decimal))
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2}", self.0)
    }
}

impl FromStr for Money {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        to_money(s)
    }
}

impl From<Decimal> for Money {
    fn from(value: Decimal) -> Self {
        Money::new(value)
    }
}

impl TryFrom<String> for Money {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        to_money(&value)
    }
}

impl From<Money> for String {
    fn from(money: Money) -> Self {
        money.to_string()
    }
}

impl Add for Money {
    type Output = Money;

    fn add(self, rhs: Self) -> Self::Output {
        Money::new(self.0 + rhs.0)
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Self {
        iter.fold(Money::ZERO, Add::add)
    }
}
