//! Value objects for the order domain.

use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Product identifier (SKU).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProductId(String);

impl ProductId {
    /// Creates a new product ID from a string.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the product ID as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ProductId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for ProductId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for ProductId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl AsRef<str> for ProductId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Money amount represented in cents to avoid floating point issues.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Money {
    /// Amount in cents (e.g., 1000 = $10.00)
    cents: i64,
}

impl Money {
    /// Creates a new Money amount from cents.
    pub fn from_cents(cents: i64) -> Self {
        Self { cents }
    }

    /// Creates a new Money amount from a dollar value.
    pub fn from_dollars(dollars: i64) -> Self {
        Self {
            cents: dollars * 100,
        }
    }

    /// Returns zero money.
    pub fn zero() -> Self {
        Self { cents: 0 }
    }

    /// Returns the amount in cents.
    pub fn cents(&self) -> i64 {
        self.cents
    }

    /// Returns the dollar portion (whole number).
    pub fn dollars(&self) -> i64 {
        self.cents / 100
    }

    /// Returns the cents portion (remainder after dollars).
    pub fn cents_part(&self) -> i64 {
        self.cents.abs() % 100
    }

    /// Returns true if the amount is positive.
    pub fn is_positive(&self) -> bool {
        self.cents > 0
    }

    /// Returns true if the amount is zero.
    pub fn is_zero(&self) -> bool {
        self.cents == 0
    }

    /// Returns true if the amount is negative.
    pub fn is_negative(&self) -> bool {
        self.cents < 0
    }

    /// Multiplies by a quantity. Returns `None` on overflow.
    pub fn checked_multiply(&self, quantity: u32) -> Option<Money> {
        self.cents.checked_mul(i64::from(quantity)).map(Money::from_cents)
    }

    /// Returns `None` on overflow.
    pub fn checked_add(&self, rhs: Money) -> Option<Money> {
        self.cents.checked_add(rhs.cents).map(Money::from_cents)
    }

    /// Returns `None` on overflow.
    pub fn checked_sub(&self, rhs: Money) -> Option<Money> {
        self.cents.checked_sub(rhs.cents).map(Money::from_cents)
    }

    /// Sums `amounts`, or returns `None` if the sum does not fit.
    pub fn checked_sum(amounts: impl IntoIterator<Item = Money>) -> Option<Money> {
        amounts
            .into_iter()
            .try_fold(Money::zero(), |acc, amount| acc.checked_add(amount))
    }

    /// Applies a rate expressed in basis points (1000 = 10%), rounding half
    /// away from zero to the nearest cent. Returns `None` if the result does
    /// not fit.
    pub fn apply_rate_bps(&self, basis_points: u32) -> Option<Money> {
        let scaled = i128::from(self.cents) * i128::from(basis_points);
        let half = if scaled < 0 { -5_000 } else { 5_000 };
        i64::try_from((scaled + half) / 10_000)
            .ok()
            .map(Money::from_cents)
    }

    /// Returns how much is missing to reach `target`, never below zero.
    pub fn shortfall_to(&self, target: Money) -> Money {
        if *self >= target {
            Money::zero()
        } else {
            target - *self
        }
    }
}

impl Default for Money {
    fn default() -> Self {
        Self::zero()
    }
}

impl std::fmt::Display for Money {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.cents < 0 {
            write!(f, "-${}.{:02}", self.dollars().abs(), self.cents_part())
        } else {
            write!(f, "${}.{:02}", self.dollars(), self.cents_part())
        }
    }
}

/// Error returned when a money literal cannot be parsed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Invalid money amount: {0:?} (expected e.g. 7.29 or $7.29)")]
pub struct ParseMoneyError(String);

impl FromStr for Money {
    type Err = ParseMoneyError;

    /// Parses `7`, `7.2`, `7.29`, optionally prefixed by `$` or `-`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ParseMoneyError(s.to_string());
        let trimmed = s.trim();
        let (negative, unsigned) = match trimmed.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, trimmed),
        };
        let unsigned = unsigned.strip_prefix('$').unwrap_or(unsigned);

        let (whole, fraction) = unsigned.split_once('.').unwrap_or((unsigned, ""));
        if whole.is_empty() || fraction.len() > 2 {
            return Err(invalid());
        }
        if !whole.bytes().all(|b| b.is_ascii_digit())
            || !fraction.bytes().all(|b| b.is_ascii_digit())
        {
            return Err(invalid());
        }

        let dollars: i64 = whole.parse().map_err(|_| invalid())?;
        let cents: i64 = match fraction.len() {
            0 => 0,
            1 => fraction.parse::<i64>().map_err(|_| invalid())? * 10,
            _ => fraction.parse().map_err(|_| invalid())?,
        };
        let total = dollars
            .checked_mul(100)
            .and_then(|c| c.checked_add(cents))
            .ok_or_else(invalid)?;

        Ok(Money::from_cents(if negative { -total } else { total }))
    }
}

impl std::ops::Add for Money {
    type Output = Money;

    fn add(self, rhs: Self) -> Self::Output {
        Money {
            cents: self.cents + rhs.cents,
        }
    }
}

impl std::ops::Sub for Money {
    type Output = Money;

    fn sub(self, rhs: Self) -> Self::Output {
        Money {
            cents: self.cents - rhs.cents,
        }
    }
}

impl std::ops::AddAssign for Money {
    fn add_assign(&mut self, rhs: Self) {
        self.cents += rhs.cents;
    }
}

impl std::ops::SubAssign for Money {
    fn sub_assign(&mut self, rhs: Self) {
        self.cents -= rhs.cents;
    }
}

impl std::iter::Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Self {
        iter.fold(Money::zero(), |acc, m| acc + m)
    }
}

impl<'a> std::iter::Sum<&'a Money> for Money {
    fn sum<I: Iterator<Item = &'a Money>>(iter: I) -> Self {
        iter.copied().sum()
    }
}

/// An item scheduled for one delivery day of an order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderItem {
    /// The product identifier.
    pub product_id: ProductId,

    /// Human-readable product name.
    pub name: String,

    /// Price per unit.
    pub unit_price: Money,

    /// Quantity ordered.
    pub quantity: u32,
}

impl OrderItem {
    /// Creates a new order item.
    pub fn new(
        product_id: impl Into<ProductId>,
        name: impl Into<String>,
        quantity: u32,
        unit_price: Money,
    ) -> Self {
        Self {
            product_id: product_id.into(),
            name: name.into(),
            unit_price,
            quantity,
        }
    }

    /// Returns quantity * unit_price, or `None` if it does not fit.
    pub fn total_price(&self) -> Option<Money> {
        self.unit_price.checked_multiply(self.quantity)
    }
}
