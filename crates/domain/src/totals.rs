//! Order totals: subtotal, fees, tiered discount, tax and grand total.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::order::Money;

/// Errors raised while computing totals.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TotalsError {
    /// A day total or the subtotal is negative.
    #[error("Invalid amount: {0} (must not be negative)")]
    InvalidAmount(Money),

    /// An amount does not fit in the money range.
    #[error("Amount out of range")]
    Overflow,
}

/// The charge breakdown of an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Totals {
    pub subtotal: Money,
    pub platform_fee: Money,
    pub delivery_fee: Money,
    pub discount: Money,
    pub taxes: Money,
    pub grand_total: Money,
}

impl Totals {
    /// Builds totals from their parts, deriving the grand total.
    pub fn assemble(
        subtotal: Money,
        platform_fee: Money,
        delivery_fee: Money,
        discount: Money,
        taxes: Money,
    ) -> Result<Self, TotalsError> {
        let grand_total = subtotal
            .checked_add(platform_fee)
            .and_then(|total| total.checked_add(delivery_fee))
            .and_then(|total| total.checked_sub(discount))
            .and_then(|total| total.checked_add(taxes))
            .ok_or(TotalsError::Overflow)?;
        Ok(Self {
            subtotal,
            platform_fee,
            delivery_fee,
            discount,
            taxes,
            grand_total,
        })
    }
}

/// Fees, discount tiers and tax rate applied to an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeePolicy {
    /// Flat platform fee.
    pub platform_fee: Money,

    /// Flat delivery fee.
    pub delivery_fee: Money,

    /// Subtotals strictly above this get the high discount.
    pub discount_threshold: Money,

    /// Discount above the threshold.
    pub discount_high: Money,

    /// Discount at or below the threshold.
    pub discount_low: Money,

    /// Tax rate in basis points (1000 = 10%).
    pub tax_rate_bps: u32,
}

impl Default for FeePolicy {
    fn default() -> Self {
        Self {
            platform_fee: Money::from_dollars(1),
            delivery_fee: Money::from_dollars(10),
            discount_threshold: Money::from_dollars(100),
            discount_high: Money::from_dollars(10),
            discount_low: Money::from_dollars(5),
            tax_rate_bps: 1000,
        }
    }
}

impl FeePolicy {
    /// Computes the full breakdown for the given per-day totals.
    pub fn compute_totals(&self, day_totals: &[Money]) -> Result<Totals, TotalsError> {
        if let Some(negative) = day_totals.iter().find(|total| total.is_negative()) {
            return Err(TotalsError::InvalidAmount(*negative));
        }
        let subtotal =
            Money::checked_sum(day_totals.iter().copied()).ok_or(TotalsError::Overflow)?;
        self.totals_for_subtotal(subtotal)
    }

    /// Computes the breakdown for an already-summed subtotal.
    pub fn totals_for_subtotal(&self, subtotal: Money) -> Result<Totals, TotalsError> {
        if subtotal.is_negative() {
            return Err(TotalsError::InvalidAmount(subtotal));
        }
        Totals::assemble(
            subtotal,
            self.platform_fee,
            self.delivery_fee,
            self.discount_for(subtotal),
            self.taxes_for(subtotal)?,
        )
    }

    /// Returns the discount tier that applies to `subtotal`.
    pub fn discount_for(&self, subtotal: Money) -> Money {
        if subtotal > self.discount_threshold {
            self.discount_high
        } else {
            self.discount_low
        }
    }

    /// Returns the tax on `subtotal`, rounded half-up to the cent.
    pub fn taxes_for(&self, subtotal: Money) -> Result<Money, TotalsError> {
        subtotal
            .apply_rate_bps(self.tax_rate_bps)
            .ok_or(TotalsError::Overflow)
    }
}

/// Computes totals with the default fee policy.
pub fn compute_totals(day_totals: &[Money]) -> Result<Totals, TotalsError> {
    FeePolicy::default().compute_totals(day_totals)
}
