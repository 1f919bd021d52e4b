//! Per-day cart snapshots handed over by the cart collaborator.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::calendar::Weekday;
use crate::order::{Money, ProductId};

/// A priced line in one day of the cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartItem {
    /// The product identifier.
    pub product_id: ProductId,

    /// Display name, carried over to the order when present.
    #[serde(default)]
    pub name: String,

    /// Price per unit as quoted by the catalog at cart time.
    pub unit_price: Money,

    /// Quantity in the cart.
    pub quantity: u32,
}

impl CartItem {
    /// Creates a new cart item.
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

    /// Returns unit_price * quantity, or `None` if it does not fit.
    pub fn line_total(&self) -> Option<Money> {
        self.unit_price.checked_multiply(self.quantity)
    }
}

/// The cart contents for one delivery day.
///
/// The day total is always derived from the items.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartDaySnapshot {
    /// Day of the week this part of the cart is for.
    pub day: Weekday,

    /// Calendar date the day resolves to.
    pub date: NaiveDate,

    /// Items for this day.
    pub items: Vec<CartItem>,
}

impl CartDaySnapshot {
    /// Creates a snapshot for `day` on `date`.
    pub fn new(day: Weekday, date: NaiveDate, items: Vec<CartItem>) -> Self {
        Self { day, date, items }
    }

    /// Sum of unit_price * quantity over all items, or `None` if it does not
    /// fit.
    pub fn day_total(&self) -> Option<Money> {
        self.items
            .iter()
            .map(CartItem::line_total)
            .try_fold(Money::zero(), |acc, line| acc.checked_add(line?))
    }

    /// Returns the first item with a negative price, if any.
    pub fn first_negative_price(&self) -> Option<&CartItem> {
        self.items.iter().find(|item| item.unit_price.is_negative())
    }

    /// Returns true if the day has no items.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn day_total_sums_lines() {
        let day = CartDaySnapshot::new(
            Weekday::Thursday,
            NaiveDate::from_ymd_opt(2024, 5, 16).unwrap(),
            vec![
                CartItem::new("roti", "Roti", 3, Money::from_cents(99)),
                CartItem::new("dal", "Dal", 1, Money::from_cents(432)),
            ],
        );
        assert_eq!(day.day_total(), Some(Money::from_cents(729)));
        assert!(day.first_negative_price().is_none());
    }

    #[test]
    fn empty_day_totals_zero() {
        let day = CartDaySnapshot::new(
            Weekday::Monday,
            NaiveDate::from_ymd_opt(2024, 5, 13).unwrap(),
            vec![],
        );
        assert!(day.is_empty());
        assert_eq!(day.day_total(), Some(Money::zero()));
    }

    #[test]
    fn oversized_day_has_no_total() {
        let day = CartDaySnapshot::new(
            Weekday::Monday,
            NaiveDate::from_ymd_opt(2024, 5, 13).unwrap(),
            vec![CartItem::new("feast", "Feast", u32::MAX, Money::from_cents(i64::MAX / 2))],
        );
        assert_eq!(day.day_total(), None);
    }

    #[test]
    fn name_defaults_when_missing() {
        let json = r#"{"product_id":"rice","unit_price":{"cents":250},"quantity":2}"#;
        let item: CartItem = serde_json::from_str(json).unwrap();
        assert_eq!(item.name, "");
        assert_eq!(item.line_total(), Some(Money::from_cents(500)));
    }
}
