//! The placed order record.

use chrono::NaiveDate;
use common::{AmendmentId, CustomerId, OrderId};
use record_store::Record;
use serde::{Deserialize, Serialize};

use crate::calendar::Weekday;
use crate::totals::{FeePolicy, Totals, TotalsError};

use super::{Money, OrderItem, ProductId};

/// Items of an order delivered on one date.
///
/// Holds at most one item per product; `day_total` always equals the sum of
/// the items. Deserializing rebuilds the total from the items, so a stored
/// total is never trusted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "StoredOrderDay")]
pub struct OrderDay {
    /// Cart day the items were ordered for.
    pub day: Weekday,

    /// Date the items are delivered on.
    pub delivery_date: NaiveDate,

    items: Vec<OrderItem>,
    day_total: Money,
}

#[derive(Deserialize)]
struct StoredOrderDay {
    day: Weekday,
    delivery_date: NaiveDate,
    items: Vec<OrderItem>,
}

impl TryFrom<StoredOrderDay> for OrderDay {
    type Error = TotalsError;

    fn try_from(stored: StoredOrderDay) -> Result<Self, Self::Error> {
        Self::with_items(stored.day, stored.delivery_date, stored.items)
    }
}

impl OrderDay {
    /// Creates a day without items.
    pub fn new(day: Weekday, delivery_date: NaiveDate) -> Self {
        Self {
            day,
            delivery_date,
            items: Vec::new(),
            day_total: Money::zero(),
        }
    }

    /// Creates a day from items, folding repeated products together.
    pub fn with_items(
        day: Weekday,
        delivery_date: NaiveDate,
        items: impl IntoIterator<Item = OrderItem>,
    ) -> Result<Self, TotalsError> {
        let mut order_day = Self::new(day, delivery_date);
        for item in items {
            order_day.add_item(item)?;
        }
        Ok(order_day)
    }

    /// Returns the items in insertion order.
    pub fn items(&self) -> &[OrderItem] {
        &self.items
    }

    /// Returns the item for `product_id`, if present.
    pub fn item(&self, product_id: &ProductId) -> Option<&OrderItem> {
        self.items.iter().find(|item| &item.product_id == product_id)
    }

    pub fn day_total(&self) -> Money {
        self.day_total
    }

    /// Adds an item.
    ///
    /// A product already on the day keeps its name; its quantity grows and
    /// its unit price becomes the higher of the two prices. Fails with
    /// [`TotalsError::Overflow`] if the quantity or the day total would not
    /// fit, leaving the day unchanged.
    pub fn add_item(&mut self, item: OrderItem) -> Result<(), TotalsError> {
        let position = self
            .items
            .iter()
            .position(|existing| existing.product_id == item.product_id);

        let (replaced_total, line) = match position {
            Some(index) => {
                let existing = &self.items[index];
                let quantity = existing
                    .quantity
                    .checked_add(item.quantity)
                    .ok_or(TotalsError::Overflow)?;
                let line = OrderItem {
                    quantity,
                    unit_price: existing.unit_price.max(item.unit_price),
                    ..existing.clone()
                };
                (existing.total_price(), line)
            }
            None => (Some(Money::zero()), item),
        };

        let day_total = replaced_total
            .and_then(|replaced| self.day_total.checked_sub(replaced))
            .zip(line.total_price())
            .and_then(|(rest, line_total)| rest.checked_add(line_total))
            .ok_or(TotalsError::Overflow)?;

        match position {
            Some(index) => self.items[index] = line,
            None => self.items.push(line),
        }
        self.day_total = day_total;
        Ok(())
    }

    /// Returns true if the stored total matches the items.
    pub fn is_consistent(&self) -> bool {
        self.items_total() == Some(self.day_total)
    }

    fn items_total(&self) -> Option<Money> {
        self.items
            .iter()
            .map(OrderItem::total_price)
            .try_fold(Money::zero(), |acc, line| acc.checked_add(line?))
    }
}

/// Discount applied to an order.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Discount {
    pub amount: Money,
    #[serde(default)]
    pub code: Option<String>,
}

/// A placed, paid multi-day order.
///
/// `total_paid` always equals `subtotal + platform_fee + delivery_fee -
/// discount + taxes`, and `subtotal` equals the sum of the day totals.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    id: OrderId,
    customer_id: CustomerId,
    days: Vec<OrderDay>,
    subtotal: Money,
    platform_fee: Money,
    delivery_fee: Money,
    discount: Discount,
    taxes: Money,
    total_paid: Money,

    /// Amendments merged into this order, oldest first.
    #[serde(default)]
    applied_amendments: Vec<AmendmentId>,
}

impl Record for Order {
    type Id = OrderId;

    fn record_type() -> &'static str {
        "Order"
    }

    fn record_id(&self) -> OrderId {
        self.id
    }
}

impl Order {
    /// Creates an order from its days, pricing it with `policy`.
    ///
    /// Days are ordered by delivery date.
    pub fn place(
        id: OrderId,
        customer_id: CustomerId,
        days: Vec<OrderDay>,
        policy: &FeePolicy,
        discount_code: Option<String>,
    ) -> Result<Self, TotalsError> {
        let mut order = Self {
            id,
            customer_id,
            days,
            subtotal: Money::zero(),
            platform_fee: Money::zero(),
            delivery_fee: Money::zero(),
            discount: Discount {
                amount: Money::zero(),
                code: discount_code,
            },
            taxes: Money::zero(),
            total_paid: Money::zero(),
            applied_amendments: Vec::new(),
        };
        order.sort_days();
        let totals = policy.compute_totals(&order.day_totals())?;
        order.apply_totals(totals);
        Ok(order)
    }

    pub fn id(&self) -> OrderId {
        self.id
    }

    pub fn customer_id(&self) -> CustomerId {
        self.customer_id
    }

    /// Returns the days ordered by delivery date.
    pub fn days(&self) -> &[OrderDay] {
        &self.days
    }

    /// Returns the day ordered for `day`, if any.
    pub fn day(&self, day: Weekday) -> Option<&OrderDay> {
        self.days.iter().find(|order_day| order_day.day == day)
    }

    /// Returns each day's total, in day order.
    pub fn day_totals(&self) -> Vec<Money> {
        self.days.iter().map(OrderDay::day_total).collect()
    }

    pub fn subtotal(&self) -> Money {
        self.subtotal
    }

    pub fn platform_fee(&self) -> Money {
        self.platform_fee
    }

    pub fn delivery_fee(&self) -> Money {
        self.delivery_fee
    }

    pub fn discount(&self) -> &Discount {
        &self.discount
    }

    pub fn taxes(&self) -> Money {
        self.taxes
    }

    pub fn total_paid(&self) -> Money {
        self.total_paid
    }

    /// Returns the stored charges as a [`Totals`] breakdown.
    pub fn totals(&self) -> Totals {
        Totals {
            subtotal: self.subtotal,
            platform_fee: self.platform_fee,
            delivery_fee: self.delivery_fee,
            discount: self.discount.amount,
            taxes: self.taxes,
            grand_total: self.total_paid,
        }
    }

    /// Returns the ids of merged amendments, oldest first.
    pub fn applied_amendments(&self) -> &[AmendmentId] {
        &self.applied_amendments
    }

    /// Returns true if `amendment_id` has been merged into this order.
    pub fn has_applied(&self, amendment_id: AmendmentId) -> bool {
        self.applied_amendments.contains(&amendment_id)
    }

    /// Returns the total quantity over all days.
    pub fn total_quantity(&self) -> u64 {
        self.days
            .iter()
            .flat_map(|day| day.items())
            .map(|item| u64::from(item.quantity))
            .sum()
    }

    /// Returns true if every day total matches its items and the stored
    /// charges add up.
    pub fn is_consistent(&self) -> bool {
        let subtotal = Money::checked_sum(self.days.iter().map(OrderDay::day_total));
        let assembled = Totals::assemble(
            self.subtotal,
            self.platform_fee,
            self.delivery_fee,
            self.discount.amount,
            self.taxes,
        );
        self.days.iter().all(OrderDay::is_consistent)
            && subtotal == Some(self.subtotal)
            && assembled.is_ok_and(|totals| totals.grand_total == self.total_paid)
    }

    /// Returns the day for `day`, creating it on `delivery_date` if absent.
    pub(crate) fn day_entry(&mut self, day: Weekday, delivery_date: NaiveDate) -> &mut OrderDay {
        let index = match self.days.iter().position(|order_day| order_day.day == day) {
            Some(index) => index,
            None => {
                self.days.push(OrderDay::new(day, delivery_date));
                self.days.len() - 1
            }
        };
        &mut self.days[index]
    }

    pub(crate) fn sort_days(&mut self) {
        self.days.sort_by_key(|order_day| order_day.delivery_date);
    }

    /// Overwrites the stored charges. The discount code is kept.
    pub(crate) fn apply_totals(&mut self, totals: Totals) {
        self.subtotal = totals.subtotal;
        self.platform_fee = totals.platform_fee;
        self.delivery_fee = totals.delivery_fee;
        self.discount.amount = totals.discount;
        self.taxes = totals.taxes;
        self.total_paid = totals.grand_total;
    }

    pub(crate) fn record_amendment(&mut self, amendment_id: AmendmentId) {
        self.applied_amendments.push(amendment_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 5, day).unwrap()
    }

    fn two_day_order() -> Order {
        Order::place(
            OrderId::new(),
            CustomerId::new(),
            vec![
                OrderDay::with_items(
                    Weekday::Monday,
                    date(13),
                    [OrderItem::new("A", "Aloo Paratha", 1, Money::from_dollars(10))],
                )
                .unwrap(),
                OrderDay::with_items(
                    Weekday::Tuesday,
                    date(14),
                    [OrderItem::new("B", "Bhindi", 1, Money::from_dollars(10))],
                )
                .unwrap(),
            ],
            &FeePolicy::default(),
            None,
        )
        .unwrap()
    }

    #[test]
    fn test_order_day_folds_repeated_products() {
        let day = OrderDay::with_items(
            Weekday::Monday,
            date(13),
            [
                OrderItem::new("A", "Aloo Paratha", 1, Money::from_dollars(10)),
                OrderItem::new("B", "Bhindi", 2, Money::from_cents(450)),
                OrderItem::new("A", "Aloo Paratha", 2, Money::from_dollars(12)),
            ],
        )
        .unwrap();

        assert_eq!(day.items().len(), 2);
        let a = day.item(&ProductId::new("A")).unwrap();
        assert_eq!(a.quantity, 3);
        assert_eq!(a.unit_price, Money::from_dollars(12));
        assert_eq!(day.day_total(), Money::from_cents(3600 + 900));
        assert!(day.is_consistent());
    }

    #[test]
    fn test_add_item_keeps_higher_price() {
        let mut day = OrderDay::with_items(
            Weekday::Monday,
            date(13),
            [OrderItem::new("A", "Aloo Paratha", 1, Money::from_dollars(10))],
        )
        .unwrap();
        day.add_item(OrderItem::new("A", "Renamed", 1, Money::from_dollars(8)))
            .unwrap();

        let a = day.item(&ProductId::new("A")).unwrap();
        assert_eq!(a.unit_price, Money::from_dollars(10));
        assert_eq!(a.name, "Aloo Paratha");
        assert_eq!(day.day_total(), Money::from_dollars(20));
    }

    #[test]
    fn test_add_item_overflow_leaves_day_unchanged() {
        let mut day = OrderDay::with_items(
            Weekday::Monday,
            date(13),
            [OrderItem::new("A", "Aloo Paratha", u32::MAX - 1, Money::from_cents(1))],
        )
        .unwrap();
        let before = day.clone();

        let result = day.add_item(OrderItem::new("A", "Aloo Paratha", 2, Money::from_cents(1)));
        assert_eq!(result, Err(TotalsError::Overflow));
        assert_eq!(day, before);

        let result = day.add_item(OrderItem::new(
            "B",
            "Bhindi",
            2,
            Money::from_cents(i64::MAX / 2 + 1),
        ));
        assert_eq!(result, Err(TotalsError::Overflow));
        assert_eq!(day, before);
        assert!(day.is_consistent());
    }

    #[test]
    fn test_place_orders_days_and_prices_totals() {
        let order = Order::place(
            OrderId::new(),
            CustomerId::new(),
            vec![
                OrderDay::with_items(
                    Weekday::Friday,
                    date(17),
                    [OrderItem::new("B", "Biryani", 1, Money::from_cents(500))],
                )
                .unwrap(),
                OrderDay::with_items(
                    Weekday::Thursday,
                    date(16),
                    [OrderItem::new("A", "Aloo Paratha", 1, Money::from_cents(729))],
                )
                .unwrap(),
            ],
            &FeePolicy::default(),
            Some("WELCOME".to_string()),
        )
        .unwrap();

        assert_eq!(order.days()[0].day, Weekday::Thursday);
        assert_eq!(order.subtotal(), Money::from_cents(1229));
        assert_eq!(order.total_paid(), Money::from_cents(1952));
        assert_eq!(order.discount().code.as_deref(), Some("WELCOME"));
        assert!(order.is_consistent());
        assert!(order.applied_amendments().is_empty());
    }

    #[test]
    fn test_order_round_trips_through_json() {
        let order = two_day_order();

        let json = serde_json::to_string(&order).unwrap();
        let restored: Order = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, order);
        assert_eq!(Order::record_type(), "Order");
        assert_eq!(restored.record_id(), order.id());
    }

    #[test]
    fn test_stored_day_total_is_rebuilt_from_items() {
        let order = two_day_order();
        let mut json = serde_json::to_value(&order).unwrap();
        json["days"][1]["day_total"]["cents"] = 99_999.into();

        let restored: Order = serde_json::from_value(json).unwrap();
        let tuesday = restored.day(Weekday::Tuesday).unwrap();
        assert_eq!(tuesday.day_total(), Money::from_dollars(10));
        assert!(restored.is_consistent());
        assert_eq!(restored, order);
    }

    #[test]
    fn test_stored_duplicate_products_are_folded() {
        let order = two_day_order();
        let mut json = serde_json::to_value(&order).unwrap();
        let item = json["days"][0]["items"][0].clone();
        json["days"][0]["items"].as_array_mut().unwrap().push(item);

        let restored: Order = serde_json::from_value(json).unwrap();
        let monday = restored.day(Weekday::Monday).unwrap();
        assert_eq!(monday.items().len(), 1);
        assert_eq!(monday.items()[0].quantity, 2);
        assert_eq!(monday.day_total(), Money::from_dollars(20));
        // The stored subtotal no longer matches the folded days.
        assert!(!restored.is_consistent());
    }

    #[test]
    fn test_stored_day_out_of_range_is_rejected() {
        let json = serde_json::json!({
            "day": "Monday",
            "delivery_date": "2024-05-13",
            "items": [{
                "product_id": "A",
                "name": "Aloo Paratha",
                "unit_price": { "cents": i64::MAX },
                "quantity": 2
            }]
        });
        assert!(serde_json::from_value::<OrderDay>(json).is_err());
    }
}
