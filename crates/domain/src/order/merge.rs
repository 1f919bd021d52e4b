//! Folding a paid amendment into its order.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::calendar::{DayDateResolver, Weekday};
use crate::catalog::ProductLookup;
use crate::totals::{FeePolicy, Totals};

use super::{AmendmentStatus, MergeError, Order, OrderItem, PendingAmendment, ProductId};

/// An amendment item that could not be priced and was left out.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DroppedItem {
    pub day: Weekday,
    pub product_id: ProductId,
    pub quantity: u32,
}

/// Result of a successful merge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MergeOutcome {
    /// The order with the amendment folded in.
    pub order: Order,

    /// The amendment, now confirmed.
    pub amendment: PendingAmendment,

    /// Items skipped because the catalog did not know them.
    pub dropped: Vec<DroppedItem>,
}

impl MergeOutcome {
    /// Returns true if some amendment items were dropped.
    pub fn is_partial(&self) -> bool {
        !self.dropped.is_empty()
    }
}

/// Merges amendments into orders and recomputes the order's charges.
///
/// Fees and the discount are preserved from the order; subtotal and taxes
/// are recomputed. With `recompute_discount_on_amend` the discount tier is
/// re-evaluated against the new subtotal.
#[derive(Debug, Clone, Default)]
pub struct AmendmentMerger {
    policy: FeePolicy,
    recompute_discount_on_amend: bool,
}

impl AmendmentMerger {
    /// Creates a merger that keeps the order's discount.
    pub fn new(policy: FeePolicy) -> Self {
        Self {
            policy,
            recompute_discount_on_amend: false,
        }
    }

    /// Sets whether the discount tier is re-evaluated on merge.
    pub fn with_discount_recompute(mut self, recompute: bool) -> Self {
        self.recompute_discount_on_amend = recompute;
        self
    }

    pub fn policy(&self) -> &FeePolicy {
        &self.policy
    }

    /// Folds `amendment` into `order`.
    ///
    /// Neither input is modified; the merged order and the confirmed
    /// amendment are returned in the outcome. `now` resolves the date of
    /// days the order does not have yet. An order whose stored charges do
    /// not add up to its days is refused.
    pub fn merge(
        &self,
        order: &Order,
        amendment: &PendingAmendment,
        lookup: &impl ProductLookup,
        now: NaiveDateTime,
    ) -> Result<MergeOutcome, MergeError> {
        check_applicable(order, amendment)?;
        if !order.is_consistent() {
            return Err(MergeError::InconsistentOrder(order.id()));
        }

        let resolver = DayDateResolver::default();
        let mut merged_order = order.clone();
        let mut dropped = Vec::new();
        let mut merged_items = 0usize;

        for amendment_day in amendment.days() {
            for item in amendment_day.items.iter().filter(|item| item.quantity > 0) {
                let Some(entry) = lookup.lookup(&item.product_id) else {
                    tracing::warn!(
                        order_id = %order.id(),
                        amendment_id = %amendment.id(),
                        product_id = %item.product_id,
                        day = %amendment_day.day,
                        "product not in catalog, dropping amendment item"
                    );
                    dropped.push(DroppedItem {
                        day: amendment_day.day,
                        product_id: item.product_id.clone(),
                        quantity: item.quantity,
                    });
                    continue;
                };

                let delivery_date = amendment_day.delivery_date.unwrap_or_else(|| {
                    resolver.resolve_date_for_weekday(amendment_day.day, now)
                });
                merged_order
                    .day_entry(amendment_day.day, delivery_date)
                    .add_item(OrderItem::new(
                        item.product_id.clone(),
                        entry.name,
                        item.quantity,
                        entry.unit_price,
                    ))?;
                merged_items += 1;
            }
        }

        if merged_items == 0 {
            return Err(MergeError::EmptyAmendment);
        }

        merged_order.sort_days();
        let totals = self.recalculate(&merged_order)?;
        merged_order.apply_totals(totals);
        merged_order.record_amendment(amendment.id());

        let mut confirmed = amendment.clone();
        confirmed.mark_confirmed();

        tracing::debug!(
            order_id = %order.id(),
            amendment_id = %amendment.id(),
            merged_items,
            dropped = dropped.len(),
            total_paid = %merged_order.total_paid(),
            "amendment merged"
        );

        Ok(MergeOutcome {
            order: merged_order,
            amendment: confirmed,
            dropped,
        })
    }

    fn recalculate(&self, order: &Order) -> Result<Totals, MergeError> {
        let recomputed = self.policy.compute_totals(&order.day_totals())?;
        let discount = if self.recompute_discount_on_amend {
            recomputed.discount
        } else {
            order.discount().amount
        };
        Ok(Totals::assemble(
            recomputed.subtotal,
            order.platform_fee(),
            order.delivery_fee(),
            discount,
            recomputed.taxes,
        )?)
    }
}

fn check_applicable(order: &Order, amendment: &PendingAmendment) -> Result<(), MergeError> {
    if amendment.status() == AmendmentStatus::Confirmed || order.has_applied(amendment.id()) {
        return Err(MergeError::AlreadyApplied(amendment.id()));
    }
    if amendment.status() == AmendmentStatus::Cancelled {
        return Err(MergeError::Cancelled(amendment.id()));
    }
    if !amendment.payment_status().is_paid() {
        return Err(MergeError::NotPaid(amendment.id()));
    }
    if amendment.order_id() != order.id() {
        return Err(MergeError::OrderMismatch {
            amendment_id: amendment.id(),
            expected: order.id(),
            actual: amendment.order_id(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use chrono::NaiveDate;
    use common::{AmendmentId, CustomerId, OrderId};

    use super::*;
    use crate::catalog::CatalogEntry;
    use crate::order::{AmendmentDay, AmendmentItem, Money, OrderDay};
    use crate::totals::TotalsError;

    fn date(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 5, day).unwrap()
    }

    // Wednesday 2024-05-15
    fn now() -> NaiveDateTime {
        date(15).and_hms_opt(9, 0, 0).unwrap()
    }

    fn catalog() -> HashMap<ProductId, CatalogEntry> {
        HashMap::from([
            (
                ProductId::new("A"),
                CatalogEntry::new("Aloo Paratha", Money::from_dollars(10)),
            ),
            (
                ProductId::new("B"),
                CatalogEntry::new("Bhindi Masala", Money::from_cents(450)),
            ),
        ])
    }

    fn monday_order() -> Order {
        Order::place(
            OrderId::new(),
            CustomerId::new(),
            vec![OrderDay::with_items(
                Weekday::Monday,
                date(13),
                [OrderItem::new("A", "Aloo Paratha", 1, Money::from_dollars(10))],
            )
            .unwrap()],
            &FeePolicy::default(),
            None,
        )
        .unwrap()
    }

    fn paid_amendment(order: &Order, days: Vec<AmendmentDay>) -> PendingAmendment {
        let mut amendment = PendingAmendment::new(AmendmentId::new(), order.id(), days, now());
        amendment.mark_paid().unwrap();
        amendment
    }

    fn add(day: Weekday, product: &str, quantity: u32) -> AmendmentDay {
        AmendmentDay::new(day, vec![AmendmentItem::new(product, quantity)])
    }

    #[test]
    fn test_existing_product_quantity_is_summed() {
        let order = monday_order();
        let amendment = paid_amendment(&order, vec![add(Weekday::Monday, "A", 2)]);

        let outcome = AmendmentMerger::default()
            .merge(&order, &amendment, &catalog(), now())
            .unwrap();

        let monday = outcome.order.day(Weekday::Monday).unwrap();
        assert_eq!(monday.items().len(), 1);
        assert_eq!(monday.items()[0].quantity, 3);
        assert_eq!(monday.items()[0].unit_price, Money::from_dollars(10));
        assert_eq!(monday.day_total(), Money::from_dollars(30));

        // 30 + 1 + 10 - 5 + 3
        assert_eq!(outcome.order.total_paid(), Money::from_dollars(39));
        assert!(outcome.order.is_consistent());
        assert!(outcome.order.has_applied(amendment.id()));
        assert_eq!(outcome.amendment.status(), AmendmentStatus::Confirmed);
        assert!(!outcome.is_partial());
    }

    #[test]
    fn test_reapplying_is_rejected_without_change() {
        let order = monday_order();
        let amendment = paid_amendment(&order, vec![add(Weekday::Monday, "A", 2)]);
        let merger = AmendmentMerger::default();
        let first = merger.merge(&order, &amendment, &catalog(), now()).unwrap();

        let again = merger.merge(&first.order, &first.amendment, &catalog(), now());
        assert_eq!(again, Err(MergeError::AlreadyApplied(amendment.id())));

        // Ledger alone is enough to reject a stale pending copy.
        let stale = merger.merge(&first.order, &amendment, &catalog(), now());
        assert_eq!(stale, Err(MergeError::AlreadyApplied(amendment.id())));
        assert_eq!(first.order.day(Weekday::Monday).unwrap().items()[0].quantity, 3);
    }

    #[test]
    fn test_new_product_and_new_day() {
        let order = monday_order();
        let amendment = paid_amendment(
            &order,
            vec![add(Weekday::Monday, "B", 2), add(Weekday::Thursday, "A", 1)],
        );

        let outcome = AmendmentMerger::default()
            .merge(&order, &amendment, &catalog(), now())
            .unwrap();

        let monday = outcome.order.day(Weekday::Monday).unwrap();
        assert_eq!(monday.items().len(), 2);
        assert_eq!(monday.items()[1].name, "Bhindi Masala");
        assert_eq!(monday.day_total(), Money::from_dollars(19));

        let thursday = outcome.order.day(Weekday::Thursday).unwrap();
        assert_eq!(thursday.delivery_date, date(16));
        assert_eq!(outcome.order.subtotal(), Money::from_dollars(29));
    }

    #[test]
    fn test_supplied_delivery_date_is_used() {
        let order = monday_order();
        let amendment = paid_amendment(
            &order,
            vec![add(Weekday::Sunday, "A", 1).on(date(12))],
        );

        let outcome = AmendmentMerger::default()
            .merge(&order, &amendment, &catalog(), now())
            .unwrap();

        assert_eq!(outcome.order.days()[0].day, Weekday::Sunday);
        assert_eq!(outcome.order.days()[0].delivery_date, date(12));
    }

    #[test]
    fn test_price_reconciles_to_higher_catalog_price() {
        let order = monday_order();
        let amendment = paid_amendment(&order, vec![add(Weekday::Monday, "A", 1)]);
        let mut prices = catalog();
        prices.insert(
            ProductId::new("A"),
            CatalogEntry::new("Aloo Paratha", Money::from_dollars(12)),
        );

        let outcome = AmendmentMerger::default()
            .merge(&order, &amendment, &prices, now())
            .unwrap();

        let item = &outcome.order.day(Weekday::Monday).unwrap().items()[0];
        assert_eq!(item.unit_price, Money::from_dollars(12));
        assert_eq!(item.quantity, 2);
    }

    #[test]
    fn test_unknown_products_are_dropped() {
        let order = monday_order();
        let amendment = paid_amendment(
            &order,
            vec![AmendmentDay::new(
                Weekday::Monday,
                vec![AmendmentItem::new("A", 1), AmendmentItem::new("ZZ", 4)],
            )],
        );

        let outcome = AmendmentMerger::default()
            .merge(&order, &amendment, &catalog(), now())
            .unwrap();

        assert!(outcome.is_partial());
        assert_eq!(
            outcome.dropped,
            vec![DroppedItem {
                day: Weekday::Monday,
                product_id: ProductId::new("ZZ"),
                quantity: 4,
            }]
        );
        assert_eq!(outcome.order.total_quantity(), 2);
    }

    #[test]
    fn test_nothing_mergeable_is_empty_amendment() {
        let order = monday_order();
        let amendment = paid_amendment(&order, vec![add(Weekday::Monday, "ZZ", 1)]);

        let result = AmendmentMerger::default().merge(&order, &amendment, &catalog(), now());
        assert_eq!(result, Err(MergeError::EmptyAmendment));
    }

    #[test]
    fn test_guards() {
        let order = monday_order();
        let merger = AmendmentMerger::default();

        let unpaid = PendingAmendment::new(
            AmendmentId::new(),
            order.id(),
            vec![add(Weekday::Monday, "A", 1)],
            now(),
        );
        assert_eq!(
            merger.merge(&order, &unpaid, &catalog(), now()),
            Err(MergeError::NotPaid(unpaid.id()))
        );

        let mut cancelled = paid_amendment(&order, vec![add(Weekday::Monday, "A", 1)]);
        cancelled.cancel().unwrap();
        assert_eq!(
            merger.merge(&order, &cancelled, &catalog(), now()),
            Err(MergeError::Cancelled(cancelled.id()))
        );

        let other = monday_order();
        let foreign = paid_amendment(&other, vec![add(Weekday::Monday, "A", 1)]);
        assert!(matches!(
            merger.merge(&order, &foreign, &catalog(), now()),
            Err(MergeError::OrderMismatch { .. })
        ));
    }

    #[test]
    fn test_discount_frozen_unless_recomputed() {
        let order = monday_order();
        let amendment = paid_amendment(&order, vec![add(Weekday::Monday, "A", 10)]);

        let frozen = AmendmentMerger::default()
            .merge(&order, &amendment, &catalog(), now())
            .unwrap();
        assert_eq!(frozen.order.subtotal(), Money::from_dollars(110));
        assert_eq!(frozen.order.discount().amount, Money::from_dollars(5));

        let recomputed = AmendmentMerger::default()
            .with_discount_recompute(true)
            .merge(&order, &amendment, &catalog(), now())
            .unwrap();
        assert_eq!(recomputed.order.discount().amount, Money::from_dollars(10));
        assert!(recomputed.order.is_consistent());
    }

    #[test]
    fn test_untouched_days_keep_totals_from_items() {
        let order = Order::place(
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
                    [OrderItem::new("B", "Bhindi Masala", 1, Money::from_dollars(10))],
                )
                .unwrap(),
            ],
            &FeePolicy::default(),
            None,
        )
        .unwrap();
        let mut json = serde_json::to_value(&order).unwrap();
        json["days"][1]["day_total"]["cents"] = 99_999.into();
        let stored: Order = serde_json::from_value(json).unwrap();
        let amendment = paid_amendment(&stored, vec![add(Weekday::Monday, "A", 1)]);

        let outcome = AmendmentMerger::default()
            .merge(&stored, &amendment, &catalog(), now())
            .unwrap();

        assert_eq!(
            outcome.order.day(Weekday::Tuesday).unwrap().day_total(),
            Money::from_dollars(10)
        );
        assert_eq!(outcome.order.subtotal(), Money::from_dollars(30));
        // 30 + 1 + 10 - 5 + 3
        assert_eq!(outcome.order.total_paid(), Money::from_dollars(39));
        assert!(outcome.order.is_consistent());
    }

    #[test]
    fn test_inconsistent_order_is_refused() {
        let order = monday_order();
        let mut json = serde_json::to_value(&order).unwrap();
        json["subtotal"]["cents"] = 1.into();
        let stored: Order = serde_json::from_value(json).unwrap();
        let amendment = paid_amendment(&stored, vec![add(Weekday::Monday, "A", 1)]);

        let result = AmendmentMerger::default().merge(&stored, &amendment, &catalog(), now());
        assert_eq!(result, Err(MergeError::InconsistentOrder(stored.id())));
    }

    #[test]
    fn test_quantity_overflow_is_an_error() {
        let order = monday_order();
        let amendment = paid_amendment(&order, vec![add(Weekday::Monday, "A", u32::MAX)]);

        let result = AmendmentMerger::default().merge(&order, &amendment, &catalog(), now());
        assert_eq!(result, Err(MergeError::Totals(TotalsError::Overflow)));
    }

    #[test]
    fn test_merge_never_lowers_total_or_quantity() {
        let order = monday_order();
        let amendment = paid_amendment(
            &order,
            vec![add(Weekday::Monday, "A", 1), add(Weekday::Tuesday, "B", 3)],
        );

        let outcome = AmendmentMerger::default()
            .merge(&order, &amendment, &catalog(), now())
            .unwrap();

        assert!(outcome.order.total_paid() >= order.total_paid());
        assert!(outcome.order.total_quantity() >= order.total_quantity());
    }
}
