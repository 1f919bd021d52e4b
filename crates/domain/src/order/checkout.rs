//! Checkout: turning a planned cart into a persisted order.

use record_store::{RecordStore, RecordStoreExt};

use crate::calendar::{Clock, SystemClock};
use crate::cart::CartDaySnapshot;
use crate::clubbing::{ClubbingCalculator, ClubbingResult, ClubbingRules};
use crate::config::DeliveryConfig;
use crate::error::DomainError;
use crate::totals::TotalsError;

use super::{CheckoutError, Order, OrderDay, OrderItem, PlaceOrder};

/// An order created at checkout, with the plan it was built from.
#[derive(Debug, Clone)]
pub struct PlacedOrder {
    pub order: Order,
    pub plan: ClubbingResult,
}

/// Service that checks a cart against ordering windows and the minimum
/// order value, then creates the order.
pub struct CheckoutService<S, C = SystemClock> {
    orders: S,
    clock: C,
    calculator: ClubbingCalculator,
    config: DeliveryConfig,
}

impl<S: RecordStore<Order>, C: Clock> CheckoutService<S, C> {
    /// Creates a new checkout service with the default clubbing rules.
    pub fn new(orders: S, clock: C, config: DeliveryConfig) -> Self {
        Self {
            orders,
            clock,
            calculator: ClubbingCalculator::default(),
            config,
        }
    }

    /// Replaces the clubbing rule table.
    pub fn with_rules(mut self, rules: ClubbingRules) -> Self {
        self.calculator = ClubbingCalculator::new(rules);
        self
    }

    /// Returns a reference to the order store.
    pub fn store(&self) -> &S {
        &self.orders
    }

    /// Plans `cart` for `location` without creating anything.
    ///
    /// A cart below the minimum is not an error here; the plan reports it.
    pub fn preview(
        &self,
        location: Option<&str>,
        cart: &[CartDaySnapshot],
    ) -> Result<ClubbingResult, CheckoutError> {
        let now = self.clock.now();
        let resolver = self.config.resolver();
        if let Some(closed) = cart
            .iter()
            .find(|snapshot| resolver.is_date_closed(snapshot.date, now))
        {
            return Err(CheckoutError::OrderingWindowClosed {
                day: closed.day,
                date: closed.date,
            });
        }

        let min_cart_value = self.config.min_cart_value_for(location);
        Ok(self.calculator.plan(cart, min_cart_value)?)
    }

    /// Places an order for the cart in `cmd`.
    #[tracing::instrument(skip(self, cmd), fields(order_id = %cmd.order_id, location = ?cmd.location))]
    pub async fn place_order(&self, cmd: PlaceOrder) -> Result<PlacedOrder, DomainError> {
        let plan = match self.checked_plan(&cmd) {
            Ok(plan) => plan,
            Err(e) => {
                tracing::info!(error = %e, "checkout rejected");
                metrics::counter!("checkout_rejections_total").increment(1);
                return Err(e.into());
            }
        };

        let days = build_days(&cmd.cart, &plan).map_err(CheckoutError::from)?;
        let order = Order::place(
            cmd.order_id,
            cmd.customer_id,
            days,
            &self.config.fee_policy,
            cmd.discount_code,
        )
        .map_err(CheckoutError::from)?;

        self.orders.insert(order.clone()).await?;

        metrics::counter!("checkout_orders_placed_total").increment(1);
        tracing::info!(
            days = order.days().len(),
            total_paid = %order.total_paid(),
            "order placed"
        );

        Ok(PlacedOrder { order, plan })
    }

    /// Loads an order by ID.
    ///
    /// Returns None if the order doesn't exist.
    #[tracing::instrument(skip(self))]
    pub async fn get_order(&self, order_id: common::OrderId) -> Result<Option<Order>, DomainError> {
        Ok(self.orders.load(&order_id).await?.map(|v| v.into_record()))
    }

    fn checked_plan(&self, cmd: &PlaceOrder) -> Result<ClubbingResult, CheckoutError> {
        if cmd.cart.is_empty() {
            return Err(CheckoutError::EmptyCart);
        }
        let plan = self.preview(cmd.location.as_deref(), &cmd.cart)?;
        if !plan.can_checkout {
            return Err(CheckoutError::MinimumNotMet {
                shortfall: plan.total_shortfall,
            });
        }
        Ok(plan)
    }
}

// The plan lists days in the same date order as a stable sort of the cart.
fn build_days(
    cart: &[CartDaySnapshot],
    plan: &ClubbingResult,
) -> Result<Vec<OrderDay>, TotalsError> {
    let mut snapshots: Vec<&CartDaySnapshot> = cart.iter().collect();
    snapshots.sort_by_key(|snapshot| snapshot.date);

    snapshots
        .into_iter()
        .zip(&plan.plan)
        .filter(|(snapshot, _)| !snapshot.is_empty())
        .map(|(snapshot, entry)| {
            OrderDay::with_items(
                snapshot.day,
                entry.delivery_date,
                snapshot.items.iter().map(|item| {
                    OrderItem::new(
                        item.product_id.clone(),
                        item.name.clone(),
                        item.quantity,
                        item.unit_price,
                    )
                }),
            )
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveDate, NaiveDateTime};
    use common::CustomerId;
    use record_store::InMemoryRecordStore;

    use super::*;
    use crate::calendar::{FixedClock, Weekday};
    use crate::cart::CartItem;
    use crate::order::Money;

    fn date(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 5, day).unwrap()
    }

    // Monday 2024-05-13, before the cutoff
    fn monday_morning() -> NaiveDateTime {
        date(13).and_hms_opt(9, 0, 0).unwrap()
    }

    fn cart_day(day: Weekday, date: NaiveDate, cents: i64) -> CartDaySnapshot {
        CartDaySnapshot::new(
            day,
            date,
            vec![CartItem::new(format!("sku-{day}"), "Thali", 1, Money::from_cents(cents))],
        )
    }

    fn service() -> CheckoutService<InMemoryRecordStore<Order>, FixedClock> {
        CheckoutService::new(
            InMemoryRecordStore::new(),
            FixedClock::new(monday_morning()),
            DeliveryConfig::default(),
        )
    }

    #[test]
    fn test_build_days_uses_plan_delivery_dates() {
        let cart = vec![
            cart_day(Weekday::Friday, date(17), 500),
            cart_day(Weekday::Thursday, date(16), 729),
        ];
        let plan = ClubbingCalculator::default()
            .plan(&cart, Money::from_dollars(10))
            .unwrap();

        let days = build_days(&cart, &plan).unwrap();
        assert_eq!(days[0].day, Weekday::Thursday);
        assert_eq!(days[0].delivery_date, date(17));
        assert_eq!(days[1].day, Weekday::Friday);
        assert_eq!(days[1].delivery_date, date(17));
    }

    #[test]
    fn test_preview_reports_shortfall_without_error() {
        let plan = service()
            .preview(None, &[cart_day(Weekday::Thursday, date(16), 300)])
            .unwrap();
        assert!(!plan.can_checkout);
        assert_eq!(plan.total_shortfall, Money::from_cents(700));
    }

    #[test]
    fn test_preview_rejects_closed_day() {
        let service = CheckoutService::new(
            InMemoryRecordStore::new(),
            FixedClock::new(date(16).and_hms_opt(14, 0, 0).unwrap()),
            DeliveryConfig::default(),
        );
        let result = service.preview(None, &[cart_day(Weekday::Thursday, date(16), 1500)]);
        assert_eq!(
            result,
            Err(CheckoutError::OrderingWindowClosed {
                day: Weekday::Thursday,
                date: date(16),
            })
        );
    }

    #[tokio::test]
    async fn test_place_order_persists() {
        let service = service();
        let cmd = PlaceOrder::new(
            CustomerId::new(),
            vec![
                cart_day(Weekday::Thursday, date(16), 729),
                cart_day(Weekday::Friday, date(17), 500),
            ],
        );
        let order_id = cmd.order_id;

        let placed = service.place_order(cmd).await.unwrap();
        assert!(placed.plan.can_checkout);
        assert_eq!(placed.order.total_paid(), Money::from_cents(1952));

        let stored = service.get_order(order_id).await.unwrap().unwrap();
        assert_eq!(stored, placed.order);
    }

    #[tokio::test]
    async fn test_place_order_rejects_empty_cart() {
        let result = service()
            .place_order(PlaceOrder::new(CustomerId::new(), vec![]))
            .await;
        assert!(matches!(
            result,
            Err(DomainError::Checkout(CheckoutError::EmptyCart))
        ));
    }
}
