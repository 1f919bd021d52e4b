//! Pending amendments: items a customer adds to an already-placed order.

use std::collections::BTreeSet;

use chrono::{NaiveDate, NaiveDateTime};
use common::{AmendmentId, OrderId};
use record_store::Record;
use serde::{Deserialize, Serialize};

use crate::calendar::Weekday;

use super::{AmendmentError, AmendmentStatus, PaymentStatus, ProductId};

/// A product and quantity to add. Priced from the catalog at merge time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AmendmentItem {
    pub product_id: ProductId,
    pub quantity: u32,
}

impl AmendmentItem {
    pub fn new(product_id: impl Into<ProductId>, quantity: u32) -> Self {
        Self {
            product_id: product_id.into(),
            quantity,
        }
    }
}

/// Items to add for one delivery day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AmendmentDay {
    pub day: Weekday,

    /// Delivery date for a day the order does not have yet. Resolved from
    /// the current week when absent.
    #[serde(default)]
    pub delivery_date: Option<NaiveDate>,

    pub items: Vec<AmendmentItem>,
}

impl AmendmentDay {
    pub fn new(day: Weekday, items: Vec<AmendmentItem>) -> Self {
        Self {
            day,
            delivery_date: None,
            items,
        }
    }

    /// Sets an explicit delivery date.
    pub fn on(mut self, delivery_date: NaiveDate) -> Self {
        self.delivery_date = Some(delivery_date);
        self
    }
}

/// An amendment awaiting merge into its order.
///
/// Created `pending/unpaid`, becomes `pending/paid` once its own charge
/// succeeds and `confirmed/paid` when merged. Confirmed amendments are kept
/// as audit records.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingAmendment {
    id: AmendmentId,
    order_id: OrderId,
    days: Vec<AmendmentDay>,
    #[serde(default)]
    status: AmendmentStatus,
    #[serde(default)]
    payment_status: PaymentStatus,
    requested_at: NaiveDateTime,
}

impl Record for PendingAmendment {
    type Id = AmendmentId;

    fn record_type() -> &'static str {
        "PendingAmendment"
    }

    fn record_id(&self) -> AmendmentId {
        self.id
    }
}

impl PendingAmendment {
    /// Creates an unpaid pending amendment.
    pub fn new(
        id: AmendmentId,
        order_id: OrderId,
        days: Vec<AmendmentDay>,
        requested_at: NaiveDateTime,
    ) -> Self {
        Self {
            id,
            order_id,
            days,
            status: AmendmentStatus::Pending,
            payment_status: PaymentStatus::Unpaid,
            requested_at,
        }
    }

    pub fn id(&self) -> AmendmentId {
        self.id
    }

    pub fn order_id(&self) -> OrderId {
        self.order_id
    }

    pub fn days(&self) -> &[AmendmentDay] {
        &self.days
    }

    pub fn status(&self) -> AmendmentStatus {
        self.status
    }

    pub fn payment_status(&self) -> PaymentStatus {
        self.payment_status
    }

    pub fn requested_at(&self) -> NaiveDateTime {
        self.requested_at
    }

    /// Returns the distinct products referenced, sorted.
    pub fn product_ids(&self) -> Vec<ProductId> {
        self.days
            .iter()
            .flat_map(|day| day.items.iter().map(|item| item.product_id.clone()))
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Checks that there is something to add and every quantity is positive.
    pub fn validate(&self) -> Result<(), AmendmentError> {
        if self.days.iter().all(|day| day.items.is_empty()) {
            return Err(AmendmentError::EmptyRequest);
        }
        if let Some(item) = self
            .days
            .iter()
            .flat_map(|day| day.items.iter())
            .find(|item| item.quantity == 0)
        {
            return Err(AmendmentError::InvalidQuantity {
                product_id: item.product_id.to_string(),
                quantity: item.quantity,
            });
        }
        Ok(())
    }

    /// Records the amendment's payment.
    ///
    /// Returns false if it was already paid.
    pub fn mark_paid(&mut self) -> Result<bool, AmendmentError> {
        if !self.status.can_pay() {
            return Err(AmendmentError::InvalidTransition {
                current: self.status,
                action: "pay",
            });
        }
        if self.payment_status.is_paid() {
            return Ok(false);
        }
        self.payment_status = PaymentStatus::Paid;
        Ok(true)
    }

    /// Cancels the amendment.
    pub fn cancel(&mut self) -> Result<(), AmendmentError> {
        if !self.status.can_cancel() {
            return Err(AmendmentError::InvalidTransition {
                current: self.status,
                action: "cancel",
            });
        }
        self.status = AmendmentStatus::Cancelled;
        Ok(())
    }

    // Callers check the status first.
    pub(crate) fn mark_confirmed(&mut self) {
        self.status = AmendmentStatus::Confirmed;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn requested_at() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 5, 13)
            .unwrap()
            .and_hms_opt(9, 0, 0)
            .unwrap()
    }

    fn amendment(days: Vec<AmendmentDay>) -> PendingAmendment {
        PendingAmendment::new(AmendmentId::new(), OrderId::new(), days, requested_at())
    }

    #[test]
    fn test_new_amendment_is_pending_and_unpaid() {
        let a = amendment(vec![AmendmentDay::new(
            Weekday::Monday,
            vec![AmendmentItem::new("A", 2)],
        )]);
        assert_eq!(a.status(), AmendmentStatus::Pending);
        assert_eq!(a.payment_status(), PaymentStatus::Unpaid);
        assert!(a.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_empty_and_zero_quantity() {
        assert_eq!(amendment(vec![]).validate(), Err(AmendmentError::EmptyRequest));
        assert_eq!(
            amendment(vec![AmendmentDay::new(Weekday::Monday, vec![])]).validate(),
            Err(AmendmentError::EmptyRequest)
        );
        assert!(matches!(
            amendment(vec![AmendmentDay::new(
                Weekday::Monday,
                vec![AmendmentItem::new("A", 0)]
            )])
            .validate(),
            Err(AmendmentError::InvalidQuantity { quantity: 0, .. })
        ));
    }

    #[test]
    fn test_mark_paid_is_idempotent() {
        let mut a = amendment(vec![]);
        assert_eq!(a.mark_paid(), Ok(true));
        assert_eq!(a.mark_paid(), Ok(false));
        assert!(a.payment_status().is_paid());
    }

    #[test]
    fn test_cancelled_amendment_cannot_be_paid_or_cancelled_again() {
        let mut a = amendment(vec![]);
        a.cancel().unwrap();

        assert!(matches!(
            a.mark_paid(),
            Err(AmendmentError::InvalidTransition { action: "pay", .. })
        ));
        assert!(a.cancel().is_err());
    }

    #[test]
    fn test_product_ids_are_distinct() {
        let a = amendment(vec![
            AmendmentDay::new(
                Weekday::Monday,
                vec![AmendmentItem::new("B", 1), AmendmentItem::new("A", 1)],
            ),
            AmendmentDay::new(Weekday::Tuesday, vec![AmendmentItem::new("A", 3)]),
        ]);
        assert_eq!(a.product_ids(), vec![ProductId::new("A"), ProductId::new("B")]);
    }

    #[test]
    fn test_deserializes_with_default_status() {
        let json = format!(
            r#"{{"id":"{}","order_id":"{}","days":[{{"day":"Monday","items":[{{"product_id":"A","quantity":2}}]}}],"requested_at":"2024-05-13T09:00:00"}}"#,
            AmendmentId::new(),
            OrderId::new()
        );
        let a: PendingAmendment = serde_json::from_str(&json).unwrap();
        assert_eq!(a.status(), AmendmentStatus::Pending);
        assert_eq!(a.days()[0].delivery_date, None);
    }
}
