//! Commands accepted by the checkout and amendment services.

use common::{AmendmentId, CustomerId, OrderId};

use crate::cart::CartDaySnapshot;

use super::AmendmentDay;

/// Command to turn a cart into an order.
#[derive(Debug, Clone)]
pub struct PlaceOrder {
    /// The order ID to create.
    pub order_id: OrderId,

    /// The customer placing the order.
    pub customer_id: CustomerId,

    /// Delivery location; selects the minimum cart value.
    pub location: Option<String>,

    /// Per-day cart contents.
    pub cart: Vec<CartDaySnapshot>,

    /// Discount code entered at checkout.
    pub discount_code: Option<String>,
}

impl PlaceOrder {
    /// Creates a new PlaceOrder command with a generated order ID.
    pub fn new(customer_id: CustomerId, cart: Vec<CartDaySnapshot>) -> Self {
        Self {
            order_id: OrderId::new(),
            customer_id,
            location: None,
            cart,
            discount_code: None,
        }
    }

    pub fn at_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    pub fn with_discount_code(mut self, code: impl Into<String>) -> Self {
        self.discount_code = Some(code.into());
        self
    }
}

/// Command to capture an amendment to a placed order.
#[derive(Debug, Clone)]
pub struct RequestAmendment {
    /// The amendment ID to create.
    pub amendment_id: AmendmentId,

    /// The order being amended.
    pub order_id: OrderId,

    /// Items to add, per day.
    pub days: Vec<AmendmentDay>,
}

impl RequestAmendment {
    /// Creates a new RequestAmendment command with a generated amendment ID.
    pub fn new(order_id: OrderId, days: Vec<AmendmentDay>) -> Self {
        Self {
            amendment_id: AmendmentId::new(),
            order_id,
            days,
        }
    }
}
