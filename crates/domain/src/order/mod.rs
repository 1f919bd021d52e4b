//! Orders, amendments and the services that create and merge them.

mod aggregate;
mod amendment;
mod checkout;
mod commands;
mod merge;
mod service;
mod state;
mod value_objects;

pub use aggregate::{Discount, Order, OrderDay};
pub use amendment::{AmendmentDay, AmendmentItem, PendingAmendment};
pub use checkout::{CheckoutService, PlacedOrder};
pub use commands::{PlaceOrder, RequestAmendment};
pub use merge::{AmendmentMerger, DroppedItem, MergeOutcome};
pub use service::{AmendmentService, MergeReport};
pub use state::{AmendmentStatus, PaymentStatus};
pub use value_objects::{Money, OrderItem, ParseMoneyError, ProductId};

use chrono::NaiveDate;
use common::{AmendmentId, OrderId};
use thiserror::Error;

use crate::calendar::Weekday;
use crate::clubbing::ClubbingError;
use crate::totals::TotalsError;

/// Errors that can occur while merging an amendment into an order.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MergeError {
    /// No amendment item could be merged.
    #[error("Amendment has no items that can be merged")]
    EmptyAmendment,

    /// The amendment has already been merged.
    #[error("Amendment {0} has already been applied")]
    AlreadyApplied(AmendmentId),

    /// The amendment's own payment has not succeeded.
    #[error("Amendment {0} is not paid")]
    NotPaid(AmendmentId),

    /// The amendment was cancelled.
    #[error("Amendment {0} was cancelled")]
    Cancelled(AmendmentId),

    /// The amendment belongs to another order.
    #[error("Amendment {amendment_id} targets order {actual}, not {expected}")]
    OrderMismatch {
        amendment_id: AmendmentId,
        expected: OrderId,
        actual: OrderId,
    },

    /// The order's stored charges do not add up to its days.
    #[error("Order {0} is inconsistent: stored charges do not match its days")]
    InconsistentOrder(OrderId),

    /// Recomputing the totals failed.
    #[error("Totals error: {0}")]
    Totals(#[from] TotalsError),
}

/// Errors that can occur while capturing or updating an amendment.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AmendmentError {
    /// The amendment adds nothing.
    #[error("Amendment request has no items")]
    EmptyRequest,

    /// Invalid quantity.
    #[error("Invalid quantity for {product_id}: {quantity} (must be greater than 0)")]
    InvalidQuantity { product_id: String, quantity: u32 },

    /// Amendment is not in the expected state.
    #[error("Invalid state transition: cannot {action} a {current} amendment")]
    InvalidTransition {
        current: AmendmentStatus,
        action: &'static str,
    },
}

/// Errors that can occur at checkout.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CheckoutError {
    /// The cart has no days.
    #[error("Cart is empty")]
    EmptyCart,

    /// Ordering for a cart day has closed.
    #[error("Ordering window for {day} ({date}) is closed")]
    OrderingWindowClosed { day: Weekday, date: NaiveDate },

    /// The cart does not reach the minimum order value.
    #[error("Minimum order value not met: add {shortfall}")]
    MinimumNotMet { shortfall: Money },

    /// The cart could not be planned.
    #[error("Clubbing error: {0}")]
    Clubbing(#[from] ClubbingError),

    /// The order could not be priced.
    #[error("Totals error: {0}")]
    Totals(#[from] TotalsError),
}
