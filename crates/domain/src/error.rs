//! Domain error types.

use common::{AmendmentId, OrderId};
use record_store::StoreError;
use thiserror::Error;

use crate::order::{AmendmentError, CheckoutError, MergeError};

/// Errors returned by the checkout and amendment services.
#[derive(Debug, Error)]
pub enum DomainError {
    /// An error occurred in the record store.
    #[error("Record store error: {0}")]
    Store(#[from] StoreError),

    /// Checkout rejected the cart.
    #[error("Checkout error: {0}")]
    Checkout(#[from] CheckoutError),

    /// The amendment request or transition is invalid.
    #[error("Amendment error: {0}")]
    Amendment(#[from] AmendmentError),

    /// The amendment could not be merged.
    #[error("Merge error: {0}")]
    Merge(#[from] MergeError),

    /// Order not found.
    #[error("Order not found: {0}")]
    OrderNotFound(OrderId),

    /// Amendment not found.
    #[error("Amendment not found: {0}")]
    AmendmentNotFound(AmendmentId),

    /// Every merge attempt lost a race with another writer.
    #[error("Order {order_id} kept changing; gave up after {attempts} attempts")]
    ConcurrentModification { order_id: OrderId, attempts: u32 },
}

impl DomainError {
    /// Returns the merge error, if this is one.
    pub fn as_merge_error(&self) -> Option<&MergeError> {
        match self {
            DomainError::Merge(e) => Some(e),
            _ => None,
        }
    }
}
