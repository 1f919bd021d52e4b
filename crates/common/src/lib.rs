//! Shared identifier types used across the delivery workspace.

pub mod types;

pub use types::{AmendmentId, CustomerId, OrderId};
