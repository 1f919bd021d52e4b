//! Core of the multi-day delivery system.
//!
//! This crate provides:
//! - Weekday/date resolution and ordering cutoffs ([`calendar`])
//! - Delivery-day clubbing against a minimum order value ([`clubbing`])
//! - Order totals with fees, discount tiers and tax ([`totals`])
//! - Orders, amendments and the amendment merge ([`order`])
//! - Checkout and amendment services over a versioned record store

pub mod calendar;
pub mod cart;
pub mod catalog;
pub mod clubbing;
pub mod config;
pub mod error;
pub mod order;
pub mod totals;

pub use calendar::{
    CalendarError, Clock, DayDateResolver, FixedClock, SystemClock, Weekday, parse_weekday,
};
pub use cart::{CartDaySnapshot, CartItem};
pub use catalog::{Catalog, CatalogEntry, InMemoryCatalog, ProductLookup};
pub use clubbing::{
    ClubbingCalculator, ClubbingError, ClubbingPlanEntry, ClubbingResult, ClubbingRules,
    ForcedPair, MessageColor,
};
pub use config::DeliveryConfig;
pub use error::DomainError;
pub use order::{
    AmendmentDay, AmendmentError, AmendmentItem, AmendmentMerger, AmendmentService,
    AmendmentStatus, CheckoutError, CheckoutService, Discount, DroppedItem, MergeError,
    MergeOutcome, MergeReport, Money, Order, OrderDay, OrderItem, PaymentStatus,
    PendingAmendment, PlaceOrder, PlacedOrder, ProductId, RequestAmendment,
};
pub use totals::{FeePolicy, Totals, TotalsError, compute_totals};
