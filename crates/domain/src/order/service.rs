//! Amendment service: capture, payment, cancellation and merge.

use common::{AmendmentId, OrderId};
use record_store::{RecordStore, RecordStoreExt, StoreError, Versioned};

use crate::calendar::{Clock, SystemClock};
use crate::catalog::Catalog;
use crate::config::DeliveryConfig;
use crate::error::DomainError;

use super::{
    AmendmentError, AmendmentMerger, AmendmentStatus, DroppedItem, MergeError, MergeOutcome,
    Order, PendingAmendment, RequestAmendment,
};

/// Result of applying an amendment.
#[derive(Debug, Clone)]
pub struct MergeReport {
    /// The order as written.
    pub order: Order,

    /// The confirmed amendment.
    pub amendment: PendingAmendment,

    /// Items left out because the catalog did not know them.
    pub dropped: Vec<DroppedItem>,

    /// Number of read-merge-write attempts used.
    pub attempts: u32,
}

impl MergeReport {
    fn new(outcome: MergeOutcome, attempts: u32) -> Self {
        Self {
            order: outcome.order,
            amendment: outcome.amendment,
            dropped: outcome.dropped,
            attempts,
        }
    }

    /// Returns true if some amendment items were dropped.
    pub fn is_partial(&self) -> bool {
        !self.dropped.is_empty()
    }
}

/// Service for managing amendments to placed orders.
///
/// Merges are optimistic: the order is written at the version it was read
/// at, and a conflicting write restarts the merge from a fresh read.
pub struct AmendmentService<O, A, K, C = SystemClock> {
    orders: O,
    amendments: A,
    catalog: K,
    clock: C,
    merger: AmendmentMerger,
    max_attempts: u32,
}

impl<O, A, K, C> AmendmentService<O, A, K, C>
where
    O: RecordStore<Order>,
    A: RecordStore<PendingAmendment>,
    K: Catalog,
    C: Clock,
{
    /// Creates a new amendment service.
    pub fn new(orders: O, amendments: A, catalog: K, clock: C, config: &DeliveryConfig) -> Self {
        Self {
            orders,
            amendments,
            catalog,
            clock,
            merger: config.merger(),
            max_attempts: config.max_merge_attempts.max(1),
        }
    }

    /// Returns a reference to the order store.
    pub fn orders(&self) -> &O {
        &self.orders
    }

    /// Returns a reference to the amendment store.
    pub fn amendments(&self) -> &A {
        &self.amendments
    }

    /// Captures a new unpaid amendment for an existing order.
    #[tracing::instrument(skip(self, cmd), fields(amendment_id = %cmd.amendment_id, order_id = %cmd.order_id))]
    pub async fn request_amendment(
        &self,
        cmd: RequestAmendment,
    ) -> Result<PendingAmendment, DomainError> {
        if !self.orders.exists(&cmd.order_id).await? {
            return Err(DomainError::OrderNotFound(cmd.order_id));
        }

        let amendment = PendingAmendment::new(
            cmd.amendment_id,
            cmd.order_id,
            cmd.days,
            self.clock.now(),
        );
        amendment.validate()?;
        self.amendments.insert(amendment.clone()).await?;

        tracing::info!("amendment requested");
        Ok(amendment)
    }

    /// Records that the amendment's own payment succeeded.
    ///
    /// Recording a payment twice is a no-op.
    #[tracing::instrument(skip(self))]
    pub async fn record_payment(
        &self,
        amendment_id: AmendmentId,
    ) -> Result<PendingAmendment, DomainError> {
        let Versioned {
            record: mut amendment,
            version,
        } = self.load_amendment(amendment_id).await?;

        if amendment.mark_paid()? {
            self.amendments.update(amendment.clone(), version).await?;
            tracing::info!("amendment payment recorded");
        }
        Ok(amendment)
    }

    /// Cancels an amendment that has not been merged.
    ///
    /// The order's ledger is authoritative: if a merge lands while the
    /// cancel is being written, the amendment is put back to confirmed and
    /// the cancel fails.
    #[tracing::instrument(skip(self))]
    pub async fn cancel_amendment(
        &self,
        amendment_id: AmendmentId,
    ) -> Result<PendingAmendment, DomainError> {
        let Versioned {
            record: mut amendment,
            version,
        } = self.load_amendment(amendment_id).await?;

        // A merge that wrote the order but not yet the amendment still counts.
        if self.ledger_holds(&amendment).await? {
            return Err(already_merged());
        }

        amendment.cancel()?;
        let cancelled_at = self.amendments.update(amendment.clone(), version).await?;

        if self.ledger_holds(&amendment).await? {
            let mut confirmed = amendment;
            confirmed.mark_confirmed();
            match self.amendments.update(confirmed, cancelled_at).await {
                Ok(_) => {}
                // The merge confirmed it first.
                Err(e) if e.is_conflict() => {}
                Err(e) => return Err(e.into()),
            }
            tracing::warn!("amendment merged while cancelling, kept as confirmed");
            return Err(already_merged());
        }

        tracing::info!("amendment cancelled");
        Ok(amendment)
    }

    /// Merges a paid amendment into its order.
    ///
    /// Each attempt re-reads both records, merges, and writes the order then
    /// the amendment, each at the version it was read at.
    #[tracing::instrument(skip(self))]
    pub async fn apply_amendment(
        &self,
        amendment_id: AmendmentId,
    ) -> Result<MergeReport, DomainError> {
        let mut committed: Option<MergeOutcome> = None;
        let mut order_id = None;

        for attempt in 1..=self.max_attempts {
            let Versioned {
                record: amendment,
                version: amendment_version,
            } = self.load_amendment(amendment_id).await?;
            order_id = Some(amendment.order_id());
            let Versioned {
                record: order,
                version: order_version,
            } = self.load_order(amendment.order_id()).await?;

            // The order's ledger wins over a cancel that raced the merge.
            if order.has_applied(amendment_id) {
                let finished = if amendment.status() == AmendmentStatus::Confirmed {
                    amendment
                } else {
                    if amendment.status() == AmendmentStatus::Cancelled {
                        tracing::warn!("amendment cancelled after its merge, confirming");
                    }
                    let mut finished = amendment;
                    finished.mark_confirmed();
                    match self.amendments.update(finished.clone(), amendment_version).await {
                        Ok(_) => {}
                        Err(e) if e.is_conflict() => {
                            self.note_conflict(attempt, &e);
                            continue;
                        }
                        Err(e) => return Err(e.into()),
                    }
                    finished
                };
                return match committed {
                    Some(mut outcome) => {
                        outcome.amendment = finished;
                        Ok(self.finish(outcome, attempt))
                    }
                    None => Err(MergeError::AlreadyApplied(amendment_id).into()),
                };
            }

            let prices = self.catalog.fetch_products(&amendment.product_ids()).await;
            let outcome = self
                .merger
                .merge(&order, &amendment, &prices, self.clock.now())?;

            match self.orders.update(outcome.order.clone(), order_version).await {
                Ok(_) => {}
                Err(e) if e.is_conflict() => {
                    self.note_conflict(attempt, &e);
                    continue;
                }
                Err(e) => return Err(e.into()),
            }

            match self
                .amendments
                .update(outcome.amendment.clone(), amendment_version)
                .await
            {
                Ok(_) => return Ok(self.finish(outcome, attempt)),
                Err(e) if e.is_conflict() => {
                    // The order is written; the next attempt only finishes the amendment.
                    self.note_conflict(attempt, &e);
                    committed = Some(outcome);
                }
                Err(e) => return Err(e.into()),
            }
        }

        match order_id {
            Some(order_id) => Err(DomainError::ConcurrentModification {
                order_id,
                attempts: self.max_attempts,
            }),
            None => Err(DomainError::AmendmentNotFound(amendment_id)),
        }
    }

    /// Loads an amendment by ID.
    ///
    /// Returns None if the amendment doesn't exist.
    #[tracing::instrument(skip(self))]
    pub async fn get_amendment(
        &self,
        amendment_id: AmendmentId,
    ) -> Result<Option<PendingAmendment>, DomainError> {
        Ok(self
            .amendments
            .load(&amendment_id)
            .await?
            .map(Versioned::into_record))
    }

    /// Loads an order by ID.
    ///
    /// Returns None if the order doesn't exist.
    #[tracing::instrument(skip(self))]
    pub async fn get_order(&self, order_id: OrderId) -> Result<Option<Order>, DomainError> {
        Ok(self.orders.load(&order_id).await?.map(Versioned::into_record))
    }

    async fn load_amendment(
        &self,
        amendment_id: AmendmentId,
    ) -> Result<Versioned<PendingAmendment>, DomainError> {
        self.amendments
            .load(&amendment_id)
            .await?
            .ok_or(DomainError::AmendmentNotFound(amendment_id))
    }

    async fn load_order(&self, order_id: OrderId) -> Result<Versioned<Order>, DomainError> {
        self.orders
            .load(&order_id)
            .await?
            .ok_or(DomainError::OrderNotFound(order_id))
    }

    async fn ledger_holds(&self, amendment: &PendingAmendment) -> Result<bool, DomainError> {
        Ok(self
            .orders
            .load(&amendment.order_id())
            .await?
            .is_some_and(|order| order.record.has_applied(amendment.id())))
    }

    fn note_conflict(&self, attempt: u32, error: &StoreError) {
        metrics::counter!("amendment_merge_conflicts_total").increment(1);
        tracing::warn!(
            attempt,
            max_attempts = self.max_attempts,
            error = %error,
            "concurrent write during amendment merge, retrying"
        );
    }

    fn finish(&self, outcome: MergeOutcome, attempts: u32) -> MergeReport {
        metrics::counter!("amendment_merges_total").increment(1);
        if outcome.is_partial() {
            metrics::counter!("amendment_items_dropped_total")
                .increment(outcome.dropped.len() as u64);
        }
        tracing::info!(
            attempts,
            dropped = outcome.dropped.len(),
            total_paid = %outcome.order.total_paid(),
            "amendment applied"
        );
        MergeReport::new(outcome, attempts)
    }
}

fn already_merged() -> DomainError {
    AmendmentError::InvalidTransition {
        current: AmendmentStatus::Confirmed,
        action: "cancel",
    }
    .into()
}
