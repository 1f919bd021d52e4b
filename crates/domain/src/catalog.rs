//! Product catalog collaborators used to price amendment items.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::order::{Money, ProductId};

/// Current catalog data for a product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub name: String,
    pub unit_price: Money,
}

impl CatalogEntry {
    pub fn new(name: impl Into<String>, unit_price: Money) -> Self {
        Self {
            name: name.into(),
            unit_price,
        }
    }
}

/// Synchronous product lookup used by the merge.
pub trait ProductLookup {
    /// Returns the entry for `product_id`, or `None` if it is unknown.
    fn lookup(&self, product_id: &ProductId) -> Option<CatalogEntry>;
}

impl ProductLookup for HashMap<ProductId, CatalogEntry> {
    fn lookup(&self, product_id: &ProductId) -> Option<CatalogEntry> {
        self.get(product_id).cloned()
    }
}

/// Async catalog collaborator.
///
/// Services prefetch the products they need and hand the resulting map to
/// the synchronous merge.
#[async_trait]
pub trait Catalog: Send + Sync {
    /// Fetches the entries for `product_ids`. Unknown ids are left out.
    async fn fetch_products(
        &self,
        product_ids: &[ProductId],
    ) -> HashMap<ProductId, CatalogEntry>;
}

/// In-memory catalog for tests and the command-line tool.
#[derive(Clone, Default)]
pub struct InMemoryCatalog {
    entries: Arc<RwLock<HashMap<ProductId, CatalogEntry>>>,
}

impl InMemoryCatalog {
    /// Creates an empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a catalog holding `entries`.
    pub fn with_entries(entries: HashMap<ProductId, CatalogEntry>) -> Self {
        Self {
            entries: Arc::new(RwLock::new(entries)),
        }
    }

    /// Adds or replaces a product.
    pub async fn upsert(&self, product_id: impl Into<ProductId>, entry: CatalogEntry) {
        self.entries.write().await.insert(product_id.into(), entry);
    }

    /// Removes a product, returning its last entry.
    pub async fn remove(&self, product_id: &ProductId) -> Option<CatalogEntry> {
        self.entries.write().await.remove(product_id)
    }
}

impl std::fmt::Debug for InMemoryCatalog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryCatalog").finish_non_exhaustive()
    }
}

#[async_trait]
impl Catalog for InMemoryCatalog {
    async fn fetch_products(
        &self,
        product_ids: &[ProductId],
    ) -> HashMap<ProductId, CatalogEntry> {
        let entries = self.entries.read().await;
        product_ids
            .iter()
            .filter_map(|id| entries.get(id).map(|entry| (id.clone(), entry.clone())))
            .collect()
    }
}
