use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::models::{CanonicalProduct, ExternalListing, PriceHistory, Source};
use crate::storage::{ListingStore, PairBatch, WritePolicy};
use crate::utils::error::Result;

#[derive(Debug, Default)]
struct MemoryState {
    products: Vec<CanonicalProduct>,
    sources: Vec<Source>,
    listings: Vec<ExternalListing>,
    history: Vec<PriceHistory>,
}

/// Process-local store for dry runs and tests. Nothing survives a restart.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    state: Arc<RwLock<MemoryState>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds the catalog in one go.
    pub async fn with_catalog(products: Vec<CanonicalProduct>, sources: Vec<Source>) -> Self {
        let store = Self::new();
        {
            let mut state = store.state.write().await;
            state.products = products;
            state.sources = sources;
        }
        store
    }

    pub async fn all_listings(&self) -> Vec<ExternalListing> {
        self.state.read().await.listings.clone()
    }
}

#[async_trait]
impl ListingStore for MemoryStore {
    async fn list_products(&self) -> Result<Vec<CanonicalProduct>> {
        Ok(self.state.read().await.products.clone())
    }

    async fn list_active_sources(&self) -> Result<Vec<Source>> {
        let state = self.state.read().await;
        Ok(state.sources.iter().filter(|s| s.is_active).cloned().collect())
    }

    async fn commit_pair(&self, batch: &PairBatch, policy: WritePolicy) -> Result<usize> {
        // One write guard for the whole batch keeps it atomic.
        let mut state = self.state.write().await;

        for listing in &batch.listings {
            let existing = match policy {
                WritePolicy::Append => None,
                WritePolicy::Upsert => state
                    .listings
                    .iter_mut()
                    .find(|l| l.source_id == listing.source_id && l.external_id == listing.external_id),
            };

            match existing {
                Some(row) => {
                    let (id, first_seen) = (row.id.clone(), row.first_seen);
                    *row = ExternalListing {
                        id,
                        first_seen,
                        missed_runs: 0,
                        is_stale: false,
                        ..listing.clone()
                    };
                }
                None => state.listings.push(listing.clone()),
            }
        }

        if let Some(point) = &batch.price_point {
            state.history.push(point.clone());
        }

        Ok(batch.listings.len())
    }

    async fn age_unseen_listings(&self, source_id: &str, run_at: DateTime<Utc>, stale_after: u32) -> Result<u64> {
        let mut state = self.state.write().await;
        let mut aged = 0;

        for listing in state
            .listings
            .iter_mut()
            .filter(|l| l.source_id == source_id && l.last_seen < run_at)
        {
            listing.missed_runs += 1;
            if listing.missed_runs >= i64::from(stale_after) {
                listing.is_stale = true;
            }
            aged += 1;
        }

        Ok(aged)
    }

    async fn listings_for_product(&self, product_id: &str) -> Result<Vec<ExternalListing>> {
        let state = self.state.read().await;
        Ok(state
            .listings
            .iter()
            .filter(|l| l.product_id == product_id)
            .cloned()
            .collect())
    }

    async fn price_history(&self, product_id: &str, source_id: &str) -> Result<Vec<PriceHistory>> {
        let state = self.state.read().await;
        let mut history: Vec<PriceHistory> = state
            .history
            .iter()
            .filter(|p| p.product_id == product_id && p.source_id == source_id)
            .cloned()
            .collect();
        history.sort_by_key(|p| p.recorded_at);
        Ok(history)
    }

    async fn count_listings(&self) -> Result<u64> {
        Ok(self.state.read().await.listings.len() as u64)
    }

    async fn insert_product(&self, product: &CanonicalProduct) -> Result<()> {
        self.state.write().await.products.push(product.clone());
        Ok(())
    }

    async fn insert_source(&self, source: &Source) -> Result<()> {
        self.state.write().await.sources.push(source.clone());
        Ok(())
    }
}
