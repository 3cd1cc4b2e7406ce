use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{CanonicalProduct, ExternalListing, PriceHistory, Source};
use crate::utils::error::Result;

pub mod memory;
pub mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

/// How listings are written when the same (source, external id) is seen again.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum WritePolicy {
    /// Refresh the existing row and its `last_seen`; insert when new.
    #[default]
    Upsert,
    /// Insert a new row for every observation.
    Append,
}

/// Everything one (source, product) pair writes in a run.
#[derive(Debug, Clone, Default)]
pub struct PairBatch {
    pub listings: Vec<ExternalListing>,
    pub price_point: Option<PriceHistory>,
}

/// Persistence seen by the sync pipeline.
///
/// `commit_pair` must be all-or-nothing: if it fails or is dropped part way,
/// none of the batch may be visible.
#[async_trait]
pub trait ListingStore: Send + Sync {
    async fn list_products(&self) -> Result<Vec<CanonicalProduct>>;
    async fn list_active_sources(&self) -> Result<Vec<Source>>;

    /// Returns the number of listings written.
    async fn commit_pair(&self, batch: &PairBatch, policy: WritePolicy) -> Result<usize>;

    /// Bumps `missed_runs` on listings of `source_id` last seen before
    /// `run_at`, flagging them stale once they reach `stale_after` misses.
    async fn age_unseen_listings(&self, source_id: &str, run_at: DateTime<Utc>, stale_after: u32) -> Result<u64>;

    async fn listings_for_product(&self, product_id: &str) -> Result<Vec<ExternalListing>>;
    async fn price_history(&self, product_id: &str, source_id: &str) -> Result<Vec<PriceHistory>>;
    async fn count_listings(&self) -> Result<u64>;

    // Catalog maintenance; the sync pipeline never calls these.
    async fn insert_product(&self, product: &CanonicalProduct) -> Result<()>;
    async fn insert_source(&self, source: &Source) -> Result<()>;
}
