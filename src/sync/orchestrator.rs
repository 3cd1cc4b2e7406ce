use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

use crate::config::SyncConfig;
use crate::matching::EntityMatcher;
use crate::models::{CanonicalProduct, ExternalListing, PriceHistory, Source};
use crate::plugins::registry::{AdapterRegistry, SourceAdapterRef};
use crate::storage::{ListingStore, PairBatch, WritePolicy};
use crate::utils::error::{AppError, Result};

/// Outcome of one orchestrator run over a set of sources.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SyncReport {
    pub run_at: DateTime<Utc>,
    pub total_listings: usize,
    pub per_source: BTreeMap<String, usize>,
    pub errors: Vec<String>,
    pub pairs_completed: usize,
    pub pairs_abandoned: usize,
}

struct PairJob<'a> {
    source: &'a Source,
    adapter: SourceAdapterRef,
    product: &'a CanonicalProduct,
}

struct PairOutcome<'a> {
    source: &'a Source,
    result: std::result::Result<usize, String>,
}

/// Fans (source, product) pairs out to adapters, resolves what comes back and
/// commits each pair atomically.
#[derive(Clone)]
pub struct SyncOrchestrator {
    store: Arc<dyn ListingStore>,
    adapters: AdapterRegistry,
    matcher: Arc<EntityMatcher>,
    settings: SyncConfig,
}

impl SyncOrchestrator {
    pub fn new(
        store: Arc<dyn ListingStore>,
        adapters: AdapterRegistry,
        matcher: Arc<EntityMatcher>,
        settings: SyncConfig,
    ) -> Self {
        Self {
            store,
            adapters,
            matcher,
            settings,
        }
    }

    pub fn store(&self) -> &Arc<dyn ListingStore> {
        &self.store
    }

    pub fn settings(&self) -> &SyncConfig {
        &self.settings
    }

    pub async fn run_sync(&self, sources: &[Source], products: &[CanonicalProduct]) -> Result<SyncReport> {
        let sources: Vec<&Source> = sources.iter().filter(|s| s.is_active).collect();
        if sources.is_empty() {
            return Err(AppError::Configuration("no active sources to sync".to_string()));
        }
        if products.is_empty() {
            return Err(AppError::Configuration("product catalog is empty".to_string()));
        }

        let started = Instant::now();
        let run_at = Utc::now();
        let mut report = SyncReport {
            run_at,
            total_listings: 0,
            per_source: BTreeMap::new(),
            errors: Vec::new(),
            pairs_completed: 0,
            pairs_abandoned: 0,
        };

        let mut jobs = Vec::new();
        for source in &sources {
            let Some(adapter) = self.adapters.get(&source.slug).await else {
                tracing::warn!(source = %source.slug, "no adapter registered, skipping source");
                report.errors.push(format!("no adapter for {}", source.slug));
                continue;
            };

            report.per_source.insert(source.slug.clone(), 0);
            for product in products {
                jobs.push(PairJob {
                    source,
                    adapter: adapter.clone(),
                    product,
                });
            }
        }

        tracing::info!(
            sources = sources.len(),
            products = products.len(),
            pairs = jobs.len(),
            "starting sync run"
        );

        let mut pending_by_source: HashMap<&str, usize> = HashMap::new();
        for job in &jobs {
            *pending_by_source.entry(job.source.id.as_str()).or_insert(0) += 1;
        }
        let mut failed_sources: HashSet<&str> = HashSet::new();

        let deadline = self.settings.deadline_secs.map(|secs| started + Duration::from_secs(secs));

        // In-flight pairs are dropped with the stream at the end of this block,
        // which rolls back any open transaction before aging starts.
        {
            let pending: Vec<_> = jobs.iter().map(|job| self.run_pair(job, products, run_at)).collect();
            let pairs = stream::iter(pending).buffer_unordered(self.settings.max_concurrency.max(1));
            let mut pairs = std::pin::pin!(pairs);

            loop {
                let next = match deadline {
                    Some(at) => match tokio::time::timeout_at(at, pairs.next()).await {
                        Ok(next) => next,
                        Err(_) => break,
                    },
                    None => pairs.next().await,
                };
                let Some(outcome) = next else { break };

                report.pairs_completed += 1;
                if let Some(pending) = pending_by_source.get_mut(outcome.source.id.as_str()) {
                    *pending -= 1;
                }

                match outcome.result {
                    Ok(written) => {
                        report.total_listings += written;
                        *report.per_source.entry(outcome.source.slug.clone()).or_insert(0) += written;
                    }
                    Err(message) => {
                        failed_sources.insert(outcome.source.id.as_str());
                        report.errors.push(message);
                    }
                }
            }
        }

        report.pairs_abandoned = jobs.len() - report.pairs_completed;
        if report.pairs_abandoned > 0 {
            let secs = self.settings.deadline_secs.unwrap_or_default();
            tracing::warn!(abandoned = report.pairs_abandoned, "sync deadline exceeded");
            report.errors.push(format!(
                "sync deadline of {}s exceeded; {} pairs abandoned",
                secs, report.pairs_abandoned
            ));
        }

        if self.settings.write_policy == WritePolicy::Upsert {
            for source in &sources {
                let finished = pending_by_source.get(source.id.as_str()) == Some(&0);
                if finished && !failed_sources.contains(source.id.as_str()) {
                    self.age_source(source, run_at, &mut report.errors).await;
                }
            }
        }

        let elapsed = started.elapsed().as_secs_f64();
        metrics::histogram!("listing_sync_run_duration_seconds").record(elapsed);
        tracing::info!(
            total_listings = report.total_listings,
            errors = report.errors.len(),
            elapsed_secs = elapsed,
            "sync run finished"
        );

        Ok(report)
    }

    async fn run_pair<'a>(
        &self,
        job: &PairJob<'a>,
        catalog: &[CanonicalProduct],
        run_at: DateTime<Utc>,
    ) -> PairOutcome<'a> {
        let result = self.sync_pair(job, catalog, run_at).await;
        match &result {
            Ok(written) => {
                metrics::counter!("listing_sync_listings_persisted_total", "source" => job.source.slug.clone())
                    .increment(*written as u64);
            }
            Err(error) => {
                metrics::counter!("listing_sync_pair_errors_total", "source" => job.source.slug.clone()).increment(1);
                tracing::warn!(source = %job.source.slug, product = %job.product.name, error = %error, "pair failed");
            }
        }

        let result = result.map_err(|error| {
            let message = match error {
                AppError::Adapter { message, .. } => message,
                other => other.to_string(),
            };
            format!("{}/{}: {}", job.source.slug, job.product.name, message)
        });

        PairOutcome {
            source: job.source,
            result,
        }
    }

    async fn sync_pair(&self, job: &PairJob<'_>, catalog: &[CanonicalProduct], run_at: DateTime<Utc>) -> Result<usize> {
        let query = job.product.search_query();
        let raw = job.adapter.search(&query).await.map_err(|e| AppError::Adapter {
            slug: job.source.slug.clone(),
            message: e.to_string(),
        })?;

        // Search results often include neighbouring products; re-resolve each
        // title against the whole catalog and fall back to the queried one.
        let listings: Vec<ExternalListing> = raw
            .into_iter()
            .map(|raw| {
                let product = self.matcher.find_match(&raw.title, catalog).unwrap_or(job.product);
                ExternalListing::from_raw(raw, &product.id, &job.source.id, run_at)
            })
            .collect();

        let price_point = PriceHistory::lowest_in_stock(&listings, &job.product.id, &job.source.id, run_at);
        let batch = PairBatch { listings, price_point };
        let written = self.store.commit_pair(&batch, self.settings.write_policy).await?;

        tracing::debug!(
            source = %job.source.slug,
            product = %job.product.name,
            listings = written,
            "pair committed"
        );
        Ok(written)
    }

    async fn age_source(&self, source: &Source, run_at: DateTime<Utc>, errors: &mut Vec<String>) {
        match self
            .store
            .age_unseen_listings(&source.id, run_at, self.settings.stale_after_runs)
            .await
        {
            Ok(aged) if aged > 0 => tracing::debug!(source = %source.slug, aged, "aged unseen listings"),
            Ok(_) => {}
            Err(e) => errors.push(format!("{}: {}", source.slug, e)),
        }
    }
}
