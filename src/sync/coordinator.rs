use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

use super::orchestrator::{SyncOrchestrator, SyncReport};
use crate::config::AppConfig;
use crate::matching::EntityMatcher;
use crate::models::SourceKind;
use crate::plugins::AdapterRegistry;
use crate::storage::ListingStore;
use crate::utils::error::{AppError, Result};

/// Result payload of one source class.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ClassOutcome {
    /// False only when the class run itself failed; per-pair failures are
    /// listed in `errors` without clearing it.
    pub success: bool,
    pub total_listings: usize,
    pub by_source: BTreeMap<String, usize>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<String>,
}

impl ClassOutcome {
    pub fn failed(message: String) -> Self {
        Self {
            success: false,
            total_listings: 0,
            by_source: BTreeMap::new(),
            errors: vec![message],
        }
    }
}

impl From<SyncReport> for ClassOutcome {
    fn from(report: SyncReport) -> Self {
        Self {
            success: true,
            total_listings: report.total_listings,
            by_source: report.per_source,
            errors: report.errors,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CoordinatorReport {
    pub run_at: DateTime<Utc>,
    /// Keyed by class name (`api`, `scraped`).
    #[serde(flatten)]
    pub per_class: BTreeMap<String, ClassOutcome>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<String>,
}

impl CoordinatorReport {
    pub fn total_listings(&self) -> usize {
        self.per_class.values().map(|outcome| outcome.total_listings).sum()
    }
}

/// Runs every source class in turn, API sources first.
#[derive(Clone)]
pub struct SyncCoordinator {
    orchestrator: SyncOrchestrator,
}

impl SyncCoordinator {
    pub fn new(orchestrator: SyncOrchestrator) -> Self {
        Self { orchestrator }
    }

    /// Wires adapters and the matcher from configuration on top of `store`.
    pub async fn from_config(config: &AppConfig, store: Arc<dyn ListingStore>) -> Result<Self> {
        let adapters = AdapterRegistry::from_settings(&config.adapters, &config.sync).await?;
        let matcher = Arc::new(EntityMatcher::from_config(&config.matcher));
        Ok(Self::new(SyncOrchestrator::new(store, adapters, matcher, config.sync.clone())))
    }

    pub fn orchestrator(&self) -> &SyncOrchestrator {
        &self.orchestrator
    }

    /// Syncs the active sources of one class against the current catalog.
    /// Both are read fresh on every call.
    pub async fn run_class(&self, kind: SourceKind) -> Result<SyncReport> {
        let store = self.orchestrator.store();
        let products = store.list_products().await?;
        let sources: Vec<_> = store
            .list_active_sources()
            .await?
            .into_iter()
            .filter(|source| source.kind == kind)
            .collect();

        tracing::info!(class = %kind, sources = sources.len(), products = products.len(), "running source class");
        self.orchestrator.run_sync(&sources, &products).await
    }

    /// Fails only when nothing could run at all: an empty catalog or no active
    /// source in any class. Past that, a class that cannot run is recorded and
    /// the next class still runs.
    pub async fn run_all(&self) -> Result<CoordinatorReport> {
        let store = self.orchestrator.store();
        if store.list_products().await?.is_empty() {
            return Err(AppError::Configuration("product catalog is empty".to_string()));
        }
        if store.list_active_sources().await?.is_empty() {
            return Err(AppError::Configuration("no active sources to sync".to_string()));
        }

        let run_at = Utc::now();
        let mut per_class = BTreeMap::new();
        let mut errors = Vec::new();

        for kind in SourceKind::ALL {
            let outcome = match self.run_class(kind).await {
                Ok(report) => ClassOutcome::from(report),
                Err(e) => {
                    tracing::error!(class = %kind, error = %e, "source class failed");
                    let message = format!("{}: {}", kind, e);
                    errors.push(message.clone());
                    ClassOutcome::failed(message)
                }
            };
            per_class.insert(kind.as_str().to_string(), outcome);
        }

        Ok(CoordinatorReport {
            run_at,
            per_class,
            errors,
        })
    }
}
