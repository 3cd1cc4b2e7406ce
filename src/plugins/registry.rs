use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

use super::adapters::{AdapterSettings, build_adapter};
use super::traits::SourceAdapter;
use crate::config::SyncConfig;
use crate::utils::error::AppError;

pub type SourceAdapterRef = Arc<dyn SourceAdapter>;

/// Slug → adapter lookup shared by every sync run.
#[derive(Clone, Default)]
pub struct AdapterRegistry {
    adapters: Arc<RwLock<HashMap<String, SourceAdapterRef>>>,
}

impl AdapterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds one adapter per configured entry, all sharing a single HTTP client.
    pub async fn from_settings(settings: &[AdapterSettings], sync: &SyncConfig) -> Result<Self, AppError> {
        let client = reqwest::Client::builder()
            .user_agent(sync.user_agent.clone())
            .timeout(Duration::from_secs(sync.request_timeout))
            .build()?;

        let registry = Self::new();
        for entry in settings {
            registry.register(build_adapter(entry, client.clone())?).await?;
        }
        Ok(registry)
    }

    /// Register an adapter under its own slug. A second adapter for the same
    /// slug is rejected.
    pub async fn register(&self, adapter: SourceAdapterRef) -> Result<(), AppError> {
        let slug = adapter.slug().to_string();
        let mut adapters = self.adapters.write().await;
        if adapters.contains_key(&slug) {
            return Err(AppError::Configuration(format!("adapter '{}' registered twice", slug)));
        }

        tracing::debug!(source = %slug, "registered source adapter");
        adapters.insert(slug, adapter);
        Ok(())
    }

    pub async fn get(&self, slug: &str) -> Option<SourceAdapterRef> {
        let adapters = self.adapters.read().await;
        adapters.get(slug).cloned()
    }

    pub async fn has_adapter(&self, slug: &str) -> bool {
        let adapters = self.adapters.read().await;
        adapters.contains_key(slug)
    }

    /// Registered slugs, sorted.
    pub async fn list_slugs(&self) -> Vec<String> {
        let adapters = self.adapters.read().await;
        let mut slugs: Vec<String> = adapters.keys().cloned().collect();
        slugs.sort();
        slugs
    }
}
