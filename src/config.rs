use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::env;
use validator::Validate;

use crate::matching::aliases::AliasEntry;
use crate::matching::matcher::{DEFAULT_MIN_MATCH_LEN, DEFAULT_THRESHOLD, FieldWeights};
use crate::plugins::adapters::AdapterSettings;
use crate::storage::WritePolicy;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    #[serde(default)]
    pub security: SecurityConfig,
    #[serde(default)]
    pub sync: SyncConfig,
    #[serde(default)]
    pub matcher: MatcherConfig,
    #[serde(default)]
    pub adapters: Vec<AdapterSettings>,
    pub metrics: MetricsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub request_timeout: u64,
    pub shutdown_timeout: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub acquire_timeout: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SecurityConfig {
    /// Shared secret required to trigger a run. Unset means the trigger is open.
    pub sync_token: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    pub max_concurrency: usize,
    pub deadline_secs: Option<u64>,
    pub write_policy: WritePolicy,
    pub stale_after_runs: u32,
    pub request_timeout: u64,
    pub user_agent: String,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            max_concurrency: 4,
            deadline_secs: None,
            write_policy: WritePolicy::Upsert,
            stale_after_runs: 3,
            request_timeout: 30,
            user_agent: "ListingSync/1.0".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatcherConfig {
    pub threshold: f64,
    pub min_match_len: usize,
    #[serde(default)]
    pub weights: FieldWeights,
    /// Ordered alias table; empty means the built-in table.
    #[serde(default)]
    pub aliases: Vec<AliasEntry>,
}

impl Default for MatcherConfig {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_THRESHOLD,
            min_match_len: DEFAULT_MIN_MATCH_LEN,
            weights: FieldWeights::default(),
            aliases: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    pub enabled: bool,
    pub port: u16,
    pub endpoint: String,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = Config::builder()
            // Start with default configuration
            .add_source(File::with_name("config/default"))
            // Add environment-specific config
            .add_source(File::with_name(&format!("config/{}", run_mode)).required(false))
            // Add local config (ignored by git)
            .add_source(File::with_name("config/local").required(false))
            // Add environment variables, e.g. LISTING_SYNC__SERVER__PORT
            .add_source(Environment::with_prefix("LISTING_SYNC").separator("__"))
            .build()?;

        let config: AppConfig = s.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.port == 0 {
            return Err(ConfigError::Message("Server port must be greater than 0".into()));
        }

        if self.database.max_connections == 0 {
            return Err(ConfigError::Message("Database max_connections must be greater than 0".into()));
        }

        if self.database.min_connections > self.database.max_connections {
            return Err(ConfigError::Message("Database min_connections cannot exceed max_connections".into()));
        }

        if let Some(token) = &self.security.sync_token {
            if token.trim().is_empty() {
                return Err(ConfigError::Message("Security sync_token must not be blank when set".into()));
            }
        }

        if self.sync.max_concurrency == 0 {
            return Err(ConfigError::Message("Sync max_concurrency must be greater than 0".into()));
        }

        if self.sync.deadline_secs == Some(0) {
            return Err(ConfigError::Message("Sync deadline_secs must be greater than 0 when set".into()));
        }

        if self.sync.stale_after_runs == 0 {
            return Err(ConfigError::Message("Sync stale_after_runs must be greater than 0".into()));
        }

        if !(0.0..=1.0).contains(&self.matcher.threshold) {
            return Err(ConfigError::Message("Matcher threshold must be between 0 and 1".into()));
        }

        let weights = self.matcher.weights;
        if weights.name < 0.0 || weights.brand < 0.0 || weights.tags < 0.0 {
            return Err(ConfigError::Message("Matcher weights must not be negative".into()));
        }
        if weights.name + weights.brand <= 0.0 {
            return Err(ConfigError::Message("Matcher name and brand weights cannot both be zero".into()));
        }

        self.validate_adapters()?;

        if self.metrics.port == 0 {
            return Err(ConfigError::Message("Metrics port must be greater than 0".into()));
        }

        if !self.metrics.endpoint.starts_with('/') {
            return Err(ConfigError::Message("Metrics endpoint must start with '/'".into()));
        }

        Ok(())
    }

    fn validate_adapters(&self) -> Result<(), ConfigError> {
        let mut seen = HashSet::new();
        for adapter in &self.adapters {
            adapter
                .validate()
                .map_err(|e| ConfigError::Message(format!("Adapter '{}' is invalid: {}", adapter.slug(), e)))?;

            if !adapter.search_url().contains("{query}") {
                return Err(ConfigError::Message(format!(
                    "Adapter '{}' search_url must contain a {{query}} placeholder",
                    adapter.slug()
                )));
            }

            if !seen.insert(adapter.slug().to_string()) {
                return Err(ConfigError::Message(format!("Duplicate adapter slug: {}", adapter.slug())));
            }
        }
        Ok(())
    }
}
