// Integration tests for listing-sync
// These tests drive the sync pipeline and HTTP trigger end to end against
// in-memory SQLite and scripted adapters.

pub mod sync_tests;

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{Method, Request, StatusCode},
    Router,
};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tower::ServiceExt;

use listing_sync::{
    config::{DatabaseConfig, MatcherConfig, MetricsConfig, SecurityConfig, ServerConfig, SyncConfig},
    matching::EntityMatcher,
    models::{CanonicalProduct, NewProduct, NewSource, RawListing, Source, SourceKind},
    plugins::{AdapterError, AdapterRegistry, SourceAdapter},
    storage::{ListingStore, SqliteStore},
    sync::{SyncCoordinator, SyncOrchestrator},
    web::{create_router, AppState},
    AppConfig,
};

/// Test configuration for integration tests
pub fn get_test_config() -> AppConfig {
    AppConfig {
        server: ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 3000,
            request_timeout: 30,
            shutdown_timeout: 5,
        },
        database: DatabaseConfig {
            url: "sqlite::memory:".to_string(),
            max_connections: 1,
            min_connections: 1,
            acquire_timeout: 10,
        },
        security: SecurityConfig::default(),
        sync: SyncConfig::default(),
        matcher: MatcherConfig::default(),
        adapters: Vec::new(),
        metrics: MetricsConfig {
            enabled: false,
            port: 9001,
            endpoint: "/metrics".to_string(),
        },
    }
}

/// Create a migrated in-memory store
pub async fn create_test_store() -> anyhow::Result<Arc<SqliteStore>> {
    let store = SqliteStore::connect(&get_test_config().database).await?;
    store.migrate().await?;
    Ok(Arc::new(store))
}

pub struct Catalog {
    pub sebenza: CanonicalProduct,
    pub paramilitary: CanonicalProduct,
    pub market: Source,
    pub shop: Source,
}

pub fn product(brand: &str, name: &str, tags: Option<Vec<&str>>) -> CanonicalProduct {
    CanonicalProduct::new(NewProduct {
        brand: brand.to_string(),
        name: name.to_string(),
        category: "folder".to_string(),
        tags: tags.map(|tags| tags.into_iter().map(String::from).collect()),
        msrp: None,
    })
}

pub fn source(slug: &str, kind: SourceKind) -> Source {
    Source::new(NewSource {
        slug: slug.to_string(),
        name: slug.to_string(),
        kind,
        is_active: Some(true),
    })
}

/// Two products, one API source (`market-api`) and one scraped source (`knife-shop`).
pub async fn seed_catalog(store: &dyn ListingStore) -> anyhow::Result<Catalog> {
    let catalog = Catalog {
        sebenza: product("Chris Reeve Knives", "Sebenza 31", Some(vec!["titanium"])),
        paramilitary: product("Spyderco", "Paramilitary 2", None),
        market: source("market-api", SourceKind::Api),
        shop: source("knife-shop", SourceKind::Scraped),
    };

    store.insert_product(&catalog.sebenza).await?;
    store.insert_product(&catalog.paramilitary).await?;
    store.insert_source(&catalog.market).await?;
    store.insert_source(&catalog.shop).await?;
    Ok(catalog)
}

pub fn raw(external_id: &str, title: &str, price: &str, in_stock: bool) -> RawListing {
    RawListing::new(
        external_id,
        title,
        price.parse().expect("test price"),
        format!("https://example.com/{}", external_id),
    )
    .with_in_stock(in_stock)
}

/// Scripted adapter: returns the listings of the first rule whose fragment
/// appears in the query.
pub struct FakeAdapter {
    slug: String,
    rules: Mutex<Vec<(String, Vec<RawListing>)>>,
    failure: Option<String>,
    delay: Option<Duration>,
}

impl FakeAdapter {
    pub fn new(slug: &str) -> Self {
        Self {
            slug: slug.to_string(),
            rules: Mutex::new(Vec::new()),
            failure: None,
            delay: None,
        }
    }

    pub fn with_results(self, fragment: &str, listings: Vec<RawListing>) -> Self {
        self.set_results(fragment, listings);
        self
    }

    pub fn failing(mut self, message: &str) -> Self {
        self.failure = Some(message.to_string());
        self
    }

    pub fn slow(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Replaces the rule for `fragment`, keeping rule order.
    pub fn set_results(&self, fragment: &str, listings: Vec<RawListing>) {
        let mut rules = self.rules.lock().expect("rules lock");
        match rules.iter_mut().find(|(f, _)| f == fragment) {
            Some(rule) => rule.1 = listings,
            None => rules.push((fragment.to_string(), listings)),
        }
    }
}

#[async_trait]
impl SourceAdapter for FakeAdapter {
    fn slug(&self) -> &str {
        &self.slug
    }

    async fn search(&self, query: &str) -> Result<Vec<RawListing>, AdapterError> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(message) = &self.failure {
            return Err(AdapterError::Parse(message.clone()));
        }

        let rules = self.rules.lock().expect("rules lock");
        Ok(rules
            .iter()
            .find(|(fragment, _)| query.contains(fragment.as_str()))
            .map(|(_, listings)| listings.clone())
            .unwrap_or_default())
    }
}

/// Listings both test sources return for the seeded catalog: three from the
/// API source and one from the shop.
pub fn market_adapter() -> FakeAdapter {
    FakeAdapter::new("market-api")
        .with_results(
            "Sebenza",
            vec![
                raw("m-1", "CRK Sebenza 31 LNIB free shipping", "450.00", true),
                raw("m-2", "Chris Reeve Sebenza 31 small", "400.00", false),
            ],
        )
        .with_results("Paramilitary", vec![raw("m-3", "Spyderco Paramilitary 2 S45VN", "189.95", true)])
}

pub fn shop_adapter() -> FakeAdapter {
    FakeAdapter::new("knife-shop").with_results("Sebenza", vec![raw("s-1", "Sebenza 31 Large", "465.00", true)])
}

pub async fn create_coordinator(
    store: Arc<dyn ListingStore>,
    adapters: Vec<Arc<dyn SourceAdapter>>,
    sync: SyncConfig,
) -> anyhow::Result<SyncCoordinator> {
    let registry = AdapterRegistry::new();
    for adapter in adapters {
        registry.register(adapter).await?;
    }
    let orchestrator = SyncOrchestrator::new(store, registry, Arc::new(EntityMatcher::default()), sync);
    Ok(SyncCoordinator::new(orchestrator))
}

/// Create test app state over a seeded store with both scripted adapters
pub async fn create_test_app_state(sync_token: Option<&str>) -> anyhow::Result<(AppState, Arc<SqliteStore>)> {
    let mut config = get_test_config();
    config.security.sync_token = sync_token.map(String::from);

    let store = create_test_store().await?;
    seed_catalog(store.as_ref()).await?;

    let coordinator = create_coordinator(
        store.clone(),
        vec![
            Arc::new(market_adapter()) as Arc<dyn SourceAdapter>,
            Arc::new(shop_adapter()) as Arc<dyn SourceAdapter>,
        ],
        config.sync.clone(),
    )
    .await?;

    let state = AppState {
        coordinator: Arc::new(coordinator),
        config,
    };
    Ok((state, store))
}

/// Helper to make HTTP requests to the test app; returns the status and JSON body
pub async fn make_request(
    app: &Router,
    method: Method,
    uri: &str,
    headers: &[(&str, &str)],
) -> anyhow::Result<(StatusCode, serde_json::Value)> {
    let mut request = Request::builder().method(method).uri(uri);
    for (name, value) in headers {
        request = request.header(*name, *value);
    }

    let response = app.clone().oneshot(request.body(Body::empty())?).await?;
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await?;
    let body = if bytes.is_empty() {
        serde_json::Value::Null
    } else {
        serde_json::from_slice(&bytes)?
    };
    Ok((status, body))
}

pub fn router(state: AppState) -> Router {
    create_router(state)
}
