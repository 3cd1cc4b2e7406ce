use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use listing_sync::config::{DatabaseConfig, SyncConfig};
use listing_sync::models::SourceKind;
use listing_sync::plugins::adapters::{JsonApiAdapter, JsonApiSettings};
use listing_sync::storage::{ListingStore, SqliteStore, WritePolicy};

use super::*;

#[tokio::test]
async fn test_full_run_persists_listings_and_prices() {
    let store = create_test_store().await.unwrap();
    let catalog = seed_catalog(store.as_ref()).await.unwrap();
    let coordinator = create_coordinator(
        store.clone(),
        vec![Arc::new(market_adapter()), Arc::new(shop_adapter())],
        SyncConfig::default(),
    )
    .await
    .unwrap();

    let report = coordinator.run_all().await.unwrap();

    assert!(report.errors.is_empty());
    assert_eq!(report.per_class["api"].total_listings, 3);
    assert_eq!(report.per_class["scraped"].total_listings, 1);
    assert_eq!(report.per_class["scraped"].by_source["knife-shop"], 1);
    assert_eq!(report.total_listings(), 4);
    assert_eq!(store.count_listings().await.unwrap(), 4);

    let sebenza = store.listings_for_product(&catalog.sebenza.id).await.unwrap();
    assert_eq!(sebenza.len(), 3);

    // The out-of-stock 400.00 listing does not set the price.
    let history = store.price_history(&catalog.sebenza.id, &catalog.market.id).await.unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].price.to_string(), "450.00");

    // A pair with no listings records no price point.
    let none = store.price_history(&catalog.paramilitary.id, &catalog.shop.id).await.unwrap();
    assert!(none.is_empty());
}

#[tokio::test]
async fn test_source_without_adapter_is_reported_once() {
    let store = create_test_store().await.unwrap();
    seed_catalog(store.as_ref()).await.unwrap();
    store.insert_source(&source("auction-api", SourceKind::Api)).await.unwrap();

    let coordinator = create_coordinator(store.clone(), vec![Arc::new(market_adapter())], SyncConfig::default())
        .await
        .unwrap();

    let report = coordinator.run_class(SourceKind::Api).await.unwrap();

    assert_eq!(report.errors, vec!["no adapter for auction-api".to_string()]);
    assert_eq!(report.per_source.get("market-api"), Some(&3));
    assert!(!report.per_source.contains_key("auction-api"));
    assert_eq!(report.pairs_completed, 2);
}

#[tokio::test]
async fn test_unreachable_source_does_not_affect_others() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/search"))
        .and(query_param("q", "Spyderco Paramilitary 2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"id": "pm2-1", "title": "Spyderco Paramilitary 2 CPM S45VN", "price": "179.95", "url": "/items/pm2-1"}
        ])))
        .mount(&server)
        .await;

    let store = create_test_store().await.unwrap();
    let paramilitary = product("Spyderco", "Paramilitary 2", None);
    store.insert_product(&paramilitary).await.unwrap();
    store.insert_source(&source("market-api", SourceKind::Api)).await.unwrap();
    store.insert_source(&source("auction-api", SourceKind::Api)).await.unwrap();

    let client = reqwest::Client::new();
    let market = JsonApiAdapter::new(
        JsonApiSettings::new("market-api", &format!("{}/search?q={{query}}", server.uri())),
        client.clone(),
    );
    let auction = JsonApiAdapter::new(
        JsonApiSettings::new("auction-api", "http://127.0.0.1:1/search?q={query}"),
        client,
    );
    let coordinator = create_coordinator(
        store.clone(),
        vec![Arc::new(market), Arc::new(auction)],
        SyncConfig::default(),
    )
    .await
    .unwrap();

    let report = coordinator.run_class(SourceKind::Api).await.unwrap();

    assert_eq!(report.errors.len(), 1);
    assert!(report.errors[0].starts_with("auction-api/Paramilitary 2: request failed"));
    assert_eq!(report.per_source["market-api"], 1);
    assert_eq!(report.per_source["auction-api"], 0);
    assert_eq!(report.total_listings, 1);

    let listings = store.listings_for_product(&paramilitary.id).await.unwrap();
    assert_eq!(listings.len(), 1);
    assert_eq!(listings[0].url, format!("{}/items/pm2-1", server.uri()));
}

#[tokio::test]
async fn test_repeated_upsert_runs_refresh_in_place() {
    let store = create_test_store().await.unwrap();
    let catalog = seed_catalog(store.as_ref()).await.unwrap();
    let coordinator = create_coordinator(
        store.clone(),
        vec![Arc::new(market_adapter()), Arc::new(shop_adapter())],
        SyncConfig::default(),
    )
    .await
    .unwrap();

    let first = coordinator.run_all().await.unwrap();
    let before = store.listings_for_product(&catalog.sebenza.id).await.unwrap();

    tokio::time::sleep(Duration::from_millis(20)).await;
    let second = coordinator.run_all().await.unwrap();
    let after = store.listings_for_product(&catalog.sebenza.id).await.unwrap();

    assert_eq!(first.total_listings(), 4);
    assert_eq!(second.total_listings(), 4);
    assert_eq!(store.count_listings().await.unwrap(), 4);

    for listing in &after {
        let earlier = before
            .iter()
            .find(|l| l.external_id == listing.external_id)
            .expect("listing from first run");
        assert_eq!(listing.id, earlier.id);
        assert_eq!(listing.first_seen, earlier.first_seen);
        assert!(listing.last_seen > earlier.last_seen);
        assert!(!listing.is_stale);
    }

    // Price history is append-only under either policy.
    let history = store.price_history(&catalog.sebenza.id, &catalog.market.id).await.unwrap();
    assert_eq!(history.len(), 2);
}

#[tokio::test]
async fn test_repeated_append_runs_keep_every_observation() {
    let store = create_test_store().await.unwrap();
    seed_catalog(store.as_ref()).await.unwrap();
    let settings = SyncConfig {
        write_policy: WritePolicy::Append,
        ..SyncConfig::default()
    };
    let coordinator = create_coordinator(
        store.clone(),
        vec![Arc::new(market_adapter()), Arc::new(shop_adapter())],
        settings,
    )
    .await
    .unwrap();

    coordinator.run_all().await.unwrap();
    coordinator.run_all().await.unwrap();

    assert_eq!(store.count_listings().await.unwrap(), 8);
}

#[tokio::test]
async fn test_unseen_listings_go_stale() {
    let store = create_test_store().await.unwrap();
    let catalog = seed_catalog(store.as_ref()).await.unwrap();
    let market = Arc::new(market_adapter());
    let settings = SyncConfig {
        stale_after_runs: 1,
        ..SyncConfig::default()
    };
    let coordinator = create_coordinator(store.clone(), vec![market.clone() as Arc<dyn SourceAdapter>], settings)
        .await
        .unwrap();

    coordinator.run_class(SourceKind::Api).await.unwrap();
    market.set_results("Sebenza", vec![raw("m-1", "CRK Sebenza 31 LNIB free shipping", "445.00", true)]);
    tokio::time::sleep(Duration::from_millis(20)).await;
    coordinator.run_class(SourceKind::Api).await.unwrap();

    let listings = store.listings_for_product(&catalog.sebenza.id).await.unwrap();
    let kept = listings.iter().find(|l| l.external_id == "m-1").unwrap();
    let dropped = listings.iter().find(|l| l.external_id == "m-2").unwrap();

    assert!(!kept.is_stale);
    assert_eq!(kept.price.to_string(), "445.00");
    assert!(dropped.is_stale);
    assert_eq!(dropped.missed_runs, 1);
}

#[tokio::test]
async fn test_stale_listing_seen_again_is_refreshed() {
    let store = create_test_store().await.unwrap();
    let catalog = seed_catalog(store.as_ref()).await.unwrap();
    let market = Arc::new(market_adapter());
    let settings = SyncConfig {
        stale_after_runs: 1,
        ..SyncConfig::default()
    };
    let coordinator = create_coordinator(store.clone(), vec![market.clone() as Arc<dyn SourceAdapter>], settings)
        .await
        .unwrap();

    let both = vec![
        raw("m-1", "CRK Sebenza 31 LNIB free shipping", "450.00", true),
        raw("m-2", "Chris Reeve Sebenza 31 small", "400.00", false),
    ];
    coordinator.run_class(SourceKind::Api).await.unwrap();

    market.set_results("Sebenza", vec![both[0].clone()]);
    tokio::time::sleep(Duration::from_millis(20)).await;
    coordinator.run_class(SourceKind::Api).await.unwrap();

    let listings = store.listings_for_product(&catalog.sebenza.id).await.unwrap();
    let stale = listings.iter().find(|l| l.external_id == "m-2").unwrap();
    assert!(stale.is_stale);
    let first_seen = stale.first_seen;

    market.set_results("Sebenza", both);
    tokio::time::sleep(Duration::from_millis(20)).await;
    coordinator.run_class(SourceKind::Api).await.unwrap();

    let listings = store.listings_for_product(&catalog.sebenza.id).await.unwrap();
    let back = listings.iter().find(|l| l.external_id == "m-2").unwrap();
    assert!(!back.is_stale);
    assert_eq!(back.missed_runs, 0);
    assert_eq!(back.first_seen, first_seen);
    assert_eq!(store.count_listings().await.unwrap(), 3);
}

#[tokio::test]
async fn test_deadline_abandons_outstanding_pairs() {
    let store = create_test_store().await.unwrap();
    seed_catalog(store.as_ref()).await.unwrap();
    let slow = market_adapter().slow(Duration::from_secs(5));
    let settings = SyncConfig {
        max_concurrency: 1,
        deadline_secs: Some(1),
        ..SyncConfig::default()
    };
    let coordinator = create_coordinator(store.clone(), vec![Arc::new(slow)], settings)
        .await
        .unwrap();

    let report = coordinator.run_class(SourceKind::Api).await.unwrap();

    assert_eq!(report.pairs_completed, 0);
    assert_eq!(report.pairs_abandoned, 2);
    assert_eq!(report.errors, vec!["sync deadline of 1s exceeded; 2 pairs abandoned".to_string()]);
    assert_eq!(store.count_listings().await.unwrap(), 0);
}

#[tokio::test]
async fn test_failing_adapter_message_names_the_pair() {
    let store = create_test_store().await.unwrap();
    seed_catalog(store.as_ref()).await.unwrap();
    let broken = FakeAdapter::new("market-api").failing("rate limited");
    let coordinator = create_coordinator(store.clone(), vec![Arc::new(broken)], SyncConfig::default())
        .await
        .unwrap();

    let report = coordinator.run_class(SourceKind::Api).await.unwrap();

    let mut errors = report.errors.clone();
    errors.sort();
    assert_eq!(
        errors,
        vec![
            "market-api/Paramilitary 2: could not parse response: rate limited".to_string(),
            "market-api/Sebenza 31: could not parse response: rate limited".to_string(),
        ]
    );
    assert_eq!(report.total_listings, 0);
}

#[tokio::test]
async fn test_listings_survive_reopening_the_database() {
    let dir = tempfile::tempdir().unwrap();
    let config = DatabaseConfig {
        url: format!("sqlite://{}", dir.path().join("listings.db").display()),
        ..get_test_config().database
    };

    {
        let store = Arc::new(SqliteStore::connect(&config).await.unwrap());
        store.migrate().await.unwrap();
        seed_catalog(store.as_ref()).await.unwrap();
        let coordinator = create_coordinator(
            store.clone(),
            vec![Arc::new(market_adapter()), Arc::new(shop_adapter())],
            SyncConfig::default(),
        )
        .await
        .unwrap();
        coordinator.run_all().await.unwrap();
        store.pool().close().await;
    }

    let reopened = SqliteStore::connect(&config).await.unwrap();
    assert_eq!(reopened.count_listings().await.unwrap(), 4);
    assert_eq!(reopened.list_products().await.unwrap().len(), 2);
}
