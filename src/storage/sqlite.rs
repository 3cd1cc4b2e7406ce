use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqliteConnection, SqlitePool, SqlitePoolOptions};
use std::str::FromStr;
use std::time::Duration;

use crate::config::DatabaseConfig;
use crate::models::{CanonicalProduct, ExternalListing, PriceHistory, Source};
use crate::storage::{ListingStore, PairBatch, WritePolicy};
use crate::utils::error::Result;

const LISTING_COLUMNS: &str = "id, product_id, source_id, external_id, title, price, currency, condition, \
     in_stock, url, image_url, shipping_cost, shipping_estimate, seller_name, seller_location, \
     listing_type, first_seen, last_seen, missed_runs, is_stale";

#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub async fn connect(config: &DatabaseConfig) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(&config.url)?
            .create_if_missing(true)
            .foreign_keys(true);

        let mut pool_options = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(Duration::from_secs(config.acquire_timeout));

        // Every connection to `:memory:` is its own database, so pin one.
        if config.url.contains(":memory:") {
            pool_options = pool_options
                .max_connections(1)
                .min_connections(1)
                .idle_timeout(None)
                .max_lifetime(None);
        }

        let pool = pool_options.connect_with(options).await?;
        Ok(Self { pool })
    }

    pub fn from_pool(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }
}

async fn insert_listing(conn: &mut SqliteConnection, listing: &ExternalListing) -> std::result::Result<(), sqlx::Error> {
    sqlx::query(&format!(
        "INSERT INTO external_listings ({}) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        LISTING_COLUMNS
    ))
    .bind(&listing.id)
    .bind(&listing.product_id)
    .bind(&listing.source_id)
    .bind(&listing.external_id)
    .bind(&listing.title)
    .bind(listing.price.to_string())
    .bind(&listing.currency)
    .bind(&listing.condition)
    .bind(listing.in_stock)
    .bind(&listing.url)
    .bind(&listing.image_url)
    .bind(listing.shipping_cost.map(|cost| cost.to_string()))
    .bind(&listing.shipping_estimate)
    .bind(&listing.seller_name)
    .bind(&listing.seller_location)
    .bind(listing.listing_type)
    .bind(listing.first_seen)
    .bind(listing.last_seen)
    .bind(listing.missed_runs)
    .bind(listing.is_stale)
    .execute(conn)
    .await?;
    Ok(())
}

/// Refreshes an existing observation; returns how many rows matched.
async fn refresh_listing(conn: &mut SqliteConnection, listing: &ExternalListing) -> std::result::Result<u64, sqlx::Error> {
    let result = sqlx::query(
        r#"
        UPDATE external_listings
        SET product_id = ?, title = ?, price = ?, currency = ?, condition = ?, in_stock = ?,
            url = ?, image_url = ?, shipping_cost = ?, shipping_estimate = ?, seller_name = ?,
            seller_location = ?, listing_type = ?, last_seen = ?, missed_runs = 0, is_stale = 0
        WHERE source_id = ? AND external_id = ?
        "#,
    )
    .bind(&listing.product_id)
    .bind(&listing.title)
    .bind(listing.price.to_string())
    .bind(&listing.currency)
    .bind(&listing.condition)
    .bind(listing.in_stock)
    .bind(&listing.url)
    .bind(&listing.image_url)
    .bind(listing.shipping_cost.map(|cost| cost.to_string()))
    .bind(&listing.shipping_estimate)
    .bind(&listing.seller_name)
    .bind(&listing.seller_location)
    .bind(listing.listing_type)
    .bind(listing.last_seen)
    .bind(&listing.source_id)
    .bind(&listing.external_id)
    .execute(conn)
    .await?;
    Ok(result.rows_affected())
}

async fn insert_price_point(conn: &mut SqliteConnection, point: &PriceHistory) -> std::result::Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO price_history (id, product_id, source_id, price, in_stock, recorded_at) VALUES (?, ?, ?, ?, ?, ?)",
    )
    .bind(&point.id)
    .bind(&point.product_id)
    .bind(&point.source_id)
    .bind(point.price.to_string())
    .bind(point.in_stock)
    .bind(point.recorded_at)
    .execute(conn)
    .await?;
    Ok(())
}

#[async_trait]
impl ListingStore for SqliteStore {
    async fn list_products(&self) -> Result<Vec<CanonicalProduct>> {
        let products = sqlx::query_as::<_, CanonicalProduct>(
            "SELECT id, brand, name, category, tags_json, msrp FROM products ORDER BY rowid",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(products)
    }

    async fn list_active_sources(&self) -> Result<Vec<Source>> {
        let sources = sqlx::query_as::<_, Source>(
            "SELECT id, slug, name, kind, is_active FROM sources WHERE is_active = 1 ORDER BY rowid",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(sources)
    }

    async fn commit_pair(&self, batch: &PairBatch, policy: WritePolicy) -> Result<usize> {
        // Dropping the transaction before commit rolls everything back.
        let mut tx = self.pool.begin().await?;
        let mut written = 0;

        for listing in &batch.listings {
            match policy {
                WritePolicy::Append => insert_listing(&mut tx, listing).await?,
                WritePolicy::Upsert => {
                    if refresh_listing(&mut tx, listing).await? == 0 {
                        insert_listing(&mut tx, listing).await?;
                    }
                }
            }
            written += 1;
        }

        if let Some(point) = &batch.price_point {
            insert_price_point(&mut tx, point).await?;
        }

        tx.commit().await?;
        Ok(written)
    }

    async fn age_unseen_listings(&self, source_id: &str, run_at: DateTime<Utc>, stale_after: u32) -> Result<u64> {
        let result = sqlx::query(
            r#"
            UPDATE external_listings
            SET missed_runs = missed_runs + 1,
                is_stale = CASE WHEN missed_runs + 1 >= ? THEN 1 ELSE is_stale END
            WHERE source_id = ? AND last_seen < ?
            "#,
        )
        .bind(i64::from(stale_after))
        .bind(source_id)
        .bind(run_at)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    async fn listings_for_product(&self, product_id: &str) -> Result<Vec<ExternalListing>> {
        let listings = sqlx::query_as::<_, ExternalListing>(&format!(
            "SELECT {} FROM external_listings WHERE product_id = ? ORDER BY rowid",
            LISTING_COLUMNS
        ))
        .bind(product_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(listings)
    }

    async fn price_history(&self, product_id: &str, source_id: &str) -> Result<Vec<PriceHistory>> {
        let history = sqlx::query_as::<_, PriceHistory>(
            r#"
            SELECT id, product_id, source_id, price, in_stock, recorded_at
            FROM price_history
            WHERE product_id = ? AND source_id = ?
            ORDER BY recorded_at, rowid
            "#,
        )
        .bind(product_id)
        .bind(source_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(history)
    }

    async fn count_listings(&self) -> Result<u64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM external_listings")
            .fetch_one(&self.pool)
            .await?;
        Ok(count.max(0) as u64)
    }

    async fn insert_product(&self, product: &CanonicalProduct) -> Result<()> {
        sqlx::query("INSERT INTO products (id, brand, name, category, tags_json, msrp) VALUES (?, ?, ?, ?, ?, ?)")
            .bind(&product.id)
            .bind(&product.brand)
            .bind(&product.name)
            .bind(&product.category)
            .bind(product.tags_json())
            .bind(product.msrp.map(|msrp| msrp.to_string()))
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn insert_source(&self, source: &Source) -> Result<()> {
        sqlx::query("INSERT INTO sources (id, slug, name, kind, is_active) VALUES (?, ?, ?, ?, ?)")
            .bind(&source.id)
            .bind(&source.slug)
            .bind(&source.name)
            .bind(source.kind)
            .bind(source.is_active)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
