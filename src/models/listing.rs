use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::sqlite::SqliteRow;
use sqlx::{FromRow, Row};
use std::str::FromStr;

use crate::models::{ListingType, generate_id};

/// Unvalidated listing as returned by a source adapter.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RawListing {
    pub external_id: String,
    pub title: String,
    pub price: Decimal,
    pub currency: String,
    pub condition: String,
    pub in_stock: bool,
    pub url: String,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub shipping_cost: Option<Decimal>,
    #[serde(default)]
    pub shipping_estimate: Option<String>,
    #[serde(default)]
    pub seller_name: Option<String>,
    #[serde(default)]
    pub seller_location: Option<String>,
}

impl RawListing {
    /// Minimal in-stock "new" listing; adapters fill in the optional fields.
    pub fn new(
        external_id: impl Into<String>,
        title: impl Into<String>,
        price: Decimal,
        url: impl Into<String>,
    ) -> Self {
        Self {
            external_id: external_id.into(),
            title: title.into(),
            price,
            currency: "USD".to_string(),
            condition: "new".to_string(),
            in_stock: true,
            url: url.into(),
            image_url: None,
            shipping_cost: None,
            shipping_estimate: None,
            seller_name: None,
            seller_location: None,
        }
    }

    pub fn with_in_stock(mut self, in_stock: bool) -> Self {
        self.in_stock = in_stock;
        self
    }
}

/// A listing after entity resolution, as stored.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExternalListing {
    pub id: String,
    pub product_id: String,
    pub source_id: String,
    pub external_id: String,
    pub title: String,
    pub price: Decimal,
    pub currency: String,
    pub condition: String,
    pub in_stock: bool,
    pub url: String,
    pub image_url: Option<String>,
    pub shipping_cost: Option<Decimal>,
    pub shipping_estimate: Option<String>,
    pub seller_name: Option<String>,
    pub seller_location: Option<String>,
    pub listing_type: ListingType,
    pub first_seen: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
    pub missed_runs: i64,
    pub is_stale: bool,
}

impl ExternalListing {
    pub fn from_raw(
        raw: RawListing,
        product_id: &str,
        source_id: &str,
        seen_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: generate_id(),
            product_id: product_id.to_string(),
            source_id: source_id.to_string(),
            external_id: raw.external_id,
            title: raw.title,
            price: raw.price,
            currency: raw.currency,
            condition: raw.condition,
            in_stock: raw.in_stock,
            url: raw.url,
            image_url: raw.image_url,
            shipping_cost: raw.shipping_cost,
            shipping_estimate: raw.shipping_estimate,
            seller_name: raw.seller_name,
            seller_location: raw.seller_location,
            listing_type: ListingType::BuyNow,
            first_seen: seen_at,
            last_seen: seen_at,
            missed_runs: 0,
            is_stale: false,
        }
    }
}

fn decode_decimal(column: &str, text: &str) -> Result<Decimal, sqlx::Error> {
    Decimal::from_str(text).map_err(|e| sqlx::Error::ColumnDecode {
        index: column.to_string(),
        source: Box::new(e),
    })
}

impl<'r> FromRow<'r, SqliteRow> for ExternalListing {
    fn from_row(row: &'r SqliteRow) -> Result<Self, sqlx::Error> {
        let price: String = row.try_get("price")?;
        let shipping_cost: Option<String> = row.try_get("shipping_cost")?;

        Ok(Self {
            id: row.try_get("id")?,
            product_id: row.try_get("product_id")?,
            source_id: row.try_get("source_id")?,
            external_id: row.try_get("external_id")?,
            title: row.try_get("title")?,
            price: decode_decimal("price", &price)?,
            currency: row.try_get("currency")?,
            condition: row.try_get("condition")?,
            in_stock: row.try_get("in_stock")?,
            url: row.try_get("url")?,
            image_url: row.try_get("image_url")?,
            shipping_cost: shipping_cost
                .as_deref()
                .map(|text| decode_decimal("shipping_cost", text))
                .transpose()?,
            shipping_estimate: row.try_get("shipping_estimate")?,
            seller_name: row.try_get("seller_name")?,
            seller_location: row.try_get("seller_location")?,
            listing_type: row.try_get("listing_type")?,
            first_seen: row.try_get("first_seen")?,
            last_seen: row.try_get("last_seen")?,
            missed_runs: row.try_get("missed_runs")?,
            is_stale: row.try_get("is_stale")?,
        })
    }
}
