use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::sqlite::SqliteRow;
use sqlx::{FromRow, Row};
use std::str::FromStr;

use crate::models::{ExternalListing, generate_id};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PriceHistory {
    pub id: String,
    pub product_id: String,
    pub source_id: String,
    pub price: Decimal,
    pub in_stock: bool,
    pub recorded_at: DateTime<Utc>,
}

impl PriceHistory {
    pub fn new(product_id: &str, source_id: &str, price: Decimal, recorded_at: DateTime<Utc>) -> Self {
        Self {
            id: generate_id(),
            product_id: product_id.to_string(),
            source_id: source_id.to_string(),
            price,
            in_stock: true,
            recorded_at,
        }
    }

    /// Lowest in-stock price among every listing a (product, source) pair
    /// produced, whichever product each one resolved to. Returns `None` when
    /// nothing was in stock.
    pub fn lowest_in_stock(
        listings: &[ExternalListing],
        product_id: &str,
        source_id: &str,
        recorded_at: DateTime<Utc>,
    ) -> Option<Self> {
        listings
            .iter()
            .filter(|l| l.in_stock)
            .map(|l| l.price)
            .min()
            .map(|price| Self::new(product_id, source_id, price, recorded_at))
    }
}

impl<'r> FromRow<'r, SqliteRow> for PriceHistory {
    fn from_row(row: &'r SqliteRow) -> Result<Self, sqlx::Error> {
        let price: String = row.try_get("price")?;
        Ok(Self {
            id: row.try_get("id")?,
            product_id: row.try_get("product_id")?,
            source_id: row.try_get("source_id")?,
            price: Decimal::from_str(&price).map_err(|e| sqlx::Error::ColumnDecode {
                index: "price".to_string(),
                source: Box::new(e),
            })?,
            in_stock: row.try_get("in_stock")?,
            recorded_at: row.try_get("recorded_at")?,
        })
    }
}
