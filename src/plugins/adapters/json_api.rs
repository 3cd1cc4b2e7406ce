use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::str::FromStr;
use url::Url;
use validator::Validate;

use super::{fetch, search_url};
use crate::models::RawListing;
use crate::plugins::traits::{AdapterError, SourceAdapter};

/// Key names of each listing field inside one result object.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct JsonFieldMap {
    pub external_id: String,
    pub title: String,
    pub price: String,
    pub currency: String,
    pub condition: String,
    pub in_stock: String,
    pub url: String,
    pub image_url: String,
    pub shipping_cost: String,
    pub shipping_estimate: String,
    pub seller_name: String,
    pub seller_location: String,
}

impl Default for JsonFieldMap {
    fn default() -> Self {
        Self {
            external_id: "id".to_string(),
            title: "title".to_string(),
            price: "price".to_string(),
            currency: "currency".to_string(),
            condition: "condition".to_string(),
            in_stock: "in_stock".to_string(),
            url: "url".to_string(),
            image_url: "image_url".to_string(),
            shipping_cost: "shipping_cost".to_string(),
            shipping_estimate: "shipping_estimate".to_string(),
            seller_name: "seller_name".to_string(),
            seller_location: "seller_location".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct JsonApiSettings {
    #[validate(length(min = 1))]
    pub slug: String,
    #[validate(url)]
    pub search_url: String,
    /// JSON pointer to the result array; empty means the body itself.
    #[serde(default)]
    pub results_pointer: String,
    #[serde(default)]
    pub fields: JsonFieldMap,
    #[serde(default = "default_currency")]
    pub default_currency: String,
}

fn default_currency() -> String {
    "USD".to_string()
}

impl JsonApiSettings {
    pub fn new(slug: &str, search_url: &str) -> Self {
        Self {
            slug: slug.to_string(),
            search_url: search_url.to_string(),
            results_pointer: String::new(),
            fields: JsonFieldMap::default(),
            default_currency: default_currency(),
        }
    }
}

/// Searches a JSON endpoint and maps each result object onto a listing.
pub struct JsonApiAdapter {
    settings: JsonApiSettings,
    client: reqwest::Client,
}

impl JsonApiAdapter {
    pub fn new(settings: JsonApiSettings, client: reqwest::Client) -> Self {
        Self { settings, client }
    }

    fn parse_body(&self, body: &Value, base: &Url) -> Result<Vec<RawListing>, AdapterError> {
        let results = if self.settings.results_pointer.is_empty() {
            body
        } else {
            body.pointer(&self.settings.results_pointer).ok_or_else(|| {
                AdapterError::Parse(format!("no value at {}", self.settings.results_pointer))
            })?
        };

        let items = results
            .as_array()
            .ok_or_else(|| AdapterError::Parse("results are not an array".to_string()))?;

        let mut listings = Vec::with_capacity(items.len());
        for (index, item) in items.iter().enumerate() {
            match self.parse_item(item, base) {
                Some(listing) => listings.push(listing),
                None => tracing::warn!(source = %self.settings.slug, index, "skipping malformed result"),
            }
        }
        Ok(listings)
    }

    fn parse_item(&self, item: &Value, base: &Url) -> Option<RawListing> {
        let fields = &self.settings.fields;

        let external_id = text_field(item, &fields.external_id)?;
        let title = text_field(item, &fields.title)?;
        let price = decimal_field(item, &fields.price)?;
        let url = base.join(&text_field(item, &fields.url)?).ok()?;

        let mut listing = RawListing::new(external_id, title, price, url.to_string());
        listing.currency = text_field(item, &fields.currency).unwrap_or_else(|| self.settings.default_currency.clone());
        if let Some(condition) = text_field(item, &fields.condition) {
            listing.condition = condition;
        }
        if let Some(in_stock) = item.get(&fields.in_stock).and_then(Value::as_bool) {
            listing.in_stock = in_stock;
        }
        listing.image_url = text_field(item, &fields.image_url);
        listing.shipping_cost = decimal_field(item, &fields.shipping_cost);
        listing.shipping_estimate = text_field(item, &fields.shipping_estimate);
        listing.seller_name = text_field(item, &fields.seller_name);
        listing.seller_location = text_field(item, &fields.seller_location);
        Some(listing)
    }
}

fn text_field(item: &Value, key: &str) -> Option<String> {
    match item.get(key)? {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn decimal_field(item: &Value, key: &str) -> Option<Decimal> {
    match item.get(key)? {
        Value::Number(n) => Decimal::from_str(&n.to_string()).ok(),
        Value::String(s) => super::parse_price(s),
        _ => None,
    }
}

#[async_trait]
impl SourceAdapter for JsonApiAdapter {
    fn slug(&self) -> &str {
        &self.settings.slug
    }

    async fn search(&self, query: &str) -> Result<Vec<RawListing>, AdapterError> {
        let url = search_url(&self.settings.search_url, query)?;
        let body: Value = fetch(&self.client, &url).await?.json().await?;
        self.parse_body(&body, &url)
    }
}
