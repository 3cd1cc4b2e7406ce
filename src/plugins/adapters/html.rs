use async_trait::async_trait;
use scraper::{ElementRef, Html, Selector};
use serde::{Deserialize, Serialize};
use url::Url;
use validator::Validate;

use super::{fetch, parse_price, search_url};
use crate::models::RawListing;
use crate::plugins::traits::{AdapterError, SourceAdapter};
use crate::utils::error::AppError;

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct HtmlSettings {
    #[validate(length(min = 1))]
    pub slug: String,
    #[validate(url)]
    pub search_url: String,
    #[serde(default = "default_item_selector")]
    pub item_selector: String,
    #[serde(default = "default_title_selector")]
    pub title_selector: String,
    #[serde(default = "default_price_selector")]
    pub price_selector: String,
    #[serde(default = "default_link_selector")]
    pub link_selector: String,
    #[serde(default)]
    pub image_selector: Option<String>,
    /// Present inside an item when it cannot be bought right now.
    #[serde(default)]
    pub out_of_stock_selector: Option<String>,
    #[serde(default = "default_currency")]
    pub currency: String,
}

fn default_item_selector() -> String {
    ".product".to_string()
}

fn default_title_selector() -> String {
    ".title".to_string()
}

fn default_price_selector() -> String {
    ".price".to_string()
}

fn default_link_selector() -> String {
    "a".to_string()
}

fn default_currency() -> String {
    "USD".to_string()
}

impl HtmlSettings {
    pub fn new(slug: &str, search_url: &str) -> Self {
        Self {
            slug: slug.to_string(),
            search_url: search_url.to_string(),
            item_selector: default_item_selector(),
            title_selector: default_title_selector(),
            price_selector: default_price_selector(),
            link_selector: default_link_selector(),
            image_selector: None,
            out_of_stock_selector: None,
            currency: default_currency(),
        }
    }
}

struct Selectors {
    item: Selector,
    title: Selector,
    price: Selector,
    link: Selector,
    image: Option<Selector>,
    out_of_stock: Option<Selector>,
}

fn compile(slug: &str, css: &str) -> Result<Selector, AppError> {
    Selector::parse(css)
        .map_err(|e| AppError::Configuration(format!("adapter '{}' has invalid selector '{}': {}", slug, css, e)))
}

/// Scrapes a search results page with CSS selectors.
pub struct HtmlListingAdapter {
    settings: HtmlSettings,
    selectors: Selectors,
    client: reqwest::Client,
}

impl HtmlListingAdapter {
    pub fn new(settings: HtmlSettings, client: reqwest::Client) -> Result<Self, AppError> {
        let slug = settings.slug.as_str();
        let selectors = Selectors {
            item: compile(slug, &settings.item_selector)?,
            title: compile(slug, &settings.title_selector)?,
            price: compile(slug, &settings.price_selector)?,
            link: compile(slug, &settings.link_selector)?,
            image: settings.image_selector.as_deref().map(|css| compile(slug, css)).transpose()?,
            out_of_stock: settings.out_of_stock_selector.as_deref().map(|css| compile(slug, css)).transpose()?,
        };

        Ok(Self {
            settings,
            selectors,
            client,
        })
    }

    fn parse_page(&self, body: &str, base: &Url) -> Vec<RawListing> {
        let document = Html::parse_document(body);
        let mut listings = Vec::new();

        for (index, item) in document.select(&self.selectors.item).enumerate() {
            match self.parse_item(item, base) {
                Some(listing) => listings.push(listing),
                None => tracing::debug!(source = %self.settings.slug, index, "skipping item without title, price or link"),
            }
        }
        listings
    }

    fn parse_item(&self, item: ElementRef<'_>, base: &Url) -> Option<RawListing> {
        let title = element_text(item.select(&self.selectors.title).next()?);
        if title.is_empty() {
            return None;
        }
        let price = parse_price(&element_text(item.select(&self.selectors.price).next()?))?;

        let href = item.select(&self.selectors.link).next()?.value().attr("href")?;
        let url = base.join(href).ok()?;

        // The absolute product URL is the only stable identifier a page offers.
        let mut listing = RawListing::new(url.as_str(), title, price, url.as_str());
        listing.currency = self.settings.currency.clone();

        if let Some(selector) = &self.selectors.out_of_stock {
            listing.in_stock = item.select(selector).next().is_none();
        }
        listing.image_url = self
            .selectors
            .image
            .as_ref()
            .and_then(|selector| item.select(selector).next())
            .and_then(|img| img.value().attr("src"))
            .and_then(|src| base.join(src).ok())
            .map(String::from);

        Some(listing)
    }
}

fn element_text(element: ElementRef<'_>) -> String {
    element.text().collect::<Vec<_>>().join(" ").split_whitespace().collect::<Vec<_>>().join(" ")
}

#[async_trait]
impl SourceAdapter for HtmlListingAdapter {
    fn slug(&self) -> &str {
        &self.settings.slug
    }

    async fn search(&self, query: &str) -> Result<Vec<RawListing>, AdapterError> {
        let url = search_url(&self.settings.search_url, query)?;
        let body = fetch(&self.client, &url).await?.text().await?;
        Ok(self.parse_page(&body, &url))
    }
}
