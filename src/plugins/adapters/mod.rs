use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::sync::{Arc, LazyLock};
use url::Url;
use validator::{Validate, ValidationErrors};

use super::registry::SourceAdapterRef;
use super::traits::AdapterError;
use crate::utils::error::AppError;

pub mod html;
pub mod json_api;

pub use html::{HtmlListingAdapter, HtmlSettings};
pub use json_api::{JsonApiAdapter, JsonApiSettings, JsonFieldMap};

/// One `[[adapters]]` entry from configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AdapterSettings {
    JsonApi(JsonApiSettings),
    Html(HtmlSettings),
}

impl AdapterSettings {
    pub fn slug(&self) -> &str {
        match self {
            AdapterSettings::JsonApi(settings) => &settings.slug,
            AdapterSettings::Html(settings) => &settings.slug,
        }
    }

    pub fn search_url(&self) -> &str {
        match self {
            AdapterSettings::JsonApi(settings) => &settings.search_url,
            AdapterSettings::Html(settings) => &settings.search_url,
        }
    }
}

impl Validate for AdapterSettings {
    fn validate(&self) -> Result<(), ValidationErrors> {
        match self {
            AdapterSettings::JsonApi(settings) => settings.validate(),
            AdapterSettings::Html(settings) => settings.validate(),
        }
    }
}

pub fn build_adapter(settings: &AdapterSettings, client: reqwest::Client) -> Result<SourceAdapterRef, AppError> {
    let adapter: SourceAdapterRef = match settings {
        AdapterSettings::JsonApi(settings) => Arc::new(JsonApiAdapter::new(settings.clone(), client)),
        AdapterSettings::Html(settings) => Arc::new(HtmlListingAdapter::new(settings.clone(), client)?),
    };
    Ok(adapter)
}

/// Fills the `{query}` placeholder with the form-encoded query.
pub(crate) fn search_url(template: &str, query: &str) -> Result<Url, AdapterError> {
    let encoded: String = url::form_urlencoded::byte_serialize(query.as_bytes()).collect();
    Ok(Url::parse(&template.replace("{query}", &encoded))?)
}

pub(crate) async fn fetch(client: &reqwest::Client, url: &Url) -> Result<reqwest::Response, AdapterError> {
    let response = client.get(url.clone()).send().await?;
    let status = response.status();
    if !status.is_success() {
        return Err(AdapterError::Status {
            status: status.as_u16(),
            url: url.to_string(),
        });
    }
    Ok(response)
}

static PRICE_REGEX: LazyLock<regex::Regex> = LazyLock::new(|| {
    regex::Regex::new(r"(\d{1,3}(?:,\d{3})+(?:\.\d+)?|\d+(?:\.\d+)?)").expect("static price regex")
});

/// First number in a price string such as "$1,234.50" or "USD 99".
pub(crate) fn parse_price(text: &str) -> Option<Decimal> {
    let captures = PRICE_REGEX.captures(text)?;
    let digits = captures.get(1)?.as_str().replace(',', "");
    Decimal::from_str(&digits).ok()
}
