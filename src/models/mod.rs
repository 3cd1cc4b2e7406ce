use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub mod listing;
pub mod price_history;
pub mod product;
pub mod source;

// Re-exports for convenience
pub use listing::*;
pub use price_history::*;
pub use product::*;
pub use source::*;

// Common enums used across models
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "TEXT")]
pub enum SourceKind {
    #[sqlx(rename = "api")]
    Api,
    #[sqlx(rename = "scraped")]
    Scraped,
}

impl SourceKind {
    /// Coordinator order: API sources first, then scraped ones.
    pub const ALL: [SourceKind; 2] = [SourceKind::Api, SourceKind::Scraped];

    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::Api => "api",
            SourceKind::Scraped => "scraped",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_lowercase().as_str() {
            "api" => Some(SourceKind::Api),
            "scraped" | "scraper" => Some(SourceKind::Scraped),
            _ => None,
        }
    }
}

impl std::fmt::Display for SourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "TEXT")]
pub enum ListingType {
    #[sqlx(rename = "buy_now")]
    BuyNow,
}

impl ListingType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ListingType::BuyNow => "buy_now",
        }
    }
}

// Helper function to generate UUIDs in the format expected by the database
pub fn generate_id() -> String {
    Uuid::new_v4().simple().to_string()
}
