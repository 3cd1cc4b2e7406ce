use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::sqlite::SqliteRow;
use sqlx::{FromRow, Row};
use std::str::FromStr;

use crate::models::generate_id;

/// Authoritative catalog entry that listings are resolved against.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CanonicalProduct {
    pub id: String,
    pub brand: String,
    pub name: String,
    pub category: String,

    // `None` means the catalog has no tags for this product, which is not the
    // same thing as an empty tag list scoring zero.
    pub tags: Option<Vec<String>>,
    pub msrp: Option<Decimal>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewProduct {
    pub brand: String,
    pub name: String,
    pub category: String,
    pub tags: Option<Vec<String>>,
    pub msrp: Option<Decimal>,
}

impl CanonicalProduct {
    pub fn new(new_product: NewProduct) -> Self {
        Self {
            id: generate_id(),
            brand: new_product.brand,
            name: new_product.name,
            category: new_product.category,
            tags: new_product.tags,
            msrp: new_product.msrp,
        }
    }

    /// Tags that can take part in matching; an empty list counts as absent.
    pub fn match_tags(&self) -> Option<&[String]> {
        self.tags.as_deref().filter(|tags| !tags.is_empty())
    }

    /// Search query sent to adapters: brand followed by the name with any
    /// repeated brand text removed.
    pub fn search_query(&self) -> String {
        let brand = self.brand.trim();
        let name = strip_case_insensitive(&self.name, brand);
        let query = format!("{} {}", brand, name);
        query.split_whitespace().collect::<Vec<_>>().join(" ")
    }

    pub fn tags_json(&self) -> Option<String> {
        self.tags
            .as_ref()
            .and_then(|tags| serde_json::to_string(tags).ok())
    }
}

fn strip_case_insensitive(haystack: &str, needle: &str) -> String {
    if needle.is_empty() {
        return haystack.to_string();
    }
    let lower = haystack.to_lowercase();
    let needle_lower = needle.to_lowercase();
    // Lower-casing can change byte offsets for non-ASCII text; leave it alone then.
    if lower.len() != haystack.len() {
        return haystack.to_string();
    }

    let mut out = String::with_capacity(haystack.len());
    let mut cursor = 0;
    while let Some(pos) = lower[cursor..].find(&needle_lower) {
        let start = cursor + pos;
        out.push_str(&haystack[cursor..start]);
        out.push(' ');
        cursor = start + needle_lower.len();
    }
    out.push_str(&haystack[cursor..]);
    out
}

impl<'r> FromRow<'r, SqliteRow> for CanonicalProduct {
    fn from_row(row: &'r SqliteRow) -> Result<Self, sqlx::Error> {
        let tags_json: Option<String> = row.try_get("tags_json")?;
        let tags = match tags_json {
            Some(json) => Some(serde_json::from_str::<Vec<String>>(&json).map_err(|e| {
                sqlx::Error::ColumnDecode {
                    index: "tags_json".to_string(),
                    source: Box::new(e),
                }
            })?),
            None => None,
        };

        let msrp_text: Option<String> = row.try_get("msrp")?;
        let msrp = match msrp_text {
            Some(text) => Some(Decimal::from_str(&text).map_err(|e| sqlx::Error::ColumnDecode {
                index: "msrp".to_string(),
                source: Box::new(e),
            })?),
            None => None,
        };

        Ok(Self {
            id: row.try_get("id")?,
            brand: row.try_get("brand")?,
            name: row.try_get("name")?,
            category: row.try_get("category")?,
            tags,
            msrp,
        })
    }
}
