use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::models::{SourceKind, generate_id};

/// An external retailer or marketplace that listings are pulled from.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq)]
pub struct Source {
    pub id: String,
    pub slug: String,
    pub name: String,
    pub kind: SourceKind,
    pub is_active: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewSource {
    pub slug: String,
    pub name: String,
    pub kind: SourceKind,
    pub is_active: Option<bool>,
}

impl Source {
    pub fn new(new_source: NewSource) -> Self {
        Self {
            id: generate_id(),
            slug: new_source.slug,
            name: new_source.name,
            kind: new_source.kind,
            is_active: new_source.is_active.unwrap_or(true),
        }
    }
}
