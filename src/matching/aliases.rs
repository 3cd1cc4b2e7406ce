use serde::{Deserialize, Serialize};

/// One row of the alias table. `alias` is matched as a lower-case substring.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AliasEntry {
    pub alias: String,
    pub brand: String,
}

/// Default table. Order matters: the first alias found in a title wins.
const DEFAULT_ALIASES: &[(&str, &str)] = &[
    ("crk", "Chris Reeve Knives"),
    ("chris reeve", "Chris Reeve Knives"),
    ("zt", "Zero Tolerance"),
    ("zero tolerance", "Zero Tolerance"),
    ("bm", "Benchmade"),
    ("benchmade", "Benchmade"),
    ("spydie", "Spyderco"),
    ("spyderco", "Spyderco"),
    ("hinderer", "Rick Hinderer Knives"),
    ("rhk", "Rick Hinderer Knives"),
    ("microtech", "Microtech"),
    ("we knife", "WE Knife Co"),
    ("civivi", "Civivi"),
];

/// Ordered alias → canonical brand table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrandAliases {
    entries: Vec<AliasEntry>,
}

impl BrandAliases {
    /// Aliases are lower-cased on the way in; insertion order is kept.
    pub fn new(entries: impl IntoIterator<Item = AliasEntry>) -> Self {
        let entries = entries
            .into_iter()
            .filter(|entry| !entry.alias.trim().is_empty())
            .map(|entry| AliasEntry {
                alias: entry.alias.to_lowercase(),
                brand: entry.brand,
            })
            .collect();
        Self { entries }
    }

    pub fn from_pairs(pairs: &[(&str, &str)]) -> Self {
        Self::new(pairs.iter().map(|(alias, brand)| AliasEntry {
            alias: alias.to_string(),
            brand: brand.to_string(),
        }))
    }

    /// Canonical brand of the first alias (in table order) contained in the
    /// lower-cased title.
    pub fn resolve(&self, title: &str) -> Option<&str> {
        let lower = title.to_lowercase();
        self.entries
            .iter()
            .find(|entry| lower.contains(&entry.alias))
            .map(|entry| entry.brand.as_str())
    }

    pub fn entries(&self) -> &[AliasEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for BrandAliases {
    fn default() -> Self {
        Self::from_pairs(DEFAULT_ALIASES)
    }
}
