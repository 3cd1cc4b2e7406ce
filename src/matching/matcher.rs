use serde::{Deserialize, Serialize};
use strsim::normalized_levenshtein;

use crate::config::MatcherConfig;
use crate::matching::aliases::BrandAliases;
use crate::matching::normalizer::TitleNormalizer;
use crate::models::CanonicalProduct;

pub const DEFAULT_THRESHOLD: f64 = 0.4;
pub const DEFAULT_MIN_MATCH_LEN: usize = 3;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct FieldWeights {
    pub name: f64,
    pub brand: f64,
    pub tags: f64,
}

impl Default for FieldWeights {
    fn default() -> Self {
        Self {
            name: 0.6,
            brand: 0.2,
            tags: 0.2,
        }
    }
}

/// Best candidate for a title, with its distance score (0 = perfect).
#[derive(Debug, Clone, Copy)]
pub struct ScoredMatch<'a> {
    pub product: &'a CanonicalProduct,
    pub score: f64,
}

/// Resolves noisy listing titles to catalog products.
///
/// The alias table, threshold and weights are fixed at construction; build a
/// second matcher to try a different table.
pub struct EntityMatcher {
    normalizer: TitleNormalizer,
    aliases: BrandAliases,
    weights: FieldWeights,
    threshold: f64,
    min_match_len: usize,
}

impl EntityMatcher {
    pub fn new(aliases: BrandAliases, threshold: f64) -> Self {
        Self {
            normalizer: TitleNormalizer::new(),
            aliases,
            weights: FieldWeights::default(),
            threshold,
            min_match_len: DEFAULT_MIN_MATCH_LEN,
        }
    }

    pub fn from_config(config: &MatcherConfig) -> Self {
        let aliases = if config.aliases.is_empty() {
            BrandAliases::default()
        } else {
            BrandAliases::new(config.aliases.clone())
        };

        Self {
            normalizer: TitleNormalizer::new(),
            aliases,
            weights: config.weights,
            threshold: config.threshold,
            min_match_len: config.min_match_len,
        }
    }

    /// The catalog product this title most likely refers to, or `None` when
    /// no candidate scores within the threshold.
    pub fn find_match<'a>(&self, title: &str, catalog: &'a [CanonicalProduct]) -> Option<&'a CanonicalProduct> {
        self.best_candidate(title, catalog)
            .filter(|scored| scored.score <= self.threshold)
            .map(|scored| scored.product)
    }

    /// Lowest-scoring candidate regardless of the threshold. Ties keep the
    /// candidate that comes first in catalog order.
    pub fn best_candidate<'a>(&self, title: &str, catalog: &'a [CanonicalProduct]) -> Option<ScoredMatch<'a>> {
        if catalog.is_empty() {
            return None;
        }

        let normalized = self.normalizer.normalize(title).to_lowercase();
        if normalized.chars().count() < self.min_match_len {
            return None;
        }
        let title_tokens: Vec<&str> = normalized.split_whitespace().collect();

        let brand = self.aliases.resolve(title);
        let mut candidates: Vec<&CanonicalProduct> = match brand {
            Some(brand) => catalog.iter().filter(|p| same_brand(&p.brand, brand)).collect(),
            None => Vec::new(),
        };
        if candidates.is_empty() {
            candidates = catalog.iter().collect();
        }

        let mut best: Option<ScoredMatch<'a>> = None;
        for product in candidates {
            let score = self.score(&title_tokens, brand, product);
            tracing::trace!(product = %product.name, score, "scored candidate");
            match best {
                Some(current) if score >= current.score => {}
                _ => best = Some(ScoredMatch { product, score }),
            }
        }
        best
    }

    fn score(&self, title_tokens: &[&str], resolved_brand: Option<&str>, product: &CanonicalProduct) -> f64 {
        let name = field_distance(title_tokens, &product.name);

        // A resolved alias is stronger evidence than spelling similarity.
        let brand = match resolved_brand {
            Some(brand) if same_brand(&product.brand, brand) => 0.0,
            _ => field_distance(title_tokens, &product.brand),
        };

        let mut weighted = self.weights.name * name + self.weights.brand * brand;
        let mut total_weight = self.weights.name + self.weights.brand;

        if let Some(tags) = product.match_tags() {
            let tags = tags
                .iter()
                .map(|tag| field_distance(title_tokens, tag))
                .fold(1.0, f64::min);
            weighted += self.weights.tags * tags;
            total_weight += self.weights.tags;
        }

        if total_weight <= 0.0 {
            return 1.0;
        }
        (weighted / total_weight).clamp(0.0, 1.0)
    }
}

impl Default for EntityMatcher {
    fn default() -> Self {
        Self::new(BrandAliases::default(), DEFAULT_THRESHOLD)
    }
}

fn same_brand(a: &str, b: &str) -> bool {
    a.trim().to_lowercase() == b.trim().to_lowercase()
}

/// Lower-cases and replaces punctuation so catalog text compares on the same
/// footing as a normalized title.
fn fold(text: &str) -> String {
    let spaced: String = text
        .to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect();
    spaced.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// 1 minus the best similarity between `field` and any run of title tokens
/// as wide as the field (the whole title when it is shorter).
fn field_distance(title_tokens: &[&str], field: &str) -> f64 {
    let field = fold(field);
    let width = field.split_whitespace().count();
    if width == 0 || title_tokens.is_empty() {
        return 1.0;
    }

    let width = width.min(title_tokens.len());
    let best = title_tokens
        .windows(width)
        .map(|window| normalized_levenshtein(&window.join(" "), &field))
        .fold(0.0, f64::max);

    1.0 - best
}
