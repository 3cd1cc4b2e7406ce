use regex::Regex;
use std::sync::LazyLock;

/// Condition grades and their abbreviations. Longer phrases come first so the
/// alternation prefers "like new in box" over "like new".
const CONDITION_PHRASES: &[&str] = &[
    "like new in box",
    "brand new in box",
    "new in box",
    "near mint",
    "like new",
    "lnib",
    "bnib",
    "nib",
    "nwt",
    "nm",
    "vgc",
];

const SHIPPING_PHRASES: &[&str] = &[
    "same day shipping",
    "free shipping",
    "fast shipping",
    "fast & free",
    "free s&h",
    "free ship",
    "ships free",
    "ships today",
    "shipped",
    "obo",
];

static DEFAULT_NORMALIZER: LazyLock<TitleNormalizer> = LazyLock::new(TitleNormalizer::new);

/// Strips marketplace noise from a listing title using the default phrase sets.
pub fn normalize(title: &str) -> String {
    DEFAULT_NORMALIZER.normalize(title)
}

pub struct TitleNormalizer {
    condition_regex: Regex,
    shipping_regex: Regex,
}

impl TitleNormalizer {
    pub fn new() -> Self {
        Self {
            condition_regex: phrase_regex(CONDITION_PHRASES),
            shipping_regex: phrase_regex(SHIPPING_PHRASES),
        }
    }

    /// Repeats the cleaning pass until nothing changes, so the result is a
    /// fixed point and normalizing twice equals normalizing once.
    pub fn normalize(&self, title: &str) -> String {
        let mut current = self.pass(title);
        loop {
            let next = self.pass(&current);
            if next == current {
                return current;
            }
            current = next;
        }
    }

    fn pass(&self, title: &str) -> String {
        let stripped = self.condition_regex.replace_all(title, " ");
        let stripped = self.shipping_regex.replace_all(&stripped, " ");

        let kept: Vec<&str> = stripped
            .split_whitespace()
            .filter(|token| !is_grade(token))
            .collect();

        let cleaned: String = kept
            .join(" ")
            .chars()
            .map(|c| if c.is_alphanumeric() || c.is_whitespace() { c } else { ' ' })
            .collect();

        cleaned.split_whitespace().collect::<Vec<_>>().join(" ")
    }
}

impl Default for TitleNormalizer {
    fn default() -> Self {
        Self::new()
    }
}

fn phrase_regex(phrases: &[&str]) -> Regex {
    let alternation = phrases
        .iter()
        .map(|phrase| regex::escape(phrase).replace(' ', r"\s+"))
        .collect::<Vec<_>>()
        .join("|");
    // Built from constant phrase lists, so compilation cannot fail at runtime.
    Regex::new(&format!(r"(?i)\b(?:{})\b", alternation)).expect("static phrase regex")
}

/// Standalone letter grades such as "A", "B+" or "C". Upper-case only so the
/// article "a" survives.
fn is_grade(token: &str) -> bool {
    let mut chars = token.chars();
    match (chars.next(), chars.next(), chars.next()) {
        (Some(letter), None, None) => ('A'..='F').contains(&letter),
        (Some(letter), Some('+'), None) => ('A'..='F').contains(&letter),
        _ => false,
    }
}
