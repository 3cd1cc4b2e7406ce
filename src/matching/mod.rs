//! Title clean-up and entity resolution against the product catalog.

pub mod aliases;
pub mod matcher;
pub mod normalizer;

pub use aliases::{AliasEntry, BrandAliases};
pub use matcher::{EntityMatcher, FieldWeights, ScoredMatch};
pub use normalizer::{TitleNormalizer, normalize};
