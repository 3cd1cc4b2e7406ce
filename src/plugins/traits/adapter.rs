use async_trait::async_trait;

use crate::models::RawListing;

/// Failures an adapter may report for a single search.
#[derive(Debug, thiserror::Error)]
pub enum AdapterError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("unexpected status {status} from {url}")]
    Status { status: u16, url: String },

    #[error("invalid search url: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("could not parse response: {0}")]
    Parse(String),
}

/// One retailer or marketplace that can be searched for listings.
///
/// Adapters are untrusted: the orchestrator isolates every call, so an
/// implementation may fail freely but should not panic.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SourceAdapter: Send + Sync {
    /// Matches `Source::slug` in the catalog.
    fn slug(&self) -> &str;

    async fn search(&self, query: &str) -> Result<Vec<RawListing>, AdapterError>;
}
