pub mod adapters;
pub mod registry;
pub mod traits;

pub use adapters::{AdapterSettings, HtmlListingAdapter, JsonApiAdapter};
pub use registry::AdapterRegistry;
pub use traits::{AdapterError, SourceAdapter};
