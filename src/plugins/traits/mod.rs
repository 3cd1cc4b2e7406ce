pub mod adapter;

pub use adapter::{AdapterError, SourceAdapter};

#[cfg(test)]
pub use adapter::MockSourceAdapter;
