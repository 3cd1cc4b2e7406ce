pub mod config;
pub mod matching;
pub mod models;
pub mod plugins;
pub mod storage;
pub mod sync;
pub mod utils;
pub mod web;

// Re-export commonly used types
pub use config::AppConfig;
pub use utils::error::AppError;

pub type Result<T> = std::result::Result<T, AppError>;
