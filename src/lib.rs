//! pricewatch: a price tracker for Lebanese e-commerce stores
//!
//! This crate scrapes product listings from configured stores (through a
//! discovered WooCommerce JSON API or by parsing category HTML), normalizes
//! prices for VAT, keeps the current price plus an append-only price history
//! in SQLite, and exports a CSV snapshot after every run.

pub mod config;
pub mod crawler;
pub mod output;
pub mod pricing;
pub mod reconcile;
pub mod storage;

use thiserror::Error;

/// Main error type for pricewatch operations
#[derive(Debug, Error)]
pub enum PriceWatchError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Storage error: {0}")]
    Storage(#[from] storage::StorageError),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),

    #[error("Unknown store: {0}")]
    UnknownStore(String),
}

/// Result type alias for pricewatch operations
pub type Result<T> = std::result::Result<T, PriceWatchError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

// Re-export commonly used types
pub use config::{Config, StoreConfig};
pub use pricing::{normalize_price, TaxedPrice};
pub use reconcile::{reconcile, ReconcileOutcome};
