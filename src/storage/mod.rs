//! Storage module for persisting scraped products
//!
//! This module handles all database operations, including:
//! - SQLite database initialization and schema management
//! - Category and product persistence
//! - Append-only price history
//! - Run tracking

mod schema;
mod sqlite;
mod traits;

pub use sqlite::SqliteStorage;
pub use traits::{Storage, StorageError, StorageResult};

use crate::config::StoreType;
use crate::PriceWatchError;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use std::path::Path;

/// Initializes or opens a storage database
///
/// # Arguments
///
/// * `path` - Path to the SQLite database file
///
/// # Returns
///
/// * `Ok(SqliteStorage)` - Successfully initialized storage
/// * `Err(PriceWatchError)` - Failed to initialize storage
pub fn open_storage(path: &Path) -> Result<SqliteStorage, PriceWatchError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    SqliteStorage::new(path)
}

/// Availability of a product
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StockStatus {
    InStock,
    OutOfStock,
}

impl StockStatus {
    pub fn from_availability(in_stock: bool) -> Self {
        if in_stock {
            Self::InStock
        } else {
            Self::OutOfStock
        }
    }

    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::InStock => "in_stock",
            Self::OutOfStock => "out_of_stock",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "in_stock" | "instock" => Some(Self::InStock),
            "out_of_stock" | "outofstock" => Some(Self::OutOfStock),
            _ => None,
        }
    }
}

/// A normalized product ready to be reconciled against storage
#[derive(Debug, Clone)]
pub struct ProductRecord {
    pub store_name: String,
    pub store_type: StoreType,
    pub category: String,
    /// Store product id, or the product URL when the store exposes none
    pub source_id: String,
    pub name: String,
    pub sku: Option<String>,
    /// Price as listed by the store
    pub price: Decimal,
    pub price_before_tax: Decimal,
    pub price_after_tax: Decimal,
    pub currency: String,
    pub stock_status: StockStatus,
    pub product_url: Option<String>,
    pub image_url: Option<String>,
    pub description: Option<String>,
    pub scraped_at: DateTime<Utc>,
}

/// A product row as persisted
#[derive(Debug, Clone)]
pub struct StoredProduct {
    pub id: i64,
    pub category_id: i64,
    pub category: String,
    pub store_name: String,
    pub store_type: StoreType,
    pub source_id: String,
    pub name: String,
    pub sku: Option<String>,
    pub price: Decimal,
    pub price_before_tax: Decimal,
    pub price_after_tax: Decimal,
    pub currency: String,
    pub stock_status: StockStatus,
    pub product_url: Option<String>,
    pub image_url: Option<String>,
    pub description: Option<String>,
    pub created_at: String,
    pub updated_at: String,
    pub last_scraped: String,
}

/// One recorded price change
#[derive(Debug, Clone)]
pub struct PriceHistoryRecord {
    pub id: i64,
    pub product_id: i64,
    pub price: Decimal,
    pub price_before_tax: Decimal,
    pub price_after_tax: Decimal,
    pub currency: String,
    pub stock_status: StockStatus,
    pub recorded_at: String,
}

/// Represents a scrape run
#[derive(Debug, Clone)]
pub struct RunRecord {
    pub id: i64,
    pub started_at: String,
    pub finished_at: Option<String>,
    pub config_hash: String,
    pub status: RunStatus,
}

/// Status of a scrape run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Running,
    Completed,
    Interrupted,
    Failed,
}

impl RunStatus {
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Interrupted => "interrupted",
            Self::Failed => "failed",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "running" => Some(Self::Running),
            "completed" => Some(Self::Completed),
            "interrupted" => Some(Self::Interrupted),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}

/// Formats a timestamp the way every column stores it
pub fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(chrono::SecondsFormat::Secs, true)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_status_roundtrip() {
        for status in &[
            RunStatus::Running,
            RunStatus::Completed,
            RunStatus::Interrupted,
            RunStatus::Failed,
        ] {
            assert_eq!(Some(*status), RunStatus::from_db_string(status.to_db_string()));
        }
        assert_eq!(RunStatus::from_db_string("invalid"), None);
    }

    #[test]
    fn test_stock_status_accepts_woocommerce_spelling() {
        assert_eq!(StockStatus::from_db_string("instock"), Some(StockStatus::InStock));
        assert_eq!(
            StockStatus::from_db_string("out_of_stock"),
            Some(StockStatus::OutOfStock)
        );
        assert_eq!(StockStatus::from_db_string("backorder"), None);
        assert_eq!(StockStatus::from_availability(false), StockStatus::OutOfStock);
    }

    #[test]
    fn test_timestamps_sort_lexically() {
        let earlier = format_timestamp(&"2026-01-02T03:04:05.999Z".parse().unwrap());
        let later = format_timestamp(&"2026-01-02T03:04:06Z".parse().unwrap());
        assert_eq!(earlier, "2026-01-02T03:04:05Z");
        assert!(earlier < later);
    }
}
