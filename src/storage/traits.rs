//! Storage traits and error types
//!
//! This module defines the trait interface for storage backends and
//! associated error types.

use crate::storage::{PriceHistoryRecord, ProductRecord, RunRecord, RunStatus, StoredProduct};
use chrono::{DateTime, Utc};
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Product not found: {0}")]
    ProductNotFound(i64),

    #[error("Run not found: {0}")]
    RunNotFound(i64),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Constraint violation: {0}")]
    ConstraintViolation(String),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Trait for storage backend implementations
///
/// This trait defines all database operations needed by the reconciler, the
/// exporter and the CLI query modes.
pub trait Storage {
    // ===== Run Management =====

    /// Creates a new scrape run
    ///
    /// # Arguments
    ///
    /// * `config_hash` - Hash of the configuration file
    ///
    /// # Returns
    ///
    /// The ID of the newly created run
    fn create_run(&mut self, config_hash: &str) -> StorageResult<i64>;

    /// Gets a run by ID
    fn get_run(&self, run_id: i64) -> StorageResult<RunRecord>;

    /// Gets the most recent run
    fn get_latest_run(&self) -> StorageResult<Option<RunRecord>>;

    /// Updates the status of a run
    fn update_run_status(&mut self, run_id: i64, status: RunStatus) -> StorageResult<()>;

    /// Marks a run as completed with a finish timestamp
    fn complete_run(&mut self, run_id: i64) -> StorageResult<()>;

    // ===== Transactions =====

    /// Runs `f` inside a single transaction
    ///
    /// Commits when `f` returns `Ok`, rolls back otherwise.
    fn transaction<T, F>(&mut self, f: F) -> StorageResult<T>
    where
        F: FnOnce(&mut Self) -> StorageResult<T>,
        Self: Sized;

    // ===== Categories =====

    /// Returns the id of the `(store, name)` category, creating it if needed
    fn get_or_create_category(&mut self, store_name: &str, name: &str) -> StorageResult<i64>;

    /// Counts categories across all stores
    fn count_categories(&self) -> StorageResult<u64>;

    // ===== Products =====

    /// Looks a product up by its identity `(store, category, source id)`
    fn find_product(
        &self,
        store_name: &str,
        category_id: i64,
        source_id: &str,
    ) -> StorageResult<Option<StoredProduct>>;

    /// Gets a product by ID
    fn get_product(&self, product_id: i64) -> StorageResult<StoredProduct>;

    /// Inserts a new product and returns its ID
    fn insert_product(&mut self, category_id: i64, record: &ProductRecord) -> StorageResult<i64>;

    /// Overwrites every field of a product, prices included
    fn update_product(&mut self, product_id: i64, record: &ProductRecord) -> StorageResult<()>;

    /// Refreshes descriptive fields, stock status and `last_scraped`
    ///
    /// Prices and `updated_at` are left untouched.
    fn refresh_product(&mut self, product_id: i64, record: &ProductRecord) -> StorageResult<()>;

    /// Lists every product ordered by store, category and name
    fn list_products(&self) -> StorageResult<Vec<StoredProduct>>;

    /// Lists products whose name contains `term` (case-insensitive)
    fn search_products(&self, term: &str) -> StorageResult<Vec<StoredProduct>>;

    // ===== Price History =====

    /// Appends a history entry holding the record's prices
    fn append_price_history(&mut self, product_id: i64, record: &ProductRecord)
        -> StorageResult<i64>;

    /// Gets the history of a product, oldest first
    fn get_price_history(&self, product_id: i64) -> StorageResult<Vec<PriceHistoryRecord>>;

    /// Deletes history entries recorded before `cutoff`
    ///
    /// # Returns
    ///
    /// The number of deleted entries
    fn prune_price_history(&mut self, cutoff: DateTime<Utc>) -> StorageResult<u64>;

    // ===== Statistics =====

    /// Gets total product count
    fn count_products(&self) -> StorageResult<u64>;

    /// Gets total history entry count
    fn count_price_history(&self) -> StorageResult<u64>;

    /// Gets product counts per store, sorted by store name
    fn count_products_by_store(&self) -> StorageResult<Vec<(String, u64)>>;
}
