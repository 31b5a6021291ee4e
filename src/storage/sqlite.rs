//! SQLite storage implementation
//!
//! This module provides a SQLite-based implementation of the Storage trait.

use crate::config::StoreType;
use crate::storage::schema::initialize_schema;
use crate::storage::traits::{Storage, StorageError, StorageResult};
use crate::storage::{
    format_timestamp, PriceHistoryRecord, ProductRecord, RunRecord, RunStatus, StockStatus,
    StoredProduct,
};
use crate::PriceWatchError;
use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};
use rust_decimal::Decimal;
use std::path::Path;
use std::str::FromStr;

const PRODUCT_COLUMNS: &str = "
    SELECT p.id, p.category_id, c.name, p.store_name, p.store_type, p.source_id, p.name,
           p.sku, p.price, p.price_before_tax, p.price_after_tax, p.currency,
           p.stock_status, p.product_url, p.image_url, p.description,
           p.created_at, p.updated_at, p.last_scraped
    FROM products p
    JOIN categories c ON c.id = p.category_id";

/// SQLite storage backend
pub struct SqliteStorage {
    conn: Connection,
}

impl SqliteStorage {
    /// Creates a new SqliteStorage instance
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the SQLite database file
    ///
    /// # Returns
    ///
    /// * `Ok(SqliteStorage)` - Successfully opened/created database
    /// * `Err(PriceWatchError)` - Failed to open database
    pub fn new(path: &Path) -> Result<Self, PriceWatchError> {
        let conn = Connection::open(path)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA foreign_keys = ON;
            PRAGMA temp_store = MEMORY;
        ",
        )?;

        initialize_schema(&conn)?;

        Ok(Self { conn })
    }

    /// Creates an in-memory database (for testing)
    #[cfg(test)]
    pub fn new_in_memory() -> Result<Self, PriceWatchError> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        initialize_schema(&conn)?;
        Ok(Self { conn })
    }
}

fn now() -> String {
    format_timestamp(&Utc::now())
}

fn slugify(name: &str) -> String {
    name.trim()
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("-")
}

fn decimal_column(row: &Row, idx: usize) -> rusqlite::Result<Decimal> {
    let text: String = row.get(idx)?;
    Decimal::from_str(&text)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn stock_column(row: &Row, idx: usize) -> rusqlite::Result<StockStatus> {
    Ok(StockStatus::from_db_string(&row.get::<_, String>(idx)?).unwrap_or(StockStatus::OutOfStock))
}

fn row_to_product(row: &Row) -> rusqlite::Result<StoredProduct> {
    Ok(StoredProduct {
        id: row.get(0)?,
        category_id: row.get(1)?,
        category: row.get(2)?,
        store_name: row.get(3)?,
        store_type: StoreType::from_db_string(&row.get::<_, String>(4)?)
            .unwrap_or(StoreType::General),
        source_id: row.get(5)?,
        name: row.get(6)?,
        sku: row.get(7)?,
        price: decimal_column(row, 8)?,
        price_before_tax: decimal_column(row, 9)?,
        price_after_tax: decimal_column(row, 10)?,
        currency: row.get(11)?,
        stock_status: stock_column(row, 12)?,
        product_url: row.get(13)?,
        image_url: row.get(14)?,
        description: row.get(15)?,
        created_at: row.get(16)?,
        updated_at: row.get(17)?,
        last_scraped: row.get(18)?,
    })
}

fn row_to_run(row: &Row) -> rusqlite::Result<RunRecord> {
    Ok(RunRecord {
        id: row.get(0)?,
        started_at: row.get(1)?,
        finished_at: row.get(2)?,
        config_hash: row.get(3)?,
        status: RunStatus::from_db_string(&row.get::<_, String>(4)?)
            .unwrap_or(RunStatus::Running),
    })
}

impl Storage for SqliteStorage {
    // ===== Run Management =====

    fn create_run(&mut self, config_hash: &str) -> StorageResult<i64> {
        self.conn.execute(
            "INSERT INTO runs (started_at, config_hash, status) VALUES (?1, ?2, ?3)",
            params![now(), config_hash, RunStatus::Running.to_db_string()],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn get_run(&self, run_id: i64) -> StorageResult<RunRecord> {
        self.conn
            .query_row(
                "SELECT id, started_at, finished_at, config_hash, status FROM runs WHERE id = ?1",
                params![run_id],
                row_to_run,
            )
            .optional()?
            .ok_or(StorageError::RunNotFound(run_id))
    }

    fn get_latest_run(&self) -> StorageResult<Option<RunRecord>> {
        let run = self
            .conn
            .query_row(
                "SELECT id, started_at, finished_at, config_hash, status FROM runs ORDER BY id DESC LIMIT 1",
                [],
                row_to_run,
            )
            .optional()?;
        Ok(run)
    }

    fn update_run_status(&mut self, run_id: i64, status: RunStatus) -> StorageResult<()> {
        let finished_at = match status {
            RunStatus::Running => None,
            _ => Some(now()),
        };
        let changed = self.conn.execute(
            "UPDATE runs SET status = ?1, finished_at = ?2 WHERE id = ?3",
            params![status.to_db_string(), finished_at, run_id],
        )?;
        if changed == 0 {
            return Err(StorageError::RunNotFound(run_id));
        }
        Ok(())
    }

    fn complete_run(&mut self, run_id: i64) -> StorageResult<()> {
        self.update_run_status(run_id, RunStatus::Completed)
    }

    // ===== Transactions =====

    fn transaction<T, F>(&mut self, f: F) -> StorageResult<T>
    where
        F: FnOnce(&mut Self) -> StorageResult<T>,
        Self: Sized,
    {
        self.conn.execute_batch("BEGIN IMMEDIATE")?;

        match f(self) {
            Ok(value) => {
                self.conn.execute_batch("COMMIT")?;
                Ok(value)
            }
            Err(e) => {
                if let Err(rollback) = self.conn.execute_batch("ROLLBACK") {
                    tracing::warn!("Rollback failed after '{}': {}", e, rollback);
                }
                Err(e)
            }
        }
    }

    // ===== Categories =====

    fn get_or_create_category(&mut self, store_name: &str, name: &str) -> StorageResult<i64> {
        let existing: Option<i64> = self
            .conn
            .query_row(
                "SELECT id FROM categories WHERE store_name = ?1 AND name = ?2",
                params![store_name, name],
                |row| row.get(0),
            )
            .optional()?;

        if let Some(id) = existing {
            return Ok(id);
        }

        self.conn.execute(
            "INSERT INTO categories (store_name, name, slug, created_at) VALUES (?1, ?2, ?3, ?4)",
            params![store_name, name, slugify(name), now()],
        )?;

        Ok(self.conn.last_insert_rowid())
    }

    fn count_categories(&self) -> StorageResult<u64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM categories", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    // ===== Products =====

    fn find_product(
        &self,
        store_name: &str,
        category_id: i64,
        source_id: &str,
    ) -> StorageResult<Option<StoredProduct>> {
        let query = format!(
            "{} WHERE p.store_name = ?1 AND p.category_id = ?2 AND p.source_id = ?3",
            PRODUCT_COLUMNS
        );
        let product = self
            .conn
            .query_row(&query, params![store_name, category_id, source_id], row_to_product)
            .optional()?;
        Ok(product)
    }

    fn get_product(&self, product_id: i64) -> StorageResult<StoredProduct> {
        let query = format!("{} WHERE p.id = ?1", PRODUCT_COLUMNS);
        self.conn
            .query_row(&query, params![product_id], row_to_product)
            .optional()?
            .ok_or(StorageError::ProductNotFound(product_id))
    }

    fn insert_product(&mut self, category_id: i64, record: &ProductRecord) -> StorageResult<i64> {
        let scraped = format_timestamp(&record.scraped_at);
        let result = self.conn.execute(
            "INSERT INTO products (store_name, store_type, category_id, source_id, name, sku,
             price, price_before_tax, price_after_tax, currency, stock_status,
             product_url, image_url, description, created_at, updated_at, last_scraped)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?15, ?15)",
            params![
                record.store_name,
                record.store_type.as_str(),
                category_id,
                record.source_id,
                record.name,
                record.sku,
                record.price.to_string(),
                record.price_before_tax.to_string(),
                record.price_after_tax.to_string(),
                record.currency,
                record.stock_status.to_db_string(),
                record.product_url,
                record.image_url,
                record.description,
                scraped,
            ],
        );

        match result {
            Ok(_) => Ok(self.conn.last_insert_rowid()),
            Err(rusqlite::Error::SqliteFailure(err, _))
                if err.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                Err(StorageError::ConstraintViolation(format!(
                    "product '{}' already exists in {} / category {}",
                    record.source_id, record.store_name, category_id
                )))
            }
            Err(e) => Err(e.into()),
        }
    }

    fn update_product(&mut self, product_id: i64, record: &ProductRecord) -> StorageResult<()> {
        let scraped = format_timestamp(&record.scraped_at);
        let changed = self.conn.execute(
            "UPDATE products SET name = ?1, sku = ?2, price = ?3, price_before_tax = ?4,
             price_after_tax = ?5, currency = ?6, stock_status = ?7, product_url = ?8,
             image_url = ?9, description = ?10, store_type = ?11,
             updated_at = ?12, last_scraped = ?12
             WHERE id = ?13",
            params![
                record.name,
                record.sku,
                record.price.to_string(),
                record.price_before_tax.to_string(),
                record.price_after_tax.to_string(),
                record.currency,
                record.stock_status.to_db_string(),
                record.product_url,
                record.image_url,
                record.description,
                record.store_type.as_str(),
                scraped,
                product_id,
            ],
        )?;
        if changed == 0 {
            return Err(StorageError::ProductNotFound(product_id));
        }
        Ok(())
    }

    fn refresh_product(&mut self, product_id: i64, record: &ProductRecord) -> StorageResult<()> {
        let changed = self.conn.execute(
            "UPDATE products SET name = ?1, sku = ?2, stock_status = ?3, product_url = ?4,
             image_url = ?5, description = ?6, store_type = ?7, last_scraped = ?8
             WHERE id = ?9",
            params![
                record.name,
                record.sku,
                record.stock_status.to_db_string(),
                record.product_url,
                record.image_url,
                record.description,
                record.store_type.as_str(),
                format_timestamp(&record.scraped_at),
                product_id,
            ],
        )?;
        if changed == 0 {
            return Err(StorageError::ProductNotFound(product_id));
        }
        Ok(())
    }

    fn list_products(&self) -> StorageResult<Vec<StoredProduct>> {
        let query = format!("{} ORDER BY p.store_name, c.name, p.name, p.id", PRODUCT_COLUMNS);
        let mut stmt = self.conn.prepare(&query)?;
        let products = stmt
            .query_map([], row_to_product)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(products)
    }

    fn search_products(&self, term: &str) -> StorageResult<Vec<StoredProduct>> {
        let query = format!(
            "{} WHERE p.name LIKE '%' || ?1 || '%' ORDER BY p.store_name, p.name",
            PRODUCT_COLUMNS
        );
        let mut stmt = self.conn.prepare(&query)?;
        let products = stmt
            .query_map(params![term.trim()], row_to_product)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(products)
    }

    // ===== Price History =====

    fn append_price_history(
        &mut self,
        product_id: i64,
        record: &ProductRecord,
    ) -> StorageResult<i64> {
        self.conn.execute(
            "INSERT INTO price_history (product_id, price, price_before_tax, price_after_tax,
             currency, stock_status, recorded_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                product_id,
                record.price.to_string(),
                record.price_before_tax.to_string(),
                record.price_after_tax.to_string(),
                record.currency,
                record.stock_status.to_db_string(),
                format_timestamp(&record.scraped_at),
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn get_price_history(&self, product_id: i64) -> StorageResult<Vec<PriceHistoryRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, product_id, price, price_before_tax, price_after_tax, currency,
             stock_status, recorded_at
             FROM price_history WHERE product_id = ?1 ORDER BY recorded_at, id",
        )?;

        let history = stmt
            .query_map(params![product_id], |row| {
                Ok(PriceHistoryRecord {
                    id: row.get(0)?,
                    product_id: row.get(1)?,
                    price: decimal_column(row, 2)?,
                    price_before_tax: decimal_column(row, 3)?,
                    price_after_tax: decimal_column(row, 4)?,
                    currency: row.get(5)?,
                    stock_status: stock_column(row, 6)?,
                    recorded_at: row.get(7)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(history)
    }

    fn prune_price_history(&mut self, cutoff: DateTime<Utc>) -> StorageResult<u64> {
        let deleted = self.conn.execute(
            "DELETE FROM price_history WHERE recorded_at < ?1",
            params![format_timestamp(&cutoff)],
        )?;
        Ok(deleted as u64)
    }

    // ===== Statistics =====

    fn count_products(&self) -> StorageResult<u64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM products", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    fn count_price_history(&self) -> StorageResult<u64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM price_history", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    fn count_products_by_store(&self) -> StorageResult<Vec<(String, u64)>> {
        let mut stmt = self.conn.prepare(
            "SELECT store_name, COUNT(*) FROM products GROUP BY store_name ORDER BY store_name",
        )?;

        let counts = stmt
            .query_map([], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)? as u64))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(counts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn record(source_id: &str, price: &str) -> ProductRecord {
        ProductRecord {
            store_name: "Test Shop".to_string(),
            store_type: StoreType::Tech,
            category: "cpu".to_string(),
            source_id: source_id.to_string(),
            name: format!("Product {}", source_id),
            sku: Some(format!("SKU-{}", source_id)),
            price: dec(price),
            price_before_tax: dec(price),
            price_after_tax: dec(price) * dec("1.11"),
            currency: "USD".to_string(),
            stock_status: StockStatus::InStock,
            product_url: Some(format!("https://shop.example.com/p/{}", source_id)),
            image_url: None,
            description: None,
            scraped_at: Utc::now(),
        }
    }

    #[test]
    fn test_create_and_complete_run() {
        let mut storage = SqliteStorage::new_in_memory().unwrap();
        let run_id = storage.create_run("test_hash").unwrap();
        assert!(run_id > 0);

        storage.complete_run(run_id).unwrap();
        let run = storage.get_latest_run().unwrap().unwrap();
        assert_eq!(run.id, run_id);
        assert_eq!(run.status, RunStatus::Completed);
        assert!(run.finished_at.is_some());

        assert!(matches!(
            storage.get_run(run_id + 1),
            Err(StorageError::RunNotFound(_))
        ));
    }

    #[test]
    fn test_get_or_create_category() {
        let mut storage = SqliteStorage::new_in_memory().unwrap();
        let a = storage.get_or_create_category("Test Shop", "cpu").unwrap();
        let b = storage.get_or_create_category("Test Shop", "cpu").unwrap();
        let c = storage.get_or_create_category("Other Shop", "cpu").unwrap();

        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(storage.count_categories().unwrap(), 2);
    }

    #[test]
    fn test_insert_and_find_product() {
        let mut storage = SqliteStorage::new_in_memory().unwrap();
        let category_id = storage.get_or_create_category("Test Shop", "cpu").unwrap();
        let id = storage.insert_product(category_id, &record("42", "99.50")).unwrap();

        let found = storage
            .find_product("Test Shop", category_id, "42")
            .unwrap()
            .unwrap();
        assert_eq!(found.id, id);
        assert_eq!(found.category, "cpu");
        assert_eq!(found.price, dec("99.50"));
        assert_eq!(found.price.to_string(), "99.50");
        assert_eq!(found.store_type, StoreType::Tech);

        assert!(storage
            .find_product("Test Shop", category_id, "43")
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_duplicate_insert_is_constraint_violation() {
        let mut storage = SqliteStorage::new_in_memory().unwrap();
        let category_id = storage.get_or_create_category("Test Shop", "cpu").unwrap();
        storage.insert_product(category_id, &record("42", "10")).unwrap();

        let result = storage.insert_product(category_id, &record("42", "10"));
        assert!(matches!(result, Err(StorageError::ConstraintViolation(_))));
    }

    #[test]
    fn test_refresh_keeps_prices() {
        let mut storage = SqliteStorage::new_in_memory().unwrap();
        let category_id = storage.get_or_create_category("Test Shop", "cpu").unwrap();
        let id = storage.insert_product(category_id, &record("42", "10")).unwrap();

        let mut newer = record("42", "12");
        newer.name = "Renamed".to_string();
        newer.stock_status = StockStatus::OutOfStock;
        storage.refresh_product(id, &newer).unwrap();

        let product = storage.get_product(id).unwrap();
        assert_eq!(product.name, "Renamed");
        assert_eq!(product.stock_status, StockStatus::OutOfStock);
        assert_eq!(product.price, dec("10"));

        storage.update_product(id, &newer).unwrap();
        assert_eq!(storage.get_product(id).unwrap().price, dec("12"));
    }

    #[test]
    fn test_transaction_rolls_back_on_error() {
        let mut storage = SqliteStorage::new_in_memory().unwrap();

        let result: StorageResult<()> = storage.transaction(|s| {
            s.get_or_create_category("Test Shop", "cpu")?;
            Err(StorageError::Database("boom".to_string()))
        });
        assert!(result.is_err());
        assert_eq!(storage.count_categories().unwrap(), 0);

        storage
            .transaction(|s| s.get_or_create_category("Test Shop", "cpu"))
            .unwrap();
        assert_eq!(storage.count_categories().unwrap(), 1);
    }

    #[test]
    fn test_price_history_and_prune() {
        let mut storage = SqliteStorage::new_in_memory().unwrap();
        let category_id = storage.get_or_create_category("Test Shop", "cpu").unwrap();
        let id = storage.insert_product(category_id, &record("42", "10")).unwrap();

        let mut old = record("42", "11");
        old.scraped_at = Utc::now() - Duration::days(120);
        storage.append_price_history(id, &old).unwrap();
        storage.append_price_history(id, &record("42", "12")).unwrap();

        let history = storage.get_price_history(id).unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].price, dec("11"));
        assert_eq!(history[1].price, dec("12"));

        let deleted = storage
            .prune_price_history(Utc::now() - Duration::days(90))
            .unwrap();
        assert_eq!(deleted, 1);
        assert_eq!(storage.count_price_history().unwrap(), 1);
    }

    #[test]
    fn test_search_and_store_counts() {
        let mut storage = SqliteStorage::new_in_memory().unwrap();
        let category_id = storage.get_or_create_category("Test Shop", "cpu").unwrap();
        let mut ryzen = record("1", "200");
        ryzen.name = "AMD Ryzen 7".to_string();
        storage.insert_product(category_id, &ryzen).unwrap();
        storage.insert_product(category_id, &record("2", "100")).unwrap();

        let hits = storage.search_products("ryzen").unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].name, "AMD Ryzen 7");

        assert_eq!(storage.count_products().unwrap(), 2);
        assert_eq!(
            storage.count_products_by_store().unwrap(),
            vec![("Test Shop".to_string(), 2)]
        );
        assert_eq!(storage.list_products().unwrap().len(), 2);
    }
}
