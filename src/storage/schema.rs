//! Database schema definitions
//!
//! Prices are stored as decimal TEXT so they round-trip through
//! `rust_decimal` without loss.

/// SQL schema for the database
pub const SCHEMA_SQL: &str = r#"
-- Track scrape runs
CREATE TABLE IF NOT EXISTS runs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    started_at TEXT NOT NULL,
    finished_at TEXT,
    config_hash TEXT NOT NULL,
    status TEXT NOT NULL
);

-- Product categories, created on first sighting
CREATE TABLE IF NOT EXISTS categories (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    store_name TEXT NOT NULL,
    name TEXT NOT NULL,
    slug TEXT NOT NULL,
    created_at TEXT NOT NULL,
    UNIQUE(store_name, name)
);

-- Current state of every product
CREATE TABLE IF NOT EXISTS products (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    store_name TEXT NOT NULL,
    store_type TEXT NOT NULL,
    category_id INTEGER NOT NULL REFERENCES categories(id),
    source_id TEXT NOT NULL,
    name TEXT NOT NULL,
    sku TEXT,
    price TEXT NOT NULL,
    price_before_tax TEXT NOT NULL,
    price_after_tax TEXT NOT NULL,
    currency TEXT NOT NULL,
    stock_status TEXT NOT NULL,
    product_url TEXT,
    image_url TEXT,
    description TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    last_scraped TEXT NOT NULL,
    UNIQUE(store_name, category_id, source_id)
);

CREATE INDEX IF NOT EXISTS idx_products_store ON products(store_name);
CREATE INDEX IF NOT EXISTS idx_products_name ON products(name);

-- Append-only price changes
CREATE TABLE IF NOT EXISTS price_history (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    product_id INTEGER NOT NULL REFERENCES products(id) ON DELETE CASCADE,
    price TEXT NOT NULL,
    price_before_tax TEXT NOT NULL,
    price_after_tax TEXT NOT NULL,
    currency TEXT NOT NULL,
    stock_status TEXT NOT NULL,
    recorded_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_price_history_product ON price_history(product_id, recorded_at);
"#;

/// Initializes the database schema
///
/// # Arguments
///
/// * `conn` - The database connection
///
/// # Returns
///
/// * `Ok(())` - Schema initialized successfully
/// * `Err(rusqlite::Error)` - Failed to initialize schema
pub fn initialize_schema(conn: &rusqlite::Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(SCHEMA_SQL)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::Connection;

    #[test]
    fn test_schema_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        initialize_schema(&conn).unwrap();
        assert!(initialize_schema(&conn).is_ok());
    }

    #[test]
    fn test_tables_exist_after_init() {
        let conn = Connection::open_in_memory().unwrap();
        initialize_schema(&conn).unwrap();

        for table in ["runs", "categories", "products", "price_history"] {
            let count: i64 = conn
                .query_row(
                    "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name=?1",
                    [table],
                    |row| row.get(0),
                )
                .unwrap();
            assert_eq!(count, 1, "Table {} should exist", table);
        }
    }

    #[test]
    fn test_product_identity_is_unique() {
        let conn = Connection::open_in_memory().unwrap();
        initialize_schema(&conn).unwrap();

        conn.execute(
            "INSERT INTO categories (store_name, name, slug, created_at) VALUES ('S', 'cpu', 'cpu', 'now')",
            [],
        )
        .unwrap();

        let insert = "INSERT INTO products (store_name, store_type, category_id, source_id, name,
             price, price_before_tax, price_after_tax, currency, stock_status,
             created_at, updated_at, last_scraped)
             VALUES ('S', 'tech', 1, '42', 'CPU', '10', '10', '11.10', 'USD', 'in_stock', 'now', 'now', 'now')";

        conn.execute(insert, []).unwrap();
        assert!(conn.execute(insert, []).is_err());
    }
}
