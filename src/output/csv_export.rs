//! CSV snapshot export and import
//!
//! Every run writes the full current product set to a timestamped file and
//! to `products_latest.csv`. The same layout can be imported back.

use crate::config::{StoreRegistry, StoreType};
use crate::pricing::{normalize_for_store, normalize_price, parse_price_text, TaxedPrice};
use crate::reconcile::{reconcile_batch, BatchSummary};
use crate::storage::{ProductRecord, StockStatus, Storage, StoredProduct};
use crate::PriceWatchError;
use chrono::{DateTime, Local, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Column order of exported files
pub const CSV_COLUMNS: [&str; 15] = [
    "product_id",
    "store_name",
    "store_type",
    "sku",
    "category",
    "product_name",
    "price",
    "price_before_tax",
    "final_price_after_tax",
    "currency",
    "stock_status",
    "product_url",
    "image_url",
    "description",
    "last_scraped",
];

const LATEST_FILE: &str = "products_latest.csv";
const DEFAULT_IMPORT_CATEGORY: &str = "uncategorized";

/// One CSV line; field order matches [`CSV_COLUMNS`]
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CsvRow {
    pub product_id: Option<String>,
    pub store_name: Option<String>,
    pub store_type: Option<String>,
    pub sku: Option<String>,
    pub category: Option<String>,
    pub product_name: Option<String>,
    pub price: Option<String>,
    pub price_before_tax: Option<String>,
    pub final_price_after_tax: Option<String>,
    pub currency: Option<String>,
    pub stock_status: Option<String>,
    pub product_url: Option<String>,
    pub image_url: Option<String>,
    pub description: Option<String>,
    pub last_scraped: Option<String>,
}

impl From<&StoredProduct> for CsvRow {
    fn from(product: &StoredProduct) -> Self {
        Self {
            product_id: Some(product.source_id.clone()),
            store_name: Some(product.store_name.clone()),
            store_type: Some(product.store_type.as_str().to_string()),
            sku: product.sku.clone(),
            category: Some(product.category.clone()),
            product_name: Some(product.name.clone()),
            price: Some(product.price.to_string()),
            price_before_tax: Some(product.price_before_tax.to_string()),
            final_price_after_tax: Some(product.price_after_tax.to_string()),
            currency: Some(product.currency.clone()),
            stock_status: Some(product.stock_status.to_db_string().to_string()),
            product_url: product.product_url.clone(),
            image_url: product.image_url.clone(),
            description: product.description.clone(),
            last_scraped: Some(product.last_scraped.clone()),
        }
    }
}

/// Files written by one export
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportPaths {
    pub snapshot: PathBuf,
    pub latest: PathBuf,
    pub rows: usize,
}

/// Writes every stored product to a timestamped CSV and `products_latest.csv`
///
/// # Arguments
///
/// * `storage` - The storage backend to read products from
/// * `export_dir` - Directory receiving the files, created if missing
/// * `timestamp` - Time used in the snapshot file name
pub fn export_snapshot(
    storage: &dyn Storage,
    export_dir: &Path,
    timestamp: DateTime<Local>,
) -> Result<ExportPaths, PriceWatchError> {
    std::fs::create_dir_all(export_dir)?;

    let products = storage.list_products()?;
    let snapshot = export_dir.join(format!(
        "products_{}.csv",
        timestamp.format("%Y%m%d_%H%M%S")
    ));

    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_path(&snapshot)?;
    writer.write_record(CSV_COLUMNS)?;
    for product in &products {
        writer.serialize(CsvRow::from(product))?;
    }
    writer.flush()?;

    let latest = export_dir.join(LATEST_FILE);
    std::fs::copy(&snapshot, &latest)?;

    Ok(ExportPaths {
        snapshot,
        latest,
        rows: products.len(),
    })
}

/// Outcome of a CSV import
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportSummary {
    pub rows: u64,
    pub skipped: u64,
    pub saved: BatchSummary,
}

fn field(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

fn owned_field(value: &Option<String>) -> Option<String> {
    field(value).map(str::to_string)
}

/// Converts an imported row into a record, `None` when it lacks an id,
/// name, store or price
fn row_to_record(row: &CsvRow, registry: &StoreRegistry) -> Option<ProductRecord> {
    let source_id = field(&row.product_id)?;
    let name = field(&row.product_name)?;
    let store_name = field(&row.store_name)?;
    let raw: Decimal = field(&row.price).and_then(parse_price_text)?;

    let store = registry.get(store_name);
    let taxed = match store {
        Some(store) => normalize_for_store(raw, store, name),
        None => normalize_price(raw, true, Decimal::ZERO, true),
    };
    let TaxedPrice { pre_tax, post_tax } = taxed;

    let store_type = field(&row.store_type)
        .and_then(StoreType::from_db_string)
        .or_else(|| store.map(|s| s.store_type))
        .unwrap_or_default();
    let currency = field(&row.currency)
        .map(str::to_string)
        .or_else(|| store.map(|s| s.currency.clone()))
        .unwrap_or_else(|| "USD".to_string());
    let stock_status = field(&row.stock_status)
        .and_then(StockStatus::from_db_string)
        .unwrap_or(StockStatus::InStock);
    let scraped_at = field(&row.last_scraped)
        .and_then(|ts| DateTime::parse_from_rfc3339(ts).ok())
        .map(|ts| ts.with_timezone(&Utc))
        .unwrap_or_else(Utc::now);

    Some(ProductRecord {
        store_name: store.map(|s| s.name.clone()).unwrap_or_else(|| store_name.to_string()),
        store_type,
        category: field(&row.category)
            .unwrap_or(DEFAULT_IMPORT_CATEGORY)
            .to_string(),
        source_id: source_id.to_string(),
        name: name.to_string(),
        sku: owned_field(&row.sku),
        price: raw,
        price_before_tax: pre_tax,
        price_after_tax: post_tax,
        currency,
        stock_status,
        product_url: owned_field(&row.product_url),
        image_url: owned_field(&row.image_url),
        description: owned_field(&row.description),
        scraped_at,
    })
}

/// Upserts the rows of a CSV file through the reconciler
///
/// Rows missing `product_id`, `product_name`, `store_name` or a parsable
/// `price` are skipped. Prices are re-derived from the store's tax settings
/// when the store is configured; otherwise both prices equal `price`.
pub fn import_csv<S: Storage>(
    storage: &mut S,
    path: &Path,
    registry: &StoreRegistry,
) -> Result<ImportSummary, PriceWatchError> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_path(path)?;

    let mut summary = ImportSummary::default();
    let mut records = Vec::new();

    for (line, row) in reader.deserialize::<CsvRow>().enumerate() {
        summary.rows += 1;
        let row = match row {
            Ok(row) => row,
            Err(e) => {
                tracing::warn!("Skipping CSV row {}: {}", line + 2, e);
                summary.skipped += 1;
                continue;
            }
        };

        match row_to_record(&row, registry) {
            Some(record) => records.push(record),
            None => {
                tracing::debug!("Skipping CSV row {}: missing required fields", line + 2);
                summary.skipped += 1;
            }
        }
    }

    summary.saved = reconcile_batch(storage, &records);
    Ok(summary)
}
