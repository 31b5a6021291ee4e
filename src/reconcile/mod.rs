//! Persistence reconciler
//!
//! Turns scraped products into stored rows. Each record is reconciled in its
//! own transaction:
//!
//! 1. The `(store, category)` category is fetched or created
//! 2. The product is looked up by `(store, category, source id)`
//! 3. A new product is inserted without a history entry
//! 4. A changed raw price appends one history entry holding the new prices
//!    and overwrites the current price
//! 5. An unchanged price only refreshes descriptive fields and `last_scraped`

use crate::config::StoreConfig;
use crate::crawler::ScrapedProduct;
use crate::pricing::normalize_for_store;
use crate::storage::{ProductRecord, Storage, StorageResult};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

/// What reconciling one record did to storage
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileOutcome {
    Created {
        product_id: i64,
    },
    PriceChanged {
        product_id: i64,
        old: Decimal,
        new: Decimal,
    },
    Unchanged {
        product_id: i64,
    },
}

impl ReconcileOutcome {
    pub fn product_id(&self) -> i64 {
        match self {
            Self::Created { product_id }
            | Self::PriceChanged { product_id, .. }
            | Self::Unchanged { product_id } => *product_id,
        }
    }
}

/// Per-batch counts, folded into the run statistics by the caller
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchSummary {
    pub created: u64,
    pub updated: u64,
    pub unchanged: u64,
    pub errors: u64,
}

impl BatchSummary {
    fn record(&mut self, outcome: &ReconcileOutcome) {
        match outcome {
            ReconcileOutcome::Created { .. } => self.created += 1,
            ReconcileOutcome::PriceChanged { .. } => self.updated += 1,
            ReconcileOutcome::Unchanged { .. } => self.unchanged += 1,
        }
    }
}

/// Reconciles one product record against storage
///
/// Price changes are detected by exact decimal equality on the raw price.
///
/// # Arguments
///
/// * `storage` - The storage backend
/// * `record` - The normalized product
///
/// # Returns
///
/// * `Ok(ReconcileOutcome)` - What was written
/// * `Err(StorageError)` - The transaction was rolled back
pub fn reconcile<S: Storage>(
    storage: &mut S,
    record: &ProductRecord,
) -> StorageResult<ReconcileOutcome> {
    storage.transaction(|s| {
        let category_id = s.get_or_create_category(&record.store_name, &record.category)?;

        match s.find_product(&record.store_name, category_id, &record.source_id)? {
            None => {
                let product_id = s.insert_product(category_id, record)?;
                Ok(ReconcileOutcome::Created { product_id })
            }
            Some(existing) if existing.price != record.price => {
                s.append_price_history(existing.id, record)?;
                s.update_product(existing.id, record)?;
                Ok(ReconcileOutcome::PriceChanged {
                    product_id: existing.id,
                    old: existing.price,
                    new: record.price,
                })
            }
            Some(existing) => {
                s.refresh_product(existing.id, record)?;
                Ok(ReconcileOutcome::Unchanged {
                    product_id: existing.id,
                })
            }
        }
    })
}

/// Reconciles a batch of records, one transaction each
///
/// A failing record is logged and counted; the rest of the batch continues.
pub fn reconcile_batch<S: Storage>(storage: &mut S, records: &[ProductRecord]) -> BatchSummary {
    let mut summary = BatchSummary::default();

    for record in records {
        match reconcile(storage, record) {
            Ok(outcome) => {
                if let ReconcileOutcome::PriceChanged { old, new, .. } = outcome {
                    tracing::debug!(
                        "Price change for '{}' ({}): {} -> {}",
                        record.name,
                        record.store_name,
                        old,
                        new
                    );
                }
                summary.record(&outcome);
            }
            Err(e) => {
                tracing::warn!(
                    "Failed to save '{}' from {}: {}",
                    record.name,
                    record.store_name,
                    e
                );
                summary.errors += 1;
            }
        }
    }

    summary
}

/// Builds a storable record from a scraped product
///
/// Returns `None` when the product has no parsable price; such products are
/// never stored.
pub fn normalize_scraped(
    store: &StoreConfig,
    category: &str,
    product: &ScrapedProduct,
    scraped_at: DateTime<Utc>,
) -> Option<ProductRecord> {
    let raw = product.raw_price?;
    let taxed = normalize_for_store(raw, store, &product.name);

    Some(ProductRecord {
        store_name: store.name.clone(),
        store_type: store.store_type,
        category: category.to_string(),
        source_id: product.source_id.clone(),
        name: product.name.clone(),
        sku: product.sku.clone(),
        price: raw,
        price_before_tax: taxed.pre_tax,
        price_after_tax: taxed.post_tax,
        currency: store.currency.clone(),
        stock_status: product.stock_status,
        product_url: product.product_url.clone(),
        image_url: product.image_url.clone(),
        description: product.description.clone(),
        scraped_at,
    })
}
