//! Statistics and price comparison from the product database
//!
//! This module provides functionality for extracting and displaying
//! database statistics and cross-store price comparisons.

use crate::storage::{RunRecord, Storage, StoredProduct};
use crate::PriceWatchError;

/// Database statistics summary
#[derive(Debug, Clone)]
pub struct PriceStatistics {
    /// Total number of products
    pub total_products: u64,

    /// Product count per store, sorted by store name
    pub products_by_store: Vec<(String, u64)>,

    /// Number of categories across all stores
    pub total_categories: u64,

    /// Number of recorded price changes
    pub price_history_entries: u64,

    /// The most recent run, if any
    pub latest_run: Option<RunRecord>,
}

/// Loads statistics from storage
///
/// # Arguments
///
/// * `storage` - The storage backend to query
///
/// # Returns
///
/// * `Ok(PriceStatistics)` - Successfully loaded statistics
/// * `Err(PriceWatchError)` - Failed to query statistics
pub fn load_statistics(storage: &dyn Storage) -> Result<PriceStatistics, PriceWatchError> {
    Ok(PriceStatistics {
        total_products: storage.count_products()?,
        products_by_store: storage.count_products_by_store()?,
        total_categories: storage.count_categories()?,
        price_history_entries: storage.count_price_history()?,
        latest_run: storage.get_latest_run()?,
    })
}

/// Prints statistics to stdout in a formatted manner
///
/// # Arguments
///
/// * `stats` - The statistics to display
pub fn print_statistics(stats: &PriceStatistics) {
    println!("=== Price Database Statistics ===\n");

    println!("Overview:");
    println!("  Total products: {}", stats.total_products);
    println!("  Categories: {}", stats.total_categories);
    println!("  Price changes recorded: {}", stats.price_history_entries);
    println!();

    if !stats.products_by_store.is_empty() {
        println!("Products by Store:");
        for (store, count) in &stats.products_by_store {
            let percentage = if stats.total_products > 0 {
                (*count as f64 / stats.total_products as f64) * 100.0
            } else {
                0.0
            };
            println!("  {}: {} ({:.1}%)", store, count, percentage);
        }
        println!();
    }

    match &stats.latest_run {
        Some(run) => {
            println!("Latest Run:");
            println!("  ID: {}", run.id);
            println!("  Started: {}", run.started_at);
            if let Some(finished) = &run.finished_at {
                println!("  Finished: {}", finished);
            }
            println!("  Status: {}", run.status.to_db_string());
        }
        None => println!("No runs recorded yet."),
    }
}

/// Finds products matching `term` across all stores, cheapest first
///
/// Ordering uses the post-tax price so stores with different VAT handling
/// compare fairly.
pub fn compare_prices(
    storage: &dyn Storage,
    term: &str,
) -> Result<Vec<StoredProduct>, PriceWatchError> {
    let mut products = storage.search_products(term)?;
    products.sort_by(|a, b| {
        a.price_after_tax
            .cmp(&b.price_after_tax)
            .then_with(|| a.store_name.cmp(&b.store_name))
    });
    Ok(products)
}

/// Prints a price comparison table
pub fn print_comparison(term: &str, products: &[StoredProduct]) {
    println!("=== Price Comparison: \"{}\" ===\n", term);

    if products.is_empty() {
        println!("No matching products.");
        return;
    }

    println!(
        "{:<20} {:>12} {:>12} {:<12} {}",
        "Store", "Before tax", "After tax", "Stock", "Product"
    );
    for product in products {
        println!(
            "{:<20} {:>12} {:>12} {:<12} {}",
            product.store_name,
            format!("{} {}", product.price_before_tax, product.currency),
            format!("{} {}", product.price_after_tax, product.currency),
            product.stock_status.to_db_string(),
            product.name
        );
    }
    println!("\n{} products", products.len());
}
