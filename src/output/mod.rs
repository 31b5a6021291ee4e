//! Output module for exports and reports
//!
//! This module handles:
//! - CSV snapshots of the product table after every run
//! - CSV import through the reconciler
//! - Database statistics and price comparisons for the CLI

mod csv_export;
pub mod stats;

pub use csv_export::{export_snapshot, import_csv, CsvRow, ExportPaths, ImportSummary, CSV_COLUMNS};
pub use stats::{compare_prices, load_statistics, print_comparison, print_statistics, PriceStatistics};
