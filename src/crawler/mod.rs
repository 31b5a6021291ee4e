//! Crawler module for store scraping
//!
//! This module contains the core scraping logic, including:
//! - HTTP fetching with retry logic
//! - WooCommerce API discovery
//! - API and HTML product extraction
//! - Overall run coordination

mod api;
mod context;
mod coordinator;
mod discovery;
mod extractor;
mod fetcher;
mod html;

pub use api::{parse_api_page, parse_items, ParsedListing};
pub use context::{Counter, CrawlContext, RunStats, StatsSnapshot};
pub use coordinator::{run_crawl, Coordinator, RunSummary};
pub use discovery::{discover_api, ApiEndpoint, PROBE_PATHS};
pub use extractor::{scrape_category, CategoryReport, ExtractionStrategy, ScrapedProduct};
pub use fetcher::{build_http_client, fetch_url, fetch_with_retry, FetchResult};
pub use html::{parse_category_page, parse_product_grid};
