//! Category extraction: pagination, parsing and persistence of one category

use crate::config::StoreConfig;
use crate::crawler::api::{parse_api_page, ParsedListing};
use crate::crawler::discovery::ApiEndpoint;
use crate::crawler::fetcher::{fetch_with_retry, FetchResult};
use crate::crawler::html::parse_category_page;
use crate::crawler::CrawlContext;
use crate::reconcile::{normalize_scraped, reconcile_batch};
use crate::storage::{ProductRecord, StockStatus};
use chrono::Utc;
use rust_decimal::Decimal;
use url::Url;

/// A product as read from a store, before tax normalization
#[derive(Debug, Clone, PartialEq)]
pub struct ScrapedProduct {
    /// Store product id, or the product URL when the store exposes none
    pub source_id: String,
    pub name: String,
    /// `None` when no price could be parsed
    pub raw_price: Option<Decimal>,
    pub stock_status: StockStatus,
    pub product_url: Option<String>,
    pub sku: Option<String>,
    pub image_url: Option<String>,
    pub description: Option<String>,
}

/// How a store's categories are read
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExtractionStrategy {
    Api(ApiEndpoint),
    Html,
}

impl ExtractionStrategy {
    /// Picks the strategy for a store from its discovery result
    ///
    /// The API is only used when discovery is enabled for the store.
    pub fn for_store(store: &StoreConfig, discovered: Option<ApiEndpoint>) -> Self {
        match discovered {
            Some(endpoint) if store.discover_api => Self::Api(endpoint),
            _ => Self::Html,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Api(_) => "api",
            Self::Html => "html",
        }
    }

    /// URL of one page of a category
    pub fn page_url(&self, store: &StoreConfig, category: &str, page: u32) -> String {
        match self {
            Self::Api(endpoint) => endpoint.page_url(category, page),
            Self::Html if page <= 1 => {
                format!("{}/product-category/{}/", store.root_url(), category)
            }
            Self::Html => format!(
                "{}/product-category/{}/page/{}/",
                store.root_url(),
                category,
                page
            ),
        }
    }

    fn parse(&self, body: &str, page_url: &str) -> Option<ParsedListing> {
        match self {
            Self::Api(_) => parse_api_page(body),
            Self::Html => {
                let url = Url::parse(page_url).ok()?;
                Some(parse_category_page(body, &url))
            }
        }
    }
}

/// Outcome of scraping one category
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CategoryReport {
    pub pages: u32,
    pub products: u64,
    /// True when the first page could not be fetched or parsed
    pub failed: bool,
}

/// Scrapes every page of one category and reconciles its products
///
/// Pages are fetched sequentially from 1 up to `max_pages`. Pagination stops
/// at the first page that is not a 200, does not parse, yields no products,
/// or repeats the previous page.
pub async fn scrape_category(
    ctx: &CrawlContext,
    store: &StoreConfig,
    strategy: &ExtractionStrategy,
    category: &str,
) -> CategoryReport {
    let mut report = CategoryReport::default();
    let mut previous_ids: Vec<String> = Vec::new();

    for page in 1..=ctx.config.crawler.max_pages {
        let url = strategy.page_url(store, category, page);
        tracing::debug!("Fetching {}", url);

        let body = match fetch_with_retry(&ctx.client, &url, &ctx.config.crawler, &ctx.stats).await
        {
            FetchResult::Success { final_url, body } => {
                if page > 1 && matches!(strategy, ExtractionStrategy::Html) && final_url != url {
                    tracing::debug!("{} redirected to {}, last page reached", url, final_url);
                    break;
                }
                body
            }
            FetchResult::HttpError { status_code } => {
                tracing::debug!("{} answered HTTP {}, stopping", url, status_code);
                if page == 1 {
                    ctx.stats.pages_failed.inc();
                    report.failed = true;
                }
                break;
            }
            FetchResult::NetworkError { error, .. } => {
                tracing::warn!("Giving up on {}: {}", url, error);
                ctx.stats.pages_failed.inc();
                report.failed = page == 1;
                break;
            }
        };
        ctx.stats.pages_fetched.inc();

        let Some(listing) = strategy.parse(&body, &url) else {
            tracing::warn!("Could not parse {}", url);
            ctx.stats.pages_failed.inc();
            report.failed = page == 1;
            break;
        };

        ctx.stats.products_skipped.add(listing.skipped);
        if listing.products.is_empty() {
            break;
        }

        let ids: Vec<String> = listing
            .products
            .iter()
            .map(|p| p.source_id.clone())
            .collect();
        if ids == previous_ids {
            tracing::debug!("{} repeats the previous page, stopping", url);
            break;
        }

        let saved = persist_listing(ctx, store, category, &listing);
        report.pages += 1;
        report.products += saved;

        tracing::info!(
            "{} / {} page {}: {} products",
            store.name,
            category,
            page,
            listing.products.len()
        );

        previous_ids = ids;
    }

    report
}

/// Normalizes and reconciles one page of products, returning how many were
/// handed to storage
fn persist_listing(
    ctx: &CrawlContext,
    store: &StoreConfig,
    category: &str,
    listing: &ParsedListing,
) -> u64 {
    let scraped_at = Utc::now();
    ctx.stats.total_fetched.add(listing.products.len() as u64);

    let records: Vec<ProductRecord> = listing
        .products
        .iter()
        .filter_map(|product| {
            let record = normalize_scraped(store, category, product, scraped_at);
            if record.is_none() {
                tracing::debug!("Skipping '{}': no parsable price", product.name);
                ctx.stats.products_skipped.inc();
            }
            record
        })
        .collect();

    if records.is_empty() {
        return 0;
    }

    let summary = match ctx.lock_storage() {
        Ok(mut storage) => reconcile_batch(&mut *storage, &records),
        Err(e) => {
            tracing::error!("Cannot save {} products: {}", records.len(), e);
            ctx.stats.db_errors.add(records.len() as u64);
            return 0;
        }
    };

    ctx.stats.record_batch(&summary);
    records.len() as u64
}
