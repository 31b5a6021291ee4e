//! WooCommerce JSON API discovery
//!
//! Probes the well-known WooCommerce product endpoints of a store. The first
//! one answering 200 with a non-empty JSON array wins; any failure falls
//! through to the next path and, eventually, to HTML extraction.

use crate::config::StoreConfig;
use crate::crawler::fetcher::{fetch_url, FetchResult};
use reqwest::Client;
use std::time::Duration;

/// Probe paths, in order of preference
pub const PROBE_PATHS: &[&str] = &[
    "/wp-json/wc/store/products",
    "/wp-json/wc/v3/products",
    "/wp-json/wc/v2/products",
    "/?wc-ajax=get_products",
];

/// A product listing endpoint that answered the probe
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiEndpoint {
    url: String,
}

impl ApiEndpoint {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// URL of one page of a category listing
    pub fn page_url(&self, category: &str, page: u32) -> String {
        let separator = if self.url.contains('?') { '&' } else { '?' };
        format!(
            "{}{}category={}&page={}",
            self.url, separator, category, page
        )
    }
}

/// Looks for a usable product API on a store
///
/// Each path gets a single attempt bounded by `timeout`. Stores with
/// discovery disabled or without categories are never probed.
///
/// # Returns
///
/// * `Some(ApiEndpoint)` - The first endpoint returning products
/// * `None` - The store must be scraped as HTML
pub async fn discover_api(
    client: &Client,
    store: &StoreConfig,
    timeout: Duration,
) -> Option<ApiEndpoint> {
    if !store.discover_api {
        tracing::debug!("API discovery disabled for {}", store.name);
        return None;
    }

    let category = store.categories.first()?;

    for path in PROBE_PATHS {
        let endpoint = ApiEndpoint::new(format!("{}{}", store.root_url(), path));
        let probe_url = endpoint.page_url(category, 1);
        tracing::debug!("Probing {} for {}", probe_url, store.name);

        match fetch_url(client, &probe_url, Some(timeout)).await {
            FetchResult::Success { body, .. } => {
                if is_product_array(&body) {
                    tracing::info!("Discovered API for {}: {}", store.name, endpoint.url());
                    return Some(endpoint);
                }
                tracing::debug!("{} did not return a product array", probe_url);
            }
            FetchResult::HttpError { status_code } => {
                tracing::debug!("{} answered HTTP {}", probe_url, status_code);
            }
            FetchResult::NetworkError { error, .. } => {
                tracing::debug!("{} failed: {}", probe_url, error);
            }
        }
    }

    tracing::info!("No API found for {}, using HTML extraction", store.name);
    None
}

fn is_product_array(body: &str) -> bool {
    matches!(
        serde_json::from_str::<serde_json::Value>(body),
        Ok(serde_json::Value::Array(items)) if !items.is_empty()
    )
}
