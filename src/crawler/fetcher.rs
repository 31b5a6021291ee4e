//! HTTP fetcher implementation
//!
//! This module handles all HTTP requests for the scraper, including:
//! - Building the shared HTTP client
//! - GET requests for category pages and API pages
//! - Retry logic for timeouts and connection failures
//! - Error classification

use crate::config::CrawlerConfig;
use crate::crawler::RunStats;
use reqwest::{redirect::Policy, Client, StatusCode};
use std::time::Duration;

/// Result of a fetch operation
#[derive(Debug)]
pub enum FetchResult {
    /// Got a 200 response
    Success {
        /// Final URL after redirects
        final_url: String,
        /// Response body
        body: String,
    },

    /// Any status other than 200
    HttpError {
        /// The HTTP status code
        status_code: u16,
    },

    /// Network error (connection refused, timeout, etc.)
    NetworkError {
        /// Error description
        error: String,
        /// Whether another attempt could succeed
        retryable: bool,
    },
}

/// Builds an HTTP client with proper configuration
///
/// # Arguments
///
/// * `config` - The crawler configuration (user agent and timeouts)
///
/// # Returns
///
/// * `Ok(Client)` - Successfully built HTTP client
/// * `Err(reqwest::Error)` - Failed to build client
///
/// # Example
///
/// ```no_run
/// use pricewatch::config::CrawlerConfig;
/// use pricewatch::crawler::build_http_client;
///
/// let client = build_http_client(&CrawlerConfig::default()).unwrap();
/// ```
pub fn build_http_client(config: &CrawlerConfig) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(config.user_agent.clone())
        .timeout(Duration::from_secs(config.request_timeout))
        .connect_timeout(Duration::from_secs(config.request_timeout.min(10)))
        .redirect(Policy::limited(5))
        .gzip(true)
        .brotli(true)
        .build()
}

/// Sends a single GET request
///
/// # Arguments
///
/// * `client` - The HTTP client to use
/// * `url` - The URL to fetch
/// * `timeout` - Overrides the client timeout when set
pub async fn fetch_url(client: &Client, url: &str, timeout: Option<Duration>) -> FetchResult {
    let mut request = client
        .get(url)
        .header(reqwest::header::ACCEPT, "text/html,application/json;q=0.9,*/*;q=0.8");
    if let Some(timeout) = timeout {
        request = request.timeout(timeout);
    }

    match request.send().await {
        Ok(response) => {
            let status = response.status();
            let final_url = response.url().to_string();

            if status != StatusCode::OK {
                return FetchResult::HttpError {
                    status_code: status.as_u16(),
                };
            }

            match response.text().await {
                Ok(body) => FetchResult::Success { final_url, body },
                Err(e) => FetchResult::NetworkError {
                    error: e.to_string(),
                    retryable: e.is_timeout(),
                },
            }
        }
        Err(e) => {
            if e.is_timeout() {
                FetchResult::NetworkError {
                    error: "Request timeout".to_string(),
                    retryable: true,
                }
            } else if e.is_connect() {
                FetchResult::NetworkError {
                    error: format!("Connection failed: {}", e),
                    retryable: true,
                }
            } else {
                FetchResult::NetworkError {
                    error: e.to_string(),
                    retryable: false,
                }
            }
        }
    }
}

/// Fetches a URL, retrying timeouts and connection failures
///
/// # Retry Logic
///
/// | Condition | Action |
/// |-----------|--------|
/// | HTTP 200 | Return body |
/// | Other HTTP status | Immediate, no retry |
/// | Timeout | Retry up to `max_retries` attempts |
/// | Connection failure | Retry up to `max_retries` attempts |
/// | Other errors | Immediate, no retry |
///
/// Attempt `n` waits `retry_delay * n` milliseconds before the next one.
pub async fn fetch_with_retry(
    client: &Client,
    url: &str,
    config: &CrawlerConfig,
    stats: &RunStats,
) -> FetchResult {
    let attempts = config.max_retries.max(1);
    let mut attempt = 1;

    loop {
        let result = fetch_url(client, url, None).await;

        match &result {
            FetchResult::NetworkError {
                error,
                retryable: true,
            } if attempt < attempts => {
                let delay = Duration::from_millis(config.retry_delay * attempt as u64);
                tracing::warn!(
                    "Attempt {}/{} for {} failed ({}), retrying in {:?}",
                    attempt,
                    attempts,
                    url,
                    error,
                    delay
                );
                stats.pages_retried.inc();
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            _ => return result,
        }
    }
}
