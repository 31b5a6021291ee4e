//! WooCommerce product JSON parsing
//!
//! Handles both the Store API shape (`prices.price` in minor units) and the
//! REST v2/v3 shape (`price` as a string). The same item shape is embedded in
//! some category pages, so the HTML extractor reuses [`parse_items`].

use crate::crawler::ScrapedProduct;
use crate::pricing::{clean_html, extract_price, parse_minor_units, parse_price_text};
use crate::storage::StockStatus;
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::Value;
use std::str::FromStr;

/// Products parsed from one listing page
#[derive(Debug, Default)]
pub struct ParsedListing {
    pub products: Vec<ScrapedProduct>,
    /// Items dropped for a malformed shape or a missing name or id
    pub skipped: u64,
}

#[derive(Debug, Deserialize)]
struct WooProduct {
    #[serde(default)]
    id: Option<Value>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    sku: Option<String>,
    #[serde(default)]
    permalink: Option<String>,
    #[serde(default)]
    price_html: Option<String>,
    #[serde(default)]
    prices: Option<StorePrices>,
    #[serde(default)]
    price: Option<Value>,
    #[serde(default)]
    is_in_stock: Option<bool>,
    #[serde(default)]
    stock_status: Option<String>,
    #[serde(default)]
    images: Option<Vec<WooImage>>,
    #[serde(default)]
    short_description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StorePrices {
    #[serde(default)]
    price: Option<String>,
    #[serde(default)]
    currency_minor_unit: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct WooImage {
    #[serde(default)]
    src: Option<String>,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

impl WooProduct {
    fn raw_price(&self) -> Option<Decimal> {
        if let Some(price) = self.price_html.as_deref().and_then(extract_price) {
            return Some(price);
        }

        if let Some(prices) = &self.prices {
            let minor_unit = prices.currency_minor_unit.unwrap_or(2);
            if let Some(price) = prices
                .price
                .as_deref()
                .and_then(|amount| parse_minor_units(amount, minor_unit))
            {
                return Some(price);
            }
        }

        match &self.price {
            Some(Value::String(s)) => parse_price_text(s),
            Some(Value::Number(n)) => Decimal::from_str(&n.to_string()).ok(),
            _ => None,
        }
    }

    fn stock_status(&self) -> StockStatus {
        let in_stock = self
            .is_in_stock
            .or_else(|| self.stock_status.as_deref().map(|s| s == "instock"))
            .unwrap_or(false);
        StockStatus::from_availability(in_stock)
    }

    fn into_scraped(self) -> Option<ScrapedProduct> {
        let name = self.name.as_deref().and_then(clean_html)?;
        let raw_price = self.raw_price();
        let stock_status = self.stock_status();

        let product_url = non_empty(self.permalink);
        let source_id = match self.id {
            Some(Value::Number(n)) => Some(n.to_string()),
            Some(Value::String(s)) => non_empty(Some(s)),
            _ => None,
        }
        .or_else(|| product_url.clone())?;

        let image_url = self
            .images
            .unwrap_or_default()
            .into_iter()
            .find_map(|image| non_empty(image.src));

        Some(ScrapedProduct {
            source_id,
            name,
            raw_price,
            stock_status,
            product_url,
            sku: non_empty(self.sku),
            image_url,
            description: self.short_description.as_deref().and_then(clean_html),
        })
    }
}

/// Parses a JSON array of product objects
///
/// An item that fails to parse is skipped and counted; it never fails the
/// page.
pub fn parse_items(items: Vec<Value>) -> ParsedListing {
    let mut listing = ParsedListing::default();

    for item in items {
        let parsed = serde_json::from_value::<WooProduct>(item)
            .ok()
            .and_then(WooProduct::into_scraped);

        match parsed {
            Some(product) => listing.products.push(product),
            None => {
                tracing::debug!("Skipping malformed product item");
                listing.skipped += 1;
            }
        }
    }

    listing
}

/// Parses one API page body
///
/// # Returns
///
/// * `Some(ParsedListing)` - The body is a JSON array (possibly empty)
/// * `None` - The body is not a product array
pub fn parse_api_page(body: &str) -> Option<ParsedListing> {
    match serde_json::from_str::<Value>(body) {
        Ok(Value::Array(items)) => Some(parse_items(items)),
        Ok(_) => None,
        Err(e) => {
            tracing::debug!("API page is not JSON: {}", e);
            None
        }
    }
}
