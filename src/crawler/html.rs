//! HTML category page parsing
//!
//! Product data is taken from, in order:
//! - `<script type="application/json">` holding an array or `{"products": [...]}`
//! - an inline `var products = [...];` assignment
//! - the WooCommerce product grid (`li.product`)

use crate::crawler::api::{parse_items, ParsedListing};
use crate::crawler::ScrapedProduct;
use crate::pricing::{clean_html, extract_price};
use crate::storage::StockStatus;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use serde_json::Value;
use std::sync::OnceLock;
use url::Url;

fn inline_products_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?s)var\s+products\s*=\s*(\[.*?\])\s*;").expect("valid inline pattern")
    })
}

/// Parses one category page into products
///
/// # Arguments
///
/// * `html` - The page body
/// * `page_url` - The URL the page was fetched from, for resolving links
pub fn parse_category_page(html: &str, page_url: &Url) -> ParsedListing {
    let document = Html::parse_document(html);

    if let Some(listing) = embedded_json_products(&document) {
        return listing;
    }

    if let Some(listing) = inline_script_products(html) {
        return listing;
    }

    parse_product_grid(&document, page_url)
}

fn embedded_json_products(document: &Html) -> Option<ParsedListing> {
    let selector = Selector::parse(r#"script[type="application/json"]"#).ok()?;

    document.select(&selector).find_map(|script| {
        let text = script.text().collect::<String>();
        let items = match serde_json::from_str::<Value>(text.trim()).ok()? {
            Value::Array(items) => items,
            Value::Object(mut map) => match map.remove("products") {
                Some(Value::Array(items)) => items,
                _ => return None,
            },
            _ => return None,
        };
        non_empty_listing(items)
    })
}

fn inline_script_products(html: &str) -> Option<ParsedListing> {
    let captures = inline_products_pattern().captures(html)?;
    let items = serde_json::from_str::<Vec<Value>>(captures.get(1)?.as_str()).ok()?;
    non_empty_listing(items)
}

fn non_empty_listing(items: Vec<Value>) -> Option<ParsedListing> {
    let listing = parse_items(items);
    if listing.products.is_empty() {
        None
    } else {
        Some(listing)
    }
}

struct GridSelectors {
    product: Selector,
    title: Selector,
    price: Selector,
    link: Selector,
    id_holder: Selector,
    image: Selector,
}

impl GridSelectors {
    fn new() -> Option<Self> {
        Some(Self {
            product: Selector::parse("li.product").ok()?,
            title: Selector::parse(".woocommerce-loop-product__title, h2, h3").ok()?,
            price: Selector::parse(".price").ok()?,
            link: Selector::parse("a.woocommerce-LoopProduct-link[href], a[href]").ok()?,
            id_holder: Selector::parse("[data-product_id]").ok()?,
            image: Selector::parse("img").ok()?,
        })
    }
}

/// Parses the `li.product` grid of a WooCommerce category page
pub fn parse_product_grid(document: &Html, page_url: &Url) -> ParsedListing {
    let mut listing = ParsedListing::default();
    let Some(selectors) = GridSelectors::new() else {
        return listing;
    };

    for element in document.select(&selectors.product) {
        match parse_grid_item(element, &selectors, page_url) {
            Some(product) => listing.products.push(product),
            None => {
                tracing::debug!("Skipping grid item without title or link");
                listing.skipped += 1;
            }
        }
    }

    listing
}

fn parse_grid_item(
    element: ElementRef,
    selectors: &GridSelectors,
    page_url: &Url,
) -> Option<ScrapedProduct> {
    let name = element
        .select(&selectors.title)
        .next()
        .and_then(|title| clean_html(&title.inner_html()))?;

    let raw_price = element
        .select(&selectors.price)
        .next()
        .and_then(|price| extract_price(&price.inner_html()));

    let product_url = element
        .select(&selectors.link)
        .filter_map(|a| a.value().attr("href"))
        .find_map(|href| page_url.join(href).ok())
        .map(|url| url.to_string());

    let id_holder = element.select(&selectors.id_holder).next();
    let product_id = id_holder
        .and_then(|holder| holder.value().attr("data-product_id"))
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map(str::to_string)
        .or_else(|| post_id_from_classes(element));
    let sku = id_holder
        .and_then(|holder| holder.value().attr("data-product_sku"))
        .map(str::trim)
        .filter(|sku| !sku.is_empty())
        .map(str::to_string);

    let image_url = element.select(&selectors.image).next().and_then(|img| {
        let value = img.value();
        ["data-src", "data-lazy-src", "src"]
            .iter()
            .filter_map(|attr| value.attr(attr))
            .find(|src| !src.is_empty() && !src.starts_with("data:"))
            .and_then(|src| page_url.join(src).ok())
            .map(|url| url.to_string())
    });

    let out_of_stock = element.value().classes().any(|class| class == "outofstock");

    let source_id = product_id.or_else(|| product_url.clone())?;

    Some(ScrapedProduct {
        source_id,
        name,
        raw_price,
        stock_status: StockStatus::from_availability(!out_of_stock),
        product_url,
        sku,
        image_url,
        description: None,
    })
}

/// WooCommerce tags grid items with a `post-<id>` class
fn post_id_from_classes(element: ElementRef) -> Option<String> {
    element.value().classes().find_map(|class| {
        class
            .strip_prefix("post-")
            .filter(|id| !id.is_empty() && id.chars().all(|c| c.is_ascii_digit()))
            .map(str::to_string)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;
    use std::str::FromStr;

    fn page_url() -> Url {
        Url::parse("https://shop.example.com/product-category/cpu/").unwrap()
    }

    const GRID: &str = r#"
        <html><body><ul class="products">
          <li class="product type-product post-101 instock">
            <a href="/product/ryzen-5/" class="woocommerce-LoopProduct-link">
              <img src="/img/r5.jpg">
              <h2 class="woocommerce-loop-product__title">AMD Ryzen 5 7600</h2>
              <span class="price"><del>$229.00</del> <ins>$199.00</ins></span>
            </a>
            <a href="?add-to-cart=101" data-product_id="101" data-product_sku="R5-7600">Add</a>
          </li>
          <li class="product type-product post-102 outofstock">
            <a href="https://shop.example.com/product/i5/">
              <h2 class="woocommerce-loop-product__title">Intel Core i5</h2>
              <span class="price">$1,050.00</span>
            </a>
          </li>
          <li class="product">
            <span class="price">$5.00</span>
          </li>
        </ul></body></html>
    "#;

    #[test]
    fn test_parse_grid() {
        let listing = parse_category_page(GRID, &page_url());
        assert_eq!(listing.products.len(), 2);
        assert_eq!(listing.skipped, 1);

        let ryzen = &listing.products[0];
        assert_eq!(ryzen.source_id, "101");
        assert_eq!(ryzen.name, "AMD Ryzen 5 7600");
        assert_eq!(ryzen.raw_price, Some(Decimal::from_str("199.00").unwrap()));
        assert_eq!(ryzen.sku.as_deref(), Some("R5-7600"));
        assert_eq!(
            ryzen.product_url.as_deref(),
            Some("https://shop.example.com/product/ryzen-5/")
        );
        assert_eq!(
            ryzen.image_url.as_deref(),
            Some("https://shop.example.com/img/r5.jpg")
        );
        assert_eq!(ryzen.stock_status, StockStatus::InStock);

        let intel = &listing.products[1];
        assert_eq!(intel.source_id, "102");
        assert_eq!(intel.raw_price, Some(Decimal::from_str("1050.00").unwrap()));
        assert_eq!(intel.stock_status, StockStatus::OutOfStock);
    }

    #[test]
    fn test_embedded_json_preferred() {
        let html = r#"<html><head>
            <script type="application/json">{"products": [{"id": 9, "name": "GPU", "price": "499"}]}</script>
            </head><body><ul><li class="product"><h2>Ignored</h2></li></ul></body></html>"#;

        let listing = parse_category_page(html, &page_url());
        assert_eq!(listing.products.len(), 1);
        assert_eq!(listing.products[0].name, "GPU");
    }

    #[test]
    fn test_inline_products_variable() {
        let html = r#"<html><body><script>
            var products = [{"id": 3, "name": "SSD", "price": "80", "images": [{"src": "a.jpg"}]}];
            </script></body></html>"#;

        let listing = parse_category_page(html, &page_url());
        assert_eq!(listing.products.len(), 1);
        assert_eq!(listing.products[0].source_id, "3");
    }

    #[test]
    fn test_unrelated_json_script_is_ignored() {
        let html = r#"<html><head>
            <script type="application/json">{"settings": true}</script>
            </head><body><ul><li class="product post-7"><a href="/p/7"><h3>Case</h3></a>
            <span class="price">$40</span></li></ul></body></html>"#;

        let listing = parse_category_page(html, &page_url());
        assert_eq!(listing.products.len(), 1);
        assert_eq!(listing.products[0].source_id, "7");
    }

    #[test]
    fn test_empty_page() {
        let html = "<html><body><p>No products were found.</p></body></html>";
        let listing = parse_category_page(html, &page_url());
        assert!(listing.products.is_empty());
        assert_eq!(listing.skipped, 0);
    }
}
