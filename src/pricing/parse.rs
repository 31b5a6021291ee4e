//! Price and text extraction from store HTML fragments

use rust_decimal::Decimal;
use scraper::{Html, Selector};
use regex::Regex;
use std::str::FromStr;
use std::sync::OnceLock;

fn price_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    // Constant pattern, validated by the tests below
    PATTERN.get_or_init(|| Regex::new(r"\d[\d,]*(?:\.\d+)?").expect("valid price pattern"))
}

/// Strips tags from an HTML fragment and collapses whitespace
///
/// Returns `None` for empty input or fragments without visible text.
pub fn clean_html(fragment: &str) -> Option<String> {
    if fragment.trim().is_empty() {
        return None;
    }

    let parsed = Html::parse_fragment(fragment);
    let text = parsed
        .root_element()
        .text()
        .flat_map(|chunk| chunk.split_whitespace())
        .collect::<Vec<_>>()
        .join(" ");

    if text.is_empty() {
        None
    } else {
        Some(text)
    }
}

/// Extracts the numeric price from a WooCommerce price fragment
///
/// Sale markup (`<del>old</del> <ins>new</ins>`) yields the `<ins>` price.
/// Thousands separators are dropped.
///
/// # Example
///
/// ```
/// use pricewatch::pricing::extract_price;
///
/// let price = extract_price(r#"<span class="amount">$1,299.50</span>"#).unwrap();
/// assert_eq!(price.to_string(), "1299.50");
/// ```
pub fn extract_price(price_html: &str) -> Option<Decimal> {
    if price_html.trim().is_empty() {
        return None;
    }

    let text = sale_price_text(price_html).or_else(|| clean_html(price_html))?;
    parse_price_text(&text)
}

/// Parses the first number in a plain-text price string
pub fn parse_price_text(text: &str) -> Option<Decimal> {
    price_pattern()
        .find_iter(text)
        .find_map(|m| Decimal::from_str(&m.as_str().replace(',', "")).ok())
}

/// Converts a Store API amount in minor units (`"129900"`, 2) to a price
pub fn parse_minor_units(amount: &str, minor_unit: u32) -> Option<Decimal> {
    let units = amount.trim().parse::<i64>().ok()?;
    Decimal::try_new(units, minor_unit).ok()
}

fn sale_price_text(price_html: &str) -> Option<String> {
    let fragment = Html::parse_fragment(price_html);
    let selector = Selector::parse("ins").ok()?;
    let ins = fragment.select(&selector).next()?;
    let text = ins.text().collect::<String>();
    let text = text.trim();
    if text.is_empty() {
        None
    } else {
        Some(text.to_string())
    }
}
