//! Price handling: VAT normalization and price extraction
//!
//! All arithmetic uses `rust_decimal`; prices never pass through floating
//! point.

mod parse;
mod tax;

pub use parse::{clean_html, extract_price, parse_minor_units, parse_price_text};
pub use tax::{normalize_for_store, normalize_price, round_currency, TaxedPrice, LEBANESE_VAT};
