//! VAT normalization
//!
//! Stores either list prices with VAT already applied or without it. Both
//! forms are derived here so every stored product carries a pre-tax and a
//! post-tax price.

use crate::config::StoreConfig;
use rust_decimal::{Decimal, RoundingStrategy};

/// Lebanese VAT, 11%
pub const LEBANESE_VAT: Decimal = Decimal::from_parts(11, 0, 0, false, 2);

/// A price split into its pre-tax and post-tax forms, both rounded to cents
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaxedPrice {
    pub pre_tax: Decimal,
    pub post_tax: Decimal,
}

/// Rounds to two decimal places, midpoints away from zero, keeping a fixed
/// scale of two so `111` is rendered as `111.00`
pub fn round_currency(value: Decimal) -> Decimal {
    let mut rounded = value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
    rounded.rescale(2);
    rounded
}

/// Derives pre-tax and post-tax prices from a scraped price
///
/// | Case | pre-tax | post-tax |
/// |------|---------|----------|
/// | exempt | raw | raw |
/// | tax included | raw / (1 + rate) | raw |
/// | tax excluded | raw | raw * (1 + rate) |
///
/// # Arguments
///
/// * `raw` - The price as listed by the store
/// * `tax_included` - Whether the listed price already contains VAT
/// * `rate` - VAT rate as a fraction (0.11 for 11%)
/// * `exempt` - Whether the product carries no VAT at all
///
/// # Example
///
/// ```
/// use pricewatch::pricing::{normalize_price, LEBANESE_VAT};
/// use rust_decimal::Decimal;
///
/// let taxed = normalize_price(Decimal::from(100), false, LEBANESE_VAT, false);
/// assert_eq!(taxed.post_tax, Decimal::from(111));
/// ```
pub fn normalize_price(raw: Decimal, tax_included: bool, rate: Decimal, exempt: bool) -> TaxedPrice {
    let multiplier = Decimal::ONE + rate;

    let (pre_tax, post_tax) = if exempt {
        (raw, raw)
    } else if tax_included {
        (raw / multiplier, raw)
    } else {
        (raw, raw * multiplier)
    };

    TaxedPrice {
        pre_tax: round_currency(pre_tax),
        post_tax: round_currency(post_tax),
    }
}

/// Applies a store's tax settings to a scraped price
pub fn normalize_for_store(raw: Decimal, store: &StoreConfig, product_name: &str) -> TaxedPrice {
    normalize_price(
        raw,
        store.tax_included,
        store.tax_rate,
        store.is_tax_exempt(product_name),
    )
}
