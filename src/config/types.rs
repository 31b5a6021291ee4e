use crate::pricing::LEBANESE_VAT;
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer};
use std::str::FromStr;

/// Main configuration structure for pricewatch
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub crawler: CrawlerConfig,
    pub output: OutputConfig,
    #[serde(default)]
    pub schedule: ScheduleConfig,
    /// Stores to scrape; empty means the built-in presets
    #[serde(default, rename = "store")]
    pub stores: Vec<StoreConfig>,
}

/// Crawler behavior configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CrawlerConfig {
    /// Size of the category worker pool
    #[serde(rename = "max-concurrent-categories")]
    pub max_concurrent_categories: u32,

    /// Per-request timeout for page fetches (seconds)
    #[serde(rename = "request-timeout")]
    pub request_timeout: u64,

    /// Per-request timeout for API discovery probes (seconds)
    #[serde(rename = "discovery-timeout")]
    pub discovery_timeout: u64,

    /// Attempts per page on timeouts and connection errors
    #[serde(rename = "max-retries")]
    pub max_retries: u32,

    /// Base backoff between attempts (milliseconds), multiplied by the attempt number
    #[serde(rename = "retry-delay")]
    pub retry_delay: u64,

    /// Highest page number fetched per category
    #[serde(rename = "max-pages")]
    pub max_pages: u32,

    /// User-Agent header sent to stores
    #[serde(rename = "user-agent")]
    pub user_agent: String,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            max_concurrent_categories: 4,
            request_timeout: 15,
            discovery_timeout: 10,
            max_retries: 3,
            retry_delay: 2000,
            max_pages: 500,
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

/// Stores block obvious bots, so a desktop browser string is the default
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
     AppleWebKit/537.36 (KHTML, like Gecko) Chrome/130.0 Safari/537.36";

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    /// Path to the SQLite database file
    #[serde(rename = "database-path")]
    pub database_path: String,

    /// Directory receiving the CSV snapshots
    #[serde(rename = "export-dir", default = "default_export_dir")]
    pub export_dir: String,
}

fn default_export_dir() -> String {
    "CSVs".to_string()
}

/// Periodic scrape settings used by `--watch`
#[derive(Debug, Clone, Deserialize)]
pub struct ScheduleConfig {
    #[serde(rename = "interval-hours")]
    pub interval_hours: u64,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self { interval_hours: 6 }
    }
}

/// Kind of store, kept on every product row
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreType {
    Tech,
    Fashion,
    Grocery,
    #[default]
    General,
    Electronics,
    Home,
    Sports,
    Books,
    Other,
}

impl StoreType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Tech => "tech",
            Self::Fashion => "fashion",
            Self::Grocery => "grocery",
            Self::General => "general",
            Self::Electronics => "electronics",
            Self::Home => "home",
            Self::Sports => "sports",
            Self::Books => "books",
            Self::Other => "other",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "tech" => Some(Self::Tech),
            "fashion" => Some(Self::Fashion),
            "grocery" => Some(Self::Grocery),
            "general" => Some(Self::General),
            "electronics" => Some(Self::Electronics),
            "home" => Some(Self::Home),
            "sports" => Some(Self::Sports),
            "books" => Some(Self::Books),
            "other" => Some(Self::Other),
            _ => None,
        }
    }
}

/// Static settings for one store
///
/// Immutable for the duration of a run. Adding a store means adding one of
/// these, either as a `[[store]]` table or as a built-in preset.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct StoreConfig {
    /// Display name, also the store key in storage
    pub name: String,

    /// Root URL of the shop, e.g. `https://pcandparts.com`
    pub base_url: String,

    #[serde(default)]
    pub store_type: StoreType,

    /// Category slugs as the shop names them
    pub categories: Vec<String>,

    /// Whether listed prices already contain VAT
    #[serde(default)]
    pub tax_included: bool,

    #[serde(default = "default_tax_rate", deserialize_with = "deserialize_rate")]
    pub tax_rate: Decimal,

    /// Probe for a JSON API before falling back to HTML
    #[serde(default = "default_discover_api")]
    pub discover_api: bool,

    #[serde(default = "default_currency")]
    pub currency: String,

    /// Case-insensitive name fragments of products that carry no VAT
    #[serde(default)]
    pub tax_exempt_phrases: Vec<String>,
}

impl StoreConfig {
    /// Returns true if the product name matches one of the exempt phrases
    pub fn is_tax_exempt(&self, product_name: &str) -> bool {
        let name = product_name.to_lowercase();
        self.tax_exempt_phrases
            .iter()
            .any(|phrase| !phrase.is_empty() && name.contains(&phrase.to_lowercase()))
    }

    /// Base URL without trailing slashes, ready for path joining
    pub fn root_url(&self) -> &str {
        self.base_url.trim_end_matches('/')
    }
}

fn default_tax_rate() -> Decimal {
    LEBANESE_VAT
}

fn default_discover_api() -> bool {
    true
}

fn default_currency() -> String {
    "USD".to_string()
}

/// Accepts `tax-rate = "0.11"` as well as `tax-rate = 0.11`
fn deserialize_rate<'de, D>(deserializer: D) -> Result<Decimal, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawRate {
        Text(String),
        Float(f64),
        Integer(i64),
    }

    let text = match RawRate::deserialize(deserializer)? {
        RawRate::Text(s) => s,
        RawRate::Float(f) => f.to_string(),
        RawRate::Integer(i) => i.to_string(),
    };

    Decimal::from_str(text.trim()).map_err(serde::de::Error::custom)
}
