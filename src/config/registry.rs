//! Store configuration registry
//!
//! Holds the stores a run will visit. Stores come from `[[store]]` tables in
//! the config file; when the file declares none, the built-in presets for
//! PC and Parts and Expert Zone are used.

use crate::config::types::{Config, StoreConfig, StoreType};
use crate::pricing::LEBANESE_VAT;
use crate::ConfigError;

/// Ordered set of store configurations, addressable by name
#[derive(Debug, Clone)]
pub struct StoreRegistry {
    stores: Vec<StoreConfig>,
}

impl StoreRegistry {
    /// Builds the registry for a loaded configuration
    pub fn from_config(config: &Config) -> Self {
        if config.stores.is_empty() {
            Self::builtin()
        } else {
            Self {
                stores: config.stores.clone(),
            }
        }
    }

    /// The presets shipped with the crate
    pub fn builtin() -> Self {
        Self {
            stores: vec![pc_and_parts(), expert_zone()],
        }
    }

    pub fn stores(&self) -> &[StoreConfig] {
        &self.stores
    }

    pub fn len(&self) -> usize {
        self.stores.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stores.is_empty()
    }

    /// Case-insensitive lookup by store name
    pub fn get(&self, name: &str) -> Option<&StoreConfig> {
        self.stores
            .iter()
            .find(|store| store.name.eq_ignore_ascii_case(name.trim()))
    }

    pub fn names(&self) -> Vec<&str> {
        self.stores.iter().map(|s| s.name.as_str()).collect()
    }

    /// Narrows the registry to a single store
    ///
    /// # Returns
    ///
    /// * `Ok(StoreRegistry)` - Registry containing only the named store
    /// * `Err(ConfigError::UnknownStore)` - No store with that name
    pub fn select(&self, name: &str) -> Result<StoreRegistry, ConfigError> {
        let store = self.get(name).cloned().ok_or_else(|| {
            ConfigError::UnknownStore(format!(
                "'{}' (available: {})",
                name,
                self.names().join(", ")
            ))
        })?;

        Ok(StoreRegistry {
            stores: vec![store],
        })
    }
}

fn slugs(slugs: &[&str]) -> Vec<String> {
    slugs.iter().map(|s| s.to_string()).collect()
}

/// PC and Parts: listed prices exclude VAT
fn pc_and_parts() -> StoreConfig {
    StoreConfig {
        name: "PC and Parts".to_string(),
        base_url: "https://pcandparts.com".to_string(),
        store_type: StoreType::Tech,
        categories: slugs(&[
            "computer-cases",
            "cooling",
            "cpu",
            "ram",
            "motherboard",
            "power-supplies",
            "storage",
            "video-card",
            "home-tv-monitor",
            "camera",
            "ipad",
            "ipod",
            "mobile-phone",
            "tablet",
            "watch",
            "barcode-reader",
            "flash-memory",
            "keyboard-mouse",
            "monitor",
            "keyboard",
            "Headset",
            "speaker",
            "access-point",
            "desktops",
            "laptops",
            "accessories",
            "software",
        ]),
        tax_included: false,
        tax_rate: LEBANESE_VAT,
        discover_api: true,
        currency: "USD".to_string(),
        tax_exempt_phrases: vec![],
    }
}

/// Expert Zone: listed prices include VAT, gift cards are exempt
fn expert_zone() -> StoreConfig {
    StoreConfig {
        name: "Expert Zone".to_string(),
        base_url: "https://ezonelb.com".to_string(),
        store_type: StoreType::Tech,
        categories: slugs(&[
            "accessories",
            "desktop-laptop-vr",
            "screens",
            "computer-parts",
            "external-hdd",
            "converters",
            "cables",
            "power-charging",
            "network",
            "printers",
            "ups",
            "security-softwares",
            "office-pos",
            "surveillance-camera",
            "openbox-products",
            "rgb-lighting-acc",
            "gaming-furniture",
            "laptop-parts",
        ]),
        tax_included: true,
        tax_rate: LEBANESE_VAT,
        discover_api: true,
        currency: "USD".to_string(),
        tax_exempt_phrases: vec!["gift card".to_string()],
    }
}
