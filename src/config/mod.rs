//! Configuration module for pricewatch
//!
//! This module handles loading, parsing, and validating TOML configuration
//! files, and exposes the store registry built from them.
//!
//! # Example
//!
//! ```no_run
//! use pricewatch::config::{load_config, StoreRegistry};
//! use std::path::Path;
//!
//! let config = load_config(Path::new("pricewatch.toml")).unwrap();
//! let registry = StoreRegistry::from_config(&config);
//! println!("Will scrape {} stores", registry.len());
//! ```

mod parser;
mod registry;
mod types;
mod validation;

// Re-export types
pub use types::{
    Config, CrawlerConfig, OutputConfig, ScheduleConfig, StoreConfig, StoreType,
    DEFAULT_USER_AGENT,
};

pub use registry::StoreRegistry;

// Re-export parser functions
pub use parser::{hash_config, load_config, load_config_with_hash, parse_config};
