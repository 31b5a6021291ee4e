use crate::config::types::{Config, CrawlerConfig, OutputConfig, ScheduleConfig, StoreConfig};
use crate::ConfigError;
use rust_decimal::Decimal;
use std::collections::HashSet;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_crawler_config(&config.crawler)?;
    validate_output_config(&config.output)?;
    validate_schedule_config(&config.schedule)?;
    validate_stores(&config.stores)?;
    Ok(())
}

/// Validates crawler configuration
fn validate_crawler_config(config: &CrawlerConfig) -> Result<(), ConfigError> {
    if config.max_concurrent_categories < 1 || config.max_concurrent_categories > 64 {
        return Err(ConfigError::Validation(format!(
            "max_concurrent_categories must be between 1 and 64, got {}",
            config.max_concurrent_categories
        )));
    }

    if config.request_timeout < 1 {
        return Err(ConfigError::Validation(format!(
            "request_timeout must be >= 1s, got {}s",
            config.request_timeout
        )));
    }

    if config.discovery_timeout < 1 {
        return Err(ConfigError::Validation(format!(
            "discovery_timeout must be >= 1s, got {}s",
            config.discovery_timeout
        )));
    }

    if config.max_retries < 1 {
        return Err(ConfigError::Validation(format!(
            "max_retries must be >= 1, got {}",
            config.max_retries
        )));
    }

    if config.max_pages < 1 {
        return Err(ConfigError::Validation(format!(
            "max_pages must be >= 1, got {}",
            config.max_pages
        )));
    }

    if config.user_agent.trim().is_empty() {
        return Err(ConfigError::Validation(
            "user_agent cannot be empty".to_string(),
        ));
    }

    Ok(())
}

/// Validates output configuration
fn validate_output_config(config: &OutputConfig) -> Result<(), ConfigError> {
    if config.database_path.is_empty() {
        return Err(ConfigError::Validation(
            "database_path cannot be empty".to_string(),
        ));
    }

    if config.export_dir.is_empty() {
        return Err(ConfigError::Validation(
            "export_dir cannot be empty".to_string(),
        ));
    }

    Ok(())
}

fn validate_schedule_config(config: &ScheduleConfig) -> Result<(), ConfigError> {
    if config.interval_hours < 1 {
        return Err(ConfigError::Validation(format!(
            "interval_hours must be >= 1, got {}",
            config.interval_hours
        )));
    }
    Ok(())
}

/// Validates store entries
fn validate_stores(stores: &[StoreConfig]) -> Result<(), ConfigError> {
    let mut seen = HashSet::new();

    for store in stores {
        validate_store(store)?;

        if !seen.insert(store.name.to_lowercase()) {
            return Err(ConfigError::Validation(format!(
                "Store '{}' is declared more than once",
                store.name
            )));
        }
    }

    Ok(())
}

/// Validates a single store entry
pub(crate) fn validate_store(store: &StoreConfig) -> Result<(), ConfigError> {
    if store.name.trim().is_empty() {
        return Err(ConfigError::Validation(
            "store name cannot be empty".to_string(),
        ));
    }

    let url = Url::parse(&store.base_url).map_err(|e| {
        ConfigError::InvalidUrl(format!(
            "Invalid base_url '{}' for store '{}': {}",
            store.base_url, store.name, e
        ))
    })?;

    if url.scheme() != "https" && url.scheme() != "http" {
        return Err(ConfigError::Validation(format!(
            "base_url '{}' must use HTTP or HTTPS",
            store.base_url
        )));
    }

    if store.categories.is_empty() {
        return Err(ConfigError::Validation(format!(
            "Store '{}' must have at least one category",
            store.name
        )));
    }

    if let Some(bad) = store
        .categories
        .iter()
        .find(|c| c.trim().is_empty() || c.contains('/'))
    {
        return Err(ConfigError::Validation(format!(
            "Store '{}' has an invalid category slug '{}'",
            store.name, bad
        )));
    }

    if store.tax_rate < Decimal::ZERO || store.tax_rate >= Decimal::ONE {
        return Err(ConfigError::Validation(format!(
            "tax_rate for store '{}' must be in [0, 1), got {}",
            store.name, store.tax_rate
        )));
    }

    if store.currency.trim().is_empty() {
        return Err(ConfigError::Validation(format!(
            "currency for store '{}' cannot be empty",
            store.name
        )));
    }

    Ok(())
}
