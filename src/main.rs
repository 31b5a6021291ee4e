//! pricewatch main entry point
//!
//! This is the command-line interface for the pricewatch store scraper.

use anyhow::{Context, Result};
use chrono::{Duration as ChronoDuration, Utc};
use clap::{ArgGroup, Parser};
use pricewatch::config::{load_config_with_hash, Config, StoreRegistry};
use pricewatch::crawler::{Coordinator, RunSummary};
use pricewatch::output::{
    compare_prices, import_csv, load_statistics, print_comparison, print_statistics,
};
use pricewatch::storage::{open_storage, Storage};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing_subscriber::EnvFilter;

/// pricewatch: price tracking for Lebanese online stores
///
/// Scrapes product listings from WooCommerce stores, normalizes prices for
/// VAT, keeps the price history in SQLite and exports a CSV snapshot after
/// every run.
#[derive(Parser, Debug)]
#[command(name = "pricewatch")]
#[command(version = "1.0.0")]
#[command(about = "Price tracker for Lebanese e-commerce stores", long_about = None)]
#[command(group(
    ArgGroup::new("mode")
        .args(["dry_run", "stats", "import", "prune_history", "search", "watch"])
        .multiple(false)
))]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Only scrape the named store
    #[arg(long, value_name = "NAME")]
    store: Option<String>,

    /// Validate config and show what would be scraped without scraping
    #[arg(long)]
    dry_run: bool,

    /// Show statistics from the database and exit
    #[arg(long)]
    stats: bool,

    /// Import products from a CSV file and exit
    #[arg(long, value_name = "FILE")]
    import: Option<PathBuf>,

    /// Delete price history older than DAYS and exit
    #[arg(long, value_name = "DAYS")]
    prune_history: Option<u32>,

    /// Compare prices of products matching TERM across stores
    #[arg(long, value_name = "TERM")]
    search: Option<String>,

    /// Keep scraping every `schedule.interval-hours` until interrupted
    #[arg(long)]
    watch: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (config, config_hash) = load_config_with_hash(&cli.config)
        .with_context(|| format!("Failed to load {}", cli.config.display()))?;
    tracing::info!("Configuration loaded successfully (hash: {})", config_hash);

    let mut registry = StoreRegistry::from_config(&config);
    if let Some(name) = &cli.store {
        registry = registry.select(name)?;
    }

    if cli.dry_run {
        handle_dry_run(&config, &registry);
    } else if cli.stats {
        handle_stats(&config)?;
    } else if let Some(path) = &cli.import {
        handle_import(&config, &registry, path)?;
    } else if let Some(days) = cli.prune_history {
        handle_prune(&config, days)?;
    } else if let Some(term) = &cli.search {
        handle_search(&config, term)?;
    } else if cli.watch {
        handle_watch(config, registry, config_hash).await?;
    } else {
        handle_crawl(config, registry, config_hash).await?;
    }

    Ok(())
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("pricewatch=info,warn"),
            1 => EnvFilter::new("pricewatch=debug,info"),
            2 => EnvFilter::new("pricewatch=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Handles the --dry-run mode: validates config and shows what would be scraped
fn handle_dry_run(config: &Config, registry: &StoreRegistry) {
    println!("=== pricewatch Dry Run ===\n");

    println!("Crawler Configuration:");
    println!(
        "  Category workers: {}",
        config.crawler.max_concurrent_categories
    );
    println!("  Request timeout: {}s", config.crawler.request_timeout);
    println!("  Discovery timeout: {}s", config.crawler.discovery_timeout);
    println!(
        "  Retries: {} (backoff {}ms x attempt)",
        config.crawler.max_retries, config.crawler.retry_delay
    );
    println!("  Max pages per category: {}", config.crawler.max_pages);

    println!("\nOutput:");
    println!("  Database: {}", config.output.database_path);
    println!("  CSV directory: {}", config.output.export_dir);
    println!("  Watch interval: {}h", config.schedule.interval_hours);

    println!("\nStores ({}):", registry.len());
    for store in registry.stores() {
        println!(
            "  - {} ({}, {}, VAT {} {})",
            store.name,
            store.root_url(),
            store.store_type.as_str(),
            store.tax_rate,
            if store.tax_included { "included" } else { "excluded" }
        );
        println!(
            "    API discovery: {}",
            if store.discover_api { "on" } else { "off" }
        );
        println!("    Categories: {}", store.categories.join(", "));
    }

    let categories: usize = registry.stores().iter().map(|s| s.categories.len()).sum();
    println!("\n✓ Configuration is valid");
    println!(
        "✓ Would scrape {} categories across {} stores",
        categories,
        registry.len()
    );
}

fn open_database(config: &Config) -> Result<pricewatch::storage::SqliteStorage> {
    open_storage(Path::new(&config.output.database_path))
        .with_context(|| format!("Failed to open {}", config.output.database_path))
}

/// Handles the --stats mode: shows statistics from the database
fn handle_stats(config: &Config) -> Result<()> {
    println!("Database: {}\n", config.output.database_path);

    let storage = open_database(config)?;
    let stats = load_statistics(&storage)?;
    print_statistics(&stats);

    Ok(())
}

/// Handles the --import mode: upserts CSV rows through the reconciler
fn handle_import(config: &Config, registry: &StoreRegistry, path: &Path) -> Result<()> {
    println!("=== Importing {} ===\n", path.display());

    let mut storage = open_database(config)?;
    let summary = import_csv(&mut storage, path, registry)
        .with_context(|| format!("Failed to import {}", path.display()))?;

    println!("Rows read:      {}", summary.rows);
    println!("Rows skipped:   {}", summary.skipped);
    println!("Created:        {}", summary.saved.created);
    println!("Price changed:  {}", summary.saved.updated);
    println!("Unchanged:      {}", summary.saved.unchanged);
    println!("Save errors:    {}", summary.saved.errors);

    Ok(())
}

/// Handles the --prune-history mode
fn handle_prune(config: &Config, days: u32) -> Result<()> {
    let mut storage = open_database(config)?;
    let cutoff = Utc::now() - ChronoDuration::days(i64::from(days));
    let deleted = storage.prune_price_history(cutoff)?;

    println!(
        "✓ Deleted {} price history entries older than {} days",
        deleted, days
    );
    Ok(())
}

/// Handles the --search mode: cross-store price comparison
fn handle_search(config: &Config, term: &str) -> Result<()> {
    let storage = open_database(config)?;
    let products = compare_prices(&storage, term)?;
    print_comparison(term, &products);
    Ok(())
}

fn print_run_summary(summary: &RunSummary) {
    println!("\n=== Run {} Summary ===\n", summary.run_id);
    for (store, strategy) in &summary.strategies {
        println!("{}: {} extraction", store, strategy);
    }
    println!("\n{}", summary.stats);
    println!("\nDuration: {:.1}s", summary.elapsed.as_secs_f64());
    match &summary.export {
        Some(export) => println!(
            "CSV: {} ({} products)",
            export.snapshot.display(),
            export.rows
        ),
        None => println!("CSV: export failed, see log"),
    }
}

/// Closes the open run after Ctrl-C dropped it
fn interrupt_run(coordinator: &Coordinator) -> Result<()> {
    match coordinator
        .interrupt()
        .context("Failed to record the interruption")?
    {
        Some(run_id) => println!("\nRun {} interrupted", run_id),
        None => println!("\nInterrupted"),
    }
    Ok(())
}

/// Handles the main scrape operation
async fn handle_crawl(config: Config, registry: StoreRegistry, config_hash: String) -> Result<()> {
    tracing::info!(
        "Scraping {} stores: {}",
        registry.len(),
        registry.names().join(", ")
    );

    let coordinator = Coordinator::new(config, registry, config_hash)
        .context("Failed to initialize scraper")?;

    tokio::select! {
        result = coordinator.run() => {
            let summary = result.context("Scrape run failed")?;
            print_run_summary(&summary);
        }
        _ = tokio::signal::ctrl_c() => interrupt_run(&coordinator)?,
    }

    Ok(())
}

/// Handles the --watch mode: repeats the scrape on a fixed interval
///
/// A single Ctrl-C listener lives for the whole loop, so an interrupt during
/// a scrape or during the pause both stop the process.
async fn handle_watch(config: Config, registry: StoreRegistry, config_hash: String) -> Result<()> {
    let interval = Duration::from_secs(config.schedule.interval_hours * 3600);
    let coordinator = Coordinator::new(config, registry, config_hash)
        .context("Failed to initialize scraper")?;

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            result = coordinator.run() => match result {
                Ok(summary) => print_run_summary(&summary),
                Err(e) => tracing::error!("Scrape run failed: {}", e),
            },
            _ = &mut shutdown => return interrupt_run(&coordinator),
        }

        tracing::info!("Next run in {:?}", interval);
        tokio::select! {
            _ = tokio::time::sleep(interval) => {}
            _ = &mut shutdown => return interrupt_run(&coordinator),
        }
    }
}
