//! Crawler coordinator - main scrape orchestration logic
//!
//! This module drives one scrape run:
//! - Recording the run in storage
//! - Choosing an extraction strategy per store
//! - Fanning categories out to a bounded pool of tasks
//! - Exporting the CSV snapshot and closing the run

use crate::config::{Config, StoreConfig, StoreRegistry};
use crate::crawler::discovery::discover_api;
use crate::crawler::extractor::{scrape_category, CategoryReport, ExtractionStrategy};
use crate::crawler::{build_http_client, CrawlContext, RunStats, StatsSnapshot};
use crate::output::{export_snapshot, ExportPaths};
use crate::storage::{open_storage, RunStatus, SqliteStorage, Storage, StorageError};
use crate::PriceWatchError;
use chrono::Local;
use reqwest::Client;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

/// What a finished run did
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub run_id: i64,
    pub stats: StatsSnapshot,
    pub elapsed: Duration,
    /// Store name and the extraction strategy it used
    pub strategies: Vec<(String, &'static str)>,
    /// `None` when the CSV export failed
    pub export: Option<ExportPaths>,
}

/// Main scrape coordinator structure
pub struct Coordinator {
    config: Arc<Config>,
    stores: Vec<Arc<StoreConfig>>,
    storage: Arc<Mutex<SqliteStorage>>,
    client: Client,
    config_hash: String,
    /// Id of the run in progress, `NO_RUN` when idle
    active_run: AtomicI64,
}

const NO_RUN: i64 = 0;

impl Coordinator {
    /// Creates a new coordinator instance
    ///
    /// # Arguments
    ///
    /// * `config` - The loaded configuration
    /// * `registry` - The stores to scrape
    /// * `config_hash` - Hash of the configuration file, kept on the run record
    ///
    /// # Returns
    ///
    /// * `Ok(Coordinator)` - Storage opened and HTTP client built
    /// * `Err(PriceWatchError)` - Failed to initialize
    pub fn new(
        config: Config,
        registry: StoreRegistry,
        config_hash: impl Into<String>,
    ) -> Result<Self, PriceWatchError> {
        let storage = open_storage(Path::new(&config.output.database_path))?;
        let client = build_http_client(&config.crawler)?;

        Ok(Self {
            stores: registry.stores().iter().cloned().map(Arc::new).collect(),
            config: Arc::new(config),
            storage: Arc::new(Mutex::new(storage)),
            client,
            config_hash: config_hash.into(),
            active_run: AtomicI64::new(NO_RUN),
        })
    }

    fn lock_storage(&self) -> Result<MutexGuard<'_, SqliteStorage>, PriceWatchError> {
        self.storage.lock().map_err(|_| {
            PriceWatchError::Storage(StorageError::Database("storage lock poisoned".to_string()))
        })
    }

    fn set_run_status(&self, run_id: i64, status: RunStatus) -> Result<(), PriceWatchError> {
        self.lock_storage()?.update_run_status(run_id, status)?;
        Ok(())
    }

    /// Runs one complete scrape
    ///
    /// Failures of single products, pages or categories are logged and
    /// counted. A storage failure while closing the run marks it `failed`
    /// and is returned. Dropping the returned future leaves the run open
    /// until [`Coordinator::interrupt`] is called.
    pub async fn run(&self) -> Result<RunSummary, PriceWatchError> {
        let start = Instant::now();
        let run_id = self.lock_storage()?.create_run(&self.config_hash)?;
        self.active_run.store(run_id, Ordering::SeqCst);

        let result = self.crawl(run_id, start).await;
        self.active_run.store(NO_RUN, Ordering::SeqCst);

        if let Err(e) = &result {
            tracing::error!("Run {} failed: {}", run_id, e);
            if let Err(mark) = self.set_run_status(run_id, RunStatus::Failed) {
                tracing::error!("Could not mark run {} as failed: {}", run_id, mark);
            }
        }

        result
    }

    /// Marks the run in progress as interrupted
    ///
    /// Meant for shutdown paths that dropped a [`Coordinator::run`] future.
    ///
    /// # Returns
    ///
    /// * `Ok(Some(run_id))` - The open run was closed as `interrupted`
    /// * `Ok(None)` - No run was in progress
    pub fn interrupt(&self) -> Result<Option<i64>, PriceWatchError> {
        let run_id = self.active_run.swap(NO_RUN, Ordering::SeqCst);
        if run_id == NO_RUN {
            return Ok(None);
        }

        self.set_run_status(run_id, RunStatus::Interrupted)?;
        tracing::warn!("Run {} interrupted", run_id);
        Ok(Some(run_id))
    }

    async fn crawl(&self, run_id: i64, start: Instant) -> Result<RunSummary, PriceWatchError> {
        let ctx = CrawlContext {
            config: Arc::clone(&self.config),
            client: self.client.clone(),
            storage: Arc::clone(&self.storage),
            stats: Arc::new(RunStats::default()),
        };

        tracing::info!(
            "Starting run {} over {} stores with {} category workers",
            run_id,
            self.stores.len(),
            self.config.crawler.max_concurrent_categories
        );

        let discovery_timeout = Duration::from_secs(self.config.crawler.discovery_timeout);
        let semaphore = Arc::new(Semaphore::new(
            self.config.crawler.max_concurrent_categories as usize,
        ));
        let mut tasks = JoinSet::new();
        let mut strategies = Vec::with_capacity(self.stores.len());

        for store in &self.stores {
            let discovered = discover_api(&self.client, store, discovery_timeout).await;
            let strategy = Arc::new(ExtractionStrategy::for_store(store, discovered));
            tracing::info!(
                "{}: {} extraction over {} categories",
                store.name,
                strategy.label(),
                store.categories.len()
            );
            strategies.push((store.name.clone(), strategy.label()));

            for category in &store.categories {
                let ctx = ctx.clone();
                let store = Arc::clone(store);
                let strategy = Arc::clone(&strategy);
                let semaphore = Arc::clone(&semaphore);
                let category = category.clone();

                tasks.spawn(async move {
                    let report = match semaphore.acquire_owned().await {
                        Ok(_permit) => scrape_category(&ctx, &store, &strategy, &category).await,
                        Err(_) => CategoryReport {
                            failed: true,
                            ..CategoryReport::default()
                        },
                    };
                    (store.name.clone(), category, report)
                });
            }
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((store, category, report)) if report.failed => {
                    tracing::warn!("{} / {}: category could not be scraped", store, category);
                    ctx.stats.categories_failed.inc();
                }
                Ok((store, category, report)) => {
                    tracing::debug!(
                        "{} / {}: {} products over {} pages",
                        store,
                        category,
                        report.products,
                        report.pages
                    );
                }
                Err(e) => {
                    tracing::error!("Category task aborted: {}", e);
                    ctx.stats.categories_failed.inc();
                }
            }
        }

        let export_dir = PathBuf::from(&self.config.output.export_dir);
        let export = {
            let storage = self.lock_storage()?;
            export_snapshot(&*storage, &export_dir, Local::now())
        };
        let export = match export {
            Ok(paths) => {
                tracing::info!(
                    "Exported {} products to {}",
                    paths.rows,
                    paths.snapshot.display()
                );
                Some(paths)
            }
            Err(e) => {
                tracing::error!("CSV export failed: {}", e);
                None
            }
        };

        self.lock_storage()?.complete_run(run_id)?;

        let summary = RunSummary {
            run_id,
            stats: ctx.stats.snapshot(),
            elapsed: start.elapsed(),
            strategies,
            export,
        };

        tracing::info!(
            "Run {} completed in {:?}: {} fetched, {} created, {} price changes, {} unchanged, {} skipped, {} errors",
            run_id,
            summary.elapsed,
            summary.stats.total_fetched,
            summary.stats.db_created,
            summary.stats.db_updated,
            summary.stats.db_unchanged,
            summary.stats.products_skipped,
            summary.stats.db_errors
        );

        Ok(summary)
    }
}

/// Runs one scrape with a fresh coordinator
///
/// # Example
///
/// ```no_run
/// use pricewatch::config::{load_config_with_hash, StoreRegistry};
/// use pricewatch::crawler::run_crawl;
/// use std::path::Path;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let (config, hash) = load_config_with_hash(Path::new("pricewatch.toml"))?;
/// let registry = StoreRegistry::from_config(&config);
/// let summary = run_crawl(config, registry, hash).await?;
/// println!("{}", summary.stats);
/// # Ok(())
/// # }
/// ```
pub async fn run_crawl(
    config: Config,
    registry: StoreRegistry,
    config_hash: impl Into<String>,
) -> Result<RunSummary, PriceWatchError> {
    let coordinator = Coordinator::new(config, registry, config_hash)?;
    coordinator.run().await
}
