//! Per-run state shared by every category task

use crate::config::Config;
use crate::reconcile::BatchSummary;
use crate::storage::{SqliteStorage, StorageError};
use reqwest::Client;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

/// A monotonically increasing run counter
#[derive(Debug, Default)]
pub struct Counter(AtomicU64);

impl Counter {
    pub fn inc(&self) {
        self.add(1);
    }

    pub fn add(&self, n: u64) {
        self.0.fetch_add(n, Ordering::Relaxed);
    }

    pub fn get(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }
}

/// Counters updated concurrently by the category tasks
#[derive(Debug, Default)]
pub struct RunStats {
    /// Products extracted from pages, priced or not
    pub total_fetched: Counter,
    pub db_created: Counter,
    pub db_updated: Counter,
    pub db_unchanged: Counter,
    pub db_errors: Counter,
    /// Products dropped for a missing name, id or price
    pub products_skipped: Counter,
    pub pages_fetched: Counter,
    pub pages_retried: Counter,
    pub pages_failed: Counter,
    pub categories_failed: Counter,
}

impl RunStats {
    pub fn record_batch(&self, batch: &BatchSummary) {
        self.db_created.add(batch.created);
        self.db_updated.add(batch.updated);
        self.db_unchanged.add(batch.unchanged);
        self.db_errors.add(batch.errors);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            total_fetched: self.total_fetched.get(),
            db_created: self.db_created.get(),
            db_updated: self.db_updated.get(),
            db_unchanged: self.db_unchanged.get(),
            db_errors: self.db_errors.get(),
            products_skipped: self.products_skipped.get(),
            pages_fetched: self.pages_fetched.get(),
            pages_retried: self.pages_retried.get(),
            pages_failed: self.pages_failed.get(),
            categories_failed: self.categories_failed.get(),
        }
    }
}

/// Point-in-time copy of [`RunStats`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub total_fetched: u64,
    pub db_created: u64,
    pub db_updated: u64,
    pub db_unchanged: u64,
    pub db_errors: u64,
    pub products_skipped: u64,
    pub pages_fetched: u64,
    pub pages_retried: u64,
    pub pages_failed: u64,
    pub categories_failed: u64,
}

impl fmt::Display for StatsSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Products fetched:   {}", self.total_fetched)?;
        writeln!(f, "  Created:          {}", self.db_created)?;
        writeln!(f, "  Price changed:    {}", self.db_updated)?;
        writeln!(f, "  Unchanged:        {}", self.db_unchanged)?;
        writeln!(f, "  Save errors:      {}", self.db_errors)?;
        writeln!(f, "  Skipped:          {}", self.products_skipped)?;
        writeln!(f, "Pages fetched:      {}", self.pages_fetched)?;
        writeln!(f, "  Retried:          {}", self.pages_retried)?;
        writeln!(f, "  Failed:           {}", self.pages_failed)?;
        write!(f, "Categories failed:  {}", self.categories_failed)
    }
}

/// Everything a category task needs, scoped to one run
#[derive(Clone)]
pub struct CrawlContext {
    pub config: Arc<Config>,
    pub client: Client,
    pub storage: Arc<Mutex<SqliteStorage>>,
    pub stats: Arc<RunStats>,
}

impl CrawlContext {
    /// Locks the shared storage
    ///
    /// The guard must be dropped before the next `.await`.
    pub fn lock_storage(&self) -> Result<MutexGuard<'_, SqliteStorage>, StorageError> {
        self.storage
            .lock()
            .map_err(|_| StorageError::Database("storage lock poisoned".to_string()))
    }
}
