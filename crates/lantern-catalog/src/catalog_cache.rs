//! Catalog metadata cache
//!
//! Wraps a [`RefreshingCache`] of catalog name lists behind an API that never
//! fails for readers: keys that have not loaded yet are simply absent from a
//! snapshot.

use std::sync::Arc;

use lantern_core::{Result, StatementClientFactory};

use crate::background::BackgroundExecutor;
use crate::config::CatalogCacheConfig;
use crate::loader::CatalogLoader;
use crate::refresh::{CacheEntry, CacheSnapshot, CacheStats, RefreshingCache};

/// Key under which the engine's catalog list is cached
pub const CATALOGS_KEY: &str = "catalogs";

/// Snapshot of catalog lists by key
pub type CatalogSnapshot = CacheSnapshot<Vec<String>>;

/// Background-refreshed cache of catalog names
pub struct CatalogCache {
    cache: RefreshingCache<CatalogLoader>,
    config: CatalogCacheConfig,
}

impl CatalogCache {
    /// Create a cache with its own worker pool
    pub fn new(
        factory: Arc<dyn StatementClientFactory>,
        config: CatalogCacheConfig,
    ) -> Result<Self> {
        let executor = BackgroundExecutor::new(config.worker_threads, config.thread_name.clone())?;
        Ok(Self::with_executor(factory, config, executor))
    }

    /// Create a cache running loads on `executor`
    pub fn with_executor(
        factory: Arc<dyn StatementClientFactory>,
        config: CatalogCacheConfig,
        executor: BackgroundExecutor,
    ) -> Self {
        tracing::info!(
            refresh_interval_secs = config.refresh_interval.as_secs(),
            loader_timeout_secs = config.loader_timeout.as_secs(),
            excluded = config.excluded_catalogs.len(),
            "creating catalog cache"
        );
        let loader = CatalogLoader::new(factory, &config);
        Self {
            cache: RefreshingCache::new(loader, config.refresh_interval, executor),
            config,
        }
    }

    pub fn config(&self) -> &CatalogCacheConfig {
        &self.config
    }

    /// Load `key` in the background, typically once at start-up
    pub fn populate(&self, key: &str) {
        tracing::debug!(key = %key, "populating catalog cache");
        self.cache.refresh(key);
    }

    /// Schedule a reload of `key` and return immediately.
    ///
    /// A request made while a load of `key` is running does not start a
    /// second load.
    pub fn trigger_refresh(&self, key: &str) {
        self.cache.refresh(key);
    }

    /// Every cached catalog list, possibly stale. Never blocks on a load and
    /// keeps serving the last loaded lists after `close`.
    pub fn snapshot(&self) -> CatalogSnapshot {
        self.cache.snapshot()
    }

    /// Catalog names cached under `key`, scheduling a load if missing or stale
    pub fn catalogs(&self, key: &str) -> Option<Arc<Vec<String>>> {
        self.cache.get(key)
    }

    pub fn entry(&self, key: &str) -> CacheEntry<Arc<Vec<String>>> {
        self.cache.entry(key)
    }

    pub fn stats(&self) -> CacheStats {
        self.cache.stats()
    }

    /// Shut down the refresh pool. Loads in flight are abandoned.
    pub fn close(&self) {
        self.cache.close();
    }

    pub fn is_closed(&self) -> bool {
        self.cache.is_closed()
    }
}
