//! Catalog cache configuration

use std::collections::HashSet;
use std::time::Duration;

use lantern_core::CatalogSettings;
use lantern_core::settings::{
    DEFAULT_BOOTSTRAP_QUERY, DEFAULT_LOADER_TIMEOUT, DEFAULT_REFRESH_INTERVAL,
};

/// Prefix for the names of the background refresh threads
pub const DEFAULT_THREAD_NAME: &str = "catalog-cache";

/// Configuration for the catalog cache
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogCacheConfig {
    /// Age after which a loaded entry is refreshed on the next read
    pub refresh_interval: Duration,
    /// Wall-clock budget for each background load
    pub loader_timeout: Duration,
    /// Catalog names that never appear in the cache
    pub excluded_catalogs: HashSet<String>,
    /// Statement that lists the catalogs
    pub bootstrap_query: String,
    /// Worker threads in the refresh pool
    pub worker_threads: usize,
    /// Refresh threads are named `{thread_name}-{n}`
    pub thread_name: String,
}

impl CatalogCacheConfig {
    /// Set the refresh interval.
    pub fn with_refresh_interval(mut self, interval: Duration) -> Self {
        self.refresh_interval = interval;
        self
    }

    /// Set the per-load timeout.
    pub fn with_loader_timeout(mut self, timeout: Duration) -> Self {
        self.loader_timeout = timeout;
        self
    }

    /// Replace the excluded catalog names.
    pub fn with_excluded_catalogs<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.excluded_catalogs = names.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_bootstrap_query(mut self, query: impl Into<String>) -> Self {
        self.bootstrap_query = query.into();
        self
    }

    pub fn with_worker_threads(mut self, threads: usize) -> Self {
        self.worker_threads = threads;
        self
    }

    pub fn with_thread_name(mut self, name: impl Into<String>) -> Self {
        self.thread_name = name.into();
        self
    }

    pub fn is_excluded(&self, name: &str) -> bool {
        self.excluded_catalogs.contains(name)
    }
}

impl Default for CatalogCacheConfig {
    fn default() -> Self {
        Self {
            refresh_interval: DEFAULT_REFRESH_INTERVAL,
            loader_timeout: DEFAULT_LOADER_TIMEOUT,
            excluded_catalogs: HashSet::from(["system".to_string()]),
            bootstrap_query: DEFAULT_BOOTSTRAP_QUERY.to_string(),
            worker_threads: 2,
            thread_name: DEFAULT_THREAD_NAME.to_string(),
        }
    }
}

impl From<&CatalogSettings> for CatalogCacheConfig {
    fn from(settings: &CatalogSettings) -> Self {
        Self::default()
            .with_refresh_interval(settings.refresh_interval())
            .with_loader_timeout(settings.loader_timeout())
            .with_excluded_catalogs(settings.excluded_catalogs.iter().cloned())
            .with_bootstrap_query(settings.bootstrap_query.clone())
            .with_worker_threads(settings.worker_threads)
    }
}
