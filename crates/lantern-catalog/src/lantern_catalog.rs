//! Catalog metadata cache for the remote query engine
//!
//! Catalog lists are loaded by running the bootstrap query through a
//! [`lantern_query::QueryExecutor`] on a dedicated worker pool. Loads are
//! single-flight per key, entries refresh once they age past the refresh
//! interval, and reads never wait for a load.

pub mod background;
pub mod config;
pub mod loader;
pub mod refresh;

mod catalog_cache;

pub use background::BackgroundExecutor;
pub use catalog_cache::{CATALOGS_KEY, CatalogCache, CatalogSnapshot};
pub use config::CatalogCacheConfig;
pub use loader::{CatalogLoader, filter_catalog_names};
pub use refresh::{CacheEntry, CacheLoader, CacheSnapshot, CacheStats, RefreshingCache};
