//! Generic background-refreshed cache

mod cache;

pub use cache::{CacheEntry, CacheLoader, CacheSnapshot, CacheStats, RefreshingCache};
