//! Refreshing cache with per-key single-flight loads
//!
//! Values are produced by a [`CacheLoader`] running on a [`BackgroundExecutor`].
//! A key has at most one load in flight; refresh requests that arrive while a
//! load is running are folded into a single follow-up load. Readers only ever
//! see complete values and never wait for a load: the map lock is held for
//! pointer swaps and clones, never across a load.

use std::collections::{BTreeMap, HashMap};
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use futures::FutureExt;
use lantern_core::{LanternError, Result};
use parking_lot::RwLock;

use crate::background::BackgroundExecutor;

/// Produces the value for a cache key
#[async_trait]
pub trait CacheLoader: Send + Sync + 'static {
    type Value: Send + Sync + 'static;

    async fn load(&self, key: &str) -> Result<Self::Value>;
}

/// Immutable view of every loaded entry
pub type CacheSnapshot<V> = BTreeMap<String, Arc<V>>;

/// Observable state of a single key
#[derive(Debug, Clone)]
pub enum CacheEntry<T: Clone> {
    /// Nothing has been loaded and no load is running
    NotLoaded,
    /// The first load is running
    Loading,
    /// A value is available and no load is running
    Loaded(T),
    /// A value is available and a refresh is running
    Refreshing(T),
}

impl<T: Clone> CacheEntry<T> {
    pub fn is_not_loaded(&self) -> bool {
        matches!(self, CacheEntry::NotLoaded)
    }

    /// Whether a load or refresh is running
    pub fn is_loading(&self) -> bool {
        matches!(self, CacheEntry::Loading | CacheEntry::Refreshing(_))
    }

    /// The value, if one has been loaded
    pub fn get(&self) -> Option<&T> {
        match self {
            CacheEntry::Loaded(value) | CacheEntry::Refreshing(value) => Some(value),
            _ => None,
        }
    }
}

struct Slot<V> {
    value: Option<Arc<V>>,
    loaded_at: Option<Instant>,
    loading: bool,
    refresh_pending: bool,
}

impl<V> Default for Slot<V> {
    fn default() -> Self {
        Self {
            value: None,
            loaded_at: None,
            loading: false,
            refresh_pending: false,
        }
    }
}

impl<V> Slot<V> {
    fn is_stale(&self, refresh_after: Duration) -> bool {
        match self.loaded_at {
            Some(time) => time.elapsed() >= refresh_after,
            None => true,
        }
    }
}

#[derive(Debug, Default)]
struct Counters {
    loads_started: AtomicU64,
    loads_succeeded: AtomicU64,
    loads_failed: AtomicU64,
    refreshes_coalesced: AtomicU64,
}

/// Statistics about the cache for monitoring
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Keys known to the cache, loaded or not
    pub entries: usize,
    /// Keys holding a value
    pub loaded_entries: usize,
    /// Keys with a load running
    pub loads_in_flight: usize,
    pub loads_started: u64,
    pub loads_succeeded: u64,
    pub loads_failed: u64,
    /// Refresh requests absorbed by a load already in flight
    pub refreshes_coalesced: u64,
}

struct CacheInner<L: CacheLoader> {
    entries: RwLock<HashMap<String, Slot<L::Value>>>,
    loader: L,
    refresh_after: Duration,
    counters: Counters,
}

impl<L: CacheLoader> CacheInner<L> {
    /// Mark `key` as loading. Returns false if a load is already running, in
    /// which case a single follow-up load is recorded instead.
    fn begin_load(&self, key: &str) -> bool {
        let mut entries = self.entries.write();
        let slot = entries.entry(key.to_string()).or_default();

        if slot.loading {
            slot.refresh_pending = true;
            self.counters.refreshes_coalesced.fetch_add(1, Ordering::SeqCst);
            tracing::debug!(key = %key, "load already in flight, coalescing refresh");
            false
        } else {
            slot.loading = true;
            true
        }
    }

    /// Clear the loading mark for a load that never got to run
    fn abandon_load(&self, key: &str) {
        let mut entries = self.entries.write();
        if let Some(slot) = entries.get_mut(key) {
            slot.loading = false;
            slot.refresh_pending = false;
        }
    }

    async fn run_load(self: Arc<Self>, key: String) {
        loop {
            self.counters.loads_started.fetch_add(1, Ordering::SeqCst);
            tracing::debug!(key = %key, "loading cache entry");

            let outcome = AssertUnwindSafe(self.loader.load(&key))
                .catch_unwind()
                .await
                .unwrap_or_else(|_| Err(LanternError::BackgroundLoad("loader panicked".into())));

            if !self.complete_load(&key, outcome) {
                break;
            }
        }
    }

    /// Install the outcome of a load. Returns true if a follow-up load was
    /// requested while this one ran and should start now.
    fn complete_load(&self, key: &str, outcome: Result<L::Value>) -> bool {
        let mut entries = self.entries.write();
        let slot = entries.entry(key.to_string()).or_default();

        match outcome {
            Ok(value) => {
                slot.value = Some(Arc::new(value));
                slot.loaded_at = Some(Instant::now());
                self.counters.loads_succeeded.fetch_add(1, Ordering::SeqCst);
                tracing::debug!(key = %key, "cache entry loaded");
            }
            Err(e) => {
                self.counters.loads_failed.fetch_add(1, Ordering::SeqCst);
                tracing::error!(
                    key = %key,
                    error = %e,
                    has_previous = slot.value.is_some(),
                    "background load failed, keeping previous value"
                );
            }
        }

        if slot.refresh_pending {
            slot.refresh_pending = false;
            true
        } else {
            slot.loading = false;
            false
        }
    }
}

/// Key-value cache refreshed in the background.
///
/// Entries are loaded on first request and refreshed once they are older than
/// the refresh interval. Staleness is checked when the cache is read, so there
/// is no timer per entry. A failed load leaves the previous value in place and
/// does not advance its load time, so the next read schedules another attempt.
pub struct RefreshingCache<L: CacheLoader> {
    inner: Arc<CacheInner<L>>,
    executor: BackgroundExecutor,
}

impl<L: CacheLoader> RefreshingCache<L> {
    pub fn new(loader: L, refresh_after: Duration, executor: BackgroundExecutor) -> Self {
        Self {
            inner: Arc::new(CacheInner {
                entries: RwLock::new(HashMap::new()),
                loader,
                refresh_after,
                counters: Counters::default(),
            }),
            executor,
        }
    }

    pub fn refresh_after(&self) -> Duration {
        self.inner.refresh_after
    }

    pub fn loader(&self) -> &L {
        &self.inner.loader
    }

    /// Schedule a load of `key` and return immediately.
    ///
    /// If a load for `key` is already running no second one is started; one
    /// follow-up load runs after it instead, however many requests arrive.
    pub fn refresh(&self, key: &str) {
        if !self.inner.begin_load(key) {
            return;
        }

        let inner = Arc::clone(&self.inner);
        let owned_key = key.to_string();
        if !self.executor.spawn(inner.run_load(owned_key)) {
            tracing::warn!(key = %key, "cache closed, refresh dropped");
            self.inner.abandon_load(key);
        }
    }

    /// Current value for `key`, scheduling a load if it is missing or stale
    pub fn get(&self, key: &str) -> Option<Arc<L::Value>> {
        let (value, needs_load) = {
            let entries = self.inner.entries.read();
            match entries.get(key) {
                Some(slot) => (
                    slot.value.clone(),
                    !slot.loading && slot.is_stale(self.inner.refresh_after),
                ),
                None => (None, true),
            }
        };

        if value.is_some() {
            tracing::trace!(key = %key, "cache hit");
        } else {
            tracing::debug!(key = %key, "cache miss");
        }
        if needs_load {
            self.refresh(key);
        }
        value
    }

    /// State of `key` without scheduling anything
    pub fn entry(&self, key: &str) -> CacheEntry<Arc<L::Value>> {
        let entries = self.inner.entries.read();
        match entries.get(key) {
            None => CacheEntry::NotLoaded,
            Some(slot) => match (&slot.value, slot.loading) {
                (None, false) => CacheEntry::NotLoaded,
                (None, true) => CacheEntry::Loading,
                (Some(value), false) => CacheEntry::Loaded(Arc::clone(value)),
                (Some(value), true) => CacheEntry::Refreshing(Arc::clone(value)),
            },
        }
    }

    /// Every loaded entry as of now.
    ///
    /// Stale entries are returned as they are. A refresh is scheduled for each
    /// of them and for every idle key whose loads have all failed. After
    /// `close` the last loaded values stay readable and nothing is scheduled.
    pub fn snapshot(&self) -> CacheSnapshot<L::Value> {
        let closed = self.is_closed();
        let mut stale = Vec::new();
        let snapshot = {
            let entries = self.inner.entries.read();
            let mut snapshot = CacheSnapshot::new();
            for (key, slot) in entries.iter() {
                if let Some(value) = &slot.value {
                    snapshot.insert(key.clone(), Arc::clone(value));
                }
                if !closed && !slot.loading && slot.is_stale(self.inner.refresh_after) {
                    stale.push(key.clone());
                }
            }
            snapshot
        };

        for key in stale {
            tracing::debug!(key = %key, "entry stale, scheduling refresh");
            self.refresh(&key);
        }
        snapshot
    }

    /// Drop the value for `key`. A load already running will still install its result.
    pub fn invalidate(&self, key: &str) {
        tracing::info!(key = %key, "invalidating cache entry");
        let mut entries = self.inner.entries.write();
        if let Some(slot) = entries.get_mut(key) {
            if slot.loading {
                slot.value = None;
                slot.loaded_at = None;
            } else {
                entries.remove(key);
            }
        }
    }

    pub fn len(&self) -> usize {
        self.inner.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> CacheStats {
        let entries = self.inner.entries.read();
        let counters = &self.inner.counters;
        CacheStats {
            entries: entries.len(),
            loaded_entries: entries.values().filter(|s| s.value.is_some()).count(),
            loads_in_flight: entries.values().filter(|s| s.loading).count(),
            loads_started: counters.loads_started.load(Ordering::SeqCst),
            loads_succeeded: counters.loads_succeeded.load(Ordering::SeqCst),
            loads_failed: counters.loads_failed.load(Ordering::SeqCst),
            refreshes_coalesced: counters.refreshes_coalesced.load(Ordering::SeqCst),
        }
    }

    /// Shut down the worker pool, abandoning running and queued loads
    pub fn close(&self) {
        self.executor.shutdown_now();
    }

    pub fn is_closed(&self) -> bool {
        self.executor.is_shut_down()
    }
}
