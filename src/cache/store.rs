// In-memory stale-while-revalidate cache.
// Serves fresh data directly, refreshes stale data in the background, de-duplicates
// concurrent loads per key, and bounds its size by least-recent access.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use lru::LruCache;
use parking_lot::Mutex;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::error::{HnError, Result};

use super::entry::{CacheConfig, CacheEntry, Freshness};

/// Receives failures of background revalidations, which never reach a caller.
pub type ErrorSink = Arc<dyn Fn(&str, &HnError) + Send + Sync>;

/// The shared result of one in-flight load.
type Flight<T> = Shared<BoxFuture<'static, Result<T>>>;

/// Default sink: log and move on.
pub fn log_revalidation_failure(key: &str, err: &HnError) {
    warn!(key, error = %err, "background revalidation failed");
}

struct PendingFetch<T> {
    id: u64,
    flight: Flight<T>,
}

struct CacheState<T> {
    /// Entries in access order; the least recently used is evicted first.
    entries: LruCache<String, CacheEntry<T>>,
    /// Newest load per key; callers missing the cache join it.
    pending: HashMap<String, PendingFetch<T>>,
    /// Every load whose result may still be stored, by id. Invalidation removes
    /// a key's loads from here so their results are dropped on settle.
    flights: HashMap<u64, String>,
    next_flight: u64,
}

impl<T> Default for CacheState<T> {
    fn default() -> Self {
        Self {
            entries: LruCache::unbounded(),
            pending: HashMap::new(),
            flights: HashMap::new(),
            next_flight: 0,
        }
    }
}

impl<T> CacheState<T> {
    fn store(&mut self, key: &str, data: T, capacity: Option<usize>) {
        self.entries
            .put(key.to_owned(), CacheEntry::new(data, Instant::now()));
        if let Some(capacity) = capacity {
            self.evict_to(capacity.max(1));
        }
    }

    fn evict_to(&mut self, capacity: usize) {
        while self.entries.len() > capacity {
            let Some((key, _)) = self.entries.pop_lru() else {
                break;
            };
            debug!(key = %key, "evicting least recently used entry");
        }
    }

    /// Forget the bookkeeping of a settled load.
    fn release(&mut self, key: &str, id: u64) {
        self.flights.remove(&id);
        if self.pending.get(key).is_some_and(|p| p.id == id) {
            self.pending.remove(key);
        }
    }
}

struct CacheShared<T> {
    config: CacheConfig,
    state: Mutex<CacheState<T>>,
    on_error: ErrorSink,
}

/// Clears a load's pending record however its task ends, including panics
/// and runtime shutdown.
struct FlightGuard<T> {
    shared: Arc<CacheShared<T>>,
    key: String,
    id: u64,
    settled: bool,
}

impl<T> FlightGuard<T> {
    fn complete(mut self, data: T) {
        let mut state = self.shared.state.lock();
        if state.flights.contains_key(&self.id) {
            state.store(&self.key, data, self.shared.config.capacity);
        } else {
            debug!(key = %self.key, "key invalidated during load, result not cached");
        }
        state.release(&self.key, self.id);
        self.settled = true;
    }
}

impl<T> Drop for FlightGuard<T> {
    fn drop(&mut self) {
        if !self.settled {
            self.shared.state.lock().release(&self.key, self.id);
        }
    }
}

/// A keyed stale-while-revalidate cache with single-flight loads and LRU bounds.
///
/// Cloning is cheap; clones share the same entries.
///
/// | age of entry                  | `get` behaviour                                   |
/// |-------------------------------|---------------------------------------------------|
/// | `< fresh_window`              | cached value, no load                             |
/// | `< stale_window`              | cached value, one background load per key         |
/// | `>= stale_window` or missing  | await a load, joining one already in flight       |
pub struct SwrCache<T> {
    shared: Arc<CacheShared<T>>,
}

impl<T> Clone for SwrCache<T> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T> SwrCache<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub fn new(config: CacheConfig) -> Self {
        Self::with_error_sink(config, Arc::new(log_revalidation_failure))
    }

    /// Create a cache that reports background revalidation failures to `on_error`.
    pub fn with_error_sink(config: CacheConfig, on_error: ErrorSink) -> Self {
        Self {
            shared: Arc::new(CacheShared {
                config,
                state: Mutex::new(CacheState::default()),
                on_error,
            }),
        }
    }

    pub fn config(&self) -> &CacheConfig {
        &self.shared.config
    }

    /// Get the value for `key`, calling `loader` when the entry is missing, stale, or expired.
    pub async fn get<F, Fut>(&self, key: &str, loader: F) -> Result<T>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T>> + Send + 'static,
    {
        let flight = {
            let mut state = self.shared.state.lock();
            let now = Instant::now();

            let mut stale = None;
            if let Some(entry) = state.entries.get_mut(key) {
                match self.shared.config.classify(entry.age(now)) {
                    Freshness::Fresh => {
                        entry.touch(now);
                        return Ok(entry.data.clone());
                    }
                    Freshness::Stale => {
                        entry.touch(now);
                        stale = Some(entry.data.clone());
                    }
                    Freshness::Expired => {}
                }
            }

            if let Some(data) = stale {
                if !state.pending.contains_key(key) {
                    debug!(key, "serving stale entry, revalidating in background");
                    self.start_load(&mut state, key, loader, true);
                }
                return Ok(data);
            }

            match state.pending.get(key) {
                Some(pending) => {
                    debug!(key, "joining in-flight load");
                    pending.flight.clone()
                }
                None => self.start_load(&mut state, key, loader, false),
            }
        };

        flight.await
    }

    /// Load `key` now regardless of its freshness and replace the cached value.
    pub async fn refresh<F, Fut>(&self, key: &str, loader: F) -> Result<T>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T>> + Send + 'static,
    {
        let flight = {
            let mut state = self.shared.state.lock();
            self.start_load(&mut state, key, loader, false)
        };
        flight.await
    }

    /// Remove the entry and any in-flight loads for `key`.
    ///
    /// Callers already awaiting a load still get its result; it just isn't stored.
    pub fn invalidate(&self, key: &str) {
        let mut state = self.shared.state.lock();
        state.entries.pop(key);
        state.pending.remove(key);
        state.flights.retain(|_, flight_key| flight_key != key);
    }

    /// Drop every entry and in-flight record.
    pub fn clear(&self) {
        let mut state = self.shared.state.lock();
        state.entries.clear();
        state.pending.clear();
        state.flights.clear();
    }

    /// Whether an entry exists for `key`, whatever its age.
    pub fn has(&self, key: &str) -> bool {
        self.shared.state.lock().entries.contains(key)
    }

    pub fn len(&self) -> usize {
        self.shared.state.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether a load is currently in flight for `key`.
    pub fn is_loading(&self, key: &str) -> bool {
        self.shared.state.lock().pending.contains_key(key)
    }

    /// Spawn `loader` and register it as the pending load for `key`.
    ///
    /// The spawned task stores its own result, so a load keeps going (and still
    /// clears its record) even if every caller stops waiting.
    fn start_load<F, Fut>(
        &self,
        state: &mut CacheState<T>,
        key: &str,
        loader: F,
        background: bool,
    ) -> Flight<T>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T>> + Send + 'static,
    {
        state.next_flight += 1;
        let id = state.next_flight;
        state.flights.insert(id, key.to_owned());

        let guard = FlightGuard {
            shared: Arc::clone(&self.shared),
            key: key.to_owned(),
            id,
            settled: false,
        };
        let on_error = Arc::clone(&self.shared.on_error);

        let handle = tokio::spawn(async move {
            let result = loader().await;
            match &result {
                Ok(data) => guard.complete(data.clone()),
                Err(err) => {
                    if background {
                        on_error(&guard.key, err);
                    }
                    drop(guard);
                }
            }
            result
        });

        let flight = async move {
            handle
                .await
                .unwrap_or_else(|err| Err(HnError::Other(format!("cache load task failed: {err}"))))
        }
        .boxed()
        .shared();

        state.pending.insert(
            key.to_owned(),
            PendingFetch {
                id,
                flight: flight.clone(),
            },
        );
        flight
    }
}
