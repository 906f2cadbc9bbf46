// Cache entry and freshness configuration.
// Classifies cached data into fresh, stale, and expired bands by age.

use std::time::Duration;

use tokio::time::Instant;

/// Default fresh window for item data: 1 minute.
pub const DEFAULT_FRESH_WINDOW: Duration = Duration::from_secs(60);

/// Default stale window for item data: 5 minutes.
pub const DEFAULT_STALE_WINDOW: Duration = Duration::from_secs(5 * 60);

/// Per-cache freshness and capacity settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheConfig {
    /// Age below which data is served without any background check.
    pub fresh_window: Duration,
    /// Age below which data is still served but triggers a background refresh.
    pub stale_window: Duration,
    /// Maximum number of entries; `None` means unbounded.
    pub capacity: Option<usize>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            fresh_window: DEFAULT_FRESH_WINDOW,
            stale_window: DEFAULT_STALE_WINDOW,
            capacity: None,
        }
    }
}

impl CacheConfig {
    pub fn new(fresh_window: Duration, stale_window: Duration) -> Self {
        Self {
            fresh_window,
            stale_window,
            capacity: None,
        }
    }

    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = Some(capacity);
        self
    }

    /// Classify data of the given age.
    pub fn classify(&self, age: Duration) -> Freshness {
        if age < self.fresh_window {
            Freshness::Fresh
        } else if age < self.stale_window {
            Freshness::Stale
        } else {
            Freshness::Expired
        }
    }
}

/// Temperature band of a cached value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Freshness {
    Fresh,
    Stale,
    Expired,
}

/// A cached value with its write and access times.
#[derive(Debug, Clone)]
pub struct CacheEntry<T> {
    /// The cached data.
    pub data: T,
    /// When the data was written.
    pub cached_at: Instant,
    /// When the data was last returned to a caller.
    pub last_accessed: Instant,
}

impl<T> CacheEntry<T> {
    pub(crate) fn new(data: T, now: Instant) -> Self {
        Self {
            data,
            cached_at: now,
            last_accessed: now,
        }
    }

    /// Age of the data at `now`.
    pub fn age(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.cached_at)
    }

    pub(crate) fn touch(&mut self, now: Instant) {
        self.last_accessed = now;
    }
}
