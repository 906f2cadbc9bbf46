// Cache module for in-memory response caching.
// Stale-while-revalidate entries with single-flight loads and LRU bounds.

pub mod entry;
pub mod store;

pub use entry::{CacheConfig, CacheEntry, DEFAULT_FRESH_WINDOW, DEFAULT_STALE_WINDOW, Freshness};
pub use store::{ErrorSink, SwrCache, log_revalidation_failure};
