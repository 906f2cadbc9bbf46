// Client configuration.
// Defaults for endpoints, retries, cache windows, and concurrency, with environment overrides.

use std::str::FromStr;
use std::time::Duration;

use crate::cache::CacheConfig;
use crate::error::{HnError, Result};
use crate::net::RetryPolicy;

pub const DEFAULT_API_BASE: &str = "https://hacker-news.firebaseio.com/v0/";
pub const DEFAULT_SEARCH_BASE: &str = "https://hn.algolia.com/api/v1/";
pub const DEFAULT_USER_AGENT: &str = concat!("hnkit/", env!("CARGO_PKG_VERSION"));

/// Default maximum tree depth below the root.
pub const DEFAULT_MAX_DEPTH: usize = 5;

/// Default number of child resolutions in flight at once, per client.
pub const DEFAULT_FANOUT_LIMIT: usize = 10;

/// Everything needed to build an [`HnClient`](crate::HnClient).
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub api_base: String,
    pub search_base: String,
    pub user_agent: String,
    /// Per-request timeout for the default transport.
    pub timeout: Duration,
    pub retry: RetryPolicy,
    pub item_cache: CacheConfig,
    pub user_cache: CacheConfig,
    pub list_cache: CacheConfig,
    pub max_depth: usize,
    pub fanout_limit: usize,
    /// Concurrent bulk/search calls.
    pub bulk_concurrency: usize,
    /// Minimum spacing between bulk/search call starts.
    pub bulk_interval: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_base: DEFAULT_API_BASE.to_string(),
            search_base: DEFAULT_SEARCH_BASE.to_string(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            timeout: Duration::from_secs(15),
            retry: RetryPolicy::default(),
            item_cache: CacheConfig::new(Duration::from_secs(60), Duration::from_secs(5 * 60))
                .with_capacity(5_000),
            user_cache: CacheConfig::new(Duration::from_secs(5 * 60), Duration::from_secs(30 * 60))
                .with_capacity(500),
            list_cache: CacheConfig::new(Duration::from_secs(30), Duration::from_secs(2 * 60))
                .with_capacity(16),
            max_depth: DEFAULT_MAX_DEPTH,
            fanout_limit: DEFAULT_FANOUT_LIMIT,
            bulk_concurrency: 8,
            bulk_interval: Duration::from_millis(25),
        }
    }
}

impl ClientConfig {
    /// Defaults overridden by `HNKIT_*` environment variables.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Defaults overridden by whatever `lookup` returns for each `HNKIT_*` name.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::default();

        if let Some(base) = lookup("HNKIT_API_BASE") {
            config.api_base = base;
        }
        if let Some(base) = lookup("HNKIT_SEARCH_BASE") {
            config.search_base = base;
        }
        if let Some(agent) = lookup("HNKIT_USER_AGENT") {
            config.user_agent = agent;
        }
        if let Some(secs) = parse_var::<u64>(&lookup, "HNKIT_TIMEOUT_SECS")? {
            config.timeout = Duration::from_secs(secs);
        }
        if let Some(retries) = parse_var(&lookup, "HNKIT_MAX_RETRIES")? {
            config.retry.max_attempts = retries;
        }
        if let Some(depth) = parse_var(&lookup, "HNKIT_MAX_DEPTH")? {
            config.max_depth = depth;
        }
        if let Some(fanout) = parse_var(&lookup, "HNKIT_FANOUT")? {
            config.fanout_limit = fanout;
        }
        if let Some(concurrency) = parse_var(&lookup, "HNKIT_BULK_CONCURRENCY")? {
            config.bulk_concurrency = concurrency;
        }
        if let Some(capacity) = parse_var(&lookup, "HNKIT_CACHE_CAPACITY")? {
            config.item_cache.capacity = Some(capacity);
        }

        config.validate()?;
        Ok(config)
    }

    /// Reject settings that would stall the client.
    pub fn validate(&self) -> Result<()> {
        if self.fanout_limit == 0 {
            return Err(HnError::InvalidConfig("fanout limit must be at least 1".into()));
        }
        if self.bulk_concurrency == 0 {
            return Err(HnError::InvalidConfig(
                "bulk concurrency must be at least 1".into(),
            ));
        }
        if self.timeout.is_zero() {
            return Err(HnError::InvalidConfig("timeout must be non-zero".into()));
        }
        Ok(())
    }
}

fn parse_var<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &str,
) -> Result<Option<T>> {
    match lookup(name) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| HnError::InvalidConfig(format!("{name}: cannot parse {raw:?}"))),
    }
}
