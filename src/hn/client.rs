// Hacker News API client.
// Owns the transport, hook pipeline, retry policy, caches, and limiters for one API host.

use std::sync::Arc;

use reqwest::Url;
use reqwest::header::{ACCEPT, HeaderValue};
use serde::de::DeserializeOwned;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;

use crate::cache::SwrCache;
use crate::config::ClientConfig;
use crate::error::{HnError, Result};
use crate::net::{
    HookRegistry, RateLimiter, ReqwestTransport, Request, Response, RetryPolicy, TracingHook,
    Transport, fetch,
};
use crate::tree::{TreeMaterializer, TreeNode};

use super::endpoints::Endpoints;
use super::types::{Item, User};

struct ClientInner {
    config: ClientConfig,
    endpoints: Endpoints,
    transport: Arc<dyn Transport>,
    hooks: HookRegistry,
    items: SwrCache<Item>,
    users: SwrCache<User>,
    lists: SwrCache<Vec<u64>>,
    bulk: RateLimiter,
    fanout: Arc<Semaphore>,
}

/// Hacker News API client with caching, retries, and tree materialization.
///
/// Cloning is cheap and clones share caches and limiters.
#[derive(Clone)]
pub struct HnClient {
    inner: Arc<ClientInner>,
}

impl HnClient {
    /// Create a client using the default `reqwest` transport and tracing hook.
    pub fn new(config: ClientConfig) -> Result<Self> {
        let transport = ReqwestTransport::with_defaults(&config.user_agent, config.timeout)?;
        let hooks = HookRegistry::new().with(Arc::new(TracingHook));
        Self::with_parts(config, Arc::new(transport), hooks)
    }

    /// Create a client from `HNKIT_*` environment variables.
    pub fn from_env() -> Result<Self> {
        Self::new(ClientConfig::from_env()?)
    }

    /// Create a client with an explicit transport and hook pipeline.
    pub fn with_parts(
        config: ClientConfig,
        transport: Arc<dyn Transport>,
        hooks: HookRegistry,
    ) -> Result<Self> {
        config.validate()?;
        let endpoints = Endpoints::new(&config.api_base, &config.search_base)?;

        let inner = ClientInner {
            endpoints,
            transport,
            hooks,
            items: SwrCache::new(config.item_cache),
            users: SwrCache::new(config.user_cache),
            lists: SwrCache::new(config.list_cache),
            bulk: RateLimiter::new(config.bulk_concurrency, config.bulk_interval),
            fanout: Arc::new(Semaphore::new(config.fanout_limit)),
            config,
        };

        Ok(Self {
            inner: Arc::new(inner),
        })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    pub fn endpoints(&self) -> &Endpoints {
        &self.inner.endpoints
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.inner.config.retry
    }

    pub(crate) fn items(&self) -> &SwrCache<Item> {
        &self.inner.items
    }

    pub(crate) fn users(&self) -> &SwrCache<User> {
        &self.inner.users
    }

    pub(crate) fn lists(&self) -> &SwrCache<Vec<u64>> {
        &self.inner.lists
    }

    pub(crate) fn bulk(&self) -> &RateLimiter {
        &self.inner.bulk
    }

    /// Make a GET request through the hook pipeline and retry policy.
    pub async fn get(&self, url: Url, cancel: &CancellationToken) -> Result<Response> {
        let request =
            Request::get(url).with_header(ACCEPT, HeaderValue::from_static("application/json"));
        let request = self.inner.hooks.before_request(request);

        match fetch(
            self.inner.transport.as_ref(),
            &request,
            cancel,
            Some(&self.inner.config.retry),
        )
        .await
        {
            Ok(response) => Ok(self.inner.hooks.after_response(&request, response)),
            Err(err) => Err(self.inner.hooks.on_error(&request, err)),
        }
    }

    /// GET and decode a JSON body. A JSON `null` becomes `None`.
    pub async fn get_json<T: DeserializeOwned>(
        &self,
        url: Url,
        cancel: &CancellationToken,
    ) -> Result<Option<T>> {
        let response = self.get(url, cancel).await?;
        response.json()
    }

    /// Materialize the comment tree under `root_id`.
    ///
    /// All trees built by this client share one fan-out limiter.
    pub async fn tree(
        &self,
        root_id: u64,
        max_depth: usize,
        cancel: &CancellationToken,
    ) -> Result<TreeNode> {
        TreeMaterializer::with_limiter(self.clone(), Arc::clone(&self.inner.fanout))
            .materialize(root_id, max_depth, cancel)
            .await
    }

    /// Materialize with the configured default depth.
    pub async fn default_tree(&self, root_id: u64, cancel: &CancellationToken) -> Result<TreeNode> {
        self.tree(root_id, self.inner.config.max_depth, cancel).await
    }

    /// Drop a cached item so the next read goes to the network.
    pub fn invalidate_item(&self, id: u64) {
        self.inner.items.invalidate(&id.to_string());
    }

    pub fn invalidate_user(&self, name: &str) {
        self.inner.users.invalidate(name);
    }

    /// Empty every cache.
    pub fn clear_caches(&self) {
        self.inner.items.clear();
        self.inner.users.clear();
        self.inner.lists.clear();
    }
}

/// Race `work` against the caller's cancellation.
///
/// A caller that is already cancelled never starts `work`. Cache loads run on
/// their own task, so a caller that gives up stops waiting while the shared
/// load keeps going for other callers.
pub(crate) async fn cancellable<T>(
    cancel: &CancellationToken,
    work: impl std::future::Future<Output = Result<T>>,
) -> Result<T> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(HnError::Cancelled),
        result = work => result,
    }
}
