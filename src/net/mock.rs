// Scripted transport for tests.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{StatusCode, Url, header::HeaderValue};
use tokio_util::sync::CancellationToken;

use crate::error::{HnError, Result};

use super::transport::{Request, Response, Transport};

type Handler = dyn Fn(&Request, usize) -> Result<Response> + Send + Sync;

/// Transport that answers from a closure and counts calls.
///
/// The closure receives the request and the zero-based call index.
pub(crate) struct MockTransport {
    handler: Box<Handler>,
    calls: AtomicUsize,
    delay: Duration,
}

impl MockTransport {
    pub(crate) fn new(
        handler: impl Fn(&Request, usize) -> Result<Response> + Send + Sync + 'static,
    ) -> Arc<Self> {
        Self::delayed(Duration::ZERO, handler)
    }

    /// Like `new`, but each call takes `delay` and aborts early on cancellation.
    pub(crate) fn delayed(
        delay: Duration,
        handler: impl Fn(&Request, usize) -> Result<Response> + Send + Sync + 'static,
    ) -> Arc<Self> {
        Arc::new(Self {
            handler: Box::new(handler),
            calls: AtomicUsize::new(0),
            delay,
        })
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn call(&self, request: &Request, cancel: &CancellationToken) -> Result<Response> {
        let index = self.calls.fetch_add(1, Ordering::SeqCst);
        if cancel.is_cancelled() {
            return Err(HnError::Cancelled);
        }
        if !self.delay.is_zero() {
            tokio::select! {
                _ = cancel.cancelled() => return Err(HnError::Cancelled),
                _ = tokio::time::sleep(self.delay) => {}
            }
        }
        (self.handler)(request, index)
    }
}

pub(crate) fn response(request: &Request, status: u16, body: &str) -> Response {
    Response::new(
        request.url.clone(),
        StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
    )
    .with_body(body.to_string())
}

pub(crate) fn rate_limited(request: &Request, retry_after_secs: u64) -> Response {
    response(request, 429, "").with_header(
        reqwest::header::RETRY_AFTER,
        HeaderValue::from_str(&retry_after_secs.to_string())
            .unwrap_or(HeaderValue::from_static("0")),
    )
}

pub(crate) fn test_url(path: &str) -> Url {
    Url::parse("https://hn.test/v0/")
        .and_then(|base| base.join(path))
        .unwrap_or_else(|_| panic!("invalid test path {path}"))
}
