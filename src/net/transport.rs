// Transport boundary for outbound HTTP calls.
// Defines the request/response shapes and the default reqwest-backed transport.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use reqwest::{
    Client, Method, StatusCode, Url,
    header::{HeaderMap, HeaderName, HeaderValue, RETRY_AFTER},
};
use serde::de::DeserializeOwned;
use tokio_util::sync::CancellationToken;

use crate::error::{HnError, Result};

/// An outgoing request.
#[derive(Debug, Clone)]
pub struct Request {
    pub method: Method,
    pub url: Url,
    pub headers: HeaderMap,
}

impl Request {
    pub fn get(url: Url) -> Self {
        Self {
            method: Method::GET,
            url,
            headers: HeaderMap::new(),
        }
    }

    /// Add a header, replacing any previous value.
    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }
}

/// A fully-read response.
#[derive(Debug, Clone)]
pub struct Response {
    pub url: Url,
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl Response {
    pub fn new(url: Url, status: StatusCode) -> Self {
        Self {
            url,
            status,
            headers: HeaderMap::new(),
            body: Bytes::new(),
        }
    }

    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    /// Look up a header as text.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Parse `Retry-After` as either delta-seconds or an HTTP-date.
    pub fn retry_after(&self) -> Option<Duration> {
        let value = self.headers.get(RETRY_AFTER)?.to_str().ok()?.trim();
        parse_retry_after(value, Utc::now())
    }

    pub fn bytes(&self) -> &Bytes {
        &self.body
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// Decode the body as JSON. Decoding failures are validation errors.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        Ok(serde_json::from_slice(&self.body)?)
    }
}

fn parse_retry_after(value: &str, now: DateTime<Utc>) -> Option<Duration> {
    if let Ok(secs) = value.parse::<u64>() {
        return Some(Duration::from_secs(secs));
    }

    let at = DateTime::parse_from_rfc2822(value).ok()?.with_timezone(&Utc);
    let wait = at.signed_duration_since(now).num_seconds().max(0);
    Some(Duration::from_secs(wait as u64))
}

/// Performs a single HTTP call.
///
/// Implementations should abort in-flight I/O when `cancel` fires and return
/// [`HnError::Cancelled`]. Connection-level failures are [`HnError::Transport`];
/// non-2xx statuses are returned as responses, not errors.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn call(&self, request: &Request, cancel: &CancellationToken) -> Result<Response>;
}

/// Default transport over a shared `reqwest::Client`.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Build a client with the given user agent and per-request timeout.
    pub fn with_defaults(user_agent: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .user_agent(user_agent)
            .timeout(timeout)
            .build()?;
        Ok(Self::new(client))
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn call(&self, request: &Request, cancel: &CancellationToken) -> Result<Response> {
        let builder = self
            .client
            .request(request.method.clone(), request.url.clone())
            .headers(request.headers.clone());

        let response = tokio::select! {
            _ = cancel.cancelled() => return Err(HnError::Cancelled),
            resp = builder.send() => resp?,
        };

        let url = response.url().clone();
        let status = response.status();
        let headers = response.headers().clone();
        let body = tokio::select! {
            _ = cancel.cancelled() => return Err(HnError::Cancelled),
            body = response.bytes() => body?,
        };

        Ok(Response {
            url,
            status,
            headers,
            body,
        })
    }
}
