// Retrying fetch over a pluggable transport.
// Exponential backoff with jitter, Retry-After support, and cancellation at every checkpoint.

use std::collections::BTreeSet;
use std::time::Duration;

use rand::Rng;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::{HnError, Result};

use super::transport::{Request, Response, Transport};

/// HTTP status signalling a rate limit.
pub const TOO_MANY_REQUESTS: u16 = 429;

/// Statuses retried by default: timeouts, rate limits, and transient server errors.
pub const DEFAULT_RETRYABLE_STATUSES: [u16; 6] = [408, 429, 500, 502, 503, 504];

/// How a request is retried.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Retries after the first attempt.
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub backoff_multiplier: f64,
    /// Fraction (0..=1) by which each delay is randomly scaled up or down.
    pub jitter_fraction: f64,
    pub retryable_status_codes: BTreeSet<u16>,
    pub retry_on_transport_error: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(10),
            backoff_multiplier: 2.0,
            jitter_fraction: 0.2,
            retryable_status_codes: DEFAULT_RETRYABLE_STATUSES.into_iter().collect(),
            retry_on_transport_error: true,
        }
    }
}

impl RetryPolicy {
    /// A policy that makes exactly one attempt.
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 0,
            ..Self::default()
        }
    }

    pub fn is_retryable(&self, status: u16) -> bool {
        self.retryable_status_codes.contains(&status)
    }

    /// Un-jittered delay before retry number `attempt + 1`:
    /// `min(max_delay, initial_delay * multiplier^attempt)`.
    pub fn base_delay(&self, attempt: u32) -> Duration {
        let cap = self.max_delay.as_nanos() as f64;
        let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
        let nanos = self.initial_delay.as_nanos() as f64 * self.backoff_multiplier.powi(exponent);
        let nanos = if nanos.is_finite() { nanos.min(cap) } else { cap };
        Duration::from_nanos(nanos.max(0.0) as u64)
    }

    /// Base delay scaled by a random factor in `[1 - jitter, 1 + jitter]`.
    pub fn jittered_delay(&self, attempt: u32, rng: &mut impl Rng) -> Duration {
        let base = self.base_delay(attempt);
        let jitter = self.jitter_fraction.clamp(0.0, 1.0);
        if jitter == 0.0 {
            return base;
        }
        let factor = rng.random_range((1.0 - jitter)..=(1.0 + jitter));
        Duration::from_nanos((base.as_nanos() as f64 * factor).max(0.0) as u64)
    }
}

/// Perform `request` through `transport`, retrying per `policy`.
///
/// `policy: None` makes a single best-effort attempt. Statuses are classified
/// the same way in both cases, so a lone 429 still surfaces as
/// [`HnError::RateLimited`].
pub async fn fetch(
    transport: &dyn Transport,
    request: &Request,
    cancel: &CancellationToken,
    policy: Option<&RetryPolicy>,
) -> Result<Response> {
    let single = RetryPolicy::no_retry();
    let policy = policy.unwrap_or(&single);
    let mut attempt: u32 = 0;

    loop {
        if cancel.is_cancelled() {
            return Err(HnError::Cancelled);
        }

        let outcome = transport.call(request, cancel).await;
        if cancel.is_cancelled() {
            return Err(HnError::Cancelled);
        }

        let retries_left = attempt < policy.max_attempts;
        let wait = match outcome {
            Ok(response) if response.is_success() => return Ok(response),
            Ok(response) => {
                let status = response.status.as_u16();
                if !policy.is_retryable(status) {
                    return Err(HnError::Status {
                        status,
                        url: request.url.to_string(),
                    });
                }
                let retry_after = response.retry_after();
                if !retries_left {
                    if status == TOO_MANY_REQUESTS {
                        return Err(HnError::RateLimited {
                            status,
                            retry_after: retry_after.map(|d| d.as_secs()),
                        });
                    }
                    return Err(HnError::RetriesExhausted {
                        status,
                        attempts: attempt + 1,
                    });
                }
                warn!(
                    url = %request.url,
                    status,
                    attempt,
                    "request failed, retrying"
                );
                retry_after.unwrap_or_else(|| policy.jittered_delay(attempt, &mut rand::rng()))
            }
            Err(err @ HnError::Transport { .. })
                if policy.retry_on_transport_error && retries_left =>
            {
                warn!(url = %request.url, error = %err, attempt, "transport error, retrying");
                policy.jittered_delay(attempt, &mut rand::rng())
            }
            Err(err) => return Err(err),
        };

        debug!(delay_ms = wait.as_millis() as u64, "backing off");
        backoff_sleep(wait, cancel).await?;
        attempt += 1;
    }
}

async fn backoff_sleep(delay: Duration, cancel: &CancellationToken) -> Result<()> {
    tokio::select! {
        _ = cancel.cancelled() => Err(HnError::Cancelled),
        _ = tokio::time::sleep(delay) => {
            if cancel.is_cancelled() {
                Err(HnError::Cancelled)
            } else {
                Ok(())
            }
        }
    }
}
