// Rate limiter for bulk and search calls.
// Bounds concurrency and paces starts with a token bucket; work is delayed, never dropped.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use governor::{DefaultDirectRateLimiter, Quota};
use tokio::sync::Semaphore;

/// Concurrency gate plus a token bucket allowing one start per interval.
#[derive(Clone)]
pub struct RateLimiter {
    permits: Arc<Semaphore>,
    /// `None` when starts are not paced.
    pacer: Option<Arc<DefaultDirectRateLimiter>>,
}

impl RateLimiter {
    /// A zero `min_interval` disables pacing.
    pub fn new(max_concurrent: usize, min_interval: Duration) -> Self {
        let pacer = Quota::with_period(min_interval)
            .map(|quota| Arc::new(governor::RateLimiter::direct(quota)));
        Self {
            permits: Arc::new(Semaphore::new(max_concurrent.max(1))),
            pacer,
        }
    }

    /// Run `task` once a slot is free and the bucket has a token for it.
    pub async fn schedule<F: Future>(&self, task: F) -> F::Output {
        // The semaphore is never closed, so acquisition only waits.
        let _permit = self.permits.acquire().await.ok();
        if let Some(pacer) = &self.pacer {
            pacer.until_ready().await;
        }

        task.await
    }

    /// Slots not currently held by a running task.
    pub fn available(&self) -> usize {
        self.permits.available_permits()
    }

    pub fn is_paced(&self) -> bool {
        self.pacer.is_some()
    }
}
