// Network layer.
// Pluggable transport, retrying fetch, hook pipeline, and outbound rate limiting.

pub mod hooks;
pub mod limiter;
pub mod retry;
pub mod transport;

#[cfg(test)]
pub(crate) mod mock;

pub use hooks::{Hook, HookRegistry, TracingHook};
pub use limiter::RateLimiter;
pub use retry::{DEFAULT_RETRYABLE_STATUSES, RetryPolicy, fetch};
pub use transport::{ReqwestTransport, Request, Response, Transport};
