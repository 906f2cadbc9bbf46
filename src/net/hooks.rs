// Request instrumentation hooks.
// An ordered pipeline that can rewrite requests, responses, and terminal errors.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::error::HnError;

use super::transport::{Request, Response};

/// A participant in the dispatch pipeline. Every slot is optional.
pub trait Hook: Send + Sync {
    /// Rewrite the request before it is sent.
    fn before_request(&self, request: Request) -> Request {
        request
    }

    /// Rewrite a successful response.
    fn after_response(&self, _request: &Request, response: Response) -> Response {
        response
    }

    /// Observe a failed dispatch, optionally substituting the error.
    fn on_error(&self, _request: &Request, error: HnError) -> HnError {
        error
    }
}

/// Hooks in registration order. Each slot folds its output into the next hook's input.
#[derive(Clone, Default)]
pub struct HookRegistry {
    hooks: Vec<Arc<dyn Hook>>,
}

impl HookRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, hook: Arc<dyn Hook>) {
        self.hooks.push(hook);
    }

    pub fn with(mut self, hook: Arc<dyn Hook>) -> Self {
        self.register(hook);
        self
    }

    pub fn len(&self) -> usize {
        self.hooks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hooks.is_empty()
    }

    pub fn before_request(&self, request: Request) -> Request {
        self.hooks
            .iter()
            .fold(request, |request, hook| hook.before_request(request))
    }

    pub fn after_response(&self, request: &Request, response: Response) -> Response {
        self.hooks
            .iter()
            .fold(response, |response, hook| hook.after_response(request, response))
    }

    pub fn on_error(&self, request: &Request, error: HnError) -> HnError {
        self.hooks
            .iter()
            .fold(error, |error, hook| hook.on_error(request, error))
    }
}

impl std::fmt::Debug for HookRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HookRegistry")
            .field("hooks", &self.hooks.len())
            .finish()
    }
}

/// Logs every dispatch through `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingHook;

impl Hook for TracingHook {
    fn before_request(&self, request: Request) -> Request {
        debug!(method = %request.method, url = %request.url, "dispatching request");
        request
    }

    fn after_response(&self, request: &Request, response: Response) -> Response {
        debug!(
            url = %request.url,
            status = response.status.as_u16(),
            bytes = response.body.len(),
            "response received"
        );
        response
    }

    fn on_error(&self, request: &Request, error: HnError) -> HnError {
        if !error.is_cancelled() {
            warn!(url = %request.url, error = %error, "request failed");
        }
        error
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::net::mock::{response, test_url};
    use parking_lot::Mutex;
    use reqwest::header::{HeaderName, HeaderValue};

    /// Appends its tag to a shared trace and to an `x-trace` header.
    struct Tagger {
        tag: &'static str,
        trace: Arc<Mutex<Vec<String>>>,
    }

    impl Hook for Tagger {
        fn before_request(&self, request: Request) -> Request {
            self.trace.lock().push(format!("before:{}", self.tag));
            let previous = request
                .headers
                .get("x-trace")
                .and_then(|v| v.to_str().ok())
                .unwrap_or("")
                .to_string();
            let value = format!("{previous}{}", self.tag);
            request.with_header(
                HeaderName::from_static("x-trace"),
                HeaderValue::from_str(&value).unwrap(),
            )
        }

        fn after_response(&self, _request: &Request, response: Response) -> Response {
            self.trace.lock().push(format!("after:{}", self.tag));
            response
        }
    }

    /// Replaces any error with a validation error naming itself.
    struct Rewriter;

    impl Hook for Rewriter {
        fn on_error(&self, _request: &Request, error: HnError) -> HnError {
            HnError::Validation(format!("rewritten: {error}"))
        }
    }

    #[test]
    fn test_hooks_run_in_registration_order() {
        let trace = Arc::new(Mutex::new(Vec::new()));
        let registry = HookRegistry::new()
            .with(Arc::new(Tagger {
                tag: "a",
                trace: Arc::clone(&trace),
            }))
            .with(Arc::new(Tagger {
                tag: "b",
                trace: Arc::clone(&trace),
            }));

        let request = registry.before_request(Request::get(test_url("item/1.json")));
        assert_eq!(
            request.headers.get("x-trace").unwrap().to_str().unwrap(),
            "ab"
        );

        let resp = response(&request, 200, "{}");
        registry.after_response(&request, resp);
        assert_eq!(
            trace.lock().as_slice(),
            ["before:a", "before:b", "after:a", "after:b"]
        );
    }

    #[test]
    fn test_error_hooks_can_substitute() {
        let registry = HookRegistry::new()
            .with(Arc::new(TracingHook))
            .with(Arc::new(Rewriter));
        let request = Request::get(test_url("item/1.json"));

        let error = registry.on_error(&request, HnError::transport("reset"));
        match error {
            HnError::Validation(message) => {
                assert_eq!(message, "rewritten: transport error: reset")
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn test_empty_registry_passes_through() {
        let registry = HookRegistry::new();
        assert!(registry.is_empty());

        let request = registry.before_request(Request::get(test_url("item/1.json")));
        assert!(request.headers.is_empty());
        let error = registry.on_error(&request, HnError::Cancelled);
        assert!(error.is_cancelled());
    }
}
