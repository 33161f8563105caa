//! Pre-request hooks.
//!
//! # Responsibilities
//! - Hold prepare hooks (run for every request, before route resolution)
//! - Hold filters (run after an operation is selected, before binding)
//! - Run each list strictly in registration order, stopping at the first failure
//!
//! # Design Decisions
//! - Filters see the request read-only; they can veto but not redirect dispatch
//! - Filters may suspend (I/O); prepare hooks are synchronous
//! - No retry: a rejected request is answered with a failed envelope

use std::future::Future;
use std::sync::Arc;

use futures_util::future::BoxFuture;

use crate::observability::metrics;
use crate::rest::error::{BoxError, RestError};
use crate::rest::request::IncomingRequest;

/// A pre-request hook with veto power.
pub trait Filter: Send + Sync {
    fn apply<'a>(&'a self, request: &'a IncomingRequest) -> BoxFuture<'a, Result<(), BoxError>>;
}

type PrepareHook = Arc<dyn Fn(&IncomingRequest) -> Result<(), BoxError> + Send + Sync>;

/// Ordered prepare hooks and filters shared by every dispatch.
#[derive(Clone, Default)]
pub struct FilterChain {
    prepares: Vec<PrepareHook>,
    filters: Vec<Arc<dyn Filter>>,
}

impl std::fmt::Debug for FilterChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FilterChain")
            .field("prepares", &self.prepares.len())
            .field("filters", &self.filters.len())
            .finish()
    }
}

impl FilterChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a filter.
    pub fn push(&mut self, filter: impl Filter + 'static) -> &mut Self {
        self.filters.push(Arc::new(filter));
        self
    }

    /// Append a synchronous filter.
    pub fn push_fn<F>(&mut self, f: F) -> &mut Self
    where
        F: Fn(&IncomingRequest) -> Result<(), BoxError> + Send + Sync + 'static,
    {
        self.push(FnFilter(f))
    }

    /// Append an async filter. It receives its own copy of the request.
    pub fn push_async<F, Fut>(&mut self, f: F) -> &mut Self
    where
        F: Fn(IncomingRequest) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), BoxError>> + Send + 'static,
    {
        self.push(AsyncFnFilter(f))
    }

    /// Append a prepare hook.
    pub fn add_prepare<F>(&mut self, f: F) -> &mut Self
    where
        F: Fn(&IncomingRequest) -> Result<(), BoxError> + Send + Sync + 'static,
    {
        self.prepares.push(Arc::new(f));
        self
    }

    pub fn len(&self) -> usize {
        self.filters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }

    pub fn run_prepares(&self, request: &IncomingRequest) -> Result<(), RestError> {
        for hook in &self.prepares {
            hook(request).map_err(RestError::Prepare)?;
        }
        Ok(())
    }

    /// Run every filter in order; the first error aborts the chain.
    pub async fn run(&self, request: &IncomingRequest) -> Result<(), RestError> {
        for (index, filter) in self.filters.iter().enumerate() {
            if let Err(err) = filter.apply(request).await {
                tracing::warn!(
                    request_id = request.request_id().unwrap_or("unknown"),
                    path = %request.path(),
                    filter = index,
                    error = %err,
                    "Request rejected by filter"
                );
                metrics::record_filter_rejection();
                return Err(RestError::Filter(err));
            }
        }
        Ok(())
    }
}

struct FnFilter<F>(F);

impl<F> Filter for FnFilter<F>
where
    F: Fn(&IncomingRequest) -> Result<(), BoxError> + Send + Sync,
{
    fn apply<'a>(&'a self, request: &'a IncomingRequest) -> BoxFuture<'a, Result<(), BoxError>> {
        let result = (self.0)(request);
        Box::pin(async move { result })
    }
}

struct AsyncFnFilter<F>(F);

impl<F, Fut> Filter for AsyncFnFilter<F>
where
    F: Fn(IncomingRequest) -> Fut + Send + Sync,
    Fut: Future<Output = Result<(), BoxError>> + Send + 'static,
{
    fn apply<'a>(&'a self, request: &'a IncomingRequest) -> BoxFuture<'a, Result<(), BoxError>> {
        Box::pin((self.0)(request.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Method;
    use std::sync::Mutex;

    fn request() -> IncomingRequest {
        IncomingRequest::new(Method::GET, "/orders")
    }

    #[tokio::test]
    async fn test_filters_run_in_registration_order() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut chain = FilterChain::new();
        for name in ["auth", "audit", "quota"] {
            let seen = seen.clone();
            chain.push_fn(move |_| {
                seen.lock().unwrap().push(name);
                Ok(())
            });
        }

        chain.run(&request()).await.unwrap();
        assert_eq!(*seen.lock().unwrap(), vec!["auth", "audit", "quota"]);
    }

    #[tokio::test]
    async fn test_first_failure_short_circuits() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut chain = FilterChain::new();
        let first = seen.clone();
        chain.push_fn(move |_| {
            first.lock().unwrap().push("first");
            Err("denied".into())
        });
        let second = seen.clone();
        chain.push_fn(move |_| {
            second.lock().unwrap().push("second");
            Ok(())
        });

        let err = chain.run(&request()).await.unwrap_err();
        assert_eq!(err.to_string(), "denied");
        assert_eq!(*seen.lock().unwrap(), vec!["first"]);
    }

    #[tokio::test]
    async fn test_async_filter_can_suspend() {
        let mut chain = FilterChain::new();
        chain.push_async(|req| async move {
            tokio::task::yield_now().await;
            if req.headers().contains_key("authorization") {
                Ok(())
            } else {
                Err("missing credentials".into())
            }
        });

        assert!(chain.run(&request()).await.is_err());
        let authed = request().with_header("authorization", "Bearer t");
        assert!(chain.run(&authed).await.is_ok());
    }

    #[test]
    fn test_prepare_hooks() {
        let mut chain = FilterChain::new();
        chain.add_prepare(|req| {
            if req.path().len() > 8 {
                Err("path too long".into())
            } else {
                Ok(())
            }
        });
        assert!(chain.run_prepares(&request()).is_ok());
        let long = IncomingRequest::new(Method::GET, "/a/very/long/path");
        assert!(matches!(chain.run_prepares(&long), Err(RestError::Prepare(_))));
    }
}
