//! Service registry.
//!
//! # Responsibilities
//! - Collect services at startup
//! - Mount each service under every path template it declares
//! - Compile the bindings into an axum [`Router`]
//!
//! # Design Decisions
//! - Built once at startup, immutable afterwards
//! - The first service registered for a pattern owns it; later ones are shadowed
//! - A mounted pattern only selects the service; the dispatcher then picks the
//!   operation, so a request may land on a sibling operation of the same shape

use std::collections::HashSet;
use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::any;
use axum::{Json, Router};

use crate::rest::dispatcher::Dispatcher;
use crate::rest::operation::{Endpoint, RestHandler, Service};
use crate::rest::reply::ResponseEnvelope;
use crate::rest::request::IncomingRequest;

/// Default cap on buffered request bodies.
pub const DEFAULT_BODY_LIMIT: usize = 2 * 1024 * 1024;

/// A service mounted under one URL pattern.
#[derive(Clone)]
pub struct ServiceBinding {
    pattern: String,
    template: String,
    endpoint: Arc<dyn Endpoint>,
}

impl ServiceBinding {
    /// Axum route pattern.
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// The declared template the pattern was derived from.
    pub fn template(&self) -> &str {
        &self.template
    }

    pub fn service_name(&self) -> &'static str {
        self.endpoint.name()
    }
}

impl std::fmt::Debug for ServiceBinding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceBinding")
            .field("pattern", &self.pattern)
            .field("template", &self.template)
            .field("service", &self.endpoint.name())
            .finish()
    }
}

/// Ordered `(pattern, service)` bindings plus the shared dispatcher.
#[derive(Debug, Clone)]
pub struct ServiceRegistry {
    dispatcher: Dispatcher,
    bindings: Vec<ServiceBinding>,
    body_limit: usize,
}

impl Default for ServiceRegistry {
    fn default() -> Self {
        Self::new(Dispatcher::default())
    }
}

impl ServiceRegistry {
    pub fn new(dispatcher: Dispatcher) -> Self {
        Self {
            dispatcher,
            bindings: Vec::new(),
            body_limit: DEFAULT_BODY_LIMIT,
        }
    }

    pub fn with_body_limit(mut self, limit: usize) -> Self {
        self.body_limit = limit;
        self
    }

    /// Mount `service` under each of its declared templates.
    pub fn register<S: RestHandler>(&mut self, service: Service<S>) -> &mut Self {
        let endpoint: Arc<dyn Endpoint> = Arc::new(service);
        let routes: Vec<(String, String)> = endpoint
            .routes()
            .into_iter()
            .map(|meta| (meta.route_pattern(), meta.path_template().to_string()))
            .collect();

        for (pattern, template) in routes {
            tracing::debug!(
                service = endpoint.name(),
                template = %template,
                pattern = %pattern,
                "Service bound"
            );
            self.bindings.push(ServiceBinding {
                pattern,
                template,
                endpoint: endpoint.clone(),
            });
        }
        self
    }

    pub fn bindings(&self) -> &[ServiceBinding] {
        &self.bindings
    }

    /// Patterns in registration order, duplicates included.
    pub fn patterns(&self) -> Vec<&str> {
        self.bindings.iter().map(|b| b.pattern.as_str()).collect()
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    /// Compile the bindings into a router. Unknown paths answer 404.
    pub fn into_router(self) -> Router {
        let mut router = Router::new();
        let mut mounted: HashSet<String> = HashSet::new();
        let body_limit = self.body_limit;

        for binding in self.bindings {
            if !mountable(&binding.pattern) {
                tracing::warn!(
                    template = %binding.template,
                    service = binding.endpoint.name(),
                    "Template cannot be mounted, skipped"
                );
                continue;
            }
            if !mounted.insert(binding.pattern.clone()) {
                tracing::warn!(
                    pattern = %binding.pattern,
                    template = %binding.template,
                    service = binding.endpoint.name(),
                    "Pattern already mounted, binding shadowed"
                );
                continue;
            }

            let endpoint = binding.endpoint;
            let dispatcher = self.dispatcher.clone();
            router = router.route(
                &binding.pattern,
                any(move |request: Request<Body>| {
                    let endpoint = endpoint.clone();
                    let dispatcher = dispatcher.clone();
                    async move { serve(endpoint, dispatcher, body_limit, request).await }
                }),
            );
        }

        tracing::info!(patterns = mounted.len(), "Service routes compiled");
        router.fallback(|| async { StatusCode::NOT_FOUND })
    }
}

async fn serve(
    endpoint: Arc<dyn Endpoint>,
    dispatcher: Dispatcher,
    body_limit: usize,
    request: Request<Body>,
) -> Response {
    let request = match IncomingRequest::from_http(request, body_limit).await {
        Ok(request) => request,
        Err(err) => {
            tracing::warn!(error = %err, limit = body_limit, "Request body rejected");
            return (
                StatusCode::PAYLOAD_TOO_LARGE,
                Json(ResponseEnvelope::failure(err.to_string())),
            )
                .into_response();
        }
    };
    endpoint.dispatch(&dispatcher, request).await.into_response()
}

/// axum refuses segments that start with `:` or `*`.
fn mountable(pattern: &str) -> bool {
    pattern
        .split('/')
        .all(|segment| !segment.starts_with(':') && !segment.starts_with('*'))
}
