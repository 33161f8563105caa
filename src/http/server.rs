//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create the axum Router from the service registry
//! - Wire up middleware (request ID, tracing, timeout)
//! - Redirect `/` to the landing page when one is configured
//! - Serve on a listener until the shutdown future resolves

use std::future::Future;
use std::time::Duration;

use axum::{body::Body, http::Request, response::Redirect, routing::get, Router};
use tokio::net::TcpListener;
use tower_http::{
    request_id::{PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::config::AppConfig;
use crate::http::request::UuidRequestId;
use crate::rest::{ServiceRegistry, X_REQUEST_ID};

/// HTTP server for the registered services.
pub struct HttpServer {
    router: Router,
    config: AppConfig,
}

impl HttpServer {
    /// Create a new HTTP server with the given configuration.
    pub fn new(config: AppConfig, registry: ServiceRegistry) -> Self {
        let router = Self::build_router(&config, registry);
        Self { router, config }
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(config: &AppConfig, registry: ServiceRegistry) -> Router {
        let root_taken = registry.patterns().contains(&"/");
        let mut router = registry
            .with_body_limit(config.listener.max_body_bytes)
            .into_router();

        if let Some(landing) = config.listener.landing_path.clone() {
            if root_taken {
                tracing::warn!(landing = %landing, "A service is mounted at `/`, landing redirect disabled");
            } else {
                router = router.route("/", get(move || std::future::ready(Redirect::temporary(&landing))));
            }
        }

        router
            .layer(TimeoutLayer::new(Duration::from_secs(config.timeouts.request_secs)))
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(TraceLayer::new_for_http().make_span_with(|request: &Request<Body>| {
                let request_id = request
                    .headers()
                    .get(X_REQUEST_ID)
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or("unknown");
                tracing::info_span!(
                    "request",
                    method = %request.method(),
                    path = %request.uri().path(),
                    request_id = %request_id,
                )
            }))
            .layer(SetRequestIdLayer::x_request_id(UuidRequestId))
    }

    /// Run the server, accepting connections on the given listener until
    /// `shutdown` resolves.
    pub async fn run<F>(self, listener: TcpListener, shutdown: F) -> Result<(), std::io::Error>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        // Serve with graceful shutdown
        axum::serve(listener, self.router)
            .with_graceful_shutdown(shutdown)
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    /// The fully layered router.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Get a reference to the config.
    pub fn config(&self) -> &AppConfig {
        &self.config
    }
}
