//! Request dispatch.
//!
//! # Data Flow
//! ```text
//! IncomingRequest
//!     → prepare hooks
//!     → verb check (405 if the handler declares nothing for the verb)
//!     → structural match (404 if no operation fits)
//!     → filter chain
//!     → argument binding
//!     → operation
//!     → envelope
//! ```
//!
//! # Design Decisions
//! - Never fails towards the caller: errors become `success: false` envelopes
//! - Application failures keep HTTP 200; only 404/405 change the status
//! - All per-request state lives on the task, nothing is shared between dispatches

use std::sync::Arc;
use std::time::Instant;

use axum::http::{Method, StatusCode};
use axum::response::{IntoResponse, Response};

use crate::observability::metrics;
use crate::rest::error::RestError;
use crate::rest::filter::FilterChain;
use crate::rest::operation::{Args, Operation, RestHandler, Service};
use crate::rest::reply::{Reply, ResponseEnvelope};
use crate::rest::request::IncomingRequest;

/// Result of dispatching one request against one handler.
#[derive(Debug)]
pub enum DispatchOutcome {
    /// An operation was selected; the envelope reports its success or failure.
    Envelope(ResponseEnvelope),
    /// The operation produced the HTTP response itself.
    Raw(Response),
    /// No operation structurally matches the path.
    NotFound,
    /// The handler declares no operation for this method.
    MethodNotAllowed(Method),
}

impl DispatchOutcome {
    pub fn status(&self) -> StatusCode {
        match self {
            DispatchOutcome::Envelope(_) => StatusCode::OK,
            DispatchOutcome::Raw(response) => response.status(),
            DispatchOutcome::NotFound => StatusCode::NOT_FOUND,
            DispatchOutcome::MethodNotAllowed(_) => StatusCode::METHOD_NOT_ALLOWED,
        }
    }

    /// The envelope, if this outcome carries one.
    pub fn envelope(&self) -> Option<&ResponseEnvelope> {
        match self {
            DispatchOutcome::Envelope(envelope) => Some(envelope),
            _ => None,
        }
    }
}

impl IntoResponse for DispatchOutcome {
    fn into_response(self) -> Response {
        match self {
            DispatchOutcome::Envelope(envelope) => envelope.into_response(),
            DispatchOutcome::Raw(response) => response,
            DispatchOutcome::NotFound => StatusCode::NOT_FOUND.into_response(),
            DispatchOutcome::MethodNotAllowed(method) => (
                StatusCode::METHOD_NOT_ALLOWED,
                format!("The service does not support the {method} verb"),
            )
                .into_response(),
        }
    }
}

/// Matches requests to operations and runs them behind the filter chain.
#[derive(Debug, Clone, Default)]
pub struct Dispatcher {
    filters: Arc<FilterChain>,
}

impl Dispatcher {
    pub fn new(filters: FilterChain) -> Self {
        Self {
            filters: Arc::new(filters),
        }
    }

    pub fn filters(&self) -> &FilterChain {
        &self.filters
    }

    /// Dispatch `request` to the first matching operation of `service`.
    pub async fn dispatch<S: RestHandler>(
        &self,
        service: &Service<S>,
        request: IncomingRequest,
    ) -> DispatchOutcome {
        let start = Instant::now();
        let method = request.method().clone();
        let outcome = self.route(service, request).await;
        metrics::record_request(method.as_str(), outcome.status().as_u16(), start);
        outcome
    }

    async fn route<S: RestHandler>(
        &self,
        service: &Service<S>,
        request: IncomingRequest,
    ) -> DispatchOutcome {
        let request_id = request.request_id().unwrap_or("unknown").to_string();

        if let Err(err) = self.filters.run_prepares(&request) {
            tracing::error!(request_id = %request_id, path = %request.path(), error = %err, "Prepare hook failed");
            return DispatchOutcome::Envelope(ResponseEnvelope::failure(err.to_string()));
        }

        let table = service.operations();
        let verb = match request.verb() {
            Some(verb) if table.declares(verb) => verb,
            _ => {
                tracing::warn!(
                    request_id = %request_id,
                    method = %request.method(),
                    path = %request.path(),
                    "No operation declared for verb"
                );
                return DispatchOutcome::MethodNotAllowed(request.method().clone());
            }
        };

        let request = Arc::new(request);
        let segments = request.segments();
        let Some(operation) = table.find(verb, &segments) else {
            tracing::debug!(request_id = %request_id, verb = %verb, path = %request.path(), "No operation matched");
            return DispatchOutcome::NotFound;
        };

        tracing::debug!(
            request_id = %request_id,
            verb = %verb,
            path = %request.path(),
            template = %operation.metadata().path_template(),
            "Dispatching"
        );

        match self.invoke(service, operation, request.clone(), &segments).await {
            Ok(Reply::Raw(response)) => {
                tracing::debug!(request_id = %request_id, "Operation wrote its own response, envelope skipped");
                DispatchOutcome::Raw(response)
            }
            Ok(reply) => DispatchOutcome::Envelope(ResponseEnvelope::from_reply(reply)),
            Err(err) => {
                tracing::error!(
                    request_id = %request_id,
                    verb = %verb,
                    path = %request.path(),
                    error = %err,
                    cause = ?std::error::Error::source(&err),
                    "Operation failed"
                );
                DispatchOutcome::Envelope(ResponseEnvelope::failure(err.to_string()))
            }
        }
    }

    async fn invoke<S: RestHandler>(
        &self,
        service: &Service<S>,
        operation: &Operation<S>,
        request: Arc<IncomingRequest>,
        segments: &[&str],
    ) -> Result<Reply, RestError> {
        self.filters.run(&request).await?;
        let args = Args::bind(operation.metadata(), request, segments)?;
        operation.invoke(service.handler().clone(), args).await
    }
}
