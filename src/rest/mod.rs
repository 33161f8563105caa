//! REST dispatch subsystem.
//!
//! # Data Flow
//! ```text
//! axum Router (registry.rs, one mount per declared template)
//!     → request.rs (buffer body, decode query)
//!     → dispatcher.rs (prepare hooks, verb check, first structural match)
//!     → filter.rs (pre-request filters, first failure wins)
//!     → operation.rs (argument binding, handler call)
//!     → reply.rs (normalize into the JSON envelope)
//! ```
//!
//! # Design Decisions
//! - Route tables are compiled once per handler type and never mutated
//! - Matching is positional: arity plus literal segments at their positions
//! - Every matched request answers HTTP 200 with an envelope, success or not

pub mod dispatcher;
pub mod error;
pub mod filter;
pub mod operation;
pub mod registry;
pub mod reply;
pub mod request;
pub mod route;

pub use dispatcher::{DispatchOutcome, Dispatcher};
pub use error::{BoxError, RestError};
pub use filter::{Filter, FilterChain};
pub use operation::{Args, Endpoint, Operation, OperationTable, RestHandler, Service};
pub use registry::{ServiceBinding, ServiceRegistry};
pub use reply::{IntoReply, Reply, ResponseEnvelope, Single};
pub use request::{IncomingRequest, X_REQUEST_ID};
pub use route::{RouteMetadata, Segment, Verb};
