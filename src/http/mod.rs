//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (axum setup, middleware)
//!     → request.rs (request ID)
//!     → rest::ServiceRegistry routes
//!     → response with the same x-request-id
//! ```

pub mod request;
pub mod server;

pub use request::UuidRequestId;
pub use server::HttpServer;
