//! REST dispatch service library.
//!
//! Handler types declare their operations once; the registry mounts them on
//! an axum router, and the dispatcher answers every matched request with a
//! uniform JSON envelope. Operations reach the database through
//! transactional sessions on shared pools.

pub mod config;
pub mod db;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod rest;
pub mod services;

pub use config::AppConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
pub use rest::{Dispatcher, FilterChain, RestHandler, Service, ServiceRegistry};
