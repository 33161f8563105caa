//! Built-in services.

pub mod test_service;

pub use test_service::TestService;
