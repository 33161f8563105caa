//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, pool sizes, addresses)
//! - Check the database connection string shape before any pool exists
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: AppConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;

use thiserror::Error;

use crate::config::schema::AppConfig;
use crate::db::ConnectionSpec;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{field}: {message}")]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

pub fn validate_config(config: &AppConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "listener.bind_address",
            format!("`{}` is not a socket address", config.listener.bind_address),
        ));
    }
    if config.listener.max_body_bytes == 0 {
        errors.push(ValidationError::new("listener.max_body_bytes", "must be greater than 0"));
    }
    if let Some(landing) = &config.listener.landing_path {
        if !landing.starts_with('/') || landing == "/" {
            errors.push(ValidationError::new(
                "listener.landing_path",
                "must be an absolute path other than `/`",
            ));
        }
    }

    if config.timeouts.request_secs == 0 {
        errors.push(ValidationError::new("timeouts.request_secs", "must be greater than 0"));
    }

    let db = &config.database;
    if let Some(url) = &db.url {
        if let Err(e) = url.parse::<ConnectionSpec>() {
            errors.push(ValidationError::new("database.url", e.to_string()));
        }
    }
    if db.max_open_connections == 0 {
        errors.push(ValidationError::new("database.max_open_connections", "must be greater than 0"));
    }
    if db.max_idle_connections > db.max_open_connections {
        errors.push(ValidationError::new(
            "database.max_idle_connections",
            "cannot exceed max_open_connections",
        ));
    }
    if db.max_recycle_sec == 0 {
        errors.push(ValidationError::new("database.max_recycle_sec", "must be greater than 0"));
    }

    if config.logging.file.is_some() && config.logging.max_log_files == 0 {
        errors.push(ValidationError::new("logging.max_log_files", "must be greater than 0"));
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            format!("`{}` is not a socket address", config.observability.metrics_address),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
