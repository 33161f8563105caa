//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the service.
//! All types derive Serde traits for deserialization from config files.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::db::PoolSettings;

/// Root configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct AppConfig {
    /// Listener configuration (bind address, body limit).
    pub listener: ListenerConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Database pool settings.
    pub database: DatabaseConfig,

    /// Log output settings.
    pub logging: LoggingConfig,

    /// Metrics settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8888").
    pub bind_address: String,

    /// Largest request body that is buffered, in bytes.
    pub max_body_bytes: usize,

    /// Where `/` redirects to, if set.
    pub landing_path: Option<String>,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8888".to_string(),
            max_body_bytes: 2 * 1024 * 1024,
            landing_path: None,
        }
    }
}

/// Timeout configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Request timeout (total time for request/response) in seconds.
    pub request_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self { request_secs: 30 }
    }
}

/// Database configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Connection string; no pool is created at startup when absent.
    pub url: Option<String>,

    /// Connections kept open while idle.
    pub max_idle_connections: u32,

    /// Seconds after which a connection is recycled.
    pub max_recycle_sec: u64,

    pub max_open_connections: u32,

    pub acquire_timeout_secs: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        let pool = PoolSettings::default();
        Self {
            url: None,
            max_idle_connections: pool.max_idle_connections,
            max_recycle_sec: pool.max_recycle_sec,
            max_open_connections: pool.max_open_connections,
            acquire_timeout_secs: pool.acquire_timeout_secs,
        }
    }
}

impl DatabaseConfig {
    pub fn pool_settings(&self) -> PoolSettings {
        PoolSettings {
            max_idle_connections: self.max_idle_connections,
            max_recycle_sec: self.max_recycle_sec,
            max_open_connections: self.max_open_connections,
            acquire_timeout_secs: self.acquire_timeout_secs,
        }
    }
}

/// Log line format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error) or a full filter directive.
    pub level: String,

    pub format: LogFormat,

    /// Also write log lines to this file. Rotated files get a date suffix.
    pub file: Option<PathBuf>,

    /// When the log file is rolled over.
    pub rotation: LogRotation,

    /// Rotated files kept before the oldest is deleted.
    pub max_log_files: usize,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Pretty,
            file: None,
            rotation: LogRotation::Daily,
            max_log_files: 3650,
        }
    }
}

/// Log file rollover policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogRotation {
    Never,
    Hourly,
    /// Roll over at midnight.
    #[default]
    Daily,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
