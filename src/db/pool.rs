//! Process-wide connection pools.
//!
//! # Responsibilities
//! - One pool per distinct connection string, created on first use
//! - Keep pools for the lifetime of the process
//!
//! # Design Decisions
//! - The registry is a `DashMap`; creation goes through the entry API so two
//!   tasks asking for a new URL at once still create a single pool
//! - Pools connect lazily; a reachable database is only required once a
//!   session actually runs a statement

use std::sync::LazyLock;
use std::time::Duration;

use dashmap::DashMap;
use sqlx::any::AnyPoolOptions;
use sqlx::AnyPool;

use crate::db::error::DbError;
use crate::db::url::{redact, ConnectionSpec};

pub type DbPool = AnyPool;

/// Pool sizing.
///
/// sqlx has no ceiling on idle connections, only a floor. `max_idle_connections`
/// is therefore applied as `min_connections` (capped at `max_open_connections`):
/// the pool keeps that many connections warm, opening them in the background
/// once created, and closes any extra connection after `max_recycle_sec` idle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolSettings {
    /// Connections kept warm while idle.
    pub max_idle_connections: u32,
    /// Age after which a connection is closed and replaced.
    pub max_recycle_sec: u64,
    pub max_open_connections: u32,
    pub acquire_timeout_secs: u64,
}

impl Default for PoolSettings {
    fn default() -> Self {
        Self {
            max_idle_connections: 1,
            max_recycle_sec: 3600,
            max_open_connections: 10,
            acquire_timeout_secs: 30,
        }
    }
}

static POOLS: LazyLock<DashMap<String, DbPool>> = LazyLock::new(DashMap::new);

/// The pool for `url`, creating it with `settings` on first use.
///
/// Settings only apply when the pool is created; later calls for the same
/// URL return the cached pool unchanged.
pub fn get_pool(url: &str, settings: PoolSettings) -> Result<DbPool, DbError> {
    if let Some(pool) = POOLS.get(url) {
        return Ok(pool.clone());
    }

    match POOLS.entry(url.to_string()) {
        dashmap::mapref::entry::Entry::Occupied(entry) => Ok(entry.get().clone()),
        dashmap::mapref::entry::Entry::Vacant(entry) => {
            let pool = build_pool(url, settings)?;
            tracing::info!(
                target_db = %redact(url),
                max_idle = settings.max_idle_connections,
                max_open = settings.max_open_connections,
                recycle_secs = settings.max_recycle_sec,
                "Connection pool created"
            );
            Ok(entry.insert(pool).clone())
        }
    }
}

/// Whether a pool for `url` has been created.
pub fn is_cached(url: &str) -> bool {
    POOLS.contains_key(url)
}

fn build_pool(url: &str, settings: PoolSettings) -> Result<DbPool, DbError> {
    let spec: ConnectionSpec = url.parse()?;
    sqlx::any::install_default_drivers();

    let recycle = Duration::from_secs(settings.max_recycle_sec);
    AnyPoolOptions::new()
        .max_connections(settings.max_open_connections)
        .min_connections(settings.max_idle_connections.min(settings.max_open_connections))
        .idle_timeout(recycle)
        .max_lifetime(recycle)
        .acquire_timeout(Duration::from_secs(settings.acquire_timeout_secs))
        .connect_lazy(url)
        .map_err(|source| DbError::Pool {
            target: spec.to_string(),
            source,
        })
}
