//! REST dispatch service.
//!
//! # Architecture Overview
//!
//! ```text
//!     Client Request
//!     ─────────────▶ http server ──▶ ServiceRegistry ──▶ Dispatcher ──▶ FilterChain
//!                    (request id,     (one mount per      (verb check,     (in order,
//!                     trace, timeout)  template)           first match)     first veto)
//!                                                               │
//!                                                               ▼
//!     Client Response                                       operation ──▶ TxSession
//!     ◀───────────── JSON envelope ◀──── reply normalization ◀──┘         (pooled db)
//! ```

use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;

use rest_dispatch::config::{load_config, validate_config, AppConfig};
use rest_dispatch::db;
use rest_dispatch::lifecycle::{spawn_signal_handler, Shutdown};
use rest_dispatch::observability::{logging, metrics};
use rest_dispatch::services::TestService;
use rest_dispatch::{HttpServer, Service, ServiceRegistry};

#[derive(Debug, Parser)]
#[command(name = "rest-dispatch", version, about = "REST dispatch service")]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the listener bind address.
    #[arg(short, long)]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => load_config(path)?,
        None => AppConfig::default(),
    };
    if let Some(bind) = cli.bind {
        config.listener.bind_address = bind;
        validate_config(&config).map_err(rest_dispatch::config::ConfigError::Validation)?;
    }

    let _log_guard = logging::init_logging(&config.logging)?;
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "rest-dispatch starting");
    tracing::info!(
        bind_address = %config.listener.bind_address,
        request_timeout_secs = config.timeouts.request_secs,
        database = config.database.url.is_some(),
        "Configuration loaded"
    );

    // Initialize metrics server
    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    if let Some(url) = &config.database.url {
        db::get_pool(url, config.database.pool_settings())?;
    }

    let mut registry = ServiceRegistry::default();
    registry.register(Service::new(TestService));

    // Bind TCP listener
    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let shutdown = Shutdown::new();
    spawn_signal_handler(shutdown.clone());

    let server = HttpServer::new(config, registry);
    server.run(listener, shutdown.wait()).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
