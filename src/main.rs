//! Gateway binary.
//!
//! ```text
//!     Client Request
//!     ──────────────▶ http::server ──▶ routing (RouteTable snapshot)
//!                                          │ first match, filters, target
//!                                          ▼
//!     Client Response                  http::client ──────────────▶ Upstream
//!     ◀────────────── response (stream) ◀─────────────────────────────┘
//!                          │
//!                          └─ on upstream failure: route fallback, else 502/504
//!
//!     config file ──notify/SIGHUP──▶ reload loop ──▶ SharedRouteTable::replace
//! ```

use std::time::Duration;

use tokio::net::TcpListener;
use tokio::sync::mpsc;

use stream_gateway::config::watcher::{reload_into, ConfigWatcher};
use stream_gateway::config::{load_config, GatewayConfig};
use stream_gateway::http::HttpServer;
use stream_gateway::lifecycle::{reload_signals, wait_for_shutdown, wait_for_termination, Shutdown};
use stream_gateway::observability::{init_logging, metrics};

/// How long in-flight requests get to finish after a shutdown signal.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(10);

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config_path = stream_gateway::config_path_from_env("GATEWAY_CONFIG");
    let config = match &config_path {
        Some(path) => load_config(path)?,
        None => GatewayConfig::demo(),
    };

    init_logging(&config.observability)?;
    tracing::info!("stream-gateway v{} starting", env!("CARGO_PKG_VERSION"));

    match &config_path {
        Some(path) => tracing::info!(path = ?path, routes = config.routes.len(), "Configuration loaded"),
        None => tracing::info!(routes = config.routes.len(), "No config file given; using built-in routes"),
    }

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let shutdown = Shutdown::new();

    // Reload sources: file watcher and SIGHUP feed one channel.
    let (_watcher, config_updates) = match config_path {
        Some(path) => {
            let (watcher, updates) = ConfigWatcher::new(&path);
            let sender = watcher.sender();
            let guard = watcher.run()?;

            let mut hangups = reload_signals();
            tokio::spawn(async move {
                while hangups.recv().await.is_some() {
                    reload_into(&path, &sender);
                }
            });
            (Some(guard), updates)
        }
        None => {
            let (_, updates) = mpsc::unbounded_channel();
            (None, updates)
        }
    };

    let server = HttpServer::new(config.clone())?;

    if config.admin.enabled {
        if config.admin.api_key == "CHANGE_ME_IN_PRODUCTION" {
            tracing::warn!("Admin API is using the default API key");
        }
        let admin = server.admin_router();
        let listener = TcpListener::bind(&config.admin.bind_address).await?;
        tracing::info!(address = %listener.local_addr()?, "Admin API listening");
        let mut admin_shutdown = shutdown.subscribe();
        tokio::spawn(async move {
            let result = axum::serve(listener, admin)
                .with_graceful_shutdown(async move { wait_for_shutdown(&mut admin_shutdown).await })
                .await;
            if let Err(e) = result {
                tracing::error!(error = %e, "Admin API failed");
            }
        });
    }

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    let mut server_task = tokio::spawn(server.run(listener, config_updates, shutdown.subscribe()));

    tokio::select! {
        result = &mut server_task => {
            result??;
            return Ok(());
        }
        _ = wait_for_termination() => {}
    }

    shutdown.trigger();
    match tokio::time::timeout(DRAIN_TIMEOUT, server_task).await {
        Ok(result) => result??,
        Err(_) => tracing::warn!(timeout = ?DRAIN_TIMEOUT, "Drain deadline passed; dropping open connections"),
    }

    tracing::info!("Shutdown complete");
    Ok(())
}
