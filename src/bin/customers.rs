//! Customers service binary.

use std::time::Duration;

use tokio::net::TcpListener;

use stream_gateway::config::{load_customers_config, CustomersConfig};
use stream_gateway::customers::CustomersServer;
use stream_gateway::lifecycle::{wait_for_termination, Shutdown};
use stream_gateway::observability::{init_logging, metrics};

const DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = match stream_gateway::config_path_from_env("CUSTOMERS_CONFIG") {
        Some(path) => load_customers_config(&path)?,
        None => CustomersConfig::default(),
    };

    init_logging(&config.observability)?;
    tracing::info!(
        interval_ms = config.stream.interval_ms,
        names = config.stream.names.len(),
        "customers v{} starting",
        env!("CARGO_PKG_VERSION")
    );

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
    let server = CustomersServer::new(&config, &shutdown);
    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    let mut server_task = tokio::spawn(server.run(listener, shutdown.subscribe()));

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
        Err(_) => tracing::warn!(timeout = ?DRAIN_TIMEOUT, "Drain deadline passed"),
    }

    tracing::info!("Shutdown complete");
    Ok(())
}
