//! Customers service HTTP server.
//!
//! # Responsibilities
//! - Serve the customer stream over SSE and WebSocket
//! - Answer health checks
//! - End every open stream on shutdown, then drain

use std::sync::Arc;

use axum::{routing::get, Router};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::request_id::{PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;

use crate::config::schema::CustomersConfig;
use crate::customers::encoder::{CustomerEncoder, JsonEncoder};
use crate::customers::publisher::StreamPublisher;
use crate::customers::sse::stream_customers;
use crate::customers::websocket::ws_customers;
use crate::http::request::{MakeRequestUuid, X_REQUEST_ID};
use crate::lifecycle::shutdown::{wait_for_shutdown, Shutdown};

/// Application state injected into handlers.
#[derive(Clone)]
pub struct CustomersState {
    pub publisher: StreamPublisher,
    pub encoder: Arc<dyn CustomerEncoder>,
}

pub struct CustomersServer {
    router: Router,
    publisher: StreamPublisher,
}

impl CustomersServer {
    /// Create the service with the JSON encoder.
    pub fn new(config: &CustomersConfig, shutdown: &Shutdown) -> Self {
        Self::with_encoder(config, shutdown, Arc::new(JsonEncoder))
    }

    pub fn with_encoder(
        config: &CustomersConfig,
        shutdown: &Shutdown,
        encoder: Arc<dyn CustomerEncoder>,
    ) -> Self {
        let publisher = StreamPublisher::new(&config.stream, shutdown.clone());
        let state = CustomersState {
            publisher: publisher.clone(),
            encoder,
        };

        let router = Router::new()
            .route("/customers", get(stream_customers))
            .route("/ws/customers", get(ws_customers))
            .route("/healthz", get(|| async { "ok" }))
            .with_state(state)
            .layer(PropagateRequestIdLayer::new(X_REQUEST_ID))
            .layer(TraceLayer::new_for_http())
            .layer(SetRequestIdLayer::new(X_REQUEST_ID, MakeRequestUuid));

        Self { router, publisher }
    }

    pub fn publisher(&self) -> &StreamPublisher {
        &self.publisher
    }

    /// Serve until `shutdown` fires.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "Customers service listening");

        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move { wait_for_shutdown(&mut shutdown).await })
            .await?;

        tracing::info!(
            subscribers = self.publisher.subscriber_count(),
            "Customers service stopped"
        );
        Ok(())
    }
}
