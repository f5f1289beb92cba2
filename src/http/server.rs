//! Gateway HTTP server.
//!
//! # Responsibilities
//! - Create the Axum router; every path goes to the proxy handler
//! - Wire up middleware (request ID, tracing, concurrency limit)
//! - Resolve requests against the current route table snapshot
//! - Forward to upstreams and stream responses back
//! - Apply per-route fallbacks to upstream failures
//! - Swap in new route tables as config updates arrive

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::{Method, Request},
    response::{IntoResponse, Response},
    Router,
};
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::{broadcast, mpsc};
use tower::{limit::ConcurrencyLimitLayer, ServiceBuilder};
use tower_http::request_id::{PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;
use tracing::Span;

use crate::admin::{setup_admin_router, AdminState};
use crate::config::schema::GatewayConfig;
use crate::config::validation::ValidationError;
use crate::error::GatewayError;
use crate::http::client::UpstreamClient;
use crate::http::request::{prepare_upstream_headers, MakeRequestUuid, RequestIdExt, X_REQUEST_ID};
use crate::http::response;
use crate::lifecycle::shutdown::wait_for_shutdown;
use crate::observability::metrics::{self, NO_ROUTE};
use crate::resilience::fallback::FallbackRegistry;
use crate::routing::{RequestView, RouteTable, SharedRouteTable};

/// Reasons the gateway cannot start.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("invalid route configuration: {}", join(.0))]
    InvalidRoutes(Vec<ValidationError>),

    #[error("failed to build TLS client config: {0}")]
    Tls(#[from] rustls::Error),
}

fn join(errors: &[ValidationError]) -> String {
    errors.iter().map(|e| e.to_string()).collect::<Vec<_>>().join("; ")
}

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub routes: Arc<SharedRouteTable>,
    pub fallbacks: FallbackRegistry,
    pub client: UpstreamClient,
}

/// The gateway: a route table in front of an upstream client.
pub struct HttpServer {
    router: Router,
    state: AppState,
    config: GatewayConfig,
    started_at: Instant,
}

impl HttpServer {
    /// Create a gateway with no code-registered fallbacks.
    pub fn new(config: GatewayConfig) -> Result<Self, ServerError> {
        Self::with_fallbacks(config, FallbackRegistry::new())
    }

    /// Create a gateway whose routes pick up fallbacks from `fallbacks`.
    ///
    /// The registry is consulted every time a table is compiled, so
    /// registrations made later take effect on the next reload.
    pub fn with_fallbacks(
        config: GatewayConfig,
        fallbacks: FallbackRegistry,
    ) -> Result<Self, ServerError> {
        let table =
            RouteTable::from_config(&config.routes, &fallbacks).map_err(ServerError::InvalidRoutes)?;
        let client = UpstreamClient::new(&config.timeouts)?;

        let state = AppState {
            routes: Arc::new(SharedRouteTable::new(table)),
            fallbacks,
            client,
        };

        let router = Self::build_router(&config, state.clone());
        Ok(Self {
            router,
            state,
            config,
            started_at: Instant::now(),
        })
    }

    /// Build the Axum router with all middleware layers.
    fn build_router(config: &GatewayConfig, state: AppState) -> Router {
        Router::new()
            .fallback(proxy_handler)
            .with_state(state)
            .layer(
                ServiceBuilder::new()
                    .layer(SetRequestIdLayer::new(X_REQUEST_ID, MakeRequestUuid))
                    .layer(TraceLayer::new_for_http().make_span_with(request_span))
                    .layer(PropagateRequestIdLayer::new(X_REQUEST_ID))
                    .layer(ConcurrencyLimitLayer::new(config.listener.max_connections)),
            )
    }

    /// The live route table.
    pub fn routes(&self) -> Arc<SharedRouteTable> {
        self.state.routes.clone()
    }

    pub fn fallbacks(&self) -> &FallbackRegistry {
        &self.state.fallbacks
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    /// The admin API over this gateway's route table.
    pub fn admin_router(&self) -> Router {
        setup_admin_router(AdminState {
            routes: self.state.routes.clone(),
            api_key: Arc::from(self.config.admin.api_key.as_str()),
            started_at: self.started_at,
        })
    }

    /// Serve until `shutdown` fires, applying configs from `config_updates`.
    pub async fn run(
        self,
        listener: TcpListener,
        mut config_updates: mpsc::UnboundedReceiver<GatewayConfig>,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            routes = self.state.routes.snapshot().len(),
            "Gateway listening"
        );

        let reload_state = self.state.clone();
        let mut reload_shutdown = shutdown.resubscribe();
        let reloader = tokio::spawn(async move {
            loop {
                tokio::select! {
                    update = config_updates.recv() => match update {
                        Some(config) => apply_config(&reload_state, &config),
                        None => break,
                    },
                    _ = wait_for_shutdown(&mut reload_shutdown) => break,
                }
            }
        });

        let app = self
            .router
            .into_make_service_with_connect_info::<SocketAddr>();
        axum::serve(listener, app)
            .with_graceful_shutdown(async move { wait_for_shutdown(&mut shutdown).await })
            .await?;

        reloader.abort();
        tracing::info!("Gateway stopped");
        Ok(())
    }
}

/// Compile and publish a new table, keeping the current one on error.
fn apply_config(state: &AppState, config: &GatewayConfig) {
    match RouteTable::from_config(&config.routes, &state.fallbacks) {
        Ok(table) => {
            let routes = table.len();
            let generation = state.routes.replace(table);
            metrics::record_reload("applied");
            tracing::info!(generation, routes, "Route table replaced");
        }
        Err(errors) => {
            metrics::record_reload("rejected");
            for error in &errors {
                tracing::warn!(error = %error, "Route table reload rejected");
            }
        }
    }
}

fn request_span(request: &Request<Body>) -> Span {
    tracing::info_span!(
        "request",
        method = %request.method(),
        uri = %request.uri(),
        request_id = %request.request_id(),
    )
}

/// Resolve, forward, and relay one request.
async fn proxy_handler(
    State(state): State<AppState>,
    ConnectInfo(client): ConnectInfo<SocketAddr>,
    request: Request<Body>,
) -> Response {
    let start = Instant::now();
    let table = state.routes.snapshot();
    let (parts, body) = request.into_parts();
    let request_id = parts.headers.request_id().to_string();
    let view = RequestView::from_parts(&parts);
    let mut headers = parts.headers.clone();

    let resolved = match table.resolve(&view, &mut headers) {
        Ok(resolved) => resolved,
        Err(e) => return reject(&parts.method, &request_id, e, start),
    };
    let route_id = resolved.route.id();
    prepare_upstream_headers(&mut headers, client, &resolved.target);

    tracing::debug!(
        request_id = %request_id,
        route = route_id,
        target = %resolved.target,
        "Forwarding request"
    );

    let mut outbound = Request::new(body);
    *outbound.method_mut() = parts.method.clone();
    *outbound.uri_mut() = resolved.target.clone();
    *outbound.headers_mut() = headers;

    match state.client.forward(route_id, outbound).await {
        Ok(upstream) => {
            metrics::record_request(parts.method.as_str(), upstream.status().as_u16(), route_id, start);
            response::from_upstream(upstream)
        }
        Err(err) => {
            metrics::record_upstream_error(route_id, err.kind());
            tracing::warn!(
                request_id = %request_id,
                route = route_id,
                target = err.target(),
                error = %err,
                "Upstream request failed"
            );

            let response = match resolved.route.fallback() {
                Some(fallback) => {
                    metrics::record_fallback(route_id);
                    tracing::info!(request_id = %request_id, route = route_id, "Serving fallback response");
                    fallback.respond(&err)
                }
                None => GatewayError::from(err).into_response(),
            };
            metrics::record_request(parts.method.as_str(), response.status().as_u16(), route_id, start);
            response
        }
    }
}

fn reject(method: &Method, request_id: &str, error: GatewayError, start: Instant) -> Response {
    match &error {
        GatewayError::NoMatch { path, .. } => {
            tracing::warn!(request_id = %request_id, method = %method, path = %path, "No route matched");
        }
        _ => {
            tracing::error!(request_id = %request_id, error = %error, "Request rejected by route filters");
        }
    }
    metrics::record_request(
        method.as_str(),
        error.status().as_u16(),
        error.route_id().unwrap_or(NO_ROUTE),
        start,
    );
    error.into_response()
}
