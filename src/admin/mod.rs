//! Gateway admin API.
//!
//! Served on its own listener. `/admin/*` requires a bearer token;
//! `/healthz` does not.

pub mod auth;
pub mod handlers;

use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{middleware, routing::get, Router};
use tower_http::timeout::TimeoutLayer;

use crate::routing::SharedRouteTable;
use self::auth::admin_auth_middleware;
use self::handlers::*;

/// State shared by admin handlers.
#[derive(Clone)]
pub struct AdminState {
    pub routes: Arc<SharedRouteTable>,
    pub api_key: Arc<str>,
    pub started_at: Instant,
}

#[allow(deprecated)]
pub fn setup_admin_router(state: AdminState) -> Router {
    Router::new()
        .route("/admin/status", get(get_status))
        .route("/admin/routes", get(get_routes))
        .route_layer(middleware::from_fn_with_state(state.clone(), admin_auth_middleware))
        .route("/healthz", get(healthz))
        .layer(TimeoutLayer::new(Duration::from_secs(10)))
        .with_state(state)
}
