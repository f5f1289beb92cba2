use axum::{extract::State, Json};
use serde::Serialize;

use crate::admin::AdminState;

#[derive(Debug, Serialize)]
pub struct SystemStatus {
    pub version: &'static str,
    pub status: &'static str,
    pub uptime_secs: u64,
    pub routes: usize,
    pub generation: u64,
}

#[derive(Debug, Serialize)]
pub struct RouteSummary {
    pub id: String,
    pub upstream: String,
    pub filters: usize,
    pub fallback: bool,
}

#[derive(Debug, Serialize)]
pub struct RouteListing {
    pub generation: u64,
    pub routes: Vec<RouteSummary>,
}

pub async fn get_status(State(state): State<AdminState>) -> Json<SystemStatus> {
    let table = state.routes.snapshot();
    Json(SystemStatus {
        version: env!("CARGO_PKG_VERSION"),
        status: "operational",
        uptime_secs: state.started_at.elapsed().as_secs(),
        routes: table.len(),
        generation: table.generation(),
    })
}

/// Routes of the current table, in match order.
pub async fn get_routes(State(state): State<AdminState>) -> Json<RouteListing> {
    let table = state.routes.snapshot();
    let routes = table
        .routes()
        .iter()
        .map(|route| RouteSummary {
            id: route.id().to_string(),
            upstream: route.upstream().to_string(),
            filters: route.filter_count(),
            fallback: route.fallback().is_some(),
        })
        .collect();

    Json(RouteListing {
        generation: table.generation(),
        routes,
    })
}

pub async fn healthz() -> &'static str {
    "ok"
}
