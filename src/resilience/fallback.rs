//! Per-route fallbacks.
//!
//! A fallback turns a confirmed `UpstreamError` into the response the
//! client sees. It is never consulted for NoMatch or filter errors, and it
//! runs at most once per request.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::Response;
use dashmap::DashMap;

use crate::config::schema::FallbackConfig;
use crate::error::UpstreamError;
use crate::routing::RouteError;

/// Produces a response for a failed forward.
pub trait Fallback: Send + Sync {
    fn respond(&self, error: &UpstreamError) -> Response;
}

impl<F> Fallback for F
where
    F: Fn(&UpstreamError) -> Response + Send + Sync,
{
    fn respond(&self, error: &UpstreamError) -> Response {
        self(error)
    }
}

/// Fixed response declared in config.
#[derive(Debug, Clone)]
pub struct StaticFallback {
    status: StatusCode,
    body: String,
    content_type: HeaderValue,
}

impl StaticFallback {
    pub fn from_config(config: &FallbackConfig) -> Result<Self, RouteError> {
        let status = StatusCode::from_u16(config.status)
            .map_err(|_| RouteError::InvalidFallback(format!("status {}", config.status)))?;
        let content_type = HeaderValue::from_str(&config.content_type)
            .map_err(|_| RouteError::InvalidFallback(format!("content type `{}`", config.content_type)))?;
        Ok(Self {
            status,
            body: config.body.clone(),
            content_type,
        })
    }
}

impl Fallback for StaticFallback {
    fn respond(&self, _error: &UpstreamError) -> Response {
        let mut response = Response::new(Body::from(self.body.clone()));
        *response.status_mut() = self.status;
        response
            .headers_mut()
            .insert(header::CONTENT_TYPE, self.content_type.clone());
        response
    }
}

/// Fallbacks registered in code, keyed by route id.
///
/// The registry outlives any single route table, so registrations survive
/// config reloads. A registered fallback takes precedence over one
/// declared in config.
#[derive(Clone, Default)]
pub struct FallbackRegistry {
    handlers: Arc<DashMap<String, Arc<dyn Fallback>>>,
}

impl FallbackRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, route_id: impl Into<String>, fallback: impl Fallback + 'static) {
        self.handlers.insert(route_id.into(), Arc::new(fallback));
    }

    pub fn get(&self, route_id: &str) -> Option<Arc<dyn Fallback>> {
        self.handlers.get(route_id).map(|entry| entry.value().clone())
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl std::fmt::Debug for FallbackRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut ids: Vec<String> = self.handlers.iter().map(|e| e.key().clone()).collect();
        ids.sort();
        f.debug_struct("FallbackRegistry").field("routes", &ids).finish()
    }
}
