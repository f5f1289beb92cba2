//! Gateway error taxonomy.
//!
//! Every request that is not forwarded successfully ends in one of these.
//! `NoMatch` and `Filter` are resolved locally; `Upstream` may be replaced
//! by a per-route fallback before it reaches the client.

use std::time::Duration;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use thiserror::Error;

use crate::routing::filter::FilterError;

/// Terminal request failures.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// No route predicate held.
    #[error("no route matches {method} {path}")]
    NoMatch { method: String, path: String },

    /// A route matched but its filters could not build an outbound request.
    #[error("route `{route_id}` rejected the request: {source}")]
    Filter {
        route_id: String,
        #[source]
        source: FilterError,
    },

    /// Forwarding to the resolved upstream failed.
    #[error(transparent)]
    Upstream(#[from] UpstreamError),
}

impl GatewayError {
    pub fn status(&self) -> StatusCode {
        match self {
            GatewayError::NoMatch { .. } => StatusCode::NOT_FOUND,
            GatewayError::Filter { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            GatewayError::Upstream(e) => e.status(),
        }
    }

    /// The selected route, when one was selected.
    pub fn route_id(&self) -> Option<&str> {
        match self {
            GatewayError::NoMatch { .. } => None,
            GatewayError::Filter { route_id, .. } => Some(route_id),
            GatewayError::Upstream(e) => Some(e.route_id()),
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let target = match &self {
            GatewayError::Upstream(e) => Some(e.target().to_string()),
            _ => None,
        };
        let body = serde_json::json!({
            "error": self.to_string(),
            "route": self.route_id(),
            "target": target,
        });
        (self.status(), Json(body)).into_response()
    }
}

/// Failures talking to an upstream. Each carries the route id and target
/// URI so operators can tell which route was selected.
#[derive(Debug, Error)]
pub enum UpstreamError {
    #[error("route `{route_id}`: could not connect to {target}: {reason}")]
    Connect {
        route_id: String,
        target: String,
        reason: String,
    },

    #[error("route `{route_id}`: {target} did not respond within {timeout:?}")]
    Timeout {
        route_id: String,
        target: String,
        timeout: Duration,
    },

    #[error("route `{route_id}`: request to {target} failed: {reason}")]
    Protocol {
        route_id: String,
        target: String,
        reason: String,
    },
}

impl UpstreamError {
    pub fn route_id(&self) -> &str {
        match self {
            UpstreamError::Connect { route_id, .. }
            | UpstreamError::Timeout { route_id, .. }
            | UpstreamError::Protocol { route_id, .. } => route_id,
        }
    }

    pub fn target(&self) -> &str {
        match self {
            UpstreamError::Connect { target, .. }
            | UpstreamError::Timeout { target, .. }
            | UpstreamError::Protocol { target, .. } => target,
        }
    }

    /// Short label for metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            UpstreamError::Connect { .. } => "connect",
            UpstreamError::Timeout { .. } => "timeout",
            UpstreamError::Protocol { .. } => "protocol",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            UpstreamError::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
            _ => StatusCode::BAD_GATEWAY,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let no_match = GatewayError::NoMatch {
            method: "GET".into(),
            path: "/unregistered-path".into(),
        };
        assert_eq!(no_match.status(), StatusCode::NOT_FOUND);
        assert_eq!(no_match.route_id(), None);

        let filter = GatewayError::Filter {
            route_id: "Twitter".into(),
            source: FilterError::InvalidPath { path: "/ x".into() },
        };
        assert_eq!(filter.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let timeout = GatewayError::from(UpstreamError::Timeout {
            route_id: "customers".into(),
            target: "http://localhost:9200/customers".into(),
            timeout: Duration::from_secs(1),
        });
        assert_eq!(timeout.status(), StatusCode::GATEWAY_TIMEOUT);
        assert_eq!(timeout.route_id(), Some("customers"));

        let connect = UpstreamError::Connect {
            route_id: "customers".into(),
            target: "http://localhost:9200/customers".into(),
            reason: "connection refused".into(),
        };
        assert_eq!(connect.status(), StatusCode::BAD_GATEWAY);
        assert!(connect.to_string().contains("customers"));
    }
}
