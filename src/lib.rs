//! Streaming customers service and route-table gateway.
//!
//! Two services share this crate:
//! - `customers` streams generated customers over SSE and WebSocket
//! - `gateway` forwards requests to upstreams according to an ordered,
//!   hot-reloadable route table

// Core subsystems
pub mod config;
pub mod customers;
pub mod error;
pub mod http;
pub mod routing;

// Cross-cutting concerns
pub mod admin;
pub mod lifecycle;
pub mod observability;
pub mod resilience;

pub use config::schema::{CustomersConfig, GatewayConfig};
pub use customers::CustomersServer;
pub use error::{GatewayError, UpstreamError};
pub use http::HttpServer;
pub use lifecycle::Shutdown;
pub use resilience::FallbackRegistry;
pub use routing::{Route, RouteTable};

use std::path::PathBuf;

/// Config file location: `env_var` if set, else the first CLI argument.
pub fn config_path_from_env(env_var: &str) -> Option<PathBuf> {
    std::env::var_os(env_var)
        .map(PathBuf::from)
        .or_else(|| std::env::args_os().nth(1).map(PathBuf::from))
}
