//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming Request (method, host, path, query, headers)
//!     → router.rs (ordered scan, first match wins)
//!     → matcher.rs (evaluate the route predicate, collect URI variables)
//!     → route.rs (run filters, build upstream target)
//!     → Return: Resolved { route, target } or GatewayError
//!
//! Route Compilation (at startup and on reload):
//!     RouteConfig[]
//!     → Compile predicates (pattern.rs, regex)
//!     → Compile filters (filter.rs)
//!     → Attach fallbacks (registry first, then config)
//!     → Freeze as immutable RouteTable
//!     → Publish through SharedRouteTable (atomic swap)
//! ```
//!
//! # Design Decisions
//! - Tables are immutable once built; a reload builds a new one and swaps it
//! - Declaration order is the only precedence rule
//! - A request keeps the table snapshot it started with
//! - Regex is only compiled for routes that declare one

pub mod filter;
pub mod matcher;
pub mod pattern;
pub mod route;
pub mod router;

pub use filter::{Exchange, Filter, FilterError};
pub use matcher::{FnMatcher, Matcher, RequestView, UriVariables};
pub use route::{Route, RouteBuilder};
pub use router::{Resolved, RouteMatch, RouteTable, RouteTableBuilder, SharedRouteTable};

use thiserror::Error;

use pattern::PatternError;

/// Problems compiling a route definition.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RouteError {
    #[error(transparent)]
    InvalidPattern(#[from] PatternError),

    #[error("invalid regex `{pattern}`: {reason}")]
    InvalidRegex { pattern: String, reason: String },

    #[error("regex `{pattern}` has no named group `{group}`")]
    UnknownGroup { pattern: String, group: String },

    #[error("invalid method `{0}`")]
    InvalidMethod(String),

    #[error("invalid header `{0}`")]
    InvalidHeader(String),

    #[error("invalid path template `{0}`")]
    InvalidTemplate(String),

    #[error("`{0}` predicate needs at least one condition")]
    EmptyPredicate(&'static str),

    #[error("invalid upstream `{uri}`: {reason}")]
    InvalidUpstream { uri: String, reason: String },

    #[error("invalid fallback: {0}")]
    InvalidFallback(String),

    #[error("duplicate route id `{0}`")]
    DuplicateId(String),
}
