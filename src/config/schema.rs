//! Configuration schema definitions.
//!
//! This module defines the configuration structures for both services.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Root configuration for the gateway.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct GatewayConfig {
    /// Listener configuration (bind address, concurrency).
    pub listener: ListenerConfig,

    /// Ordered route definitions. Declaration order is match priority.
    pub routes: Vec<RouteConfig>,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Admin API settings.
    pub admin: AdminConfig,
}

impl GatewayConfig {
    /// The route set the demo deployment ships with.
    ///
    /// `customers` and `test-route` point at a customers service on
    /// `localhost:9200`; the rest proxy public sites.
    pub fn demo() -> Self {
        let routes = vec![
            RouteConfig::new(
                "customers",
                "http://localhost:9200",
                PredicateConfig::path("/customers"),
            ),
            RouteConfig::new("Google", "https://google.com", PredicateConfig::path("/hello"))
                .with_filter(FilterConfig::SetPath {
                    template: "/".to_string(),
                }),
            RouteConfig::new(
                "Twitter",
                "http://twitter.com/@",
                PredicateConfig::path("/twitter/**"),
            )
            .with_filter(FilterConfig::RewritePath {
                regex: "/twitter/(?<handle>.*)".to_string(),
                replacement: "/${handle}".to_string(),
            }),
            RouteConfig::new(
                "HostTest",
                "https://spring.io/",
                PredicateConfig::And {
                    predicates: vec![
                        PredicateConfig::path("/test"),
                        PredicateConfig::host("*.spring.io"),
                    ],
                },
            )
            .with_filter(FilterConfig::SetPath {
                template: "/guides".to_string(),
            }),
            RouteConfig::new(
                "test-route",
                "http://localhost:9200",
                PredicateConfig::PathRegex {
                    pattern: ".*/customers2.*".to_string(),
                    captures: Vec::new(),
                },
            )
            .with_filter(FilterConfig::SetPath {
                template: "/customers".to_string(),
            }),
        ];

        Self {
            routes,
            ..Self::default()
        }
    }
}

/// Root configuration for the customers service.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CustomersConfig {
    /// Listener configuration.
    pub listener: ListenerConfig,

    /// Stream publisher settings.
    pub stream: StreamConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

impl Default for CustomersConfig {
    fn default() -> Self {
        Self {
            listener: ListenerConfig {
                bind_address: "0.0.0.0:9200".to_string(),
                ..ListenerConfig::default()
            },
            stream: StreamConfig::default(),
            observability: ObservabilityConfig::default(),
        }
    }
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,

    /// Maximum concurrent in-flight requests (backpressure).
    pub max_connections: usize,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            max_connections: 10_000,
        }
    }
}

/// A single route: predicate, filters, upstream.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct RouteConfig {
    /// Route identifier, unique within the table.
    pub id: String,

    /// Upstream base URI (`http` or `https`).
    pub uri: String,

    /// Condition a request must satisfy to select this route.
    pub predicate: PredicateConfig,

    /// Outbound request transformations, applied in order.
    #[serde(default)]
    pub filters: Vec<FilterConfig>,

    /// Response served when forwarding fails.
    #[serde(default)]
    pub fallback: Option<FallbackConfig>,
}

impl RouteConfig {
    pub fn new(id: impl Into<String>, uri: impl Into<String>, predicate: PredicateConfig) -> Self {
        Self {
            id: id.into(),
            uri: uri.into(),
            predicate,
            filters: Vec::new(),
            fallback: None,
        }
    }

    pub fn with_filter(mut self, filter: FilterConfig) -> Self {
        self.filters.push(filter);
        self
    }

    pub fn with_fallback(mut self, fallback: FallbackConfig) -> Self {
        self.fallback = Some(fallback);
        self
    }
}

/// Route predicate, as declared in config.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PredicateConfig {
    /// Segment pattern against the request path (`*`, `?`, `**`, `{var}`).
    Path { pattern: String },

    /// Segment pattern against the Host header (`*.example.com`).
    Host { pattern: String },

    /// Full-match regex against the request path.
    PathRegex {
        pattern: String,
        /// Named groups exported as URI variables. Empty exports all.
        #[serde(default)]
        captures: Vec<String>,
    },

    /// Request method is one of the listed methods.
    Method { methods: Vec<String> },

    /// Header is present, and matches `regex` when one is given.
    Header {
        name: String,
        #[serde(default)]
        regex: Option<String>,
    },

    /// Every sub-predicate holds.
    And { predicates: Vec<PredicateConfig> },

    /// At least one sub-predicate holds.
    Or { predicates: Vec<PredicateConfig> },
}

impl PredicateConfig {
    pub fn path(pattern: impl Into<String>) -> Self {
        Self::Path {
            pattern: pattern.into(),
        }
    }

    pub fn host(pattern: impl Into<String>) -> Self {
        Self::Host {
            pattern: pattern.into(),
        }
    }
}

/// Outbound request filter, as declared in config.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FilterConfig {
    /// Replace the path. `{var}` expands URI variables.
    SetPath { template: String },

    /// Regex replace on the path. The regex must match.
    RewritePath { regex: String, replacement: String },

    /// Prepend a fixed prefix to the path.
    PrefixPath { prefix: String },

    /// Drop the first `parts` path segments.
    StripPrefix { parts: usize },

    /// Append a header to the outbound request.
    AddRequestHeader { name: String, value: String },

    /// Remove a header from the outbound request.
    RemoveRequestHeader { name: String },
}

/// Static response served when a route's upstream fails.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct FallbackConfig {
    #[serde(default = "default_fallback_status")]
    pub status: u16,

    #[serde(default)]
    pub body: String,

    #[serde(default = "default_fallback_content_type")]
    pub content_type: String,
}

fn default_fallback_status() -> u16 {
    503
}

fn default_fallback_content_type() -> String {
    "text/plain; charset=utf-8".to_string()
}

/// Timeout configuration for upstream calls.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Connection establishment timeout in seconds.
    pub connect_secs: u64,

    /// Deadline for the upstream response head in seconds. Bodies stream
    /// without a deadline.
    pub request_secs: u64,

    /// Idle pooled connection timeout in seconds.
    pub idle_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            connect_secs: 5,
            request_secs: 30,
            idle_secs: 60,
        }
    }
}

/// Customer stream settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct StreamConfig {
    /// Delay between emitted customers in milliseconds.
    pub interval_ms: u64,

    /// Name pool; customer `n` is named `names[n % names.len()]`.
    pub names: Vec<String>,

    /// Per-subscriber buffer before a slow consumer starts skipping.
    pub channel_capacity: usize,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            interval_ms: 2_000,
            names: ["Manil", "Yanis", "Reda", "Walid", "Saeid"]
                .iter()
                .map(|n| n.to_string())
                .collect(),
            channel_capacity: 64,
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error). `RUST_LOG` wins.
    pub log_level: String,

    /// Log output format.
    pub log_format: LogFormat,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

/// Admin API configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AdminConfig {
    /// Enable the admin API.
    pub enabled: bool,

    /// API key for authentication (Bearer token).
    pub api_key: String,

    /// Admin API bind address.
    pub bind_address: String,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            // WARNING: This is a placeholder! Change this in production.
            api_key: "CHANGE_ME_IN_PRODUCTION".to_string(),
            bind_address: "127.0.0.1:8081".to_string(),
        }
    }
}
