//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks, route compilation)
//!     → GatewayConfig / CustomersConfig (validated, immutable)
//!
//! On reload signal (file change or SIGHUP):
//!     watcher.rs detects change
//!     → loader.rs loads new config
//!     → validation.rs validates
//!     → server compiles a new RouteTable
//!     → atomic swap of Arc<RouteTable>
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; changes require full reload
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;
pub mod watcher;

pub use loader::{load_config, load_customers_config, ConfigError};
pub use schema::{
    AdminConfig, CustomersConfig, FallbackConfig, FilterConfig, GatewayConfig, ListenerConfig,
    LogFormat, ObservabilityConfig, PredicateConfig, RouteConfig, StreamConfig, TimeoutConfig,
};
pub use validation::ValidationError;
