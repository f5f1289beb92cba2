//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Request to upstream:
//!     → timeouts.rs (connect deadline, response-head deadline, error classification)
//!     → On confirmed failure: fallback.rs (route fallback, if registered)
//!     → Otherwise: GatewayError::Upstream (502 / 504)
//! ```
//!
//! # Design Decisions
//! - Timeouts are non-negotiable; every upstream call has a deadline
//! - Nothing is retried; a fallback is the only recovery
//! - Fallbacks are plain functions registered per route

pub mod fallback;
pub mod timeouts;

pub use fallback::{Fallback, FallbackRegistry, StaticFallback};
