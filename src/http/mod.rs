//! HTTP protocol handling subsystem (gateway side).
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, request ID, tracing, concurrency limit)
//!     → routing (select route, run filters, resolve target)
//!     → request.rs (hop-by-hop strip, Host rewrite, x-forwarded-*)
//!     → client.rs (pooled upstream call, deadlines, error classification)
//!     → response.rs (hop-by-hop strip, stream body back)
//!     → Send to client
//! ```

pub mod client;
pub mod request;
pub mod response;
pub mod server;

pub use client::UpstreamClient;
pub use request::{MakeRequestUuid, RequestIdExt, X_REQUEST_ID};
pub use server::{HttpServer, ServerError};
