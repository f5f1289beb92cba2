//! Customers service.
//!
//! # Data Flow
//! ```text
//! source.rs (id counter, name pool)
//!     → publisher.rs (single producer, fixed delay, broadcast)
//!     → sse.rs       (GET /customers, text/event-stream)
//!     → websocket.rs (GET /ws/customers, one text message per element)
//!        each consumer encodes with encoder.rs independently
//! ```
//!
//! # Design Decisions
//! - Hot stream: no replay for late subscribers
//! - An encode failure drops one message for one consumer only
//! - Shutdown ends every session; WebSocket clients get a Close frame

pub mod encoder;
pub mod model;
pub mod publisher;
pub mod server;
pub mod source;
pub mod sse;
pub mod websocket;

pub use encoder::{CustomerEncoder, JsonEncoder, SerializationError};
pub use model::Customer;
pub use publisher::{StreamPublisher, SubscriberInfo, Subscription, Transport};
pub use server::{CustomersServer, CustomersState};
pub use source::CustomerSource;
