//! `GET /customers` as `text/event-stream`.

use std::convert::Infallible;

use axum::extract::State;
use axum::response::sse::{Event, KeepAlive, Sse};
use futures_util::{future, Stream, StreamExt};

use crate::customers::publisher::Transport;
use crate::customers::server::CustomersState;
use crate::observability::metrics;

/// One `data:` event per customer until the client leaves or the service
/// shuts down.
pub async fn stream_customers(
    State(state): State<CustomersState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let subscription = state.publisher.subscribe(Transport::Sse);
    let subscriber = subscription.id();
    let shutdown = state.publisher.shutdown_signal();
    let encoder = state.encoder.clone();

    let events = subscription
        .take_until(shutdown)
        .filter_map(move |customer| {
            let event = match encoder.encode(&customer) {
                Ok(json) => Some(Ok::<_, Infallible>(Event::default().data(json))),
                Err(e) => {
                    metrics::record_encode_error(Transport::Sse.as_str());
                    tracing::warn!(subscriber, error = %e, "Dropping customer for SSE consumer");
                    None
                }
            };
            future::ready(event)
        });

    Sse::new(events).keep_alive(KeepAlive::default())
}
