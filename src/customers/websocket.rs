//! `GET /ws/customers`: one text message per customer.

use axum::extract::ws::{close_code, CloseFrame, Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use futures_util::StreamExt;

use crate::customers::publisher::Transport;
use crate::customers::server::CustomersState;
use crate::observability::metrics;

pub async fn ws_customers(ws: WebSocketUpgrade, State(state): State<CustomersState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Push customers until the client closes, the socket fails, or the
/// service shuts down. Inbound messages other than Close are ignored.
async fn handle_socket(mut socket: WebSocket, state: CustomersState) {
    let mut subscription = state.publisher.subscribe(Transport::WebSocket);
    let subscriber = subscription.id();
    let shutdown = state.publisher.shutdown_signal();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            customer = subscription.next() => {
                let Some(customer) = customer else { break };
                match state.encoder.encode(&customer) {
                    Ok(text) => {
                        if socket.send(Message::Text(text.into())).await.is_err() {
                            tracing::debug!(subscriber, "WebSocket send failed");
                            break;
                        }
                    }
                    Err(e) => {
                        metrics::record_encode_error(Transport::WebSocket.as_str());
                        tracing::warn!(subscriber, error = %e, "Dropping customer for WebSocket consumer");
                    }
                }
            }
            incoming = socket.recv() => match incoming {
                Some(Ok(Message::Close(_))) | None => break,
                Some(Err(e)) => {
                    tracing::debug!(subscriber, error = %e, "WebSocket receive failed");
                    break;
                }
                Some(Ok(_)) => {}
            },
            _ = &mut shutdown => {
                let close = CloseFrame {
                    code: close_code::AWAY,
                    reason: "server shutting down".into(),
                };
                let _ = socket.send(Message::Close(Some(close))).await;
                break;
            }
        }
    }
}
