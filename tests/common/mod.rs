//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::body::Bytes;
use axum::http::{HeaderMap, Method, Uri};
use axum::{Json, Router};
use futures_util::stream::{BoxStream, StreamExt};
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio::sync::mpsc;

use stream_gateway::config::schema::{CustomersConfig, GatewayConfig, StreamConfig};
use stream_gateway::customers::{CustomerEncoder, CustomersServer, JsonEncoder, StreamPublisher};
use stream_gateway::http::HttpServer;
use stream_gateway::lifecycle::Shutdown;
use stream_gateway::resilience::FallbackRegistry;

/// An echo backend: replies with what it received as JSON.
pub struct EchoBackend {
    pub addr: SocketAddr,
    hits: Arc<AtomicUsize>,
}

impl EchoBackend {
    pub fn hits(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }

    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }
}

/// Start an echo backend on an ephemeral port.
pub async fn start_echo_backend() -> EchoBackend {
    let hits = Arc::new(AtomicUsize::new(0));
    let counter = hits.clone();

    let app = Router::new().fallback(move |method: Method, uri: Uri, headers: HeaderMap| {
        let counter = counter.clone();
        async move {
            counter.fetch_add(1, Ordering::SeqCst);
            let header = |name: &str| headers.get(name).and_then(|v| v.to_str().ok()).map(String::from);
            Json::<Value>(json!({
                "method": method.as_str(),
                "path": uri.path(),
                "query": uri.query(),
                "host": header("host"),
                "x_forwarded_for": header("x-forwarded-for"),
                "x_forwarded_host": header("x-forwarded-host"),
                "x_request_id": header("x-request-id"),
                "x_gateway": header("x-gateway"),
                "connection": header("connection"),
            }))
        }
    });

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });

    EchoBackend { addr, hits }
}

/// An address with nothing listening on it.
pub async fn unused_addr() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap()
}

/// A running gateway and the handles to drive it.
pub struct TestGateway {
    pub addr: SocketAddr,
    pub shutdown: Shutdown,
    pub updates: mpsc::UnboundedSender<GatewayConfig>,
}

impl TestGateway {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }
}

pub async fn start_gateway(config: GatewayConfig, fallbacks: FallbackRegistry) -> TestGateway {
    let server = HttpServer::with_fallbacks(config, fallbacks).unwrap();
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let shutdown = Shutdown::new();
    let (updates, config_updates) = mpsc::unbounded_channel();
    let server_shutdown = shutdown.subscribe();
    tokio::spawn(async move {
        let _ = server.run(listener, config_updates, server_shutdown).await;
    });

    TestGateway {
        addr,
        shutdown,
        updates,
    }
}

/// Start the customers service with a short emit interval.
pub async fn start_customers(interval_ms: u64) -> (SocketAddr, Shutdown) {
    let (addr, shutdown, _) = start_customers_with_encoder(interval_ms, Arc::new(JsonEncoder)).await;
    (addr, shutdown)
}

/// Start the customers service with `encoder`. The returned publisher is
/// the one the service streams from.
pub async fn start_customers_with_encoder(
    interval_ms: u64,
    encoder: Arc<dyn CustomerEncoder>,
) -> (SocketAddr, Shutdown, StreamPublisher) {
    let config = CustomersConfig {
        stream: StreamConfig {
            interval_ms,
            ..StreamConfig::default()
        },
        ..CustomersConfig::default()
    };

    let shutdown = Shutdown::new();
    let server = CustomersServer::with_encoder(&config, &shutdown, encoder);
    let publisher = server.publisher().clone();
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let server_shutdown = shutdown.subscribe();
    tokio::spawn(async move {
        let _ = server.run(listener, server_shutdown).await;
    });

    (addr, shutdown, publisher)
}

pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .no_proxy()
        .timeout(Duration::from_secs(10))
        .build()
        .unwrap()
}

/// Incremental reader over an SSE response's `data:` payloads.
pub struct SseReader {
    stream: BoxStream<'static, reqwest::Result<Bytes>>,
    buffer: String,
    pending: VecDeque<Value>,
}

impl SseReader {
    pub fn new(response: reqwest::Response) -> Self {
        Self {
            stream: response.bytes_stream().boxed(),
            buffer: String::new(),
            pending: VecDeque::new(),
        }
    }

    /// The next `count` events, waiting at most 5s for each chunk.
    pub async fn next_events(&mut self, count: usize) -> Vec<Value> {
        while self.pending.len() < count {
            let chunk = tokio::time::timeout(Duration::from_secs(5), self.stream.next())
                .await
                .expect("event within 5s")
                .expect("stream still open")
                .unwrap();
            self.buffer.push_str(&String::from_utf8_lossy(&chunk));

            while let Some(end) = self.buffer.find("\n\n") {
                let block: String = self.buffer.drain(..end + 2).collect();
                for line in block.lines() {
                    if let Some(data) = line.strip_prefix("data:") {
                        self.pending.push_back(serde_json::from_str(data.trim_start()).unwrap());
                    }
                }
            }
        }
        self.pending.drain(..count).collect()
    }
}

pub async fn read_sse_events(response: reqwest::Response, count: usize) -> Vec<Value> {
    SseReader::new(response).next_events(count).await
}
