//! Hot broadcast of generated customers.
//!
//! # Data Flow
//! ```text
//! producer task (one per publisher, started by the first subscribe)
//!     → every `interval`: CustomerSource::next()
//!     → broadcast channel (no replay)
//!     → Subscription (one per SSE response / WebSocket session)
//! ```
//!
//! # Design Decisions
//! - Late subscribers only see elements emitted after they attach
//! - The producer keeps running when nobody is attached; those elements
//!   are simply not delivered
//! - A subscriber that falls behind skips what it missed; others are
//!   unaffected
//! - Dropping a `Subscription` detaches it from the registry

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::task::{ready, Context, Poll};
use std::time::{Duration, Instant};

use dashmap::DashMap;
use futures_util::Stream;
use serde::Serialize;
use tokio::sync::broadcast;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_stream::wrappers::BroadcastStream;

use crate::config::schema::StreamConfig;
use crate::customers::model::Customer;
use crate::customers::source::CustomerSource;
use crate::lifecycle::shutdown::Shutdown;
use crate::observability::metrics;

/// How a consumer is attached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Transport {
    Sse,
    WebSocket,
}

impl Transport {
    pub fn as_str(&self) -> &'static str {
        match self {
            Transport::Sse => "sse",
            Transport::WebSocket => "websocket",
        }
    }
}

/// Registry entry for an attached consumer.
#[derive(Debug, Clone)]
pub struct SubscriberInfo {
    pub id: u64,
    pub transport: Transport,
    pub attached_at: Instant,
}

struct Inner {
    tx: broadcast::Sender<Customer>,
    source: CustomerSource,
    interval: Duration,
    registry: DashMap<u64, SubscriberInfo>,
    next_id: AtomicU64,
    started: AtomicBool,
    shutdown: Shutdown,
}

/// Single-producer, many-consumer customer stream.
#[derive(Clone)]
pub struct StreamPublisher {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for StreamPublisher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamPublisher")
            .field("interval", &self.inner.interval)
            .field("subscribers", &self.inner.registry.len())
            .field("started", &self.inner.started.load(Ordering::SeqCst))
            .finish()
    }
}

impl StreamPublisher {
    pub fn new(config: &StreamConfig, shutdown: Shutdown) -> Self {
        let (tx, _) = broadcast::channel(config.channel_capacity.max(1));
        Self {
            inner: Arc::new(Inner {
                tx,
                source: CustomerSource::new(config.names.clone()),
                interval: Duration::from_millis(config.interval_ms),
                registry: DashMap::new(),
                next_id: AtomicU64::new(1),
                started: AtomicBool::new(false),
                shutdown,
            }),
        }
    }

    /// Attach a consumer. The first call starts the producer.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn subscribe(&self, transport: Transport) -> Subscription {
        // receiver first, so the first consumer cannot miss element 1
        let rx = self.inner.tx.subscribe();
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        self.inner.registry.insert(
            id,
            SubscriberInfo {
                id,
                transport,
                attached_at: Instant::now(),
            },
        );
        metrics::record_subscriber_attached(transport.as_str());
        tracing::debug!(subscriber = id, transport = transport.as_str(), "Subscriber attached");

        if !self.inner.started.swap(true, Ordering::SeqCst) {
            let shutdown = self.inner.shutdown.notified();
            tokio::spawn(produce(self.inner.clone(), shutdown));
        }

        Subscription {
            id,
            stream: BroadcastStream::new(rx),
            inner: self.inner.clone(),
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner.registry.len()
    }

    /// Snapshot of attached consumers, ordered by id.
    pub fn subscribers(&self) -> Vec<SubscriberInfo> {
        let mut all: Vec<SubscriberInfo> =
            self.inner.registry.iter().map(|e| e.value().clone()).collect();
        all.sort_by_key(|s| s.id);
        all
    }

    pub fn is_started(&self) -> bool {
        self.inner.started.load(Ordering::SeqCst)
    }

    /// Resolves when the service shuts down, even if that already happened.
    pub fn shutdown_signal(&self) -> impl Future<Output = ()> + Send + 'static {
        self.inner.shutdown.notified()
    }
}

async fn produce(inner: Arc<Inner>, shutdown: impl Future<Output = ()>) {
    tracing::info!(interval = ?inner.interval, "Customer producer started");
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = tokio::time::sleep(inner.interval) => {}
            _ = &mut shutdown => break,
        }

        let customer = inner.source.next();
        metrics::record_emitted();
        // no receivers is not an error: there is no replay
        let delivered = inner.tx.send(customer).unwrap_or(0);
        tracing::trace!(id = inner.source.produced(), delivered, "Customer emitted");
    }

    tracing::info!(produced = inner.source.produced(), "Customer producer stopped");
}

/// One consumer's view of the stream.
pub struct Subscription {
    id: u64,
    stream: BroadcastStream<Customer>,
    inner: Arc<Inner>,
}

impl Subscription {
    pub fn id(&self) -> u64 {
        self.id
    }
}

impl Stream for Subscription {
    type Item = Customer;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Customer>> {
        let this = self.get_mut();
        loop {
            match ready!(Pin::new(&mut this.stream).poll_next(cx)) {
                Some(Ok(customer)) => return Poll::Ready(Some(customer)),
                Some(Err(BroadcastStreamRecvError::Lagged(skipped))) => {
                    tracing::warn!(subscriber = this.id, skipped, "Subscriber lagged; skipping elements");
                }
                None => return Poll::Ready(None),
            }
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some((_, info)) = self.inner.registry.remove(&self.id) {
            metrics::record_subscriber_detached(info.transport.as_str());
            tracing::debug!(
                subscriber = self.id,
                transport = info.transport.as_str(),
                attached_for = ?info.attached_at.elapsed(),
                "Subscriber detached"
            );
        }
    }
}
