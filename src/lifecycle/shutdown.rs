//! Shutdown coordination shared by the gateway and the customers service.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::broadcast;

/// Coordinator for graceful shutdown.
///
/// Servers, the reload loop, the stream producer and every open stream
/// session subscribe; a single `trigger` reaches all of them.
#[derive(Debug, Clone)]
pub struct Shutdown {
    tx: broadcast::Sender<()>,
    triggered: Arc<AtomicBool>,
}

impl Shutdown {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(1);
        Self {
            tx,
            triggered: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.tx.subscribe()
    }

    /// Resolves once shutdown has been triggered, including when that
    /// happened before this call.
    ///
    /// The receiver is taken here, not when the future is first polled.
    pub fn notified(&self) -> impl Future<Output = ()> + Send + 'static {
        let mut rx = self.tx.subscribe();
        let triggered = self.triggered.clone();
        async move {
            if triggered.load(Ordering::SeqCst) {
                return;
            }
            wait_for_shutdown(&mut rx).await;
        }
    }

    pub fn is_triggered(&self) -> bool {
        self.triggered.load(Ordering::SeqCst)
    }

    /// Signal every subscriber. Raw receivers taken afterwards are not
    /// woken; use [`Shutdown::notified`] for late listeners.
    pub fn trigger(&self) {
        self.triggered.store(true, Ordering::SeqCst);
        let receivers = self.tx.send(()).unwrap_or(0);
        tracing::info!(receivers, "Shutdown triggered");
    }

    /// Number of tasks still listening.
    pub fn receiver_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}

/// Resolve once `rx` observes a shutdown. A closed channel counts as one.
pub async fn wait_for_shutdown(rx: &mut broadcast::Receiver<()>) {
    let _ = rx.recv().await;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_trigger_reaches_all_subscribers() {
        let shutdown = Shutdown::new();
        let mut a = shutdown.subscribe();
        let mut b = shutdown.clone().subscribe();
        assert_eq!(shutdown.receiver_count(), 2);

        shutdown.trigger();
        wait_for_shutdown(&mut a).await;
        wait_for_shutdown(&mut b).await;
    }

    #[tokio::test]
    async fn test_dropped_coordinator_releases_waiters() {
        let shutdown = Shutdown::new();
        let mut rx = shutdown.subscribe();
        drop(shutdown);
        wait_for_shutdown(&mut rx).await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_late_listener_sees_earlier_trigger() {
        let shutdown = Shutdown::new();
        shutdown.trigger();
        assert!(shutdown.is_triggered());

        let late = tokio::time::timeout(std::time::Duration::from_secs(1), shutdown.notified()).await;
        assert!(late.is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn test_notified_waits_for_trigger() {
        let shutdown = Shutdown::new();
        let pending = shutdown.notified();
        let early = tokio::time::timeout(std::time::Duration::from_secs(1), shutdown.notified()).await;
        assert!(early.is_err());

        shutdown.trigger();
        pending.await;
    }
}
