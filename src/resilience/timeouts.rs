//! Timeout enforcement and upstream error classification.
//!
//! # Responsibilities
//! - Wrap upstream calls with a response-head deadline
//! - Tell connect timeouts apart from refused connections
//! - Render error source chains for logs and error bodies
//!
//! # Design Decisions
//! - Uses Tokio's timeout facilities
//! - Timeout errors are distinct from other errors
//! - Timed-out requests return 504 Gateway Timeout

use std::error::Error;
use std::future::Future;
use std::time::Duration;

/// Outcome of a deadline-bound call.
#[derive(Debug)]
pub enum Deadline<T, E> {
    Completed(T),
    Failed(E),
    Elapsed,
}

/// Run `fut` with a deadline.
pub async fn with_deadline<F, T, E>(limit: Duration, fut: F) -> Deadline<T, E>
where
    F: Future<Output = Result<T, E>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(Ok(value)) => Deadline::Completed(value),
        Ok(Err(e)) => Deadline::Failed(e),
        Err(_) => Deadline::Elapsed,
    }
}

/// True if any error in the source chain is an I/O timeout.
pub fn is_timeout(err: &(dyn Error + 'static)) -> bool {
    let mut current = Some(err);
    while let Some(e) = current {
        if let Some(io) = e.downcast_ref::<std::io::Error>() {
            if io.kind() == std::io::ErrorKind::TimedOut {
                return true;
            }
        }
        current = e.source();
    }
    false
}

/// `outer: inner: root` rendering of an error and its sources.
pub fn error_chain(err: &(dyn Error + 'static)) -> String {
    let mut parts = vec![err.to_string()];
    let mut current = err.source();
    while let Some(e) = current {
        let text = e.to_string();
        if parts.last() != Some(&text) {
            parts.push(text);
        }
        current = e.source();
    }
    parts.join(": ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[derive(Debug)]
    struct Wrapper(io::Error);

    impl std::fmt::Display for Wrapper {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "client error (Connect)")
        }
    }

    impl Error for Wrapper {
        fn source(&self) -> Option<&(dyn Error + 'static)> {
            Some(&self.0)
        }
    }

    #[test]
    fn test_timeout_detection_walks_sources() {
        let timed_out = Wrapper(io::Error::new(io::ErrorKind::TimedOut, "connect timed out"));
        assert!(is_timeout(&timed_out));

        let refused = Wrapper(io::Error::new(io::ErrorKind::ConnectionRefused, "refused"));
        assert!(!is_timeout(&refused));
        assert_eq!(error_chain(&refused), "client error (Connect): refused");
    }

    #[tokio::test(start_paused = true)]
    async fn test_with_deadline() {
        let slow = async {
            tokio::time::sleep(Duration::from_secs(10)).await;
            Ok::<_, io::Error>(())
        };
        assert!(matches!(with_deadline(Duration::from_secs(1), slow).await, Deadline::Elapsed));

        let fast = async { Err::<(), _>(io::Error::new(io::ErrorKind::Other, "boom")) };
        assert!(matches!(with_deadline(Duration::from_secs(1), fast).await, Deadline::Failed(_)));
    }
}
