// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Bootstrap: wait for the source store to become reachable.
//!
//! The source is usually a database container starting alongside this
//! process, so the first attempts are expected to fail. Each attempt is a
//! ping (one pooled connection acquired and released), bounded by the
//! retry config's `connection_timeout`. Attempts are spaced by the flat
//! `interval`; there is no wait after the last one.

use crate::error::{ReplicationError, Result};
use crate::metrics;
use crate::resilience::RetryConfig;
use crate::store::SourceStore;
use tokio::sync::watch;
use tokio::time::timeout;
use tracing::{error, info, warn};

/// Ping `source` until it answers or `retry.max_attempts` is used up.
///
/// Returns the attempt number that succeeded. A `true` on `shutdown_rx`,
/// whether already set or sent during the wait, abandons it with
/// [`ReplicationError::Shutdown`].
pub(super) async fn wait_for_source<S: SourceStore>(
    source: &S,
    retry: &RetryConfig,
    shutdown_rx: &mut watch::Receiver<bool>,
) -> Result<usize> {
    let max_attempts = retry.max_attempts;
    let mut last_error = String::from("no attempt made");

    for attempt in 1..=max_attempts {
        if *shutdown_rx.borrow() {
            info!(attempt, "Shutdown before bootstrap attempt, giving up");
            return Err(ReplicationError::Shutdown);
        }

        let outcome = match timeout(retry.connection_timeout, source.ping()).await {
            Ok(Ok(())) => {
                metrics::record_bootstrap_attempt(true);
                info!(attempt, max_attempts, "Source store reachable");
                return Ok(attempt);
            }
            Ok(Err(e)) => e.to_string(),
            Err(_) => format!(
                "ping timed out after {}ms",
                retry.connection_timeout.as_millis()
            ),
        };

        metrics::record_bootstrap_attempt(false);
        warn!(attempt, max_attempts, error = %outcome, "Source store not reachable");
        last_error = outcome;

        if attempt < max_attempts {
            tokio::select! {
                biased;
                result = shutdown_rx.changed() => {
                    if result.is_err() || *shutdown_rx.borrow() {
                        info!(attempt, "Shutdown during bootstrap, giving up");
                        return Err(ReplicationError::Shutdown);
                    }
                }
                _ = tokio::time::sleep(retry.interval) => {}
            }
        }
    }

    error!(attempts = max_attempts, last_error = %last_error, "Source store never became reachable");
    Err(ReplicationError::BootstrapExhausted {
        attempts: max_attempts,
        last_error,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::Record;
    use crate::store::BoxFuture;
    use chrono::{DateTime, Utc};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// Fails the first `failures` pings.
    struct FlakySource {
        failures: usize,
        pings: AtomicUsize,
    }

    impl FlakySource {
        fn new(failures: usize) -> Self {
            Self {
                failures,
                pings: AtomicUsize::new(0),
            }
        }
    }

    impl SourceStore for FlakySource {
        fn ping(&self) -> BoxFuture<'_, ()> {
            Box::pin(async move {
                let n = self.pings.fetch_add(1, Ordering::SeqCst);
                if n < self.failures {
                    Err(ReplicationError::source_msg("ping", "connection refused"))
                } else {
                    Ok(())
                }
            })
        }

        fn fetch_all(&self) -> BoxFuture<'_, Vec<Record>> {
            Box::pin(async { Ok(Vec::new()) })
        }

        fn fetch_modified_since(&self, _watermark: DateTime<Utc>) -> BoxFuture<'_, Vec<Record>> {
            Box::pin(async { Ok(Vec::new()) })
        }

        fn count(&self) -> BoxFuture<'_, u64> {
            Box::pin(async { Ok(0) })
        }
    }

    fn retry(max_attempts: usize) -> RetryConfig {
        RetryConfig::fixed(max_attempts, Duration::from_millis(5), Duration::from_millis(200))
    }

    #[tokio::test]
    async fn test_reachable_first_try() {
        let source = FlakySource::new(0);
        let (_tx, mut rx) = watch::channel(false);

        let attempt = wait_for_source(&source, &retry(3), &mut rx).await.unwrap();
        assert_eq!(attempt, 1);
        assert_eq!(source.pings.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_reachable_after_failures() {
        let source = FlakySource::new(2);
        let (_tx, mut rx) = watch::channel(false);

        let attempt = wait_for_source(&source, &retry(5), &mut rx).await.unwrap();
        assert_eq!(attempt, 3);
        assert_eq!(source.pings.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_exhausted_after_exact_attempts() {
        let source = FlakySource::new(usize::MAX);
        let (_tx, mut rx) = watch::channel(false);

        let err = wait_for_source(&source, &retry(4), &mut rx).await.unwrap_err();
        match err {
            ReplicationError::BootstrapExhausted {
                attempts,
                last_error,
            } => {
                assert_eq!(attempts, 4);
                assert!(last_error.contains("connection refused"));
            }
            other => panic!("expected BootstrapExhausted, got {other:?}"),
        }
        assert_eq!(source.pings.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_shutdown_interrupts_wait() {
        let source = FlakySource::new(usize::MAX);
        let (tx, mut rx) = watch::channel(false);
        let slow = RetryConfig::fixed(100, Duration::from_secs(60), Duration::from_millis(200));

        let handle = tokio::spawn(async move { wait_for_source(&source, &slow, &mut rx).await });
        tokio::time::sleep(Duration::from_millis(20)).await;
        tx.send(true).unwrap();

        let result = tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .unwrap()
            .unwrap();
        assert!(matches!(result, Err(ReplicationError::Shutdown)));
    }

    #[tokio::test]
    async fn test_shutdown_sent_before_wait_is_seen() {
        let source = FlakySource::new(usize::MAX);
        let (tx, mut rx) = watch::channel(false);
        tx.send(true).unwrap();
        // Already seen: changed() alone would never fire for it
        rx.borrow_and_update();

        let err = wait_for_source(&source, &retry(40), &mut rx).await.unwrap_err();
        assert!(matches!(err, ReplicationError::Shutdown));
        assert_eq!(source.pings.load(Ordering::SeqCst), 0);
    }
}
