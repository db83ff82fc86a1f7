//! Resilience utilities: retry policy and bulkheads.
//!
//! - [`RetryConfig`]: attempt budget and interval for connect-with-retry
//! - [`Bulkhead`]: semaphore bounding concurrent store operations
//!
//! # Example
//!
//! ```rust,no_run
//! # async fn example() -> Result<(), table_replicator::resilience::BulkheadFull> {
//! use table_replicator::resilience::{Bulkhead, RetryConfig};
//! use std::time::Duration;
//!
//! // Bootstrap: 30 attempts, 2s apart
//! let retry = RetryConfig::fixed(30, Duration::from_secs(2), Duration::from_secs(5));
//! assert_eq!(retry.total_wait(), Duration::from_secs(58));
//!
//! // Bulkhead: max 10 concurrent commands
//! let bulkhead = Bulkhead::new(10);
//! let _permit = bulkhead.acquire().await?;
//! // permit dropped = slot released
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// Connect-with-retry policy: a bounded number of attempts at a flat interval.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of attempts (including the first one).
    pub max_attempts: usize,

    /// Wait between a failed attempt and the next one.
    pub interval: Duration,

    /// Timeout for each individual attempt.
    pub connection_timeout: Duration,
}

impl RetryConfig {
    /// Every retry waits exactly `interval`.
    ///
    /// This is what bootstrap uses to wait for the source store:
    ///
    /// ```text
    /// Attempt  Delay     Cumulative (30 x 2s)
    /// -------  -----     ----------
    /// 1        2s        2s
    /// 2        2s        4s
    /// ...
    /// 30       -         ~58s, then fatal
    /// ```
    pub fn fixed(max_attempts: usize, interval: Duration, connection_timeout: Duration) -> Self {
        Self {
            max_attempts,
            interval,
            connection_timeout,
        }
    }

    /// Upper bound on time spent waiting between attempts, excluding the
    /// attempts themselves.
    pub fn total_wait(&self) -> Duration {
        let gaps = self.max_attempts.saturating_sub(1) as u32;
        self.interval.saturating_mul(gaps)
    }
}

// =============================================================================
// Bulkhead (Concurrency Limiter)
// =============================================================================

/// Error when bulkhead is closed.
#[derive(Debug, Clone, thiserror::Error)]
#[error("bulkhead full: max {max_concurrent} concurrent operations")]
pub struct BulkheadFull {
    /// Maximum concurrent operations allowed.
    pub max_concurrent: usize,
}

/// Limits concurrent operations against a store.
///
/// The Redis client multiplexes every command over one socket, so this is
/// what bounds how much work the replicator and readers can put in flight
/// at once. Waiting callers queue; permits are released on drop, on every
/// exit path.
#[derive(Debug)]
pub struct Bulkhead {
    semaphore: Arc<Semaphore>,
    max_concurrent: usize,
}

impl Bulkhead {
    /// Create a new bulkhead with the given concurrency limit.
    pub fn new(max_concurrent: usize) -> Self {
        Self {
            semaphore: Arc::new(Semaphore::new(max_concurrent)),
            max_concurrent,
        }
    }

    /// Acquire a permit, waiting if necessary.
    pub async fn acquire(&self) -> Result<OwnedSemaphorePermit, BulkheadFull> {
        self.semaphore
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| BulkheadFull {
                max_concurrent: self.max_concurrent,
            })
    }

    /// Try to acquire a permit without waiting.
    pub fn try_acquire(&self) -> Option<OwnedSemaphorePermit> {
        self.semaphore.clone().try_acquire_owned().ok()
    }

    /// Get the number of available permits.
    pub fn available(&self) -> usize {
        self.semaphore.available_permits()
    }

    pub fn max_concurrent(&self) -> usize {
        self.max_concurrent
    }

    /// Check if the bulkhead is full (no permits available).
    pub fn is_full(&self) -> bool {
        self.semaphore.available_permits() == 0
    }
}
