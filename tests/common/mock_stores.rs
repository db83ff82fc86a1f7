//! Failure-injecting stores for testing.
//!
//! Both wrap the in-memory stores and add knobs:
//! - [`MockSource`]: unreachable for the first N pings, failing reads,
//!   slow reads, a high-water mark of concurrent reads, and a close count
//! - [`MockTarget`]: fail after N upserts, and a count of upsert calls
//!
//! # Example
//! ```rust,ignore
//! let source = Arc::new(MockSource::with_records(records));
//! source.unreachable_for(2);
//!
//! let target = Arc::new(MockTarget::new());
//! target.fail_after(3);
//! ```

use chrono::{DateTime, TimeZone, Utc};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;
use table_replicator::store::{BoxFuture, MemorySource, MemoryTarget, SourceStore, TargetStore};
use table_replicator::{Record, ReplicationError};

/// Fixed timestamp `secs` after the epoch.
pub fn at(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(secs, 0).unwrap()
}

/// A person record with predictable name/email.
pub fn person(id: &str, updated_at: DateTime<Utc>) -> Record {
    Record::new(id, format!("Person {id}"), format!("{id}@example.com"), updated_at)
}

/// `n` people updated one second apart, starting at `start`.
pub fn people(n: usize, start: DateTime<Utc>) -> Vec<Record> {
    (0..n)
        .map(|i| person(&format!("p-{i:03}"), start + chrono::Duration::seconds(i as i64)))
        .collect()
}

/// Source store with injectable failures.
pub struct MockSource {
    inner: MemorySource,
    /// Pings that fail before the source "comes up"
    unreachable_pings: AtomicUsize,
    pings: AtomicUsize,
    fail_reads: AtomicBool,
    read_delay_ms: AtomicU64,
    full_reads: AtomicUsize,
    delta_reads: AtomicUsize,
    reads_in_flight: AtomicUsize,
    max_reads_in_flight: AtomicUsize,
    closes: AtomicUsize,
}

impl MockSource {
    pub fn new() -> Self {
        Self::with_records(Vec::new())
    }

    pub fn with_records(records: Vec<Record>) -> Self {
        Self {
            inner: MemorySource::with_records(records),
            unreachable_pings: AtomicUsize::new(0),
            pings: AtomicUsize::new(0),
            fail_reads: AtomicBool::new(false),
            read_delay_ms: AtomicU64::new(0),
            full_reads: AtomicUsize::new(0),
            delta_reads: AtomicUsize::new(0),
            reads_in_flight: AtomicUsize::new(0),
            max_reads_in_flight: AtomicUsize::new(0),
            closes: AtomicUsize::new(0),
        }
    }

    /// Fail the next `n` pings.
    pub fn unreachable_for(&self, n: usize) {
        self.unreachable_pings.store(n, Ordering::SeqCst);
    }

    /// Fail every ping.
    pub fn always_unreachable(&self) {
        self.unreachable_for(usize::MAX);
    }

    pub fn set_fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    /// Hold every read for `delay` before answering.
    pub fn set_read_delay(&self, delay: Duration) {
        self.read_delay_ms
            .store(delay.as_millis() as u64, Ordering::SeqCst);
    }

    pub async fn put(&self, record: Record) {
        self.inner.put(record).await;
    }

    pub fn ping_count(&self) -> usize {
        self.pings.load(Ordering::SeqCst)
    }

    pub fn full_reads(&self) -> usize {
        self.full_reads.load(Ordering::SeqCst)
    }

    pub fn delta_reads(&self) -> usize {
        self.delta_reads.load(Ordering::SeqCst)
    }

    /// Most reads ever observed running at the same time.
    pub fn max_reads_in_flight(&self) -> usize {
        self.max_reads_in_flight.load(Ordering::SeqCst)
    }

    pub fn close_count(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }

    async fn read<F>(&self, counter: &AtomicUsize, read: F) -> table_replicator::Result<Vec<Record>>
    where
        F: std::future::Future<Output = table_replicator::Result<Vec<Record>>>,
    {
        counter.fetch_add(1, Ordering::SeqCst);
        let now = self.reads_in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_reads_in_flight.fetch_max(now, Ordering::SeqCst);

        let delay = self.read_delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }

        let result = if self.fail_reads.load(Ordering::SeqCst) {
            Err(ReplicationError::source_msg("fetch", "injected read failure"))
        } else {
            read.await
        };

        self.reads_in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }
}

impl Default for MockSource {
    fn default() -> Self {
        Self::new()
    }
}

impl SourceStore for MockSource {
    fn ping(&self) -> BoxFuture<'_, ()> {
        Box::pin(async move {
            let n = self.pings.fetch_add(1, Ordering::SeqCst);
            if n < self.unreachable_pings.load(Ordering::SeqCst) {
                Err(ReplicationError::source_msg("ping", "connection refused"))
            } else {
                Ok(())
            }
        })
    }

    fn fetch_all(&self) -> BoxFuture<'_, Vec<Record>> {
        Box::pin(async move { self.read(&self.full_reads, self.inner.fetch_all()).await })
    }

    fn fetch_modified_since(&self, watermark: DateTime<Utc>) -> BoxFuture<'_, Vec<Record>> {
        Box::pin(async move {
            self.read(&self.delta_reads, self.inner.fetch_modified_since(watermark))
                .await
        })
    }

    fn count(&self) -> BoxFuture<'_, u64> {
        self.inner.count()
    }

    fn close(&self) -> BoxFuture<'_, ()> {
        Box::pin(async move {
            self.closes.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
    }
}

/// Target store with injectable failures.
pub struct MockTarget {
    inner: MemoryTarget,
    /// Upsert calls allowed to succeed before failures start
    fail_after: AtomicUsize,
    upserts: AtomicUsize,
}

impl MockTarget {
    pub fn new() -> Self {
        Self {
            inner: MemoryTarget::new(),
            fail_after: AtomicUsize::new(usize::MAX),
            upserts: AtomicUsize::new(0),
        }
    }

    /// Let `n` more upserts through, then fail every upsert.
    pub fn fail_after(&self, n: usize) {
        let done = self.upserts.load(Ordering::SeqCst);
        self.fail_after
            .store(done.saturating_add(n), Ordering::SeqCst);
    }

    /// Stop injecting failures.
    pub fn heal(&self) {
        self.fail_after.store(usize::MAX, Ordering::SeqCst);
    }

    /// Upsert calls, including the failed ones.
    pub fn upsert_calls(&self) -> usize {
        self.upserts.load(Ordering::SeqCst)
    }

    pub async fn len(&self) -> usize {
        self.inner.len().await
    }

    pub async fn remove(&self, id: &str) -> Option<Record> {
        self.inner.remove(id).await
    }
}

impl Default for MockTarget {
    fn default() -> Self {
        Self::new()
    }
}

impl TargetStore for MockTarget {
    fn upsert<'a>(&'a self, record: &'a Record) -> BoxFuture<'a, ()> {
        Box::pin(async move {
            let n = self.upserts.fetch_add(1, Ordering::SeqCst);
            if n >= self.fail_after.load(Ordering::SeqCst) {
                return Err(ReplicationError::target_msg("HSET", "injected write failure"));
            }
            self.inner.upsert(record).await
        })
    }

    fn find<'a>(&'a self, id: &'a str) -> BoxFuture<'a, Option<Record>> {
        self.inner.find(id)
    }

    fn find_all(&self) -> BoxFuture<'_, Vec<Record>> {
        self.inner.find_all()
    }

    fn count(&self) -> BoxFuture<'_, u64> {
        self.inner.count()
    }
}

/// Poll `check` every 10ms until it returns true or `timeout` elapses.
pub async fn eventually<F, Fut>(timeout: Duration, mut check: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if check().await {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}
