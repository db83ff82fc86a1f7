// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Store integration traits.
//!
//! The engine talks to both stores only through [`SourceStore`] and
//! [`TargetStore`]. This keeps the replication logic testable with
//! in-memory or failure-injecting stores and decouples it from the drivers.
//!
//! | Implementation | Trait | Backend |
//! |----------------|-------|---------|
//! | [`MySqlSource`] | `SourceStore` | MySQL via a bounded `sqlx` pool |
//! | [`RedisTarget`] | `TargetStore` | Redis hash of JSON documents |
//! | [`MemorySource`] | `SourceStore` | In-process (standalone/testing) |
//! | [`MemoryTarget`] | `TargetStore` | In-process (standalone/testing) |
//!
//! # Example
//!
//! ```rust,no_run
//! use table_replicator::store::{BoxFuture, TargetStore};
//! use table_replicator::Record;
//!
//! struct LoggingTarget;
//!
//! impl TargetStore for LoggingTarget {
//!     fn upsert<'a>(&'a self, record: &'a Record) -> BoxFuture<'a, ()> {
//!         Box::pin(async move {
//!             println!("would upsert {}", record.id);
//!             Ok(())
//!         })
//!     }
//!
//!     fn find<'a>(&'a self, _id: &'a str) -> BoxFuture<'a, Option<Record>> {
//!         Box::pin(async { Ok(None) })
//!     }
//!
//!     fn find_all(&self) -> BoxFuture<'_, Vec<Record>> {
//!         Box::pin(async { Ok(Vec::new()) })
//!     }
//!
//!     fn count(&self) -> BoxFuture<'_, u64> {
//!         Box::pin(async { Ok(0) })
//!     }
//! }
//! ```

mod memory;
mod mysql_source;
mod redis_target;

pub use self::memory::{MemorySource, MemoryTarget};
pub use self::mysql_source::MySqlSource;
pub use self::redis_target::RedisTarget;

use crate::error::Result;
use crate::record::Record;
use chrono::{DateTime, Utc};
use std::future::Future;
use std::pin::Pin;

/// Type alias for boxed async futures (reduces trait signature complexity).
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T>> + Send + 'a>>;

/// What the engine needs from the relational source of record.
///
/// Reads only. Rows come back ordered by `updated_at`, then `id`.
pub trait SourceStore: Send + Sync + 'static {
    /// Acquire and release one connection to prove the source is reachable.
    fn ping(&self) -> BoxFuture<'_, ()>;

    /// Unconditional full scan.
    fn fetch_all(&self) -> BoxFuture<'_, Vec<Record>>;

    /// Rows with `updated_at` strictly greater than `watermark`.
    fn fetch_modified_since(&self, watermark: DateTime<Utc>) -> BoxFuture<'_, Vec<Record>>;

    /// Row count.
    fn count(&self) -> BoxFuture<'_, u64>;

    /// Release pooled connections. Called once by the engine on shutdown or
    /// failed startup; nothing is read afterwards.
    fn close(&self) -> BoxFuture<'_, ()> {
        Box::pin(async { Ok(()) })
    }
}

/// What the engine and readers need from the document store.
pub trait TargetStore: Send + Sync + 'static {
    /// Insert the document keyed by `record.id`, or overwrite it in place.
    ///
    /// Applying the same record twice must leave exactly one document.
    fn upsert<'a>(&'a self, record: &'a Record) -> BoxFuture<'a, ()>;

    /// Fetch one document by record id.
    fn find<'a>(&'a self, id: &'a str) -> BoxFuture<'a, Option<Record>>;

    /// Fetch every document. Order is unspecified.
    fn find_all(&self) -> BoxFuture<'_, Vec<Record>>;

    /// Document count.
    fn count(&self) -> BoxFuture<'_, u64>;
}
