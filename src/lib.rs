//! # Table Replicator
//!
//! Poll-based replication of one relational table into a document store
//! used for reads.
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────────────────────┐
//! │                            table-replicator                               │
//! │                                                                           │
//! │  ┌─────────────┐    ┌───────────────────────┐    ┌──────────────────────┐ │
//! │  │ SourceStore │───►│ SyncCore (one lane)   │───►│ TargetStore          │ │
//! │  │ (MySQL)     │    │ full / delta / force  │    │ (Redis hash of JSON) │ │
//! │  └─────────────┘    └───────────────────────┘    └──────────────────────┘ │
//! │         ▲                      │                            ▲             │
//! │         │                      ▼                            │             │
//! │  ┌─────────────┐    ┌───────────────────────┐    ┌──────────────────────┐ │
//! │  │ bootstrap   │    │ Watermark             │    │ QueryFacade          │ │
//! │  │ (retry)     │    │ (+ SQLite, optional)  │    │ StatsReporter        │ │
//! │  └─────────────┘    └───────────────────────┘    └──────────────────────┘ │
//! └───────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Sync Passes
//!
//! 1. **Full**: at startup, copy every row (or resume with a delta pass if a
//!    persisted watermark exists)
//! 2. **Delta**: every poll interval, copy rows with `updated_at > watermark`
//! 3. **Force**: on demand, a full copy that bypasses the timer
//!
//! Upserts are keyed by record id, so re-copying a row is harmless. A failed
//! pass leaves the watermark where it was and the next pass retries.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use table_replicator::{ReplicationEngine, SyncConfig};
//!
//! #[tokio::main]
//! async fn main() -> table_replicator::Result<()> {
//!     let config = SyncConfig::from_env()?;
//!     let engine = ReplicationEngine::connect(config).await?;
//!
//!     engine.start().await?;
//!     println!("{:?}", engine.stats().await?);
//!
//!     engine.shutdown().await;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod engine;
pub mod error;
pub mod metrics;
pub mod query;
pub mod record;
pub mod resilience;
pub mod stats;
pub mod store;
pub mod watermark;

// Re-exports for convenience
pub use config::{BootstrapConfig, SourceConfig, SyncConfig, TargetConfig, WatermarkConfig};
pub use engine::{EngineState, ForceSyncResult, ReplicationEngine, SyncKind};
pub use error::{ReplicationError, Result};
pub use query::QueryFacade;
pub use record::Record;
pub use stats::{StatsReporter, SyncStats};
pub use store::{MemorySource, MemoryTarget, MySqlSource, RedisTarget, SourceStore, TargetStore};
pub use watermark::{Watermark, WatermarkStore};
