// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Replication engine.
//!
//! The orchestrator that ties together:
//! - The relational source via [`crate::store::SourceStore`]
//! - The document store via [`crate::store::TargetStore`]
//! - The watermark and its optional persistence via [`crate::watermark`]
//! - The periodic delta task
//!
//! # Lifecycle
//!
//! 1. Opens the watermark store (if configured) and restores the watermark
//! 2. Waits for the source to become reachable (bounded retries)
//! 3. Initial sync: full copy, or a delta pass from a restored watermark
//! 4. Spawns the periodic delta task
//! 5. On shutdown, lets an in-flight pass finish (bounded) and closes persistence
//!
//! All passes share one sync lane, so they never run concurrently.

mod bootstrap;
mod delta;
mod sync;
mod types;

pub use types::{EngineState, ForceSyncResult, SyncKind};

use crate::config::SyncConfig;
use crate::error::{ReplicationError, Result};
use crate::query::QueryFacade;
use crate::record::Record;
use crate::stats::{StatsReporter, SyncStats};
use crate::store::{MySqlSource, RedisTarget, SourceStore, TargetStore};
use crate::watermark::WatermarkStore;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use sync::SyncCore;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// The replication engine.
///
/// Copies rows from the source table into the document store: once in full
/// at startup, then incrementally every poll interval. Cheap to share behind
/// an `Arc`; every method takes `&self`.
pub struct ReplicationEngine<S: SourceStore, T: TargetStore> {
    config: SyncConfig,

    /// Stores, watermark, state and the sync lane (shared with the delta task)
    core: Arc<SyncCore<S, T>>,

    query: QueryFacade<T>,

    stats: StatsReporter<S, T>,

    shutdown_tx: watch::Sender<bool>,

    /// Periodic delta task handle
    delta_handle: Mutex<Option<JoinHandle<()>>>,
}

impl ReplicationEngine<MySqlSource, RedisTarget> {
    /// Build an engine over MySQL and Redis from config.
    ///
    /// The source pool is lazy (the first connection happens during
    /// bootstrap in [`start()`](Self::start)); the document store is
    /// connected here.
    pub async fn connect(config: SyncConfig) -> Result<Self> {
        config.validate()?;
        let source = MySqlSource::connect_lazy(&config.source)?;
        let target = RedisTarget::connect(&config.target).await?;
        Ok(Self::new(config, Arc::new(source), Arc::new(target)))
    }
}

impl<S: SourceStore, T: TargetStore> ReplicationEngine<S, T> {
    /// Create an engine over the given stores.
    ///
    /// The engine starts in `Created` state. Call [`start()`](Self::start)
    /// to bootstrap and begin polling.
    pub fn new(config: SyncConfig, source: Arc<S>, target: Arc<T>) -> Self {
        let core = Arc::new(SyncCore::new(
            Arc::clone(&source),
            Arc::clone(&target),
            config.watermark.name.clone(),
        ));
        let stats = StatsReporter::new(
            source,
            Arc::clone(&target),
            core.watermark.subscribe(),
            config.poll_interval(),
        );
        let (shutdown_tx, _shutdown_rx) = watch::channel(false);

        Self {
            config,
            core,
            query: QueryFacade::new(target),
            stats,
            shutdown_tx,
            delta_handle: Mutex::new(None),
        }
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Get current engine state.
    pub fn state(&self) -> EngineState {
        self.core.state()
    }

    /// Get a receiver to watch state changes.
    pub fn state_receiver(&self) -> watch::Receiver<EngineState> {
        self.core.state_tx.subscribe()
    }

    /// Check if engine is running.
    pub fn is_running(&self) -> bool {
        self.state().is_running()
    }

    /// Current watermark.
    pub fn watermark(&self) -> DateTime<Utc> {
        self.core.watermark.get()
    }

    /// Receive every watermark advance.
    pub fn subscribe_watermark(&self) -> watch::Receiver<DateTime<Utc>> {
        self.core.watermark.subscribe()
    }

    pub fn source(&self) -> &Arc<S> {
        &self.core.source
    }

    pub fn target(&self) -> &Arc<T> {
        &self.core.target
    }

    /// Read-only access to the document store.
    pub fn query(&self) -> &QueryFacade<T> {
        &self.query
    }

    /// Stats reporter, for callers that serve stats without holding the engine.
    pub fn stats_reporter(&self) -> &StatsReporter<S, T> {
        &self.stats
    }

    /// Source/target counts, watermark, interval and `in_sync`.
    pub async fn stats(&self) -> Result<SyncStats> {
        self.stats.stats().await
    }

    /// Every replicated record.
    pub async fn list_records(&self) -> Result<Vec<Record>> {
        self.query.list_records().await
    }

    /// One replicated record, or [`ReplicationError::NotFound`].
    pub async fn get_record(&self, id: &str) -> Result<Record> {
        self.query.get_record(id).await
    }

    /// Start the engine.
    ///
    /// Returns once the initial sync is done and the delta task is running.
    ///
    /// # Errors
    ///
    /// - [`ReplicationError::InvalidState`] unless the engine is `Created`
    /// - [`ReplicationError::BootstrapExhausted`] if the source never answered
    /// - Any error from the initial sync
    ///
    /// The last two leave the engine `Failed`.
    pub async fn start(&self) -> Result<()> {
        self.config.validate()?;

        // Subscribed before leaving Created so a shutdown issued at any point
        // during bootstrap is observed.
        let mut shutdown_rx = self.shutdown_tx.subscribe();
        if !self
            .core
            .transition(EngineState::Created, EngineState::Bootstrapping)
        {
            return Err(ReplicationError::InvalidState {
                expected: "Created".to_string(),
                actual: self.state().to_string(),
            });
        }

        info!(
            table = %self.config.source.table,
            poll_interval_ms = self.config.poll_interval_ms,
            max_attempts = self.config.bootstrap.max_attempts,
            max_wait_ms = self.config.bootstrap.retry_config().total_wait().as_millis() as u64,
            "Starting replication engine"
        );

        if let Err(e) = self.bootstrap(&mut shutdown_rx).await {
            if matches!(e, ReplicationError::Shutdown) {
                info!("Engine shut down during bootstrap");
            } else {
                error!(error = %e, "Bootstrap failed");
                self.core.transition(EngineState::Bootstrapping, EngineState::Failed);
            }
            self.core.close_store().await;
            self.close_source().await;
            return Err(e);
        }

        if !self
            .core
            .transition(EngineState::Bootstrapping, EngineState::Idle)
        {
            // shutdown() raced with bootstrap
            return Err(ReplicationError::Shutdown);
        }

        let core = Arc::clone(&self.core);
        let interval = self.config.poll_interval();
        let shutdown_rx = self.shutdown_tx.subscribe();
        let handle = tokio::spawn(async move {
            delta::run_delta_loop(core, interval, shutdown_rx).await;
        });
        *self.delta_handle.lock().await = Some(handle);

        info!(watermark = %self.watermark(), "Replication engine running");
        Ok(())
    }

    async fn bootstrap(&self, shutdown_rx: &mut watch::Receiver<bool>) -> Result<usize> {
        let mut restored = None;
        if let Some(path) = &self.config.watermark.sqlite_path {
            let store = WatermarkStore::open(path).await?;
            restored = self.core.attach_store(store).await?;
        }

        bootstrap::wait_for_source(
            self.core.source.as_ref(),
            &self.config.bootstrap.retry_config(),
            shutdown_rx,
        )
        .await?;

        let kind = match restored {
            Some(at) => {
                info!(since = %at, "Resuming from persisted watermark");
                SyncKind::Delta
            }
            None => SyncKind::Full,
        };
        self.core.run_pass(kind).await
    }

    /// Copy every source row. Waits for the sync lane.
    pub async fn full_sync(&self) -> Result<usize> {
        self.core.run_pass(SyncKind::Full).await
    }

    /// Copy rows modified after the watermark. Waits for the sync lane.
    pub async fn delta_sync(&self) -> Result<usize> {
        self.core.run_pass(SyncKind::Delta).await
    }

    /// Write a single record to the document store.
    pub async fn upsert_record(&self, record: &Record) -> Result<()> {
        self.core.upsert(record).await
    }

    /// Immediate full re-sync, bypassing the timer.
    ///
    /// Waits for an in-flight delta pass to finish first.
    ///
    /// # Errors
    ///
    /// [`ReplicationError::InvalidState`] unless the engine is running.
    pub async fn force_sync(&self) -> Result<ForceSyncResult> {
        let state = self.state();
        if !state.is_running() {
            return Err(ReplicationError::InvalidState {
                expected: "Idle".to_string(),
                actual: state.to_string(),
            });
        }

        info!("Forced sync requested");
        let synced = self.core.run_pass(SyncKind::Force).await?;
        Ok(ForceSyncResult { synced })
    }

    /// Shutdown the engine gracefully.
    ///
    /// Shutdown sequence:
    /// 1. Signal the delta task to stop
    /// 2. Wait for it, including an in-flight pass (bounded by `shutdown_timeout_ms`)
    /// 3. Abort it if the timeout elapses
    /// 4. Checkpoint and close the watermark store
    /// 5. Close the source connection pool
    pub async fn shutdown(&self) {
        if self.state() == EngineState::Stopped {
            debug!("Engine already stopped");
            return;
        }

        info!("Shutting down replication engine");
        self.core.set_state(EngineState::ShuttingDown);
        let _ = self.shutdown_tx.send_replace(true);

        let handle = self.delta_handle.lock().await.take();
        if let Some(mut handle) = handle {
            let drain_timeout = self.config.shutdown_timeout();
            match tokio::time::timeout(drain_timeout, &mut handle).await {
                Ok(Ok(())) => debug!("Delta task completed gracefully"),
                Ok(Err(e)) => warn!(error = %e, "Delta task panicked during shutdown"),
                Err(_) => {
                    warn!(
                        timeout_ms = drain_timeout.as_millis() as u64,
                        "Delta task timed out during shutdown, aborting"
                    );
                    handle.abort();
                }
            }
        }

        self.core.close_store().await;
        self.close_source().await;

        self.core.set_state(EngineState::Stopped);
        info!(watermark = %self.watermark(), "Replication engine stopped");
    }

    async fn close_source(&self) {
        if let Err(e) = self.core.source.close().await {
            warn!(error = %e, "Failed to close source store");
        }
    }
}
