// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! The sync lane: one pass at a time over shared stores and watermark.
//!
//! Every pass (initial, periodic delta, forced) runs while holding
//! `SyncCore::lane`. The read-watermark → query → upsert → advance sequence
//! is therefore never interleaved with another pass.
//!
//! # Watermark Position
//!
//! The watermark advances to the wall-clock time captured after the lane is
//! acquired and before the source is read. Rows modified while a pass runs
//! are picked up again by the next delta pass.
//!
//! # Failure
//!
//! A failed read or upsert aborts the pass: the error is returned and the
//! watermark is left untouched, so the next pass re-reads the same rows.
//! Upserts are idempotent, so the records already written are rewritten
//! harmlessly.

use super::types::{EngineState, SyncKind};
use crate::error::{ReplicationError, Result};
use crate::metrics;
use crate::record::Record;
use crate::store::{SourceStore, TargetStore};
use crate::watermark::{Watermark, WatermarkStore};
use chrono::Utc;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{watch, Mutex, MutexGuard, RwLock};
use tracing::{debug, info, warn};

/// State shared between the engine handle and the periodic task.
pub(super) struct SyncCore<S, T> {
    pub(super) source: Arc<S>,
    pub(super) target: Arc<T>,
    pub(super) watermark: Watermark,
    pub(super) state_tx: watch::Sender<EngineState>,
    lane: Mutex<()>,
    watermark_store: RwLock<Option<WatermarkStore>>,
    watermark_name: String,
}

impl<S: SourceStore, T: TargetStore> SyncCore<S, T> {
    pub(super) fn new(source: Arc<S>, target: Arc<T>, watermark_name: String) -> Self {
        let (state_tx, _state_rx) = watch::channel(EngineState::Created);
        Self {
            source,
            target,
            watermark: Watermark::new(),
            state_tx,
            lane: Mutex::new(()),
            watermark_store: RwLock::new(None),
            watermark_name,
        }
    }

    pub(super) fn state(&self) -> EngineState {
        *self.state_tx.borrow()
    }

    /// Unconditional state change.
    pub(super) fn set_state(&self, to: EngineState) {
        self.state_tx.send_replace(to);
        metrics::set_engine_state(&to.to_string());
    }

    /// Move to `to` only if the current state is `from`.
    pub(super) fn transition(&self, from: EngineState, to: EngineState) -> bool {
        let changed = self.state_tx.send_if_modified(|state| {
            if *state == from {
                *state = to;
                true
            } else {
                false
            }
        });
        if changed {
            metrics::set_engine_state(&to.to_string());
        }
        changed
    }

    /// Attach persistence and restore the watermark from it.
    ///
    /// Returns the restored value, if the store held one.
    pub(super) async fn attach_store(
        &self,
        store: WatermarkStore,
    ) -> Result<Option<chrono::DateTime<Utc>>> {
        let restored = store.load(&self.watermark_name).await?;
        if let Some(at) = restored {
            self.watermark.advance(at);
            metrics::set_watermark(self.watermark.get().timestamp_millis());
            info!(watermark = %at, path = %store.path(), "Restored watermark");
        }
        *self.watermark_store.write().await = Some(store);
        Ok(restored)
    }

    /// Detach and close persistence.
    pub(super) async fn close_store(&self) {
        if let Some(store) = self.watermark_store.write().await.take() {
            store.close().await;
        }
    }

    /// Run a pass, waiting for the lane if another pass holds it.
    pub(super) async fn run_pass(&self, kind: SyncKind) -> Result<usize> {
        let lane = self.lane.lock().await;
        self.run_locked(kind, lane).await
    }

    /// Run a pass only if the lane is free right now.
    pub(super) async fn try_run_pass(&self, kind: SyncKind) -> Option<Result<usize>> {
        match self.lane.try_lock() {
            Ok(lane) => Some(self.run_locked(kind, lane).await),
            Err(_) => None,
        }
    }

    async fn run_locked(&self, kind: SyncKind, _lane: MutexGuard<'_, ()>) -> Result<usize> {
        if matches!(
            self.state(),
            EngineState::ShuttingDown | EngineState::Stopped
        ) {
            return Err(ReplicationError::Shutdown);
        }

        // Only the running engine shows passes in its state; bootstrap and
        // direct calls on an unstarted engine leave it alone.
        let busy = match kind {
            SyncKind::Delta => EngineState::Syncing,
            SyncKind::Full | SyncKind::Force => EngineState::ForceSyncing,
        };
        let shown = self.transition(EngineState::Idle, busy);

        let pass_start = Utc::now();
        let timer = Instant::now();
        let result = self.copy(kind).await;
        let duration = timer.elapsed();

        if shown {
            self.transition(busy, EngineState::Idle);
        }

        match result {
            Ok(count) => {
                metrics::record_sync_pass(kind.as_str(), true, count, duration);
                self.watermark.advance(pass_start);
                let watermark = self.watermark.get();
                metrics::set_watermark(watermark.timestamp_millis());
                self.persist_watermark().await;

                if count > 0 || kind.is_full_scan() {
                    info!(
                        kind = %kind,
                        count,
                        watermark = %watermark,
                        duration_ms = duration.as_millis() as u64,
                        "Sync pass complete"
                    );
                } else {
                    debug!(kind = %kind, watermark = %watermark, "Sync pass found no changes");
                }
                Ok(count)
            }
            Err(e) => {
                metrics::record_sync_pass(kind.as_str(), false, 0, duration);
                warn!(
                    kind = %kind,
                    error = %e,
                    watermark = %self.watermark.get(),
                    "Sync pass failed, watermark unchanged"
                );
                Err(e)
            }
        }
    }

    async fn copy(&self, kind: SyncKind) -> Result<usize> {
        let records = if kind.is_full_scan() {
            self.source.fetch_all().await?
        } else {
            let since = self.watermark.get();
            debug!(since = %since, "Reading rows modified after watermark");
            self.source.fetch_modified_since(since).await?
        };

        for record in &records {
            self.upsert(record).await?;
        }
        Ok(records.len())
    }

    /// Write one record to the target.
    pub(super) async fn upsert(&self, record: &Record) -> Result<()> {
        match self.target.upsert(record).await {
            Ok(()) => {
                debug!(id = %record.id, updated_at = %record.updated_at, "Upserted record");
                Ok(())
            }
            Err(e) => {
                metrics::record_upsert_failure();
                warn!(id = %record.id, error = %e, "Upsert failed");
                Err(e)
            }
        }
    }

    async fn persist_watermark(&self) {
        let guard = self.watermark_store.read().await;
        let Some(store) = guard.as_ref() else {
            return;
        };

        match store.save(&self.watermark_name, self.watermark.get()).await {
            Ok(()) => metrics::record_watermark_persist(true),
            Err(e) => {
                // In-memory watermark is authoritative; disk catches up next pass.
                metrics::record_watermark_persist(false);
                warn!(error = %e, "Failed to persist watermark");
            }
        }
    }
}
