// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Periodic delta sync task.
//!
//! Ticks every `poll_interval` and runs one delta pass per tick, inline, so
//! passes from this task never overlap. Missed ticks are skipped rather than
//! replayed in a burst.
//!
//! A tick that finds the lane held (a forced sync is running) is skipped:
//! the forced pass copies everything and advances the watermark anyway.
//!
//! Failures are logged and counted; the task keeps going and the next tick
//! retries from the unchanged watermark.

use super::sync::SyncCore;
use super::types::SyncKind;
use crate::error::ReplicationError;
use crate::metrics;
use crate::store::{SourceStore, TargetStore};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, error, info, Instrument};

/// Run the delta loop until shutdown is signaled.
pub(super) async fn run_delta_loop<S: SourceStore, T: TargetStore>(
    core: Arc<SyncCore<S, T>>,
    interval: Duration,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    let span = tracing::info_span!("delta_sync");

    async move {
        // Mark initial shutdown value as seen so changed() only fires on actual changes
        let _ = shutdown_rx.borrow_and_update();

        info!(
            interval_ms = interval.as_millis() as u64,
            "Starting delta sync task"
        );

        let mut timer = tokio::time::interval(interval);
        timer.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        // First tick is immediate; the initial sync just ran.
        timer.tick().await;

        loop {
            tokio::select! {
                biased;

                result = shutdown_rx.changed() => {
                    if result.is_err() || *shutdown_rx.borrow() {
                        info!("Shutdown signal received, stopping delta sync task");
                        break;
                    }
                    continue;
                }

                _ = timer.tick() => {}
            }

            match core.try_run_pass(SyncKind::Delta).await {
                None => {
                    debug!("Sync lane busy, skipping tick");
                    metrics::record_pass_skipped("lane_busy");
                }
                Some(Ok(_)) => {}
                Some(Err(ReplicationError::Shutdown)) => break,
                Some(Err(e)) => {
                    metrics::record_error(if e.is_retryable() { "transient" } else { "delta" });
                    error!(error = %e, "Delta sync failed, retrying next tick");
                }
            }
        }

        info!("Delta sync task stopped");
    }
    .instrument(span)
    .await
}
