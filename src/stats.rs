// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Consistency statistics.
//!
//! `in_sync` is count equality only: it says nothing about whether the
//! documents match the rows field by field. It is a cheap convergence
//! signal, not a proof.
//!
//! ```text
//! {"sourceCount":5,"targetCount":5,"lastSync":"2026-10-15T08:00:00Z",
//!  "pollIntervalMs":5000,"inSync":true}
//! ```

use crate::error::Result;
use crate::metrics;
use crate::store::{SourceStore, TargetStore};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

/// Snapshot of replication progress.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncStats {
    pub source_count: u64,
    pub target_count: u64,
    /// The watermark at the time of the snapshot.
    pub last_sync: DateTime<Utc>,
    pub poll_interval_ms: u64,
    pub in_sync: bool,
}

/// Reads both stores' counts and the current watermark. Never writes.
pub struct StatsReporter<S, T> {
    source: Arc<S>,
    target: Arc<T>,
    watermark: watch::Receiver<DateTime<Utc>>,
    poll_interval: Duration,
}

impl<S, T> Clone for StatsReporter<S, T> {
    fn clone(&self) -> Self {
        Self {
            source: Arc::clone(&self.source),
            target: Arc::clone(&self.target),
            watermark: self.watermark.clone(),
            poll_interval: self.poll_interval,
        }
    }
}

impl<S: SourceStore, T: TargetStore> StatsReporter<S, T> {
    pub fn new(
        source: Arc<S>,
        target: Arc<T>,
        watermark: watch::Receiver<DateTime<Utc>>,
        poll_interval: Duration,
    ) -> Self {
        Self {
            source,
            target,
            watermark,
            poll_interval,
        }
    }

    /// Count both stores concurrently. Either count failing fails the call.
    pub async fn stats(&self) -> Result<SyncStats> {
        let (source_count, target_count) =
            futures::future::try_join(self.source.count(), self.target.count()).await?;
        let last_sync = *self.watermark.borrow();

        metrics::set_row_counts(source_count, target_count);

        Ok(SyncStats {
            source_count,
            target_count,
            last_sync,
            poll_interval_ms: self.poll_interval.as_millis() as u64,
            in_sync: source_count == target_count,
        })
    }
}
