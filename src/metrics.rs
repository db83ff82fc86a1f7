//! Metrics for observability.
//!
//! Exports Prometheus-compatible metrics for:
//! - Bootstrap attempts against the source
//! - Sync passes (full, delta, forced) and their outcomes
//! - Records copied and the watermark position
//! - Source/target row counts from the stats reporter
//!
//! # Metric Naming Convention
//!
//! All metrics are prefixed with `replicator_` and follow Prometheus conventions:
//! - Counters end in `_total`
//! - Gauges represent current state
//! - Histograms track distributions (duration, size)
//!
//! No recorder is installed here; the embedding binary picks the exporter.
//!
//! # Usage
//!
//! ```rust,no_run
//! use table_replicator::metrics;
//! use std::time::Duration;
//!
//! metrics::record_sync_pass("delta", true, 42, Duration::from_millis(50));
//! metrics::set_row_counts(1000, 998);
//! ```

use metrics::{counter, gauge, histogram};
use std::time::Duration;

/// Record one bootstrap connection attempt.
pub fn record_bootstrap_attempt(success: bool) {
    let status = if success { "success" } else { "failure" };
    counter!("replicator_bootstrap_attempts_total", "status" => status).increment(1);
}

/// Record a completed or failed sync pass.
///
/// `kind` is one of `full`, `delta`, `force`.
pub fn record_sync_pass(kind: &str, success: bool, records: usize, duration: Duration) {
    let status = if success { "success" } else { "failure" };
    counter!(
        "replicator_sync_passes_total",
        "kind" => kind.to_string(),
        "status" => status
    )
    .increment(1);
    histogram!("replicator_sync_pass_duration_seconds", "kind" => kind.to_string())
        .record(duration.as_secs_f64());

    if success {
        counter!("replicator_records_synced_total", "kind" => kind.to_string())
            .increment(records as u64);
        histogram!("replicator_sync_pass_records", "kind" => kind.to_string())
            .record(records as f64);
    }
}

/// Record a single upsert that the target rejected.
pub fn record_upsert_failure() {
    counter!("replicator_upsert_failures_total").increment(1);
}

/// Record a delta tick that did not run (previous pass still holding the lane).
pub fn record_pass_skipped(reason: &str) {
    counter!("replicator_sync_passes_skipped_total", "reason" => reason.to_string()).increment(1);
}

/// Gauge for the watermark as Unix milliseconds.
pub fn set_watermark(millis: i64) {
    gauge!("replicator_watermark_ms").set(millis as f64);
}

/// Record watermark persistence.
pub fn record_watermark_persist(success: bool) {
    let status = if success { "success" } else { "failure" };
    counter!("replicator_watermark_persists_total", "status" => status).increment(1);
}

/// Record watermark store SQLite retry (for SQLITE_BUSY/SQLITE_LOCKED).
pub fn record_watermark_store_retry(operation: &str) {
    counter!("replicator_watermark_store_retries_total", "operation" => operation.to_string())
        .increment(1);
}

/// Gauges for the last observed source and target counts.
pub fn set_row_counts(source: u64, target: u64) {
    gauge!("replicator_source_rows").set(source as f64);
    gauge!("replicator_target_documents").set(target as f64);
    gauge!("replicator_in_sync").set(if source == target { 1.0 } else { 0.0 });
}

/// Record errors by type.
pub fn record_error(error_type: &str) {
    counter!("replicator_errors_total", "error_type" => error_type.to_string()).increment(1);
}

/// Gauge for engine state.
pub fn set_engine_state(state: &str) {
    let value = match state {
        "Created" => 0.0,
        "Bootstrapping" => 1.0,
        "Idle" => 2.0,
        "Syncing" => 3.0,
        "ForceSyncing" => 4.0,
        "ShuttingDown" => 5.0,
        "Stopped" => 6.0,
        "Failed" => 7.0,
        _ => -1.0,
    };
    gauge!("replicator_engine_state").set(value);
}
