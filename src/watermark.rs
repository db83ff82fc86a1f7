// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! The sync watermark and its optional persistence.
//!
//! The watermark is the exclusive lower bound for "already synced": a delta
//! pass copies rows with `updated_at > watermark`. It starts at the Unix
//! epoch, so the first pass sees every row.
//!
//! # Monotonicity
//!
//! [`Watermark::advance`] only ever moves forward. A candidate older than
//! the current value is ignored, both in memory and on disk
//! (`MAX(stored, new)` in the upsert).
//!
//! # Persistence
//!
//! [`WatermarkStore`] keeps the value in SQLite so a restart can resume with
//! a delta pass instead of re-copying the whole table. It is written after
//! every successful pass. A crash between the pass and the write means the
//! next run re-copies rows that were already applied (idempotent, safe).
//!
//! ```text
//! read rows > W → upsert all → advance W' → persist W'
//!                                 (crash here = re-read from W, idempotent)
//! ```
//!
//! # SQLite Busy Handling
//!
//! SQLITE_BUSY/SQLITE_LOCKED are retried with exponential backoff, up to
//! `SQLITE_RETRY_MAX_ATTEMPTS`.

use crate::error::{ReplicationError, Result};
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// Configuration for SQLite busy retry behavior
const SQLITE_RETRY_MAX_ATTEMPTS: u32 = 5;
const SQLITE_RETRY_BASE_DELAY_MS: u64 = 10;
const SQLITE_RETRY_MAX_DELAY_MS: u64 = 500;

/// Process-wide watermark.
///
/// Backed by a `watch` channel so readers (stats, tests, operators) can
/// borrow or subscribe without touching the sync lane.
#[derive(Debug)]
pub struct Watermark {
    tx: watch::Sender<DateTime<Utc>>,
}

impl Default for Watermark {
    fn default() -> Self {
        Self::new()
    }
}

impl Watermark {
    /// A watermark at the Unix epoch, older than any real record.
    pub fn new() -> Self {
        Self::starting_at(DateTime::<Utc>::UNIX_EPOCH)
    }

    /// A watermark restored from an earlier run.
    pub fn starting_at(at: DateTime<Utc>) -> Self {
        let (tx, _rx) = watch::channel(at);
        Self { tx }
    }

    /// Current value.
    pub fn get(&self) -> DateTime<Utc> {
        *self.tx.borrow()
    }

    /// Move forward to `candidate`. Returns `false` (and changes nothing)
    /// if `candidate` is not newer than the current value.
    pub fn advance(&self, candidate: DateTime<Utc>) -> bool {
        self.tx.send_if_modified(|current| {
            if candidate > *current {
                *current = candidate;
                true
            } else {
                false
            }
        })
    }

    /// Receive every change of the watermark.
    pub fn subscribe(&self) -> watch::Receiver<DateTime<Utc>> {
        self.tx.subscribe()
    }
}

/// Check if an error is a retryable SQLite busy/locked error
fn is_sqlite_busy_error(e: &sqlx::Error) -> bool {
    match e {
        sqlx::Error::Database(db_err) => {
            // SQLite error codes: SQLITE_BUSY = 5, SQLITE_LOCKED = 6
            if let Some(code) = db_err.code() {
                return code == "5" || code == "6";
            }
            let msg = db_err.message().to_lowercase();
            msg.contains("database is locked") || msg.contains("database is busy")
        }
        _ => false,
    }
}

/// Execute a database operation with retry on SQLITE_BUSY/SQLITE_LOCKED
async fn execute_with_retry<F, Fut, T>(
    operation_name: &str,
    mut f: F,
) -> std::result::Result<T, sqlx::Error>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = std::result::Result<T, sqlx::Error>>,
{
    let mut attempts = 0;
    let mut delay_ms = SQLITE_RETRY_BASE_DELAY_MS;

    loop {
        attempts += 1;
        match f().await {
            Ok(result) => {
                if attempts > 1 {
                    debug!(
                        operation = operation_name,
                        attempts, "SQLite operation succeeded after retry"
                    );
                }
                return Ok(result);
            }
            Err(e) if is_sqlite_busy_error(&e) && attempts < SQLITE_RETRY_MAX_ATTEMPTS => {
                warn!(
                    operation = operation_name,
                    attempts,
                    max_attempts = SQLITE_RETRY_MAX_ATTEMPTS,
                    delay_ms,
                    "SQLite busy, retrying"
                );
                crate::metrics::record_watermark_store_retry(operation_name);
                tokio::time::sleep(Duration::from_millis(delay_ms)).await;
                delay_ms = (delay_ms * 2).min(SQLITE_RETRY_MAX_DELAY_MS);
            }
            Err(e) => return Err(e),
        }
    }
}

/// Durable watermark storage backed by SQLite.
pub struct WatermarkStore {
    pool: SqlitePool,
    path: String,
}

impl WatermarkStore {
    /// Open (creating if needed) the store at `path`. `":memory:"` keeps
    /// the value for the lifetime of the store only.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path_str = path.as_ref().to_string_lossy().to_string();
        info!(path = %path_str, "Opening watermark store");

        let options = SqliteConnectOptions::from_str(&format!("sqlite://{}?mode=rwc", path_str))
            .map_err(|e| ReplicationError::Config(format!("Invalid SQLite path: {}", e)))?
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .synchronous(sqlx::sqlite::SqliteSynchronous::Normal)
            .create_if_missing(true);

        // One writer; also keeps ":memory:" on a single connection.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS sync_watermarks (
                name TEXT PRIMARY KEY,
                watermark_ms INTEGER NOT NULL,
                updated_at INTEGER NOT NULL
            )
            "#,
        )
        .execute(&pool)
        .await?;

        Ok(Self {
            pool,
            path: path_str,
        })
    }

    /// Load the persisted watermark, `None` on first run.
    pub async fn load(&self, name: &str) -> Result<Option<DateTime<Utc>>> {
        let row: Option<(i64,)> =
            sqlx::query_as("SELECT watermark_ms FROM sync_watermarks WHERE name = ?")
                .bind(name)
                .fetch_optional(&self.pool)
                .await?;

        let Some((millis,)) = row else {
            return Ok(None);
        };
        let at = DateTime::<Utc>::from_timestamp_millis(millis).ok_or_else(|| {
            ReplicationError::Internal(format!("Stored watermark out of range: {}", millis))
        })?;

        debug!(name, watermark = %at, "Loaded watermark from disk");
        Ok(Some(at))
    }

    /// Persist `at`, keeping the stored value if it is newer.
    pub async fn save(&self, name: &str, at: DateTime<Utc>) -> Result<()> {
        let now = Utc::now().timestamp_millis();
        let millis = at.timestamp_millis();
        let pool = &self.pool;

        execute_with_retry("watermark_save", || async {
            sqlx::query(
                r#"
                INSERT INTO sync_watermarks (name, watermark_ms, updated_at)
                VALUES (?, ?, ?)
                ON CONFLICT(name) DO UPDATE SET
                    watermark_ms = MAX(sync_watermarks.watermark_ms, excluded.watermark_ms),
                    updated_at = excluded.updated_at
                "#,
            )
            .bind(name)
            .bind(millis)
            .bind(now)
            .execute(pool)
            .await
        })
        .await?;

        debug!(name, watermark = %at, "Persisted watermark");
        Ok(())
    }

    /// Get database path (for diagnostics).
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Checkpoint the WAL and close the pool.
    pub async fn close(&self) {
        let pool = &self.pool;
        let checkpoint = execute_with_retry("watermark_checkpoint", || async {
            sqlx::query("PRAGMA wal_checkpoint(TRUNCATE)")
                .execute(pool)
                .await
        })
        .await;
        if let Err(e) = checkpoint {
            warn!(error = %e, "Failed to checkpoint WAL on close");
        }

        self.pool.close().await;
        info!("Watermark store closed");
    }
}
