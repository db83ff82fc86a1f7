// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! MySQL source client.
//!
//! Backed by a bounded `sqlx` pool. The pool is created lazily, so building
//! a [`MySqlSource`] never touches the network; the first [`ping`] (from
//! bootstrap) is what opens the first connection.
//!
//! Expected table layout (column names match the application schema):
//!
//! ```sql
//! CREATE TABLE persons (
//!     id        VARCHAR(64) PRIMARY KEY,
//!     name      VARCHAR(255) NOT NULL,
//!     email     VARCHAR(255) NOT NULL,
//!     createdAt DATETIME(3) NOT NULL,
//!     updatedAt DATETIME(3) NOT NULL
//! );
//! ```
//!
//! [`ping`]: super::SourceStore::ping

use super::{BoxFuture, SourceStore};
use crate::config::{redact_url, SourceConfig};
use crate::error::{ReplicationError, Result};
use crate::record::{Record, RecordRow};
use chrono::{DateTime, Utc};
use sqlx::mysql::{MySqlConnectOptions, MySqlPool, MySqlPoolOptions};
use sqlx::Connection;
use std::str::FromStr;
use tracing::{debug, info};

/// Pooled connection to the relational source.
pub struct MySqlSource {
    pool: MySqlPool,
    table: String,
    select_all: String,
    select_since: String,
    select_count: String,
}

impl MySqlSource {
    /// Build the pool without connecting.
    pub fn connect_lazy(config: &SourceConfig) -> Result<Self> {
        let options = MySqlConnectOptions::from_str(&config.url)
            .map_err(|e| ReplicationError::Config(format!("Invalid source URL: {}", e)))?;

        let pool = MySqlPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(config.acquire_timeout())
            .connect_lazy_with(options);

        info!(
            url = %redact_url(&config.url),
            table = %config.table,
            max_connections = config.max_connections,
            "Source pool configured"
        );

        Ok(Self::from_pool(pool, &config.table))
    }

    /// Wrap an existing pool. `table` must already be a validated identifier.
    pub fn from_pool(pool: MySqlPool, table: &str) -> Self {
        let columns = "id, name, email, createdAt, updatedAt";
        Self {
            pool,
            table: table.to_string(),
            select_all: format!(
                "SELECT {} FROM `{}` ORDER BY updatedAt, id",
                columns, table
            ),
            select_since: format!(
                "SELECT {} FROM `{}` WHERE updatedAt > ? ORDER BY updatedAt, id",
                columns, table
            ),
            select_count: format!("SELECT COUNT(*) FROM `{}`", table),
        }
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    /// Underlying pool (for diagnostics and test fixtures).
    pub fn pool(&self) -> &MySqlPool {
        &self.pool
    }
}

impl SourceStore for MySqlSource {
    fn ping(&self) -> BoxFuture<'_, ()> {
        Box::pin(async move {
            // Connection goes back to the pool when dropped, on both paths.
            let mut conn = self
                .pool
                .acquire()
                .await
                .map_err(|e| ReplicationError::from_sqlx("acquire", e))?;
            conn.ping()
                .await
                .map_err(|e| ReplicationError::from_sqlx("ping", e))
        })
    }

    fn fetch_all(&self) -> BoxFuture<'_, Vec<Record>> {
        Box::pin(async move {
            let rows: Vec<RecordRow> = sqlx::query_as(&self.select_all)
                .fetch_all(&self.pool)
                .await
                .map_err(|e| ReplicationError::from_sqlx("fetch_all", e))?;

            debug!(table = %self.table, rows = rows.len(), "Fetched all rows");
            Ok(rows.into_iter().map(Record::from).collect())
        })
    }

    fn fetch_modified_since(&self, watermark: DateTime<Utc>) -> BoxFuture<'_, Vec<Record>> {
        Box::pin(async move {
            let rows: Vec<RecordRow> = sqlx::query_as(&self.select_since)
                .bind(watermark.naive_utc())
                .fetch_all(&self.pool)
                .await
                .map_err(|e| ReplicationError::from_sqlx("fetch_modified_since", e))?;

            debug!(
                table = %self.table,
                watermark = %watermark,
                rows = rows.len(),
                "Fetched modified rows"
            );
            Ok(rows.into_iter().map(Record::from).collect())
        })
    }

    fn count(&self) -> BoxFuture<'_, u64> {
        Box::pin(async move {
            let count: i64 = sqlx::query_scalar(&self.select_count)
                .fetch_one(&self.pool)
                .await
                .map_err(|e| ReplicationError::from_sqlx("count", e))?;
            Ok(count.max(0) as u64)
        })
    }

    fn close(&self) -> BoxFuture<'_, ()> {
        Box::pin(async move {
            // Waits for checked-out connections to be returned
            self.pool.close().await;
            info!(table = %self.table, "Source pool closed");
            Ok(())
        })
    }
}
