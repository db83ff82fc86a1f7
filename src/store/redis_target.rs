// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Redis document store client.
//!
//! A collection is one Redis hash (`<key_prefix><collection>`): the field is
//! the record id and the value is the record's JSON document. That maps the
//! document-store contract onto single commands:
//!
//! | Operation | Command | Notes |
//! |-----------|---------|-------|
//! | upsert | `HSET key id doc` | insert-or-overwrite, never duplicates an id |
//! | find | `HGET key id` | `nil` → not found |
//! | find_all | `HVALS key` | |
//! | count | `HLEN key` | |
//!
//! Uses `redis::aio::ConnectionManager`, which reconnects on its own and
//! multiplexes every command over one socket. Concurrency is bounded with a
//! [`Bulkhead`].

use super::{BoxFuture, TargetStore};
use crate::config::{redact_url, TargetConfig};
use crate::error::{ReplicationError, Result};
use crate::record::Record;
use crate::resilience::Bulkhead;
use redis::aio::ConnectionManager;
use redis::Client;
use tokio::sync::OwnedSemaphorePermit;
use tokio::time::timeout;
use tracing::{info, trace};

/// Connection to the document store.
pub struct RedisTarget {
    conn: ConnectionManager,
    bulkhead: Bulkhead,
    key: String,
}

impl RedisTarget {
    /// Connect to the document store.
    ///
    /// Fails fast (no retry): the target is only connected after the source
    /// is known to be reachable, and `ConnectionManager` handles reconnects
    /// from then on.
    pub async fn connect(config: &TargetConfig) -> Result<Self> {
        let client = Client::open(config.url.as_str())
            .map_err(|e| ReplicationError::Config(format!("Invalid target URL: {}", e)))?;

        let conn = timeout(config.connect_timeout(), client.get_connection_manager())
            .await
            .map_err(|_| {
                ReplicationError::target_msg(
                    "connect",
                    format!("timed out after {}ms", config.connect_timeout_ms),
                )
            })?
            .map_err(|e| ReplicationError::from_redis("connect", e))?;

        let target = Self::from_connection(conn, config.collection_key(), config.max_concurrency);
        info!(
            url = %redact_url(&config.url),
            key = %target.key,
            max_concurrency = config.max_concurrency,
            "Connected to document store"
        );
        Ok(target)
    }

    /// Wrap an existing connection.
    pub fn from_connection(conn: ConnectionManager, key: String, max_concurrency: usize) -> Self {
        Self {
            conn,
            bulkhead: Bulkhead::new(max_concurrency),
            key,
        }
    }

    /// Redis key of the collection hash.
    pub fn key(&self) -> &str {
        &self.key
    }

    async fn permit(&self) -> Result<OwnedSemaphorePermit> {
        self.bulkhead
            .acquire()
            .await
            .map_err(|e| ReplicationError::Internal(e.to_string()))
    }
}

impl TargetStore for RedisTarget {
    fn upsert<'a>(&'a self, record: &'a Record) -> BoxFuture<'a, ()> {
        Box::pin(async move {
            let doc = record.to_document()?;
            let _permit = self.permit().await?;
            let mut conn = self.conn.clone();

            // 1 = field created, 0 = field overwritten
            let created: i64 = redis::cmd("HSET")
                .arg(&self.key)
                .arg(&record.id)
                .arg(doc)
                .query_async(&mut conn)
                .await
                .map_err(|e| ReplicationError::from_redis("HSET", e))?;

            trace!(id = %record.id, created = created == 1, "HSET document");
            Ok(())
        })
    }

    fn find<'a>(&'a self, id: &'a str) -> BoxFuture<'a, Option<Record>> {
        Box::pin(async move {
            let _permit = self.permit().await?;
            let mut conn = self.conn.clone();

            let doc: Option<String> = redis::cmd("HGET")
                .arg(&self.key)
                .arg(id)
                .query_async(&mut conn)
                .await
                .map_err(|e| ReplicationError::from_redis("HGET", e))?;

            doc.map(|d| Record::from_document(&d))
                .transpose()
                .map_err(ReplicationError::from)
        })
    }

    fn find_all(&self) -> BoxFuture<'_, Vec<Record>> {
        Box::pin(async move {
            let _permit = self.permit().await?;
            let mut conn = self.conn.clone();

            let docs: Vec<String> = redis::cmd("HVALS")
                .arg(&self.key)
                .query_async(&mut conn)
                .await
                .map_err(|e| ReplicationError::from_redis("HVALS", e))?;

            docs.iter()
                .map(|d| Record::from_document(d).map_err(ReplicationError::from))
                .collect()
        })
    }

    fn count(&self) -> BoxFuture<'_, u64> {
        Box::pin(async move {
            let _permit = self.permit().await?;
            let mut conn = self.conn.clone();

            let count: u64 = redis::cmd("HLEN")
                .arg(&self.key)
                .query_async(&mut conn)
                .await
                .map_err(|e| ReplicationError::from_redis("HLEN", e))?;
            Ok(count)
        })
    }
}
