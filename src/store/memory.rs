// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! In-process stores for standalone mode and tests.

use super::{BoxFuture, SourceStore, TargetStore};
use crate::record::Record;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tokio::sync::RwLock;

/// Source table held in memory.
#[derive(Default)]
pub struct MemorySource {
    rows: RwLock<HashMap<String, Record>>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the table.
    pub fn with_records(records: impl IntoIterator<Item = Record>) -> Self {
        let rows = records.into_iter().map(|r| (r.id.clone(), r)).collect();
        Self {
            rows: RwLock::new(rows),
        }
    }

    /// Insert a row, replacing any row with the same id.
    pub async fn put(&self, record: Record) {
        self.rows.write().await.insert(record.id.clone(), record);
    }

    pub async fn remove(&self, id: &str) -> Option<Record> {
        self.rows.write().await.remove(id)
    }

    pub async fn len(&self) -> usize {
        self.rows.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.rows.read().await.is_empty()
    }

    async fn select<F>(&self, filter: F) -> Vec<Record>
    where
        F: Fn(&Record) -> bool,
    {
        let mut rows: Vec<Record> = self
            .rows
            .read()
            .await
            .values()
            .filter(|r| filter(*r))
            .cloned()
            .collect();
        rows.sort_by(|a, b| a.updated_at.cmp(&b.updated_at).then_with(|| a.id.cmp(&b.id)));
        rows
    }
}

impl SourceStore for MemorySource {
    fn ping(&self) -> BoxFuture<'_, ()> {
        Box::pin(async { Ok(()) })
    }

    fn fetch_all(&self) -> BoxFuture<'_, Vec<Record>> {
        Box::pin(async move { Ok(self.select(|_| true).await) })
    }

    fn fetch_modified_since(&self, watermark: DateTime<Utc>) -> BoxFuture<'_, Vec<Record>> {
        Box::pin(async move { Ok(self.select(|r| r.modified_after(watermark)).await) })
    }

    fn count(&self) -> BoxFuture<'_, u64> {
        Box::pin(async move { Ok(self.rows.read().await.len() as u64) })
    }
}

/// Document collection held in memory, keyed by record id.
#[derive(Default)]
pub struct MemoryTarget {
    docs: RwLock<HashMap<String, Record>>,
}

impl MemoryTarget {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.docs.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.docs.read().await.is_empty()
    }

    /// Remove a document (simulates divergence in tests).
    pub async fn remove(&self, id: &str) -> Option<Record> {
        self.docs.write().await.remove(id)
    }
}

impl TargetStore for MemoryTarget {
    fn upsert<'a>(&'a self, record: &'a Record) -> BoxFuture<'a, ()> {
        Box::pin(async move {
            self.docs
                .write()
                .await
                .insert(record.id.clone(), record.clone());
            Ok(())
        })
    }

    fn find<'a>(&'a self, id: &'a str) -> BoxFuture<'a, Option<Record>> {
        Box::pin(async move { Ok(self.docs.read().await.get(id).cloned()) })
    }

    fn find_all(&self) -> BoxFuture<'_, Vec<Record>> {
        Box::pin(async move { Ok(self.docs.read().await.values().cloned().collect()) })
    }

    fn count(&self) -> BoxFuture<'_, u64> {
        Box::pin(async move { Ok(self.docs.read().await.len() as u64) })
    }
}
