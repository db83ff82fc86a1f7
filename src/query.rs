// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Read-only lookups against the document store.
//!
//! Reads go straight to the target on every call; nothing is cached. Results
//! reflect whatever the last completed pass wrote, so they may lag the
//! source by up to one poll interval.

use crate::error::{ReplicationError, Result};
use crate::record::Record;
use crate::store::TargetStore;
use std::sync::Arc;
use tracing::debug;

/// Query facade over the document store.
pub struct QueryFacade<T> {
    target: Arc<T>,
}

impl<T> Clone for QueryFacade<T> {
    fn clone(&self) -> Self {
        Self {
            target: Arc::clone(&self.target),
        }
    }
}

impl<T: TargetStore> QueryFacade<T> {
    pub fn new(target: Arc<T>) -> Self {
        Self { target }
    }

    /// Every replicated record. Empty when nothing has been synced yet.
    pub async fn list_records(&self) -> Result<Vec<Record>> {
        let records = self.target.find_all().await?;
        debug!(count = records.len(), "Listed records");
        Ok(records)
    }

    /// One record by id.
    ///
    /// # Errors
    ///
    /// [`ReplicationError::NotFound`] if the document store has no such id.
    pub async fn get_record(&self, id: &str) -> Result<Record> {
        self.target
            .find(id)
            .await?
            .ok_or_else(|| ReplicationError::NotFound { id: id.to_string() })
    }
}
