// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! The replicated entity.
//!
//! A [`Record`] is created and mutated only in the relational source. The
//! document store holds a derived copy keyed by [`Record::id`], never by a
//! key of its own.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

/// One row of the source table and one document in the target collection.
///
/// Serialized with camelCase keys (`createdAt`, `updatedAt`) so documents
/// written by the replicator match the schema readers already expect.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Record {
    /// Natural key, unique in the source and used as the document key.
    pub id: String,
    pub name: String,
    pub email: String,
    pub created_at: DateTime<Utc>,
    /// Drives delta sync: rows with `updated_at > watermark` are re-copied.
    pub updated_at: DateTime<Utc>,
}

impl Record {
    /// Build a record whose creation and modification times are both `at`.
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        email: impl Into<String>,
        at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            email: email.into(),
            created_at: at,
            updated_at: at,
        }
    }

    /// Encode as the JSON document stored in the target.
    pub fn to_document(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    /// Decode a JSON document read back from the target.
    pub fn from_document(doc: &str) -> serde_json::Result<Self> {
        serde_json::from_str(doc)
    }

    /// Whether this record falls after the watermark (strictly greater).
    pub fn modified_after(&self, watermark: DateTime<Utc>) -> bool {
        self.updated_at > watermark
    }
}

/// Raw source row. MySQL `DATETIME` columns carry no zone; they are read as
/// naive timestamps and interpreted as UTC.
#[derive(Debug, sqlx::FromRow)]
pub(crate) struct RecordRow {
    pub id: String,
    pub name: String,
    pub email: String,
    #[sqlx(rename = "createdAt")]
    pub created_at: NaiveDateTime,
    #[sqlx(rename = "updatedAt")]
    pub updated_at: NaiveDateTime,
}

impl From<RecordRow> for Record {
    fn from(row: RecordRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            email: row.email,
            created_at: row.created_at.and_utc(),
            updated_at: row.updated_at.and_utc(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    #[test]
    fn test_document_uses_camel_case_keys() {
        let record = Record::new("p-1", "Ada", "ada@example.com", at(1_700_000_000));
        let doc = record.to_document().unwrap();

        assert!(doc.contains("\"createdAt\""));
        assert!(doc.contains("\"updatedAt\""));
        assert!(!doc.contains("created_at"));
    }

    #[test]
    fn test_document_decodes_back() {
        let mut record = Record::new("p-2", "Grace", "grace@example.com", at(1_700_000_000));
        record.updated_at = at(1_700_000_500);

        let decoded = Record::from_document(&record.to_document().unwrap()).unwrap();
        assert_eq!(decoded, record);
    }

    #[test]
    fn test_from_document_rejects_missing_fields() {
        let result = Record::from_document(r#"{"id":"p-3","name":"x"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_modified_after_is_strict() {
        let watermark = at(1_700_000_000);
        let mut record = Record::new("p-4", "Linus", "linus@example.com", watermark);

        assert!(!record.modified_after(watermark));

        record.updated_at = watermark + Duration::milliseconds(1);
        assert!(record.modified_after(watermark));

        record.updated_at = watermark - Duration::milliseconds(1);
        assert!(!record.modified_after(watermark));
    }

    #[test]
    fn test_row_conversion_treats_naive_as_utc() {
        let naive = at(1_700_000_000).naive_utc();
        let row = RecordRow {
            id: "p-5".to_string(),
            name: "Barbara".to_string(),
            email: "barbara@example.com".to_string(),
            created_at: naive,
            updated_at: naive,
        };

        let record = Record::from(row);
        assert_eq!(record.created_at, at(1_700_000_000));
        assert_eq!(record.updated_at, at(1_700_000_000));
    }
}
