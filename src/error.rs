// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Error types for the replicator.
//!
//! Errors are categorized by the store they came from and carry enough
//! context (operation name, record id) to debug from a log line.
//!
//! # Error Categories
//!
//! | Error Type | Retryable | Description |
//! |------------|-----------|-------------|
//! | `Source` | Yes | Relational source unreachable or query failed |
//! | `Target` | Yes | Document store unreachable or command failed |
//! | `Codec` | No | Stored document does not decode into a record |
//! | `WatermarkStore` | No | Local SQLite errors (needs operator attention) |
//! | `BootstrapExhausted` | No | Source never became reachable at startup |
//! | `NotFound` | No | Lookup of an id the document store does not hold |
//! | `Config` | No | Configuration invalid |
//! | `InvalidState` | No | Engine state machine violation |
//! | `Shutdown` | No | Engine is shutting down |
//! | `Internal` | No | Unexpected internal error |
//!
//! # Retry Behavior
//!
//! Only bootstrap retries automatically. Everywhere else a retryable error
//! is surfaced to the caller (forced sync, stats) or logged and retried on
//! the next poll tick (delta sync).

use thiserror::Error;

/// Result type alias for replicator operations.
pub type Result<T> = std::result::Result<T, ReplicationError>;

/// Errors that can occur while replicating or querying.
#[derive(Error, Debug)]
pub enum ReplicationError {
    /// Relational source connection or query error.
    #[error("Source error ({operation}): {message}")]
    Source {
        operation: String,
        message: String,
        #[source]
        source: Option<sqlx::Error>,
    },

    /// Document store connection or command error.
    #[error("Target error ({operation}): {message}")]
    Target {
        operation: String,
        message: String,
        #[source]
        source: Option<redis::RedisError>,
    },

    /// A document in the target could not be encoded or decoded.
    #[error("Codec error: {0}")]
    Codec(#[from] serde_json::Error),

    /// SQLite error while persisting the watermark.
    #[error("Watermark store error: {0}")]
    WatermarkStore(#[from] sqlx::Error),

    /// The source was not reachable within the bootstrap attempt budget.
    #[error("Source unreachable after {attempts} attempts: {last_error}")]
    BootstrapExhausted { attempts: usize, last_error: String },

    /// No document with this id exists in the target.
    #[error("Record with id {id} not found")]
    NotFound { id: String },

    /// Invalid or missing configuration.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Operation attempted in the wrong engine state.
    #[error("Invalid state: expected {expected}, got {actual}")]
    InvalidState { expected: String, actual: String },

    /// Shutdown in progress.
    #[error("Shutdown in progress")]
    Shutdown,

    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ReplicationError {
    /// Create a source error from a sqlx error.
    pub fn from_sqlx(operation: impl Into<String>, source: sqlx::Error) -> Self {
        Self::Source {
            operation: operation.into(),
            message: source.to_string(),
            source: Some(source),
        }
    }

    /// Create a source error without an underlying driver error.
    pub fn source_msg(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Source {
            operation: operation.into(),
            message: message.into(),
            source: None,
        }
    }

    /// Create a target error from a redis error.
    pub fn from_redis(operation: impl Into<String>, source: redis::RedisError) -> Self {
        Self::Target {
            operation: operation.into(),
            message: source.to_string(),
            source: Some(source),
        }
    }

    /// Create a target error without an underlying driver error.
    pub fn target_msg(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Target {
            operation: operation.into(),
            message: message.into(),
            source: None,
        }
    }

    /// Check if this error is retryable
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Source { .. } => true,
            Self::Target { .. } => true,
            Self::Codec(_) => false,
            Self::WatermarkStore(_) => false,
            Self::BootstrapExhausted { .. } => false,
            Self::NotFound { .. } => false,
            Self::Config(_) => false,
            Self::InvalidState { .. } => false,
            Self::Shutdown => false,
            Self::Internal(_) => false,
        }
    }

    /// Whether this is the "no such record" signal from the query facade.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

impl From<redis::RedisError> for ReplicationError {
    fn from(e: redis::RedisError) -> Self {
        Self::from_redis("unknown", e)
    }
}
