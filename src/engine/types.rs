//! Engine state types.
//!
//! Defines the state machine for the replication engine lifecycle.
//!
//! # State Transitions
//!
//! ```text
//!                  start()
//! Created ───────────────────→ Bootstrapping ──────────────→ Failed
//!                                   │        (source never reachable,
//!                                   │         initial sync failed)
//!                                   ↓
//!                  tick ┌────────  Idle  ────────┐ force_sync()
//!                       ↓          ↑  ↑          ↓
//!                    Syncing ──────┘  └──── ForceSyncing
//!
//! any running state ── shutdown() ──→ ShuttingDown ──→ Stopped
//! ```
//!
//! # State Descriptions
//!
//! - **Created**: Initial state after `ReplicationEngine::new()`. Nothing connected.
//! - **Bootstrapping**: `start()` called. Waiting for the source, then the initial sync.
//! - **Idle**: Running, between passes.
//! - **Syncing**: A periodic delta pass holds the sync lane.
//! - **ForceSyncing**: An on-demand full pass holds the sync lane.
//! - **ShuttingDown**: `shutdown()` called. Waiting for the in-flight pass.
//! - **Stopped**: Shutdown complete. Safe to drop.
//! - **Failed**: Bootstrap failed. Periodic failures never lead here.

use serde::{Deserialize, Serialize};

/// State of the replication engine.
///
/// See module docs for the state transition diagram.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    /// Engine created but not started.
    ///
    /// Call [`start()`](super::ReplicationEngine::start) to begin replication.
    Created,

    /// Waiting for the source store, then copying the table.
    Bootstrapping,

    /// Running, no pass in flight.
    Idle,

    /// Periodic delta pass in flight.
    Syncing,

    /// Forced full pass in flight.
    ForceSyncing,

    /// Shutting down gracefully.
    ///
    /// The periodic task has been signalled; an in-flight pass is allowed
    /// to finish. Transitions to `Stopped` when complete.
    ShuttingDown,

    /// Stopped.
    Stopped,

    /// Bootstrap failed.
    ///
    /// Check logs for error details. Engine cannot recover from this state.
    Failed,
}

impl EngineState {
    /// Started and not yet shutting down.
    pub fn is_running(&self) -> bool {
        matches!(self, Self::Idle | Self::Syncing | Self::ForceSyncing)
    }
}

impl std::fmt::Display for EngineState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineState::Created => write!(f, "Created"),
            EngineState::Bootstrapping => write!(f, "Bootstrapping"),
            EngineState::Idle => write!(f, "Idle"),
            EngineState::Syncing => write!(f, "Syncing"),
            EngineState::ForceSyncing => write!(f, "ForceSyncing"),
            EngineState::ShuttingDown => write!(f, "ShuttingDown"),
            EngineState::Stopped => write!(f, "Stopped"),
            EngineState::Failed => write!(f, "Failed"),
        }
    }
}

/// Which kind of pass is running.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncKind {
    /// Copy every source row (initial sync).
    Full,
    /// Copy rows modified after the watermark.
    Delta,
    /// Full copy requested by an operator.
    Force,
}

impl SyncKind {
    /// Label used in logs and metrics.
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncKind::Full => "full",
            SyncKind::Delta => "delta",
            SyncKind::Force => "force",
        }
    }

    /// Whether the pass scans the whole table.
    pub fn is_full_scan(&self) -> bool {
        !matches!(self, SyncKind::Delta)
    }
}

impl std::fmt::Display for SyncKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of [`force_sync()`](super::ReplicationEngine::force_sync).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForceSyncResult {
    /// Number of records written.
    pub synced: usize,
}
