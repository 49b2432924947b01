//! Reconciliation between the operational store and the analytics copy.
//!
//! A gap is a transaction present in the operational store but absent from
//! the deduplicated analytics copy. Gaps are reported by the scanner and
//! closed only by an explicit replay.

use std::fmt;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;

pub mod anti_join;
pub mod replay;
pub mod scanner;

pub use anti_join::AntiJoin;
pub use replay::{GapReplayer, ReplaySummary};
pub use scanner::{GapReport, ReconciliationScanner, ScanStatus, DEFAULT_LOOKBACK_HOURS};

use crate::storage::StorageError;

/// Errors that can occur while reconciling.
#[derive(Debug, thiserror::Error)]
pub enum ReconcileError {
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Query failed: {0}")]
    Query(String),

    #[error("Analytics copy unavailable: {0}")]
    Unavailable(String),

    #[error("Lookback of {0} hours is out of range")]
    LookbackOutOfRange(u32),
}

/// Longest lookback window accepted by configuration (ten years).
pub const MAX_LOOKBACK_HOURS: u32 = 24 * 365 * 10;

/// Start of the window reaching `lookback_hours` back from `now`.
pub fn lookback_cutoff(
    now: DateTime<Utc>,
    lookback_hours: u32,
) -> Result<DateTime<Utc>, ReconcileError> {
    now.checked_sub_signed(chrono::Duration::hours(i64::from(lookback_hours)))
        .ok_or(ReconcileError::LookbackOutOfRange(lookback_hours))
}

/// A transaction missing from the analytics copy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MissingReceipt {
    pub transaction_id: String,
    pub transaction_ts: DateTime<Utc>,
}

/// Finds operational rows with no analytics counterpart.
#[async_trait]
pub trait GapSource: Send + Sync {
    /// Missing transactions with `transaction_ts >= cutoff`, oldest first.
    async fn missing_since(&self, cutoff: DateTime<Utc>) -> Result<Vec<MissingReceipt>, ReconcileError>;
}

/// Sync state of a downstream table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SyncState {
    Provisioning,
    Active,
    Failed,
    Unknown,
}

impl fmt::Display for SyncState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SyncState::Provisioning => "PROVISIONING",
            SyncState::Active => "ACTIVE",
            SyncState::Failed => "FAILED",
            SyncState::Unknown => "UNKNOWN",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableStatus {
    pub table: String,
    pub state: SyncState,
    pub message: Option<String>,
}

impl TableStatus {
    pub fn new(table: impl Into<String>, state: SyncState) -> Self {
        Self {
            table: table.into(),
            state,
            message: None,
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}

/// Reports whether the analytics copy is caught up enough to scan.
#[async_trait]
pub trait SyncMonitor: Send + Sync {
    async fn table_states(&self) -> Result<Vec<TableStatus>, ReconcileError>;
}
