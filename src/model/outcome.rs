//! Per-path write results and the combined dual-write outcome.

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

/// Result of an insert-if-absent against the operational store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InsertOutcome {
    Inserted,
    /// A row with the same transaction_id already existed; nothing changed.
    AlreadyPresent,
}

impl InsertOutcome {
    pub fn is_inserted(&self) -> bool {
        matches!(self, InsertOutcome::Inserted)
    }
}

/// Acknowledgement of one analytics delivery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IngestAck {
    pub delivery_id: Uuid,
    pub transaction_id: String,
    pub headers_ack: Option<DateTime<Utc>>,
    /// `None` when the receipt had no items and the append was skipped.
    pub items_ack: Option<DateTime<Utc>>,
    pub item_count: usize,
}

/// Outcome of the analytics path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum AnalyticsResult {
    Delivered(IngestAck),
    Failed { error: String },
}

impl AnalyticsResult {
    pub fn is_delivered(&self) -> bool {
        matches!(self, AnalyticsResult::Delivered(_))
    }

    pub fn delivery_id(&self) -> Option<Uuid> {
        match self {
            AnalyticsResult::Delivered(ack) => Some(ack.delivery_id),
            AnalyticsResult::Failed { .. } => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OverallStatus {
    Success,
    Partial,
}

/// Combined result of a dual write. Returned to callers, never persisted.
///
/// Only exists when the operational write succeeded; `overall_status` is
/// derived from the analytics result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DualWriteOutcome {
    pub transaction_id: String,
    pub operational: InsertOutcome,
    pub analytics: AnalyticsResult,
    pub overall_status: OverallStatus,
}

impl DualWriteOutcome {
    pub fn new(
        transaction_id: impl Into<String>,
        operational: InsertOutcome,
        analytics: AnalyticsResult,
    ) -> Self {
        let overall_status = if analytics.is_delivered() {
            OverallStatus::Success
        } else {
            OverallStatus::Partial
        };
        Self {
            transaction_id: transaction_id.into(),
            operational,
            analytics,
            overall_status,
        }
    }

    pub fn is_success(&self) -> bool {
        self.overall_status == OverallStatus::Success
    }
}
