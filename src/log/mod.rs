//! Durable analytics log.
//!
//! Append-only, at-least-once. The log does not deduplicate; every append
//! carries a delivery id so the downstream dedup stage can collapse retries.
//!
//! Implementations:
//! - `HttpAnalyticsLog`: JSON over HTTP (reqwest)
//! - `MemoryAnalyticsLog`: in-process, tailed by the dedup pipeline

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::model::{HeaderRecord, ItemRecord};

pub mod http;
pub mod memory;

pub use http::{HttpAnalyticsLog, HttpLogConfig};
pub use memory::{LogEntry, MemoryAnalyticsLog};

/// Errors that can occur while appending to the log.
#[derive(Debug, thiserror::Error)]
pub enum LogError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Append to '{target}' rejected: HTTP {status} - {body}")]
    Rejected {
        target: String,
        status: u16,
        body: String,
    },

    #[error("Analytics log unavailable: {0}")]
    Unavailable(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl LogError {
    /// Whether retrying the same append may succeed.
    ///
    /// Timeouts, connection failures, 429 and 5xx are transient.
    pub fn is_transient(&self) -> bool {
        match self {
            LogError::Http(err) => err.is_timeout() || err.is_connect(),
            LogError::Rejected { status, .. } => *status == 429 || *status >= 500,
            LogError::Unavailable(_) => true,
            LogError::Serialization(_) | LogError::Config(_) => false,
        }
    }
}

/// Records for one target. Serialized as a bare JSON array.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum LogRecords {
    Headers(Vec<HeaderRecord>),
    Items(Vec<ItemRecord>),
}

impl LogRecords {
    pub fn len(&self) -> usize {
        match self {
            LogRecords::Headers(records) => records.len(),
            LogRecords::Items(records) => records.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A single append: all records share the delivery id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AppendRequest {
    pub target: String,
    pub delivery_id: Uuid,
    pub records: LogRecords,
}

/// Log acknowledgement.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ack {
    #[serde(default)]
    pub ack_timestamp: Option<DateTime<Utc>>,
}

/// Interface for the analytics log transport.
#[async_trait]
pub trait AnalyticsLog: Send + Sync {
    /// Append records to a target. No retries here; callers decide.
    async fn append(&self, request: AppendRequest) -> Result<Ack, LogError>;

    /// Transport name for logs.
    fn name(&self) -> &str;
}
