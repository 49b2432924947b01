//! In-process analytics log.
//!
//! Keeps appends in order with a monotonically increasing offset, so the
//! dedup pipeline can tail it. Entries the pipeline has committed are
//! trimmed; offsets stay stable across trims. Supports failure injection
//! for tests.

use std::collections::VecDeque;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{Ack, AnalyticsLog, AppendRequest, LogError};

/// One acknowledged append.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntry {
    pub offset: u64,
    pub acked_at: DateTime<Utc>,
    pub request: AppendRequest,
}

#[derive(Default)]
struct Entries {
    /// Offset of the front entry.
    base: u64,
    retained: VecDeque<LogEntry>,
}

impl Entries {
    fn next_offset(&self) -> u64 {
        self.base + self.retained.len() as u64
    }
}

#[derive(Default)]
pub struct MemoryAnalyticsLog {
    entries: RwLock<Entries>,
    fail_on_append: RwLock<bool>,
    fail_target: RwLock<Option<String>>,
    append_calls: RwLock<usize>,
}

impl MemoryAnalyticsLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail every append.
    pub async fn set_fail_on_append(&self, fail: bool) {
        *self.fail_on_append.write().await = fail;
    }

    /// Fail appends to one target only.
    pub async fn set_fail_target(&self, target: Option<&str>) {
        *self.fail_target.write().await = target.map(str::to_string);
    }

    /// Number of append attempts, including failed ones.
    pub async fn append_calls(&self) -> usize {
        *self.append_calls.read().await
    }

    /// Number of retained entries.
    pub async fn len(&self) -> usize {
        self.entries.read().await.retained.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.retained.is_empty()
    }

    /// Offset the next append will receive.
    pub async fn next_offset(&self) -> u64 {
        self.entries.read().await.next_offset()
    }

    /// Retained entries with `offset >= from`, in append order.
    pub async fn entries_from(&self, from: u64) -> Vec<LogEntry> {
        let entries = self.entries.read().await;
        let skip = from.saturating_sub(entries.base);
        let skip = usize::try_from(skip).unwrap_or(usize::MAX);
        entries.retained.iter().skip(skip).cloned().collect()
    }

    /// Discard entries with `offset < offset`.
    pub async fn trim_before(&self, offset: u64) {
        let mut entries = self.entries.write().await;
        while entries.retained.front().is_some_and(|e| e.offset < offset) {
            entries.retained.pop_front();
            entries.base += 1;
        }
    }

    /// Delivery ids of retained entries for a target, in order.
    pub async fn delivery_ids(&self, target: &str) -> Vec<Uuid> {
        self.entries
            .read()
            .await
            .retained
            .iter()
            .filter(|e| e.request.target == target)
            .map(|e| e.request.delivery_id)
            .collect()
    }
}

#[async_trait]
impl AnalyticsLog for MemoryAnalyticsLog {
    async fn append(&self, request: AppendRequest) -> Result<Ack, LogError> {
        *self.append_calls.write().await += 1;

        if *self.fail_on_append.read().await {
            return Err(LogError::Unavailable("Mock append failure".to_string()));
        }
        if self.fail_target.read().await.as_deref() == Some(request.target.as_str()) {
            return Err(LogError::Unavailable(format!(
                "Mock append failure for target '{}'",
                request.target
            )));
        }

        let acked_at = Utc::now();
        let mut entries = self.entries.write().await;
        let offset = entries.next_offset();
        entries.retained.push_back(LogEntry {
            offset,
            acked_at,
            request,
        });

        Ok(Ack {
            ack_timestamp: Some(acked_at),
        })
    }

    fn name(&self) -> &str {
        "memory"
    }
}
