//! Gap scanning over a lookback window.
//!
//! A scan never fails outright: source errors are folded into a report
//! with `status = error` so scheduled jobs can always emit a result.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, warn};

use super::{lookback_cutoff, GapSource, MissingReceipt, SyncMonitor, SyncState};

pub const DEFAULT_LOOKBACK_HOURS: u32 = 24;

const GAP_RECOMMENDATION: &str =
    "Gap detected. Consider refreshing the analytics pipeline or replaying the missing receipts.";
const CLEAN_RECOMMENDATION: &str = "No gap detected. Synced tables are current.";
const ERROR_RECOMMENDATION: &str = "Gap scan failed. Check operational store connectivity.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanStatus {
    Clean,
    GapDetected,
    Error,
}

/// Result of one reconciliation scan.
#[derive(Debug, Clone, Serialize)]
pub struct GapReport {
    pub status: ScanStatus,
    pub gap_count: usize,
    pub oldest_missing_ts: Option<DateTime<Utc>>,
    pub newest_missing_ts: Option<DateTime<Utc>>,
    pub lookback_hours: u32,
    pub recommendation: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip)]
    pub missing: Vec<MissingReceipt>,
}

impl GapReport {
    fn from_missing(lookback_hours: u32, missing: Vec<MissingReceipt>) -> Self {
        let oldest = missing.iter().map(|m| m.transaction_ts).min();
        let newest = missing.iter().map(|m| m.transaction_ts).max();
        let (status, recommendation) = if missing.is_empty() {
            (ScanStatus::Clean, CLEAN_RECOMMENDATION)
        } else {
            (ScanStatus::GapDetected, GAP_RECOMMENDATION)
        };

        Self {
            status,
            gap_count: missing.len(),
            oldest_missing_ts: oldest,
            newest_missing_ts: newest,
            lookback_hours,
            recommendation: recommendation.to_string(),
            error: None,
            missing,
        }
    }

    fn failed(lookback_hours: u32, error: String) -> Self {
        Self {
            status: ScanStatus::Error,
            gap_count: 0,
            oldest_missing_ts: None,
            newest_missing_ts: None,
            lookback_hours,
            recommendation: ERROR_RECOMMENDATION.to_string(),
            error: Some(error),
            missing: Vec::new(),
        }
    }

    pub fn has_gap(&self) -> bool {
        self.status == ScanStatus::GapDetected
    }
}

pub struct ReconciliationScanner {
    gaps: Arc<dyn GapSource>,
    monitor: Option<Arc<dyn SyncMonitor>>,
}

impl ReconciliationScanner {
    pub fn new(gaps: Arc<dyn GapSource>) -> Self {
        Self {
            gaps,
            monitor: None,
        }
    }

    pub fn with_monitor(mut self, monitor: Arc<dyn SyncMonitor>) -> Self {
        self.monitor = Some(monitor);
        self
    }

    /// Scan for gaps in the last `lookback_hours`.
    pub async fn scan(&self, lookback_hours: u32) -> GapReport {
        self.scan_at(Utc::now(), lookback_hours).await
    }

    /// Scan the window ending at `now`.
    pub async fn scan_at(&self, now: DateTime<Utc>, lookback_hours: u32) -> GapReport {
        let missing = match lookback_cutoff(now, lookback_hours) {
            Ok(cutoff) => self.gaps.missing_since(cutoff).await,
            Err(e) => Err(e),
        };

        let report = match missing {
            Ok(missing) => GapReport::from_missing(lookback_hours, missing),
            Err(e) => {
                warn!(error = %e, lookback_hours, "Gap scan failed");
                return GapReport::failed(lookback_hours, e.to_string());
            }
        };

        if report.has_gap() {
            warn!(
                gap_count = report.gap_count,
                oldest = ?report.oldest_missing_ts,
                newest = ?report.newest_missing_ts,
                lookback_hours,
                "Reconciliation gap detected"
            );
        } else {
            info!(lookback_hours, "No reconciliation gap detected");
        }
        report
    }

    /// Poll the monitor until every table is active.
    ///
    /// Returns `false` on timeout. With no monitor configured there is
    /// nothing to wait for.
    pub async fn wait_until_active(&self, timeout: Duration, poll_interval: Duration) -> bool {
        let Some(monitor) = &self.monitor else {
            return true;
        };

        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
            match tokio::time::timeout(remaining, monitor.table_states()).await {
                Err(_) => {
                    warn!(timeout_secs = timeout.as_secs(), "Sync status check outlived the wait timeout");
                    return false;
                }
                Ok(Ok(states)) => {
                    if states.iter().all(|s| s.state == SyncState::Active) {
                        info!(tables = states.len(), "All synced tables active");
                        return true;
                    }
                    for s in states.iter().filter(|s| s.state != SyncState::Active) {
                        info!(table = %s.table, state = %s.state, message = ?s.message, "Waiting for sync");
                    }
                }
                Ok(Err(e)) => warn!(error = %e, "Sync status check failed"),
            }

            if tokio::time::Instant::now() + poll_interval > deadline {
                warn!(timeout_secs = timeout.as_secs(), "Timed out waiting for synced tables");
                return false;
            }
            tokio::time::sleep(poll_interval).await;
        }
    }
}
