//! Reconciliation configuration types.

use std::time::Duration;

use serde::Deserialize;

use crate::reconcile::DEFAULT_LOOKBACK_HOURS;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ReconciliationConfig {
    /// Window scanned for gaps.
    pub lookback_hours: u32,
    /// How long to wait for synced tables before scanning anyway.
    pub wait_timeout_secs: u64,
    pub poll_interval_secs: u64,
    /// Delivery attempts per receipt during replay.
    pub replay_max_attempts: usize,
}

impl Default for ReconciliationConfig {
    fn default() -> Self {
        Self {
            lookback_hours: DEFAULT_LOOKBACK_HOURS,
            wait_timeout_secs: 600,
            poll_interval_secs: 15,
            replay_max_attempts: 5,
        }
    }
}

impl ReconciliationConfig {
    pub fn wait_timeout(&self) -> Duration {
        Duration::from_secs(self.wait_timeout_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }
}
