//! Operator-triggered gap replay.
//!
//! Re-delivers receipts that the scanner reports missing. Each replay is a
//! fresh delivery (new delivery id, same transaction id), so the dedup
//! stage collapses it with any copy that eventually shows up late.

use std::sync::Arc;

use backon::Retryable;
use chrono::Utc;
use serde::Serialize;
use tracing::{info, warn};

use super::{lookback_cutoff, GapSource, ReconcileError};
use crate::ingest::{BatchFailure, IngestionClient};
use crate::log::LogError;
use crate::storage::OperationalStore;
use crate::utils::retry::replay_backoff;

#[derive(Debug, Clone, Default, Serialize)]
pub struct ReplaySummary {
    pub lookback_hours: u32,
    pub gap_count: usize,
    pub replayed: usize,
    pub failed: usize,
    /// Reported missing but gone from the operational store by replay time.
    pub vanished: usize,
    pub errors: Vec<BatchFailure>,
}

pub struct GapReplayer {
    gaps: Arc<dyn GapSource>,
    store: Arc<dyn OperationalStore>,
    ingestion: IngestionClient,
    max_attempts: usize,
}

impl GapReplayer {
    pub fn new(
        gaps: Arc<dyn GapSource>,
        store: Arc<dyn OperationalStore>,
        ingestion: IngestionClient,
    ) -> Self {
        Self {
            gaps,
            store,
            ingestion,
            max_attempts: 5,
        }
    }

    /// Retry attempts per receipt for transient delivery failures.
    pub fn with_max_attempts(mut self, max_attempts: usize) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    /// Replay every gap in the last `lookback_hours`.
    ///
    /// Only the gap query can fail the call; per-receipt failures are
    /// collected in the summary.
    pub async fn replay(&self, lookback_hours: u32) -> Result<ReplaySummary, ReconcileError> {
        let cutoff = lookback_cutoff(Utc::now(), lookback_hours)?;
        let missing = self.gaps.missing_since(cutoff).await?;

        let mut summary = ReplaySummary {
            lookback_hours,
            gap_count: missing.len(),
            ..Default::default()
        };

        for gap in &missing {
            let Some(receipt) = self.store.get(&gap.transaction_id).await? else {
                summary.vanished += 1;
                continue;
            };

            let delivered = (|| async { self.ingestion.ingest_one(&receipt).await })
                .retry(replay_backoff(self.max_attempts))
                .when(LogError::is_transient)
                .notify(|e: &LogError, delay| {
                    warn!(
                        transaction_id = %gap.transaction_id,
                        error = %e,
                        delay_ms = delay.as_millis() as u64,
                        "Replay delivery failed, retrying"
                    );
                })
                .await;

            match delivered {
                Ok(ack) => {
                    info!(
                        transaction_id = %ack.transaction_id,
                        delivery_id = %ack.delivery_id,
                        "Gap replayed"
                    );
                    summary.replayed += 1;
                }
                Err(e) => {
                    warn!(transaction_id = %gap.transaction_id, error = %e, "Gap replay failed");
                    summary.failed += 1;
                    summary.errors.push(BatchFailure {
                        transaction_id: gap.transaction_id.clone(),
                        error: e.to_string(),
                    });
                }
            }
        }

        info!(
            gap_count = summary.gap_count,
            replayed = summary.replayed,
            failed = summary.failed,
            "Gap replay complete"
        );
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dedup::DedupPipeline;
    use crate::dedup::DedupStage;
    use crate::ingest::IngestTargets;
    use crate::log::MemoryAnalyticsLog;
    use crate::reconcile::AntiJoin;
    use crate::storage::MockOperationalStore;
    use crate::test_utils::receipt;

    struct Harness {
        store: Arc<MockOperationalStore>,
        log: Arc<MemoryAnalyticsLog>,
        pipeline: DedupPipeline,
        replayer: GapReplayer,
    }

    fn harness() -> Harness {
        let store = Arc::new(MockOperationalStore::new());
        let log = Arc::new(MemoryAnalyticsLog::new());
        let stage = Arc::new(DedupStage::new());
        let pipeline = DedupPipeline::new(log.clone(), stage.clone());
        let ingestion = IngestionClient::new(log.clone(), IngestTargets::default());
        let replayer = GapReplayer::new(
            Arc::new(AntiJoin::new(store.clone(), stage)),
            store.clone(),
            ingestion,
        )
        .with_max_attempts(2);
        Harness {
            store,
            log,
            pipeline,
            replayer,
        }
    }

    #[tokio::test]
    async fn test_replay_closes_gap() {
        let h = harness();
        h.store.insert_if_absent(&receipt("GAP-1")).await.unwrap();

        let summary = h.replayer.replay(24).await.unwrap();
        assert_eq!(summary.gap_count, 1);
        assert_eq!(summary.replayed, 1);

        h.pipeline.run_once().await.unwrap();
        let again = h.replayer.replay(24).await.unwrap();
        assert_eq!(again.gap_count, 0);
    }

    #[tokio::test]
    async fn test_transient_failures_are_retried_then_reported() {
        let h = harness();
        h.store.insert_if_absent(&receipt("GAP-1")).await.unwrap();
        h.log.set_fail_on_append(true).await;

        let summary = h.replayer.replay(24).await.unwrap();

        assert_eq!(summary.failed, 1);
        assert_eq!(summary.errors[0].transaction_id, "GAP-1");
        // Initial attempt plus two retries.
        assert_eq!(h.log.append_calls().await, 3);
    }

    #[tokio::test]
    async fn test_gap_query_failure_propagates() {
        let h = harness();
        h.store.set_fail_on_read(true).await;
        assert!(h.replayer.replay(24).await.is_err());
    }

    #[tokio::test]
    async fn test_out_of_range_lookback_is_rejected() {
        let h = harness();
        h.store.insert_if_absent(&receipt("GAP-1")).await.unwrap();

        let result = h.replayer.replay(u32::MAX).await;

        assert!(matches!(result, Err(ReconcileError::LookbackOutOfRange(_))));
        assert_eq!(h.log.append_calls().await, 0);
    }
}
