//! Ingestion client: delivers receipts to the analytics log.
//!
//! Every call seals a fresh envelope, so retries and duplicate submissions
//! produce distinct delivery ids for the same transaction_id. Duplicate
//! suppression is left to the dedup stage.

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, warn};

use crate::log::{AnalyticsLog, AppendRequest, LogError, LogRecords};
use crate::model::{IngestAck, IngestionEnvelope, Receipt};

/// Default target for header records.
pub const DEFAULT_HEADERS_TARGET: &str = "pos_raw_receipts";
/// Default target for item records.
pub const DEFAULT_ITEMS_TARGET: &str = "pos_raw_items";

/// Log targets for the two record kinds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestTargets {
    pub headers: String,
    pub items: String,
}

impl Default for IngestTargets {
    fn default() -> Self {
        Self {
            headers: DEFAULT_HEADERS_TARGET.to_string(),
            items: DEFAULT_ITEMS_TARGET.to_string(),
        }
    }
}

/// Per-receipt failure inside a batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchFailure {
    pub transaction_id: String,
    pub error: String,
}

/// Aggregate result of [`IngestionClient::ingest_batch`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BatchSummary {
    pub ingested: usize,
    pub failed: usize,
    pub errors: Vec<BatchFailure>,
}

/// Writes receipts to the analytics log.
#[derive(Clone)]
pub struct IngestionClient {
    log: Arc<dyn AnalyticsLog>,
    targets: IngestTargets,
}

impl IngestionClient {
    pub fn new(log: Arc<dyn AnalyticsLog>, targets: IngestTargets) -> Self {
        Self { log, targets }
    }

    pub fn targets(&self) -> &IngestTargets {
        &self.targets
    }

    /// Deliver one receipt: header record first, then item records.
    ///
    /// The items append is skipped for a receipt without items. An error on
    /// either append is returned as-is; a header may already be in the log.
    pub async fn ingest_one(&self, receipt: &Receipt) -> Result<IngestAck, LogError> {
        let envelope = IngestionEnvelope::seal(receipt);
        let delivery_id = envelope.delivery_id;
        let transaction_id = envelope.transaction_id().to_string();
        let item_count = envelope.items.len();

        let headers_ack = self
            .log
            .append(AppendRequest {
                target: self.targets.headers.clone(),
                delivery_id,
                records: LogRecords::Headers(vec![envelope.header]),
            })
            .await?;

        let items_ack = if envelope.items.is_empty() {
            None
        } else {
            let ack = self
                .log
                .append(AppendRequest {
                    target: self.targets.items.clone(),
                    delivery_id,
                    records: LogRecords::Items(envelope.items),
                })
                .await?;
            ack.ack_timestamp
        };

        debug!(
            transaction_id = %transaction_id,
            delivery_id = %delivery_id,
            item_count,
            log = self.log.name(),
            "Receipt delivered to analytics log"
        );

        Ok(IngestAck {
            delivery_id,
            transaction_id,
            headers_ack: headers_ack.ack_timestamp,
            items_ack,
            item_count,
        })
    }

    /// Deliver receipts one by one. A failure never aborts the batch.
    pub async fn ingest_batch(&self, receipts: &[Receipt]) -> BatchSummary {
        let mut summary = BatchSummary::default();

        for receipt in receipts {
            match self.ingest_one(receipt).await {
                Ok(_) => summary.ingested += 1,
                Err(e) => {
                    warn!(
                        transaction_id = %receipt.transaction_id(),
                        error = %e,
                        "Analytics delivery failed in batch"
                    );
                    summary.failed += 1;
                    summary.errors.push(BatchFailure {
                        transaction_id: receipt.transaction_id().to_string(),
                        error: e.to_string(),
                    });
                }
            }
        }

        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::log::MemoryAnalyticsLog;
    use crate::model::{RawReceipt, ValidationRules};
    use crate::test_utils::receipt;

    fn client(log: Arc<MemoryAnalyticsLog>) -> IngestionClient {
        IngestionClient::new(log, IngestTargets::default())
    }

    #[tokio::test]
    async fn test_ingest_one_appends_header_and_items() {
        let log = Arc::new(MemoryAnalyticsLog::new());
        let ack = client(log.clone()).ingest_one(&receipt("TXN-1")).await.unwrap();

        assert_eq!(ack.transaction_id, "TXN-1");
        assert_eq!(ack.item_count, 2);
        assert!(ack.headers_ack.is_some());
        assert!(ack.items_ack.is_some());

        let entries = log.entries_from(0).await;
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].request.target, DEFAULT_HEADERS_TARGET);
        assert_eq!(entries[1].request.target, DEFAULT_ITEMS_TARGET);
        assert!(entries.iter().all(|e| e.request.delivery_id == ack.delivery_id));
        match &entries[1].request.records {
            LogRecords::Items(items) => {
                assert_eq!(items.iter().map(|i| i.item_seq).collect::<Vec<_>>(), vec![1, 2]);
            }
            other => panic!("expected item records, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_ingest_one_skips_items_when_empty() {
        let log = Arc::new(MemoryAnalyticsLog::new());
        let mut raw: RawReceipt = crate::test_utils::raw_receipt("TXN-EMPTY");
        raw.items.clear();
        let r = raw.validate(&ValidationRules::default()).unwrap();

        let ack = client(log.clone()).ingest_one(&r).await.unwrap();
        assert_eq!(ack.item_count, 0);
        assert!(ack.items_ack.is_none());
        assert_eq!(log.len().await, 1);
    }

    #[tokio::test]
    async fn test_repeated_ingest_uses_fresh_delivery_ids() {
        let log = Arc::new(MemoryAnalyticsLog::new());
        let c = client(log.clone());
        let r = receipt("TXN-1");

        let first = c.ingest_one(&r).await.unwrap();
        let second = c.ingest_one(&r).await.unwrap();
        assert_ne!(first.delivery_id, second.delivery_id);
        assert_eq!(log.delivery_ids(DEFAULT_HEADERS_TARGET).await.len(), 2);
    }

    #[tokio::test]
    async fn test_ingest_one_propagates_transport_failure() {
        let log = Arc::new(MemoryAnalyticsLog::new());
        log.set_fail_on_append(true).await;

        let result = client(log).ingest_one(&receipt("TXN-1")).await;
        assert!(matches!(result, Err(LogError::Unavailable(_))));
    }

    #[tokio::test]
    async fn test_items_failure_after_header_is_reported() {
        let log = Arc::new(MemoryAnalyticsLog::new());
        log.set_fail_target(Some(DEFAULT_ITEMS_TARGET)).await;

        assert!(client(log.clone()).ingest_one(&receipt("TXN-1")).await.is_err());
        assert_eq!(log.len().await, 1);
    }

    #[tokio::test]
    async fn test_ingest_batch_counts_successes() {
        let log = Arc::new(MemoryAnalyticsLog::new());
        let receipts = vec![receipt("A"), receipt("B"), receipt("C")];

        let summary = client(log).ingest_batch(&receipts).await;
        assert_eq!(summary.ingested, 3);
        assert_eq!(summary.failed, 0);
        assert!(summary.errors.is_empty());
    }

    #[tokio::test]
    async fn test_ingest_batch_records_failures_without_aborting() {
        let log = Arc::new(MemoryAnalyticsLog::new());
        log.set_fail_on_append(true).await;
        let receipts = vec![receipt("A"), receipt("B")];

        let summary = client(log.clone()).ingest_batch(&receipts).await;
        assert_eq!(summary.ingested, 0);
        assert_eq!(summary.failed, 2);
        assert_eq!(summary.errors[1].transaction_id, "B");
        assert_eq!(log.append_calls().await, 2);
    }
}
