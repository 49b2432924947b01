//! In-process left anti-join of the operational store against the analytics copy.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::{GapSource, MissingReceipt, ReconcileError};
use crate::dedup::AnalyticsCopy;
use crate::storage::OperationalStore;

pub struct AntiJoin {
    store: Arc<dyn OperationalStore>,
    copy: Arc<dyn AnalyticsCopy>,
}

impl AntiJoin {
    pub fn new(store: Arc<dyn OperationalStore>, copy: Arc<dyn AnalyticsCopy>) -> Self {
        Self { store, copy }
    }
}

#[async_trait]
impl GapSource for AntiJoin {
    async fn missing_since(&self, cutoff: DateTime<Utc>) -> Result<Vec<MissingReceipt>, ReconcileError> {
        let receipts = self.store.list_since(cutoff).await?;
        let ids: Vec<String> = receipts
            .iter()
            .map(|r| r.transaction_id().to_string())
            .collect();
        let present = self.copy.present(&ids).await?;

        Ok(receipts
            .iter()
            .filter(|r| !present.contains(r.transaction_id()))
            .map(|r| MissingReceipt {
                transaction_id: r.transaction_id().to_string(),
                transaction_ts: r.transaction_ts(),
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;
    use uuid::Uuid;

    use super::*;
    use crate::dedup::DedupStage;
    use crate::log::{AppendRequest, LogRecords};
    use crate::model::IngestionEnvelope;
    use crate::storage::MockOperationalStore;
    use crate::test_utils::{fixed_ts, receipt_at};

    #[tokio::test]
    async fn test_reports_only_missing_in_window() {
        let store = Arc::new(MockOperationalStore::new());
        let stage = Arc::new(DedupStage::new());
        let now = fixed_ts();

        let synced = receipt_at("SYNCED", now - Duration::hours(1));
        let missing = receipt_at("MISSING", now - Duration::hours(2));
        let old = receipt_at("OLD", now - Duration::hours(30));
        for r in [&synced, &missing, &old] {
            store.insert_if_absent(r).await.unwrap();
        }

        let envelope = IngestionEnvelope::seal_with(&synced, Uuid::new_v4(), now);
        stage
            .apply(&AppendRequest {
                target: "pos_raw_receipts".into(),
                delivery_id: envelope.delivery_id,
                records: LogRecords::Headers(vec![envelope.header]),
            })
            .await;

        let gaps = AntiJoin::new(store, stage)
            .missing_since(now - Duration::hours(24))
            .await
            .unwrap();

        assert_eq!(
            gaps,
            vec![MissingReceipt {
                transaction_id: "MISSING".into(),
                transaction_ts: now - Duration::hours(2),
            }]
        );
    }

    #[tokio::test]
    async fn test_store_failure_propagates() {
        let store = Arc::new(MockOperationalStore::new());
        store.set_fail_on_read(true).await;
        let result = AntiJoin::new(store, Arc::new(DedupStage::new()))
            .missing_since(fixed_ts())
            .await;
        assert!(matches!(result, Err(ReconcileError::Storage(_))));
    }
}
