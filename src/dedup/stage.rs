//! Dedup stage: quality gate, upsert tables, and the denormalized lookup.

use std::collections::{BTreeSet, HashSet};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::RwLock;
use tracing::debug;

use super::gate::{header_gate, item_gate, QualityGate};
use super::policy::{HeaderPolicy, ItemPolicy};
use super::table::{UpsertStats, UpsertTable};
use super::AnalyticsCopy;
use crate::log::{AppendRequest, LogRecords};
use crate::model::{HeaderRecord, ItemRecord};
use crate::reconcile::ReconcileError;

/// One deduplicated receipt with item aggregates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LookupRow {
    pub transaction_id: String,
    pub store_id: String,
    pub store_name: String,
    pub customer_id: Option<String>,
    pub transaction_ts: DateTime<Utc>,
    pub total_cents: i64,
    pub tender_type: Option<String>,
    pub item_count: usize,
    pub items_extended_cents: i64,
    /// Distinct department codes, sorted.
    pub departments: Vec<String>,
    /// Items in receipt order.
    pub items: Vec<ItemRecord>,
    pub ingested_ts: DateTime<Utc>,
}

impl LookupRow {
    fn build(header: &HeaderRecord, items: Vec<ItemRecord>) -> Self {
        let departments: BTreeSet<String> = items
            .iter()
            .filter_map(|i| i.department_code.clone())
            .collect();

        Self {
            transaction_id: header.transaction_id.clone(),
            store_id: header.store_id.clone(),
            store_name: header.store_name.clone(),
            customer_id: header.customer_id.clone(),
            transaction_ts: header.transaction_ts,
            total_cents: header.total_cents,
            tender_type: header.tender_type.clone(),
            item_count: items.len(),
            items_extended_cents: items.iter().map(|i| i.extended_cents).sum(),
            departments: departments.into_iter().collect(),
            items,
            ingested_ts: header.ingested_ts,
        }
    }
}

/// Result of applying one append.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ApplyStats {
    pub accepted: usize,
    pub dropped: usize,
    pub upsert: UpsertStats,
    /// Transaction ids whose rows may have changed.
    pub touched: BTreeSet<String>,
}

struct StageState {
    header_gate: QualityGate<HeaderRecord>,
    item_gate: QualityGate<ItemRecord>,
    headers: UpsertTable<HeaderPolicy>,
    items: UpsertTable<ItemPolicy>,
}

impl StageState {
    fn items_for(&self, transaction_id: &str) -> Vec<ItemRecord> {
        let start = (transaction_id.to_string(), 0);
        let end = (transaction_id.to_string(), u32::MAX);
        self.items.range(start..=end).cloned().collect()
    }

    fn lookup_row(&self, transaction_id: &str) -> Option<LookupRow> {
        self.headers
            .get(&transaction_id.to_string())
            .map(|header| LookupRow::build(header, self.items_for(transaction_id)))
    }
}

/// Collapses at-least-once deliveries to one row per natural key.
pub struct DedupStage {
    state: RwLock<StageState>,
}

impl Default for DedupStage {
    fn default() -> Self {
        Self {
            state: RwLock::new(StageState {
                header_gate: header_gate(),
                item_gate: item_gate(),
                headers: UpsertTable::new(),
                items: UpsertTable::new(),
            }),
        }
    }
}

impl DedupStage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Gate and upsert the records of one append.
    pub async fn apply(&self, request: &AppendRequest) -> ApplyStats {
        let mut state = self.state.write().await;
        let mut stats = ApplyStats::default();

        match &request.records {
            LogRecords::Headers(records) => {
                let kept = state.header_gate.filter(records.clone());
                stats.dropped = records.len() - kept.len();
                stats.accepted = kept.len();
                stats
                    .touched
                    .extend(kept.iter().map(|r| r.transaction_id.clone()));
                stats.upsert = state.headers.apply(kept);
            }
            LogRecords::Items(records) => {
                let kept = state.item_gate.filter(records.clone());
                stats.dropped = records.len() - kept.len();
                stats.accepted = kept.len();
                stats
                    .touched
                    .extend(kept.iter().map(|r| r.transaction_id.clone()));
                stats.upsert = state.items.apply(kept);
            }
        }

        debug!(
            target_table = %request.target,
            delivery_id = %request.delivery_id,
            accepted = stats.accepted,
            dropped = stats.dropped,
            stale = stats.upsert.stale,
            "Dedup stage applied append"
        );
        stats
    }

    /// Current deduplicated header for a transaction.
    pub async fn header(&self, transaction_id: &str) -> Option<HeaderRecord> {
        self.state
            .read()
            .await
            .headers
            .get(&transaction_id.to_string())
            .cloned()
    }

    pub async fn header_count(&self) -> usize {
        self.state.read().await.headers.len()
    }

    pub async fn item_count(&self) -> usize {
        self.state.read().await.items.len()
    }

    /// Records dropped by the header and item gates combined.
    pub async fn dropped_total(&self) -> u64 {
        let state = self.state.read().await;
        state.header_gate.total_dropped() + state.item_gate.total_dropped()
    }

    /// Lookup rows for every transaction with a header, ordered by id.
    pub async fn lookup_rows(&self) -> Vec<LookupRow> {
        let state = self.state.read().await;
        state
            .headers
            .rows()
            .map(|header| {
                LookupRow::build(header, state.items_for(&header.transaction_id))
            })
            .collect()
    }

    /// Lookup rows for the given ids. Ids without a header are skipped.
    pub async fn lookup_rows_for<'a>(
        &self,
        transaction_ids: impl IntoIterator<Item = &'a String>,
    ) -> Vec<LookupRow> {
        let state = self.state.read().await;
        transaction_ids
            .into_iter()
            .filter_map(|id| state.lookup_row(id))
            .collect()
    }
}

#[async_trait]
impl AnalyticsCopy for DedupStage {
    async fn present(&self, transaction_ids: &[String]) -> Result<HashSet<String>, ReconcileError> {
        let state = self.state.read().await;
        Ok(transaction_ids
            .iter()
            .filter(|id| state.headers.contains(id))
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;
    use uuid::Uuid;

    use super::*;
    use crate::model::IngestionEnvelope;
    use crate::test_utils::{fixed_ts, receipt};

    fn requests(envelope: IngestionEnvelope) -> Vec<AppendRequest> {
        vec![
            AppendRequest {
                target: "pos_raw_receipts".into(),
                delivery_id: envelope.delivery_id,
                records: LogRecords::Headers(vec![envelope.header]),
            },
            AppendRequest {
                target: "pos_raw_items".into(),
                delivery_id: envelope.delivery_id,
                records: LogRecords::Items(envelope.items),
            },
        ]
    }

    #[tokio::test]
    async fn test_duplicate_deliveries_collapse() {
        let stage = DedupStage::new();
        let r = receipt("TXN-1");

        for minutes in [0, 5] {
            let envelope =
                IngestionEnvelope::seal_with(&r, Uuid::new_v4(), fixed_ts() + Duration::minutes(minutes));
            for req in requests(envelope) {
                stage.apply(&req).await;
            }
        }

        assert_eq!(stage.header_count().await, 1);
        assert_eq!(stage.item_count().await, 2);
        assert_eq!(
            stage.header("TXN-1").await.unwrap().ingested_ts,
            fixed_ts() + Duration::minutes(5)
        );
    }

    #[tokio::test]
    async fn test_late_older_delivery_is_stale() {
        let stage = DedupStage::new();
        let r = receipt("TXN-1");
        let newer = IngestionEnvelope::seal_with(&r, Uuid::new_v4(), fixed_ts() + Duration::minutes(5));
        let older = IngestionEnvelope::seal_with(&r, Uuid::new_v4(), fixed_ts());
        let newer_id = newer.delivery_id;

        for req in requests(newer) {
            stage.apply(&req).await;
        }
        let stats = stage.apply(&requests(older)[0]).await;

        assert_eq!(stats.upsert.stale, 1);
        assert_eq!(stage.header("TXN-1").await.unwrap().event_id, newer_id);
    }

    #[tokio::test]
    async fn test_lookup_row_aggregates_items() {
        let stage = DedupStage::new();
        let envelope = IngestionEnvelope::seal_with(&receipt("TXN-1"), Uuid::new_v4(), fixed_ts());
        for req in requests(envelope) {
            stage.apply(&req).await;
        }

        let rows = stage.lookup_rows().await;
        assert_eq!(rows.len(), 1);
        let row = &rows[0];
        assert_eq!(row.item_count, 2);
        assert_eq!(row.items_extended_cents, 998 + 759);
        assert_eq!(row.departments, vec!["GROCERY".to_string()]);
        assert_eq!(
            row.items.iter().map(|i| i.item_seq).collect::<Vec<_>>(),
            vec![1, 2]
        );
    }

    #[tokio::test]
    async fn test_gate_drops_are_reported() {
        let stage = DedupStage::new();
        let bad = HeaderRecord {
            event_id: Uuid::new_v4(),
            transaction_id: "".into(),
            store_id: "S1".into(),
            ..Default::default()
        };
        let stats = stage
            .apply(&AppendRequest {
                target: "pos_raw_receipts".into(),
                delivery_id: Uuid::new_v4(),
                records: LogRecords::Headers(vec![bad]),
            })
            .await;

        assert_eq!(stats.dropped, 1);
        assert_eq!(stats.accepted, 0);
        assert!(stats.touched.is_empty());
        assert_eq!(stage.dropped_total().await, 1);
        assert_eq!(stage.header_count().await, 0);
    }

    #[tokio::test]
    async fn test_present_reports_known_ids() {
        let stage = DedupStage::new();
        let envelope = IngestionEnvelope::seal_with(&receipt("TXN-1"), Uuid::new_v4(), fixed_ts());
        stage.apply(&requests(envelope)[0]).await;

        let present = stage
            .present(&["TXN-1".to_string(), "TXN-2".to_string()])
            .await
            .unwrap();
        assert_eq!(present, HashSet::from(["TXN-1".to_string()]));
    }
}
