//! Keyed upsert table.

use std::collections::BTreeMap;
use std::ops::RangeBounds;

use serde::Serialize;

use super::policy::DedupPolicy;

/// What happened to a single record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Inserted,
    Replaced,
    /// Older than the stored row; ignored.
    Stale,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct UpsertStats {
    pub inserted: u64,
    pub replaced: u64,
    pub stale: u64,
}

impl UpsertStats {
    fn record(&mut self, outcome: UpsertOutcome) {
        match outcome {
            UpsertOutcome::Inserted => self.inserted += 1,
            UpsertOutcome::Replaced => self.replaced += 1,
            UpsertOutcome::Stale => self.stale += 1,
        }
    }

    pub fn merge(&mut self, other: UpsertStats) {
        self.inserted += other.inserted;
        self.replaced += other.replaced;
        self.stale += other.stale;
    }
}

/// One row per natural key, ordered by key.
pub struct UpsertTable<P: DedupPolicy> {
    rows: BTreeMap<P::Key, P::Record>,
}

impl<P: DedupPolicy> Default for UpsertTable<P> {
    fn default() -> Self {
        Self {
            rows: BTreeMap::new(),
        }
    }
}

impl<P: DedupPolicy> UpsertTable<P> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply one record. Newer-or-equal sequence replaces; older is stale.
    pub fn upsert(&mut self, record: P::Record) -> UpsertOutcome {
        let key = P::key(&record);
        match self.rows.get_mut(&key) {
            None => {
                self.rows.insert(key, record);
                UpsertOutcome::Inserted
            }
            Some(existing) if P::sequence(&record) >= P::sequence(existing) => {
                *existing = P::merge(existing, record);
                UpsertOutcome::Replaced
            }
            Some(_) => UpsertOutcome::Stale,
        }
    }

    pub fn apply(&mut self, records: impl IntoIterator<Item = P::Record>) -> UpsertStats {
        let mut stats = UpsertStats::default();
        for record in records {
            stats.record(self.upsert(record));
        }
        stats
    }

    pub fn get(&self, key: &P::Key) -> Option<&P::Record> {
        self.rows.get(key)
    }

    pub fn contains(&self, key: &P::Key) -> bool {
        self.rows.contains_key(key)
    }

    pub fn range<R: RangeBounds<P::Key>>(&self, range: R) -> impl Iterator<Item = &P::Record> {
        self.rows.range(range).map(|(_, record)| record)
    }

    pub fn rows(&self) -> impl Iterator<Item = &P::Record> {
        self.rows.values()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;
    use uuid::Uuid;

    use super::*;
    use crate::dedup::policy::{HeaderPolicy, ItemPolicy};
    use crate::model::{HeaderRecord, ItemRecord};
    use crate::test_utils::fixed_ts;

    fn header(id: &str, total: i64, minutes: i64) -> HeaderRecord {
        HeaderRecord {
            event_id: Uuid::new_v4(),
            transaction_id: id.to_string(),
            store_id: "STORE-042".to_string(),
            total_cents: total,
            ingested_ts: fixed_ts() + Duration::minutes(minutes),
            ..Default::default()
        }
    }

    #[test]
    fn test_latest_wins() {
        let mut table = UpsertTable::<HeaderPolicy>::new();
        assert_eq!(table.upsert(header("T1", 100, 0)), UpsertOutcome::Inserted);
        assert_eq!(table.upsert(header("T1", 200, 5)), UpsertOutcome::Replaced);

        assert_eq!(table.len(), 1);
        assert_eq!(table.get(&"T1".to_string()).unwrap().total_cents, 200);
    }

    #[test]
    fn test_stale_record_ignored() {
        let mut table = UpsertTable::<HeaderPolicy>::new();
        table.upsert(header("T1", 200, 5));
        assert_eq!(table.upsert(header("T1", 100, 0)), UpsertOutcome::Stale);
        assert_eq!(table.get(&"T1".to_string()).unwrap().total_cents, 200);
    }

    #[test]
    fn test_equal_sequence_replaces() {
        let mut table = UpsertTable::<HeaderPolicy>::new();
        table.upsert(header("T1", 100, 0));
        assert_eq!(table.upsert(header("T1", 150, 0)), UpsertOutcome::Replaced);
        assert_eq!(table.get(&"T1".to_string()).unwrap().total_cents, 150);
    }

    #[test]
    fn test_apply_stats() {
        let mut table = UpsertTable::<HeaderPolicy>::new();
        let stats = table.apply(vec![
            header("T1", 100, 1),
            header("T2", 100, 1),
            header("T1", 100, 2),
            header("T1", 100, 0),
        ]);
        assert_eq!(
            stats,
            UpsertStats {
                inserted: 2,
                replaced: 1,
                stale: 1
            }
        );
    }

    #[test]
    fn test_items_keyed_by_sequence() {
        let mut table = UpsertTable::<ItemPolicy>::new();
        let item = |seq: u32| ItemRecord {
            transaction_id: "T1".to_string(),
            item_seq: seq,
            ingested_ts: fixed_ts(),
            ..Default::default()
        };
        table.apply(vec![item(2), item(1), item(1)]);
        assert_eq!(table.len(), 2);

        let seqs: Vec<u32> = table
            .range(("T1".to_string(), 0)..=("T1".to_string(), u32::MAX))
            .map(|i| i.item_seq)
            .collect();
        assert_eq!(seqs, vec![1, 2]);
    }
}
