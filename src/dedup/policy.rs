//! Dedup policies: natural key, tie-break sequence, merge.

use std::hash::Hash;

use chrono::{DateTime, Utc};

use crate::model::{HeaderRecord, ItemRecord};

/// How a record stream collapses to one row per natural key.
pub trait DedupPolicy: Send + Sync + 'static {
    type Record: Clone + Send + Sync;
    type Key: Ord + Hash + Clone + Send + Sync;

    /// Natural key.
    fn key(record: &Self::Record) -> Self::Key;

    /// Ordering used to pick the winner; larger wins, ties go to the newcomer.
    fn sequence(record: &Self::Record) -> DateTime<Utc>;

    /// Combine the stored row with a newer record. Defaults to full replacement.
    fn merge(_existing: &Self::Record, incoming: Self::Record) -> Self::Record {
        incoming
    }
}

/// Receipt headers: one row per transaction_id, latest ingestion wins.
pub struct HeaderPolicy;

impl DedupPolicy for HeaderPolicy {
    type Record = HeaderRecord;
    type Key = String;

    fn key(record: &HeaderRecord) -> String {
        record.transaction_id.clone()
    }

    fn sequence(record: &HeaderRecord) -> DateTime<Utc> {
        record.ingested_ts
    }
}

/// Line items: one row per (transaction_id, item_seq), latest ingestion wins.
pub struct ItemPolicy;

impl DedupPolicy for ItemPolicy {
    type Record = ItemRecord;
    type Key = (String, u32);

    fn key(record: &ItemRecord) -> (String, u32) {
        (record.transaction_id.clone(), record.item_seq)
    }

    fn sequence(record: &ItemRecord) -> DateTime<Utc> {
        record.ingested_ts
    }
}
