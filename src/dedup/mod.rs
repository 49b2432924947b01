//! Dedup/upsert stage for the analytics copy.
//!
//! The log is at-least-once, so the same receipt can arrive under several
//! delivery ids. The stage gates records through data-quality expectations,
//! then keeps one row per natural key with latest-`ingested_ts`-wins
//! semantics and no per-field merging.

use std::collections::HashSet;

use async_trait::async_trait;

pub mod gate;
pub mod pipeline;
pub mod policy;
pub mod stage;
pub mod table;

pub use gate::{header_gate, item_gate, ExpectAction, Expectation, QualityGate};
pub use pipeline::{spawn_pipeline_task, DedupPipeline, PipelineProgress, PipelineTaskHandle};
pub use policy::{DedupPolicy, HeaderPolicy, ItemPolicy};
pub use stage::{ApplyStats, DedupStage, LookupRow};
pub use table::{UpsertOutcome, UpsertStats, UpsertTable};

use crate::reconcile::ReconcileError;
use crate::storage::StorageError;

/// Read side of the deduplicated analytics copy.
#[async_trait]
pub trait AnalyticsCopy: Send + Sync {
    /// Subset of `transaction_ids` that have a deduplicated header row.
    async fn present(&self, transaction_ids: &[String]) -> Result<HashSet<String>, ReconcileError>;
}

/// Destination for denormalized lookup rows.
#[async_trait]
pub trait LookupSink: Send + Sync {
    /// Upsert rows, keeping the newer row on conflict. Returns rows affected.
    async fn upsert_lookup(&self, rows: &[LookupRow]) -> Result<u64, StorageError>;
}
