//! Dedup pipeline: tails the in-process log into the dedup stage.
//!
//! Each run reads entries past the committed offset, applies them to the
//! stage, and pushes the changed lookup rows to the sink. The offset only
//! advances once the sink accepted the rows, so a failed sync is retried on
//! the next run.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, error, info};

use super::stage::DedupStage;
use super::LookupSink;
use crate::log::MemoryAnalyticsLog;
use crate::reconcile::{ReconcileError, SyncMonitor, SyncState, TableStatus};
use crate::storage::StorageError;

/// Progress of one pipeline run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PipelineProgress {
    pub entries: usize,
    pub records_accepted: usize,
    pub records_dropped: usize,
    pub rows_synced: usize,
    pub offset: u64,
}

pub struct DedupPipeline {
    log: Arc<MemoryAnalyticsLog>,
    stage: Arc<DedupStage>,
    sink: Option<Arc<dyn LookupSink>>,
    offset: Mutex<u64>,
    last_error: RwLock<Option<String>>,
}

impl DedupPipeline {
    pub fn new(log: Arc<MemoryAnalyticsLog>, stage: Arc<DedupStage>) -> Self {
        Self {
            log,
            stage,
            sink: None,
            offset: Mutex::new(0),
            last_error: RwLock::new(None),
        }
    }

    /// Sync changed lookup rows to a sink after each run.
    pub fn with_sink(mut self, sink: Arc<dyn LookupSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn stage(&self) -> &Arc<DedupStage> {
        &self.stage
    }

    pub async fn offset(&self) -> u64 {
        *self.offset.lock().await
    }

    /// Process everything appended since the last committed offset.
    ///
    /// Runs are serialized. Re-applying entries after a failed sync is
    /// harmless since upserts are idempotent.
    pub async fn run_once(&self) -> Result<PipelineProgress, StorageError> {
        let mut offset = self.offset.lock().await;
        let entries = self.log.entries_from(*offset).await;

        let mut progress = PipelineProgress {
            entries: entries.len(),
            offset: *offset,
            ..Default::default()
        };
        if entries.is_empty() {
            return Ok(progress);
        }

        let mut touched = std::collections::BTreeSet::new();
        let mut next_offset = *offset;
        for entry in &entries {
            let stats = self.stage.apply(&entry.request).await;
            progress.records_accepted += stats.accepted;
            progress.records_dropped += stats.dropped;
            touched.extend(stats.touched);
            next_offset = entry.offset + 1;
        }

        if let Some(sink) = &self.sink {
            let rows = self.stage.lookup_rows_for(&touched).await;
            match sink.upsert_lookup(&rows).await {
                Ok(_) => progress.rows_synced = rows.len(),
                Err(e) => {
                    error!(error = %e, rows = rows.len(), "Lookup sync failed");
                    *self.last_error.write().await = Some(e.to_string());
                    return Err(e);
                }
            }
        }

        *offset = next_offset;
        progress.offset = next_offset;
        self.log.trim_before(next_offset).await;
        *self.last_error.write().await = None;

        debug!(
            entries = progress.entries,
            accepted = progress.records_accepted,
            dropped = progress.records_dropped,
            synced = progress.rows_synced,
            offset = next_offset,
            "Dedup pipeline run complete"
        );
        Ok(progress)
    }
}

#[async_trait]
impl SyncMonitor for DedupPipeline {
    async fn table_states(&self) -> Result<Vec<TableStatus>, ReconcileError> {
        if let Some(error) = self.last_error.read().await.clone() {
            return Ok(vec![
                TableStatus::new("receipt_lookup", SyncState::Failed).with_message(error)
            ]);
        }

        let offset = self.offset().await;
        let end = self.log.next_offset().await;
        let status = if offset >= end {
            TableStatus::new("receipt_lookup", SyncState::Active)
        } else {
            TableStatus::new("receipt_lookup", SyncState::Provisioning)
                .with_message(format!("{} log entries behind", end - offset))
        };
        Ok(vec![status])
    }
}

/// Handle to a running pipeline task.
pub struct PipelineTaskHandle {
    cancel: tokio::sync::watch::Sender<bool>,
}

impl PipelineTaskHandle {
    /// Signal the pipeline task to stop.
    pub fn stop(&self) {
        let _ = self.cancel.send(true);
    }
}

impl Drop for PipelineTaskHandle {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Spawn a background task that runs the pipeline every `interval`.
pub fn spawn_pipeline_task(pipeline: Arc<DedupPipeline>, interval: Duration) -> PipelineTaskHandle {
    let (cancel_tx, mut cancel_rx) = tokio::sync::watch::channel(false);

    tokio::spawn(async move {
        info!(interval_ms = interval.as_millis() as u64, "Dedup pipeline task started");

        loop {
            tokio::select! {
                _ = tokio::time::sleep(interval) => {
                    if let Err(e) = pipeline.run_once().await {
                        error!(error = %e, "Dedup pipeline run failed");
                    }
                }
                changed = cancel_rx.changed() => {
                    if changed.is_err() || *cancel_rx.borrow() {
                        info!("Dedup pipeline task stopped");
                        break;
                    }
                }
            }
        }
    });

    PipelineTaskHandle { cancel: cancel_tx }
}
