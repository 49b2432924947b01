//! Dual-write orchestrator.
//!
//! For one receipt the operational insert completes strictly before the
//! analytics delivery starts:
//!
//! ```text
//! Pending -> OperationalWrite -> OperationalFailed            (error)
//!                             -> OperationalOk -> AnalyticsWrite -> Success
//!                                                                -> Partial
//! ```
//!
//! An operational failure is returned as [`IngestError`] and the analytics
//! path is not attempted. An analytics failure is logged and reported as
//! `partial`; it is never returned as an error. Neither path is retried here.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use tracing::{debug, error, info, warn};

use crate::ingest::IngestionClient;
use crate::model::{
    AnalyticsResult, DualWriteOutcome, RawReceipt, Receipt, ValidationError, ValidationRules,
};
use crate::storage::{OperationalStore, StorageError};

/// Default upper bound on the operational insert.
pub const DEFAULT_WRITE_TIMEOUT: Duration = Duration::from_secs(5);

/// Fatal ingestion errors. Analytics failures are not representable here.
#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationError),

    #[error("Operational write failed for {transaction_id}: {source}")]
    Operational {
        transaction_id: String,
        source: StorageError,
    },

    #[error("Ingestion task aborted: {0}")]
    Aborted(String),
}

/// Dual-write state machine positions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteState {
    Pending,
    OperationalWrite,
    OperationalFailed,
    OperationalOk,
    AnalyticsWrite,
    Success,
    Partial,
}

impl fmt::Display for WriteState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            WriteState::Pending => "pending",
            WriteState::OperationalWrite => "operational_write",
            WriteState::OperationalFailed => "operational_failed",
            WriteState::OperationalOk => "operational_ok",
            WriteState::AnalyticsWrite => "analytics_write",
            WriteState::Success => "success",
            WriteState::Partial => "partial",
        };
        f.write_str(name)
    }
}

fn transition(transaction_id: &str, state: WriteState) {
    debug!(transaction_id = %transaction_id, state = %state, "Dual-write transition");
}

/// Coordinates the operational and analytics writes.
#[derive(Clone)]
pub struct DualWriter {
    store: Arc<dyn OperationalStore>,
    ingestion: IngestionClient,
    rules: ValidationRules,
    write_timeout: Duration,
}

impl DualWriter {
    pub fn new(store: Arc<dyn OperationalStore>, ingestion: IngestionClient) -> Self {
        Self {
            store,
            ingestion,
            rules: ValidationRules::default(),
            write_timeout: DEFAULT_WRITE_TIMEOUT,
        }
    }

    pub fn with_rules(mut self, rules: ValidationRules) -> Self {
        self.rules = rules;
        self
    }

    pub fn with_write_timeout(mut self, timeout: Duration) -> Self {
        self.write_timeout = timeout;
        self
    }

    pub fn ingestion(&self) -> &IngestionClient {
        &self.ingestion
    }

    fn operational_failure(&self, transaction_id: &str, source: StorageError) -> IngestError {
        transition(transaction_id, WriteState::OperationalFailed);
        error!(
            transaction_id = %transaction_id,
            error = %source,
            "Operational write failed; analytics write skipped"
        );
        IngestError::Operational {
            transaction_id: transaction_id.to_string(),
            source,
        }
    }

    /// Write a validated receipt to both paths.
    pub async fn write_receipt(&self, receipt: &Receipt) -> Result<DualWriteOutcome, IngestError> {
        let transaction_id = receipt.transaction_id();
        transition(transaction_id, WriteState::Pending);

        transition(transaction_id, WriteState::OperationalWrite);
        let insert = self.store.insert_if_absent(receipt);
        let operational = match tokio::time::timeout(self.write_timeout, insert).await {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(e)) => return Err(self.operational_failure(transaction_id, e)),
            Err(_) => {
                return Err(self.operational_failure(
                    transaction_id,
                    StorageError::Timeout(self.write_timeout),
                ))
            }
        };
        transition(transaction_id, WriteState::OperationalOk);

        transition(transaction_id, WriteState::AnalyticsWrite);
        let analytics = match self.ingestion.ingest_one(receipt).await {
            Ok(ack) => AnalyticsResult::Delivered(ack),
            Err(e) => {
                warn!(
                    transaction_id = %transaction_id,
                    error = %e,
                    "Analytics write failed; receipt is in the operational store only"
                );
                AnalyticsResult::Failed {
                    error: e.to_string(),
                }
            }
        };

        let outcome = DualWriteOutcome::new(transaction_id, operational, analytics);
        if outcome.is_success() {
            transition(transaction_id, WriteState::Success);
            info!(
                transaction_id = %transaction_id,
                operational = ?outcome.operational,
                "Dual write complete"
            );
        } else {
            transition(transaction_id, WriteState::Partial);
        }
        Ok(outcome)
    }

    /// Validate, then dual-write. Nothing is written when validation fails.
    pub async fn ingest_receipt(&self, raw: RawReceipt) -> Result<DualWriteOutcome, IngestError> {
        let receipt = raw.validate(&self.rules).map_err(|e| {
            warn!(error = %e, "Receipt rejected by validation");
            IngestError::Validation(e)
        })?;
        self.write_receipt(&receipt).await
    }

    /// Ingest each receipt in its own task; results keep input order.
    ///
    /// Spawned tasks run to completion even if this future is dropped, so
    /// each item ends as either an outcome or an error.
    pub async fn ingest_batch(
        &self,
        raws: Vec<RawReceipt>,
    ) -> Vec<Result<DualWriteOutcome, IngestError>> {
        let handles: Vec<_> = raws
            .into_iter()
            .map(|raw| {
                let writer = self.clone();
                tokio::spawn(async move { writer.ingest_receipt(raw).await })
            })
            .collect();

        let results: Vec<_> = join_all(handles)
            .await
            .into_iter()
            .map(|joined| match joined {
                Ok(result) => result,
                Err(e) => {
                    error!(error = %e, "Batch ingestion task aborted");
                    Err(IngestError::Aborted(e.to_string()))
                }
            })
            .collect();

        let ok = results.iter().filter(|r| r.is_ok()).count();
        info!(
            total = results.len(),
            ok,
            failed = results.len() - ok,
            "Batch ingestion complete"
        );
        results
    }
}
