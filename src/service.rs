//! Service context: wires the store, log, dedup pipeline and reconciliation
//! pieces from configuration and owns the connection pool.

use std::sync::Arc;

use backon::Retryable;
use tracing::{error, info, warn};

use crate::config::{Config, ConfigError, LogType, StorageType};
use crate::dedup::{spawn_pipeline_task, DedupPipeline, DedupStage, LookupSink, PipelineTaskHandle};
use crate::ingest::{IngestTargets, IngestionClient};
use crate::log::{AnalyticsLog, HttpAnalyticsLog, HttpLogConfig, LogError, MemoryAnalyticsLog};
use crate::model::{DualWriteOutcome, RawReceipt};
use crate::orchestrator::{DualWriter, IngestError};
use crate::reconcile::{
    AntiJoin, GapReplayer, GapReport, GapSource, ReconcileError, ReconciliationScanner,
    ReplaySummary, SyncMonitor,
};
use crate::storage::{MockOperationalStore, OperationalStore, StorageError};
use crate::utils::retry::connection_backoff;

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Operational store setup failed: {0}")]
    Storage(#[from] StorageError),

    #[error("Analytics log setup failed: {0}")]
    Log(#[from] LogError),

    #[error("Failed to prepare database location: {0}")]
    Io(#[from] std::io::Error),
}

/// Pool owned by the context, closed on shutdown.
enum PoolHandle {
    #[cfg(feature = "sqlite")]
    Sqlite(Arc<crate::pool::LazyPool<crate::pool::SqlitePoolFactory>>),
    #[cfg(feature = "postgres")]
    Postgres(Arc<crate::pool::LazyPool<crate::pool::PostgresPoolFactory>>),
    None,
}

impl PoolHandle {
    async fn close(&self) {
        match self {
            #[cfg(feature = "sqlite")]
            PoolHandle::Sqlite(pool) => pool.close().await,
            #[cfg(feature = "postgres")]
            PoolHandle::Postgres(pool) => pool.close().await,
            PoolHandle::None => {}
        }
    }
}

/// A SQL store seen through each of the roles it plays.
struct Backend {
    store: Arc<dyn OperationalStore>,
    sink: Arc<dyn LookupSink>,
    gaps: Arc<dyn GapSource>,
    monitor: Arc<dyn SyncMonitor>,
    pool: PoolHandle,
}

impl Backend {
    #[allow(dead_code)]
    fn from_store<S>(store: Arc<S>, pool: PoolHandle) -> Self
    where
        S: OperationalStore + LookupSink + GapSource + SyncMonitor + 'static,
    {
        Self {
            store: store.clone(),
            sink: store.clone(),
            gaps: store.clone(),
            monitor: store,
            pool,
        }
    }
}

/// Everything a caller needs to ingest and reconcile receipts.
pub struct ServiceContext {
    config: Config,
    store: Arc<dyn OperationalStore>,
    writer: DualWriter,
    scanner: ReconciliationScanner,
    replayer: GapReplayer,
    pipeline: Option<Arc<DedupPipeline>>,
    pipeline_task: Option<PipelineTaskHandle>,
    pool: PoolHandle,
}

impl ServiceContext {
    /// Build the context described by `config`.
    ///
    /// With the memory log a local dedup pipeline is started and syncs the
    /// lookup table in the operational database. With the HTTP log the
    /// lookup table is expected to be filled by the remote pipeline.
    pub async fn from_config(config: Config) -> Result<Self, ServiceError> {
        config.validate()?;
        let backend = open_backend(&config).await?;

        let log: Arc<dyn AnalyticsLog>;
        let monitor: Arc<dyn SyncMonitor>;
        let mut pipeline = None;
        match config.analytics.log_type {
            LogType::Memory => {
                let memory = Arc::new(MemoryAnalyticsLog::new());
                let local = Arc::new(
                    DedupPipeline::new(memory.clone(), Arc::new(DedupStage::new()))
                        .with_sink(backend.sink.clone()),
                );
                log = memory;
                monitor = local.clone();
                pipeline = Some(local);
            }
            LogType::Http => {
                log = Arc::new(HttpAnalyticsLog::new(HttpLogConfig::from(
                    &config.analytics.http,
                ))?);
                monitor = backend.monitor.clone();
            }
        }

        let pipeline_task = pipeline
            .as_ref()
            .map(|p| spawn_pipeline_task(p.clone(), config.analytics.pipeline_interval()));

        let ingestion = IngestionClient::new(log, config.analytics.targets());
        let mut context = Self::assemble(
            config,
            backend.store,
            ingestion,
            backend.gaps,
            monitor,
            backend.pool,
        );
        context.pipeline = pipeline;
        context.pipeline_task = pipeline_task;

        info!(
            storage = ?context.config.operational.storage_type,
            log = ?context.config.analytics.log_type,
            "Service context ready"
        );
        Ok(context)
    }

    /// In-memory context over a mock store and memory log.
    ///
    /// The dedup pipeline is not scheduled; drive it with
    /// [`DedupPipeline::run_once`] through [`ServiceContext::pipeline`].
    pub fn in_memory(
        config: Config,
        store: Arc<MockOperationalStore>,
        log: Arc<MemoryAnalyticsLog>,
    ) -> Self {
        let stage = Arc::new(DedupStage::new());
        let pipeline = Arc::new(DedupPipeline::new(log.clone(), stage.clone()));
        let gaps = Arc::new(AntiJoin::new(store.clone(), stage));
        let ingestion = IngestionClient::new(log, config.analytics.targets());

        let mut context =
            Self::assemble(config, store, ingestion, gaps, pipeline.clone(), PoolHandle::None);
        context.pipeline = Some(pipeline);
        context
    }

    fn assemble(
        config: Config,
        store: Arc<dyn OperationalStore>,
        ingestion: IngestionClient,
        gaps: Arc<dyn GapSource>,
        monitor: Arc<dyn SyncMonitor>,
        pool: PoolHandle,
    ) -> Self {
        let writer = DualWriter::new(store.clone(), ingestion.clone())
            .with_write_timeout(config.operational.write_timeout());
        let scanner = ReconciliationScanner::new(gaps.clone()).with_monitor(monitor);
        let replayer = GapReplayer::new(gaps, store.clone(), ingestion)
            .with_max_attempts(config.reconciliation.replay_max_attempts);

        Self {
            config,
            store,
            writer,
            scanner,
            replayer,
            pipeline: None,
            pipeline_task: None,
            pool,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn store(&self) -> &Arc<dyn OperationalStore> {
        &self.store
    }

    pub fn targets(&self) -> &IngestTargets {
        self.writer.ingestion().targets()
    }

    /// Local dedup pipeline, present with the memory log.
    pub fn pipeline(&self) -> Option<&Arc<DedupPipeline>> {
        self.pipeline.as_ref()
    }

    pub async fn ingest_receipt(&self, raw: RawReceipt) -> Result<DualWriteOutcome, IngestError> {
        self.writer.ingest_receipt(raw).await
    }

    pub async fn ingest_batch(
        &self,
        raws: Vec<RawReceipt>,
    ) -> Vec<Result<DualWriteOutcome, IngestError>> {
        self.writer.ingest_batch(raws).await
    }

    pub async fn scan_gaps(&self, lookback_hours: u32) -> GapReport {
        self.scanner.scan(lookback_hours).await
    }

    /// Wait for synced tables using the configured timeout and poll interval.
    pub async fn wait_for_sync(&self) -> bool {
        let rc = &self.config.reconciliation;
        self.scanner
            .wait_until_active(rc.wait_timeout(), rc.poll_interval())
            .await
    }

    pub fn replayer(&self) -> &GapReplayer {
        &self.replayer
    }

    pub async fn replay_gaps(&self, lookback_hours: u32) -> Result<ReplaySummary, ReconcileError> {
        self.replayer.replay(lookback_hours).await
    }

    /// Stop the pipeline task after a final catch-up run, then close the pool.
    pub async fn shutdown(self) {
        if let Some(task) = &self.pipeline_task {
            task.stop();
        }
        if let Some(pipeline) = &self.pipeline {
            if let Err(e) = pipeline.run_once().await {
                warn!(error = %e, "Final dedup pipeline run failed");
            }
        }
        self.pool.close().await;
        info!("Service context shut down");
    }
}

async fn open_backend(config: &Config) -> Result<Backend, ServiceError> {
    let settings = crate::pool::PoolSettings::from(&config.operational.pool);

    match config.operational.storage_type {
        #[cfg(feature = "sqlite")]
        StorageType::Sqlite => {
            use crate::pool::{LazyPool, SqlitePoolFactory};
            use crate::storage::SqliteReceiptStore;

            let path = &config.operational.sqlite.path;
            if let Some(parent) = std::path::Path::new(path).parent() {
                if !parent.as_os_str().is_empty() {
                    std::fs::create_dir_all(parent)?;
                }
            }
            info!(path = %path, "Operational store: sqlite");

            let pool = Arc::new(LazyPool::new(SqlitePoolFactory::for_path(path, settings)));
            let store = Arc::new(SqliteReceiptStore::new(pool.clone()));
            init_with_retry(|| store.init()).await?;
            Ok(Backend::from_store(store, PoolHandle::Sqlite(pool)))
        }
        #[cfg(feature = "postgres")]
        StorageType::Postgres => {
            use crate::pool::{LazyPool, PostgresPoolFactory};
            use crate::storage::PostgresReceiptStore;

            info!("Operational store: postgres");
            let factory = PostgresPoolFactory::new(config.operational.postgres.uri.clone(), settings);
            let pool = Arc::new(LazyPool::new(factory));
            let store = Arc::new(PostgresReceiptStore::new(pool.clone()));
            init_with_retry(|| store.init()).await?;
            Ok(Backend::from_store(store, PoolHandle::Postgres(pool)))
        }
        #[allow(unreachable_patterns)]
        other => {
            error!(storage = ?other, "Storage type requested but its feature is not enabled");
            Err(ConfigError::Invalid(format!("storage type {:?} not enabled in this build", other)).into())
        }
    }
}

/// Retry schema setup while the database is still coming up.
#[allow(dead_code)]
async fn init_with_retry<F, Fut>(init: F) -> Result<(), StorageError>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<(), StorageError>>,
{
    init.retry(connection_backoff())
        .when(|e| matches!(e, StorageError::Database(_) | StorageError::Pool(_)))
        .notify(|e, delay| {
            warn!(error = %e, delay_ms = delay.as_millis() as u64, "Operational store not ready, retrying");
        })
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::OverallStatus;
    use crate::reconcile::ScanStatus;
    use crate::test_utils::raw_receipt;

    fn context() -> (ServiceContext, Arc<MockOperationalStore>, Arc<MemoryAnalyticsLog>) {
        let store = Arc::new(MockOperationalStore::new());
        let log = Arc::new(MemoryAnalyticsLog::new());
        let ctx = ServiceContext::in_memory(Config::for_test(), store.clone(), log.clone());
        (ctx, store, log)
    }

    #[tokio::test]
    async fn test_ingest_then_scan_clean_after_pipeline() {
        let (ctx, _, _) = context();

        let outcome = ctx.ingest_receipt(raw_receipt("TXN-1")).await.unwrap();
        assert_eq!(outcome.overall_status, OverallStatus::Success);

        let before = ctx.scan_gaps(24).await;
        assert_eq!(before.status, ScanStatus::GapDetected);

        ctx.pipeline().unwrap().run_once().await.unwrap();
        let after = ctx.scan_gaps(24).await;
        assert_eq!(after.status, ScanStatus::Clean);
        assert!(ctx.wait_for_sync().await);
    }

    #[tokio::test]
    async fn test_partial_write_is_replayed() {
        let (ctx, store, log) = context();

        log.set_fail_on_append(true).await;
        let outcome = ctx.ingest_receipt(raw_receipt("TXN-1")).await.unwrap();
        assert_eq!(outcome.overall_status, OverallStatus::Partial);
        assert!(store.contains("TXN-1").await);
        log.set_fail_on_append(false).await;

        let summary = ctx.replay_gaps(24).await.unwrap();
        assert_eq!(summary.replayed, 1);

        ctx.pipeline().unwrap().run_once().await.unwrap();
        assert_eq!(ctx.scan_gaps(24).await.gap_count, 0);
    }

    #[tokio::test]
    async fn test_scan_with_out_of_range_lookback_reports_error() {
        let (ctx, store, _) = context();
        store.insert_if_absent(&crate::test_utils::receipt("TXN-1")).await.unwrap();

        let report = tokio::spawn(async move { ctx.scan_gaps(u32::MAX).await })
            .await
            .unwrap();

        assert_eq!(report.status, ScanStatus::Error);
        assert_eq!(report.gap_count, 0);
    }

    #[tokio::test]
    async fn test_from_config_rejects_invalid() {
        let mut config = Config::for_test();
        config.operational.pool.min_connections = 50;
        assert!(matches!(
            ServiceContext::from_config(config).await,
            Err(ServiceError::Config(_))
        ));
    }

    #[cfg(feature = "sqlite")]
    #[tokio::test]
    async fn test_from_config_with_sqlite() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::for_test();
        config.operational.sqlite.path = dir
            .path()
            .join("ops/receipts.db")
            .to_string_lossy()
            .into_owned();
        config.analytics.pipeline_interval_ms = 10;

        let ctx = ServiceContext::from_config(config).await.unwrap();
        ctx.ingest_receipt(raw_receipt("TXN-1")).await.unwrap();
        ctx.pipeline().unwrap().run_once().await.unwrap();

        let report = ctx.scan_gaps(24).await;
        assert_eq!(report.status, ScanStatus::Clean);
        ctx.shutdown().await;
    }
}
