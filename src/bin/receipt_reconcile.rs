//! receipt-reconcile: scan for receipts missing from the analytics copy
//!
//! Waits for the synced lookup table to report active, then compares the
//! operational store against it over the configured lookback window and
//! prints the gap report as JSON on stdout.
//!
//! ## Usage
//! ```text
//! receipt-reconcile [--config path.yaml]
//! ```
//!
//! Exits non-zero when a gap is found or the scan fails, so schedulers can
//! alert on it.
//!
//! ## Configuration
//! - reconciliation.lookback_hours: window to scan (default: 24)
//! - reconciliation.wait_timeout_secs: max wait for synced tables (default: 600)
//! - reconciliation.poll_interval_secs: sync status poll interval (default: 15)

use tracing::{error, info, warn};

use receipt_sync::config::Config;
use receipt_sync::reconcile::ScanStatus;
use receipt_sync::utils::bootstrap::{init_tracing, parse_config_path};
use receipt_sync::ServiceContext;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    let config_path = parse_config_path();
    let config = Config::load(config_path.as_deref()).map_err(|e| {
        error!("Failed to load configuration: {}", e);
        e
    })?;
    let lookback_hours = config.reconciliation.lookback_hours;

    let context = ServiceContext::from_config(config).await?;

    if !context.wait_for_sync().await {
        warn!("Synced tables not active; scanning anyway");
    }

    let report = context.scan_gaps(lookback_hours).await;
    println!("{}", serde_json::to_string_pretty(&report)?);
    context.shutdown().await;

    match report.status {
        ScanStatus::Clean => {
            info!("Reconciliation clean");
            Ok(())
        }
        ScanStatus::GapDetected => Err(format!("{} receipts missing", report.gap_count).into()),
        ScanStatus::Error => Err(report
            .error
            .unwrap_or_else(|| "gap scan failed".to_string())
            .into()),
    }
}
