//! receipt-replay: re-deliver receipts missing from the analytics copy
//!
//! Operator-triggered. Finds gaps over the configured lookback window,
//! reads each missing receipt from the operational store and delivers it
//! to the analytics log again with a fresh delivery id. Transient delivery
//! failures are retried with exponential backoff.
//!
//! ## Usage
//! ```text
//! receipt-replay [--config path.yaml]
//! ```
//!
//! ## Configuration
//! - reconciliation.lookback_hours: window to replay (default: 24)
//! - reconciliation.replay_max_attempts: retries per receipt (default: 5)

use tracing::{error, info};

use receipt_sync::config::Config;
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
    let summary = context.replay_gaps(lookback_hours).await;
    context.shutdown().await;

    let summary = summary?;
    println!("{}", serde_json::to_string_pretty(&summary)?);

    if summary.failed > 0 {
        return Err(format!("{} of {} receipts could not be replayed", summary.failed, summary.gap_count).into());
    }
    info!(replayed = summary.replayed, "Replay complete");
    Ok(())
}
