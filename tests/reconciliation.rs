//! Reconciliation integration tests.
//!
//! Run with: cargo test --test reconciliation
//!
//! Partial writes leave gaps between the operational store and the
//! deduplicated analytics copy; the scanner reports them and an explicit
//! replay closes them.

mod common;

use common::harness;
use receipt_sync::reconcile::ScanStatus;
use receipt_sync::test_utils::raw_receipt;

#[tokio::test]
async fn test_no_gap_when_both_paths_succeed() {
    let h = harness();
    for id in ["TXN-1", "TXN-2"] {
        h.ctx.ingest_receipt(raw_receipt(id)).await.unwrap();
    }
    h.ctx.pipeline().unwrap().run_once().await.unwrap();

    let report = h.ctx.scan_gaps(24).await;

    assert_eq!(report.status, ScanStatus::Clean);
    assert_eq!(report.gap_count, 0);
    assert_eq!(report.recommendation, "No gap detected. Synced tables are current.");
}

#[tokio::test]
async fn test_partial_write_shows_as_gap() {
    let h = harness();
    h.ctx.ingest_receipt(raw_receipt("TXN-OK")).await.unwrap();
    h.log.set_fail_on_append(true).await;
    h.ctx.ingest_receipt(raw_receipt("TXN-LOST")).await.unwrap();
    h.log.set_fail_on_append(false).await;
    h.ctx.pipeline().unwrap().run_once().await.unwrap();

    let report = h.ctx.scan_gaps(24).await;

    assert_eq!(report.status, ScanStatus::GapDetected);
    assert_eq!(report.gap_count, 1);
    assert_eq!(report.missing[0].transaction_id, "TXN-LOST");
    assert_eq!(report.oldest_missing_ts, report.newest_missing_ts);
}

#[tokio::test]
async fn test_replay_closes_gap() {
    let h = harness();
    h.log.set_fail_on_append(true).await;
    h.ctx.ingest_receipt(raw_receipt("TXN-LOST")).await.unwrap();
    h.log.set_fail_on_append(false).await;

    let summary = h.ctx.replay_gaps(24).await.unwrap();
    assert_eq!(summary.gap_count, 1);
    assert_eq!(summary.replayed, 1);

    h.ctx.pipeline().unwrap().run_once().await.unwrap();
    assert_eq!(h.ctx.scan_gaps(24).await.status, ScanStatus::Clean);
}

#[tokio::test]
async fn test_scan_error_is_reported_not_raised() {
    let h = harness();
    h.store.set_fail_on_read(true).await;

    let report = h.ctx.scan_gaps(24).await;

    assert_eq!(report.status, ScanStatus::Error);
    assert!(report.error.is_some());
}

#[tokio::test]
async fn test_gate_drops_do_not_hide_gaps() {
    let h = harness();
    h.ctx.ingest_receipt(raw_receipt("TXN-1")).await.unwrap();
    let pipeline = h.ctx.pipeline().unwrap();
    pipeline.run_once().await.unwrap();

    assert_eq!(pipeline.stage().dropped_total().await, 0);
    assert!(h.ctx.wait_for_sync().await);
    assert_eq!(h.ctx.scan_gaps(24).await.gap_count, 0);
}
