//! Dual-write integration tests.
//!
//! Run with: cargo test --test dual_write
//!
//! Drives the service context over the in-memory store and log, no external
//! dependencies required.

mod common;

use common::{harness, raw_receipt, unidentified_item_receipt};
use receipt_sync::model::{AnalyticsResult, InsertOutcome, OverallStatus};
use receipt_sync::orchestrator::IngestError;

#[tokio::test]
async fn test_same_transaction_twice() {
    let h = harness();

    let first = h.ctx.ingest_receipt(raw_receipt("TXN-1")).await.unwrap();
    let second = h.ctx.ingest_receipt(raw_receipt("TXN-1")).await.unwrap();

    assert_eq!(first.operational, InsertOutcome::Inserted);
    assert_eq!(second.operational, InsertOutcome::AlreadyPresent);
    assert_eq!(h.store.stored_count().await, 1);

    // Both deliveries reach the log under distinct ids.
    let ids = h.log.delivery_ids("pos_raw_receipts").await;
    assert_eq!(ids.len(), 2);
    assert_ne!(ids[0], ids[1]);
    assert_ne!(first.analytics.delivery_id(), second.analytics.delivery_id());
}

#[tokio::test]
async fn test_duplicates_collapse_in_dedup_stage() {
    let h = harness();
    h.ctx.ingest_receipt(raw_receipt("TXN-1")).await.unwrap();
    h.ctx.ingest_receipt(raw_receipt("TXN-1")).await.unwrap();

    let pipeline = h.ctx.pipeline().unwrap();
    pipeline.run_once().await.unwrap();

    assert_eq!(pipeline.stage().header_count().await, 1);
    assert_eq!(pipeline.stage().item_count().await, 2);
}

#[tokio::test]
async fn test_analytics_failure_is_partial() {
    let h = harness();
    h.log.set_fail_on_append(true).await;

    let outcome = h.ctx.ingest_receipt(raw_receipt("TXN-1")).await.unwrap();

    assert_eq!(outcome.overall_status, OverallStatus::Partial);
    assert!(matches!(outcome.analytics, AnalyticsResult::Failed { .. }));
    assert_eq!(h.store.insert_calls().await, 1);
    assert!(h.store.contains("TXN-1").await);
}

#[tokio::test]
async fn test_operational_failure_skips_analytics() {
    let h = harness();
    h.store.set_fail_on_insert(true).await;

    let result = h.ctx.ingest_receipt(raw_receipt("TXN-1")).await;

    match result {
        Err(IngestError::Operational { transaction_id, .. }) => assert_eq!(transaction_id, "TXN-1"),
        other => panic!("expected operational error, got {:?}", other),
    }
    assert_eq!(h.log.append_calls().await, 0);
}

#[tokio::test]
async fn test_batch_isolates_malformed_item() {
    let h = harness();
    let batch = vec![
        raw_receipt("TXN-1"),
        unidentified_item_receipt("TXN-2"),
        raw_receipt("TXN-3"),
    ];

    let results = h.ctx.ingest_batch(batch).await;

    assert_eq!(results.len(), 3);
    assert!(results[0].as_ref().unwrap().is_success());
    assert!(matches!(results[1], Err(IngestError::Validation(_))));
    assert!(results[2].as_ref().unwrap().is_success());
    assert_eq!(h.store.stored_count().await, 2);
    assert!(!h.store.contains("TXN-2").await);
}

#[tokio::test]
async fn test_outcome_serializes_for_callers() {
    let h = harness();
    let outcome = h.ctx.ingest_receipt(raw_receipt("TXN-1")).await.unwrap();

    let json = serde_json::to_value(&outcome).unwrap();
    assert_eq!(json["transaction_id"], "TXN-1");
    assert_eq!(json["overall_status"], "success");
    assert_eq!(json["operational"], "inserted");
    assert_eq!(json["analytics"]["status"], "delivered");
}
