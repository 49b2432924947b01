use chrono::Duration as ChronoDuration;

use super::*;
use crate::test_utils::{fixed_ts, receipt, receipt_at};

#[tokio::test]
async fn test_insert_if_absent_is_idempotent() {
    let store = MockOperationalStore::new();
    let r = receipt("TXN-1");

    assert_eq!(store.insert_if_absent(&r).await.unwrap(), InsertOutcome::Inserted);
    assert_eq!(
        store.insert_if_absent(&r).await.unwrap(),
        InsertOutcome::AlreadyPresent
    );
    assert_eq!(store.stored_count().await, 1);
    assert_eq!(store.insert_calls().await, 2);
}

#[tokio::test]
async fn test_fail_on_insert() {
    let store = MockOperationalStore::new();
    store.set_fail_on_insert(true).await;

    let result = store.insert_if_absent(&receipt("TXN-1")).await;
    assert!(matches!(result, Err(StorageError::Unavailable(_))));
    assert_eq!(store.stored_count().await, 0);
    assert_eq!(store.insert_calls().await, 1);
}

#[tokio::test]
async fn test_get_returns_stored_receipt() {
    let store = MockOperationalStore::new();
    let r = receipt("TXN-1");
    store.insert_if_absent(&r).await.unwrap();

    assert_eq!(store.get("TXN-1").await.unwrap(), Some(r));
    assert_eq!(store.get("TXN-2").await.unwrap(), None);
}

#[tokio::test]
async fn test_list_since_filters_and_orders() {
    let store = MockOperationalStore::new();
    let base = fixed_ts();
    store
        .insert_if_absent(&receipt_at("NEW", base))
        .await
        .unwrap();
    store
        .insert_if_absent(&receipt_at("MID", base - ChronoDuration::hours(2)))
        .await
        .unwrap();
    store
        .insert_if_absent(&receipt_at("OLD", base - ChronoDuration::hours(48)))
        .await
        .unwrap();

    let ids: Vec<String> = store
        .list_since(base - ChronoDuration::hours(24))
        .await
        .unwrap()
        .iter()
        .map(|r| r.transaction_id().to_string())
        .collect();
    assert_eq!(ids, vec!["MID", "NEW"]);
}

#[tokio::test]
async fn test_fail_on_read() {
    let store = MockOperationalStore::new();
    store.set_fail_on_read(true).await;
    assert!(store.get("TXN-1").await.is_err());
    assert!(store.list_since(fixed_ts()).await.is_err());
}
