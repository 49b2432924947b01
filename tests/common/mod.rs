//! Shared helpers for integration tests.

#![allow(dead_code)]

use std::sync::Arc;

use receipt_sync::config::Config;
use receipt_sync::log::MemoryAnalyticsLog;
use receipt_sync::model::{RawLineItem, RawReceipt};
use receipt_sync::storage::MockOperationalStore;
use receipt_sync::ServiceContext;

pub use receipt_sync::test_utils::{raw_item, raw_receipt, raw_receipt_at};

/// In-memory service with handles to its store and log.
pub struct Harness {
    pub ctx: ServiceContext,
    pub store: Arc<MockOperationalStore>,
    pub log: Arc<MemoryAnalyticsLog>,
}

pub fn harness() -> Harness {
    let store = Arc::new(MockOperationalStore::new());
    let log = Arc::new(MemoryAnalyticsLog::new());
    let ctx = ServiceContext::in_memory(Config::for_test(), store.clone(), log.clone());
    Harness { ctx, store, log }
}

/// Receipt whose only item has neither a UPC nor a SKU.
pub fn unidentified_item_receipt(transaction_id: &str) -> RawReceipt {
    let mut raw = raw_receipt(transaction_id);
    raw.items = vec![RawLineItem {
        upc: None,
        sku: None,
        ..raw_item("Mystery", "000000000000", 1757)
    }];
    raw
}
