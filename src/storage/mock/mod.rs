//! Mock operational store for testing.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use super::{OperationalStore, Result, StorageError};
use crate::model::{InsertOutcome, Receipt};

/// Mock operational store that keeps receipts in memory.
#[derive(Default)]
pub struct MockOperationalStore {
    receipts: RwLock<HashMap<String, Receipt>>,
    fail_on_insert: RwLock<bool>,
    fail_on_read: RwLock<bool>,
    insert_delay: RwLock<Option<Duration>>,
    insert_calls: RwLock<usize>,
}

impl MockOperationalStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn set_fail_on_insert(&self, fail: bool) {
        *self.fail_on_insert.write().await = fail;
    }

    pub async fn set_fail_on_read(&self, fail: bool) {
        *self.fail_on_read.write().await = fail;
    }

    /// Delay every insert, to exercise write timeouts.
    pub async fn set_insert_delay(&self, delay: Option<Duration>) {
        *self.insert_delay.write().await = delay;
    }

    /// Number of insert attempts, including failed and duplicate ones.
    pub async fn insert_calls(&self) -> usize {
        *self.insert_calls.read().await
    }

    pub async fn stored_count(&self) -> usize {
        self.receipts.read().await.len()
    }

    pub async fn contains(&self, transaction_id: &str) -> bool {
        self.receipts.read().await.contains_key(transaction_id)
    }
}

#[async_trait]
impl OperationalStore for MockOperationalStore {
    async fn insert_if_absent(&self, receipt: &Receipt) -> Result<InsertOutcome> {
        *self.insert_calls.write().await += 1;

        if let Some(delay) = *self.insert_delay.read().await {
            tokio::time::sleep(delay).await;
        }
        if *self.fail_on_insert.read().await {
            return Err(StorageError::Unavailable(
                "Mock insert failure".to_string(),
            ));
        }

        let mut receipts = self.receipts.write().await;
        if receipts.contains_key(receipt.transaction_id()) {
            return Ok(InsertOutcome::AlreadyPresent);
        }
        receipts.insert(receipt.transaction_id().to_string(), receipt.clone());
        Ok(InsertOutcome::Inserted)
    }

    async fn get(&self, transaction_id: &str) -> Result<Option<Receipt>> {
        if *self.fail_on_read.read().await {
            return Err(StorageError::Unavailable("Mock read failure".to_string()));
        }
        Ok(self.receipts.read().await.get(transaction_id).cloned())
    }

    async fn list_since(&self, cutoff: DateTime<Utc>) -> Result<Vec<Receipt>> {
        if *self.fail_on_read.read().await {
            return Err(StorageError::Unavailable("Mock read failure".to_string()));
        }
        let mut receipts: Vec<Receipt> = self
            .receipts
            .read()
            .await
            .values()
            .filter(|r| r.transaction_ts() >= cutoff)
            .cloned()
            .collect();
        receipts.sort_by_key(|r| r.transaction_ts());
        Ok(receipts)
    }
}

#[cfg(test)]
mod tests;
