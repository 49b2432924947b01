//! Operational store: the low-latency system of record.
//!
//! Implementations:
//! - `SqlReceiptStore<Sqlite>` / `SqlReceiptStore<Postgres>`: sqlx + sea-query
//! - `MockOperationalStore`: in-memory with failure injection, for tests

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::model::{InsertOutcome, Receipt};
use crate::pool::PoolError;

pub mod mock;
pub mod schema;
pub mod sql;

pub use mock::MockOperationalStore;
pub use sql::{SqlDatabase, SqlReceiptStore};

#[cfg(feature = "postgres")]
pub use sql::postgres::PostgresReceiptStore;
#[cfg(feature = "sqlite")]
pub use sql::sqlite::SqliteReceiptStore;

/// Result type for storage operations.
pub type Result<T> = std::result::Result<T, StorageError>;

/// Errors that can occur during storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Connection pool error: {0}")]
    Pool(#[from] PoolError),

    #[error("Operational write timed out after {0:?}")]
    Timeout(Duration),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

/// Interface for the operational system of record.
///
/// `transaction_id` is the primary key. Rows are never updated by the
/// ingestion path.
#[async_trait]
pub trait OperationalStore: Send + Sync {
    /// Insert the receipt unless a row with the same transaction_id exists.
    ///
    /// A duplicate is reported as [`InsertOutcome::AlreadyPresent`], not an error.
    async fn insert_if_absent(&self, receipt: &Receipt) -> Result<InsertOutcome>;

    /// Fetch a receipt by transaction_id.
    async fn get(&self, transaction_id: &str) -> Result<Option<Receipt>>;

    /// Receipts with `transaction_ts >= cutoff`, oldest first.
    async fn list_since(&self, cutoff: DateTime<Utc>) -> Result<Vec<Receipt>>;
}
