//! Database schema definitions using sea-query.
//!
//! Timestamps are stored as fixed-width RFC 3339 UTC text (microsecond
//! precision, `Z` suffix) so that string comparison orders them correctly
//! on every backend.

use chrono::{DateTime, SecondsFormat, Utc};
use sea_query::Iden;

/// Operational system of record. One row per transaction_id.
#[derive(Iden)]
pub enum ReceiptTransactions {
    Table,
    #[iden = "transaction_id"]
    TransactionId,
    #[iden = "store_id"]
    StoreId,
    #[iden = "store_name"]
    StoreName,
    #[iden = "customer_id"]
    CustomerId,
    #[iden = "transaction_ts"]
    TransactionTs,
    #[iden = "total_cents"]
    TotalCents,
    #[iden = "tender_type"]
    TenderType,
    #[iden = "item_count"]
    ItemCount,
    #[iden = "item_summary"]
    ItemSummary,
    #[iden = "payload"]
    Payload,
    #[iden = "created_at"]
    CreatedAt,
}

/// Deduplicated analytics copy synced back for reconciliation.
#[derive(Iden)]
pub enum ReceiptLookup {
    Table,
    #[iden = "transaction_id"]
    TransactionId,
    #[iden = "store_id"]
    StoreId,
    #[iden = "customer_id"]
    CustomerId,
    #[iden = "transaction_ts"]
    TransactionTs,
    #[iden = "total_cents"]
    TotalCents,
    #[iden = "item_count"]
    ItemCount,
    #[iden = "items_extended_cents"]
    ItemsExtendedCents,
    #[iden = "departments"]
    Departments,
    #[iden = "ingested_ts"]
    IngestedTs,
    #[iden = "synced_at"]
    SyncedAt,
}

/// SQL for creating the receipt tables (SQLite).
pub const SQLITE_SCHEMA: &[&str] = &[
    r#"
CREATE TABLE IF NOT EXISTS receipt_transactions (
    transaction_id TEXT PRIMARY KEY,
    store_id TEXT NOT NULL,
    store_name TEXT NOT NULL,
    customer_id TEXT,
    transaction_ts TEXT NOT NULL,
    total_cents INTEGER NOT NULL,
    tender_type TEXT,
    item_count INTEGER NOT NULL,
    item_summary TEXT NOT NULL,
    payload TEXT NOT NULL,
    created_at TEXT NOT NULL
)"#,
    "CREATE INDEX IF NOT EXISTS idx_receipt_transactions_ts ON receipt_transactions(transaction_ts)",
    r#"
CREATE TABLE IF NOT EXISTS receipt_lookup (
    transaction_id TEXT PRIMARY KEY,
    store_id TEXT NOT NULL,
    customer_id TEXT,
    transaction_ts TEXT NOT NULL,
    total_cents INTEGER NOT NULL,
    item_count INTEGER NOT NULL,
    items_extended_cents INTEGER NOT NULL,
    departments TEXT NOT NULL DEFAULT '[]',
    ingested_ts TEXT NOT NULL,
    synced_at TEXT NOT NULL
)"#,
];

/// SQL for creating the receipt tables (PostgreSQL).
pub const POSTGRES_SCHEMA: &[&str] = &[
    r#"
CREATE TABLE IF NOT EXISTS receipt_transactions (
    transaction_id TEXT PRIMARY KEY,
    store_id TEXT NOT NULL,
    store_name TEXT NOT NULL,
    customer_id TEXT,
    transaction_ts TEXT NOT NULL,
    total_cents BIGINT NOT NULL,
    tender_type TEXT,
    item_count BIGINT NOT NULL,
    item_summary TEXT NOT NULL,
    payload TEXT NOT NULL,
    created_at TEXT NOT NULL
)"#,
    "CREATE INDEX IF NOT EXISTS idx_receipt_transactions_ts ON receipt_transactions(transaction_ts)",
    r#"
CREATE TABLE IF NOT EXISTS receipt_lookup (
    transaction_id TEXT PRIMARY KEY,
    store_id TEXT NOT NULL,
    customer_id TEXT,
    transaction_ts TEXT NOT NULL,
    total_cents BIGINT NOT NULL,
    item_count BIGINT NOT NULL,
    items_extended_cents BIGINT NOT NULL,
    departments TEXT NOT NULL DEFAULT '[]',
    ingested_ts TEXT NOT NULL,
    synced_at TEXT NOT NULL
)"#,
];

/// Format a timestamp for a TEXT column.
pub fn ts_to_text(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Parse a TEXT timestamp column.
pub fn ts_from_text(value: &str) -> Result<DateTime<Utc>, chrono::ParseError> {
    DateTime::parse_from_rfc3339(value).map(|ts| ts.with_timezone(&Utc))
}
