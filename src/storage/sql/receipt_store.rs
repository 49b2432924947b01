//! Unified SQL receipt store.
//!
//! Serves both the operational write path (insert-if-absent keyed by
//! transaction_id) and the reconciliation side: lookup rows synced from the
//! dedup stage and the LEFT JOIN anti-join that finds gaps.

use std::sync::Arc;

use super::SqlDatabase;
use crate::pool::LazyPool;

/// SQL-based receipt store.
///
/// Connections come from a shared [`LazyPool`]; the pool is created on the
/// first query, not at construction.
pub struct SqlReceiptStore<DB: SqlDatabase> {
    pool: Arc<LazyPool<DB::Factory>>,
}

impl<DB: SqlDatabase> SqlReceiptStore<DB> {
    pub fn new(pool: Arc<LazyPool<DB::Factory>>) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &Arc<LazyPool<DB::Factory>> {
        &self.pool
    }
}

macro_rules! impl_receipt_store {
    ($db_type:ty, $feature:literal) => {
        #[cfg(feature = $feature)]
        impl SqlReceiptStore<$db_type> {
            /// Create tables and indexes if they do not exist.
            pub async fn init(&self) -> crate::storage::Result<()> {
                let pool = self.pool.get_pool().await?;
                for ddl in <$db_type as SqlDatabase>::schema() {
                    sqlx::query(*ddl).execute(&pool).await?;
                }
                tracing::info!(backend = <$db_type as SqlDatabase>::NAME, "Receipt schema ready");
                Ok(())
            }

            async fn select_receipts(
                &self,
                stmt: sea_query::SelectStatement,
            ) -> crate::storage::Result<Vec<crate::model::Receipt>> {
                use sqlx::Row;

                let (sql, values) = <$db_type as SqlDatabase>::build_select(stmt);
                let pool = self.pool.get_pool().await?;
                let rows = sqlx::query_with(&sql, values).fetch_all(&pool).await?;

                let mut receipts = Vec::with_capacity(rows.len());
                for row in rows {
                    let payload: String = row.try_get("payload")?;
                    receipts.push(serde_json::from_str(&payload)?);
                }
                Ok(receipts)
            }
        }

        #[cfg(feature = $feature)]
        #[async_trait::async_trait]
        impl crate::storage::OperationalStore for SqlReceiptStore<$db_type> {
            async fn insert_if_absent(
                &self,
                receipt: &crate::model::Receipt,
            ) -> crate::storage::Result<crate::model::InsertOutcome> {
                use sea_query::{OnConflict, Query};

                use crate::model::InsertOutcome;
                use crate::storage::schema::{ts_to_text, ReceiptTransactions};

                let payload = serde_json::to_string(receipt)?;

                let stmt = Query::insert()
                    .into_table(ReceiptTransactions::Table)
                    .columns([
                        ReceiptTransactions::TransactionId,
                        ReceiptTransactions::StoreId,
                        ReceiptTransactions::StoreName,
                        ReceiptTransactions::CustomerId,
                        ReceiptTransactions::TransactionTs,
                        ReceiptTransactions::TotalCents,
                        ReceiptTransactions::TenderType,
                        ReceiptTransactions::ItemCount,
                        ReceiptTransactions::ItemSummary,
                        ReceiptTransactions::Payload,
                        ReceiptTransactions::CreatedAt,
                    ])
                    .values_panic([
                        receipt.transaction_id().into(),
                        receipt.store_id().into(),
                        receipt.store_name().into(),
                        receipt.customer_id().map(str::to_string).into(),
                        ts_to_text(receipt.transaction_ts()).into(),
                        receipt.total_cents().into(),
                        receipt.tender_type().map(|t| t.as_str().to_string()).into(),
                        (receipt.item_count() as i64).into(),
                        receipt.item_summary().into(),
                        payload.into(),
                        ts_to_text(chrono::Utc::now()).into(),
                    ])
                    .on_conflict(
                        OnConflict::column(ReceiptTransactions::TransactionId)
                            .do_nothing()
                            .to_owned(),
                    )
                    .to_owned();

                let (sql, values) = <$db_type as SqlDatabase>::build_insert(stmt);
                let pool = self.pool.get_pool().await?;
                let result = sqlx::query_with(&sql, values).execute(&pool).await?;

                if result.rows_affected() == 0 {
                    Ok(InsertOutcome::AlreadyPresent)
                } else {
                    Ok(InsertOutcome::Inserted)
                }
            }

            async fn get(
                &self,
                transaction_id: &str,
            ) -> crate::storage::Result<Option<crate::model::Receipt>> {
                use sea_query::{Expr, Query};

                use crate::storage::schema::ReceiptTransactions;

                let stmt = Query::select()
                    .column(ReceiptTransactions::Payload)
                    .from(ReceiptTransactions::Table)
                    .and_where(Expr::col(ReceiptTransactions::TransactionId).eq(transaction_id))
                    .to_owned();

                Ok(self.select_receipts(stmt).await?.into_iter().next())
            }

            async fn list_since(
                &self,
                cutoff: chrono::DateTime<chrono::Utc>,
            ) -> crate::storage::Result<Vec<crate::model::Receipt>> {
                use sea_query::{Expr, Order, Query};

                use crate::storage::schema::{ts_to_text, ReceiptTransactions};

                let stmt = Query::select()
                    .column(ReceiptTransactions::Payload)
                    .from(ReceiptTransactions::Table)
                    .and_where(Expr::col(ReceiptTransactions::TransactionTs).gte(ts_to_text(cutoff)))
                    .order_by(ReceiptTransactions::TransactionTs, Order::Asc)
                    .to_owned();

                self.select_receipts(stmt).await
            }
        }

        #[cfg(feature = $feature)]
        #[async_trait::async_trait]
        impl crate::dedup::LookupSink for SqlReceiptStore<$db_type> {
            async fn upsert_lookup(
                &self,
                rows: &[crate::dedup::LookupRow],
            ) -> crate::storage::Result<u64> {
                use sea_query::{Expr, OnConflict, Query};

                use crate::storage::schema::{ts_to_text, ReceiptLookup};

                if rows.is_empty() {
                    return Ok(0);
                }

                let synced_at = ts_to_text(chrono::Utc::now());
                let mut stmt = Query::insert();
                stmt.into_table(ReceiptLookup::Table).columns([
                    ReceiptLookup::TransactionId,
                    ReceiptLookup::StoreId,
                    ReceiptLookup::CustomerId,
                    ReceiptLookup::TransactionTs,
                    ReceiptLookup::TotalCents,
                    ReceiptLookup::ItemCount,
                    ReceiptLookup::ItemsExtendedCents,
                    ReceiptLookup::Departments,
                    ReceiptLookup::IngestedTs,
                    ReceiptLookup::SyncedAt,
                ]);

                for row in rows {
                    stmt.values_panic([
                        row.transaction_id.clone().into(),
                        row.store_id.clone().into(),
                        row.customer_id.clone().into(),
                        ts_to_text(row.transaction_ts).into(),
                        row.total_cents.into(),
                        (row.item_count as i64).into(),
                        row.items_extended_cents.into(),
                        serde_json::to_string(&row.departments)?.into(),
                        ts_to_text(row.ingested_ts).into(),
                        synced_at.clone().into(),
                    ]);
                }

                // stale syncs never overwrite a newer analytics row
                stmt.on_conflict(
                    OnConflict::column(ReceiptLookup::TransactionId)
                        .update_columns([
                            ReceiptLookup::StoreId,
                            ReceiptLookup::CustomerId,
                            ReceiptLookup::TransactionTs,
                            ReceiptLookup::TotalCents,
                            ReceiptLookup::ItemCount,
                            ReceiptLookup::ItemsExtendedCents,
                            ReceiptLookup::Departments,
                            ReceiptLookup::IngestedTs,
                            ReceiptLookup::SyncedAt,
                        ])
                        .action_and_where(Expr::cust(
                            "excluded.ingested_ts >= receipt_lookup.ingested_ts",
                        ))
                        .to_owned(),
                );

                let (sql, values) = <$db_type as SqlDatabase>::build_insert(stmt);
                let pool = self.pool.get_pool().await?;
                let result = sqlx::query_with(&sql, values).execute(&pool).await?;

                tracing::debug!(
                    backend = <$db_type as SqlDatabase>::NAME,
                    rows = rows.len(),
                    affected = result.rows_affected(),
                    "Lookup rows synced"
                );
                Ok(result.rows_affected())
            }
        }

        #[cfg(feature = $feature)]
        #[async_trait::async_trait]
        impl crate::reconcile::GapSource for SqlReceiptStore<$db_type> {
            async fn missing_since(
                &self,
                cutoff: chrono::DateTime<chrono::Utc>,
            ) -> Result<Vec<crate::reconcile::MissingReceipt>, crate::reconcile::ReconcileError> {
                use sea_query::{Expr, Order, Query};
                use sqlx::Row;

                use crate::reconcile::{MissingReceipt, ReconcileError};
                use crate::storage::schema::{ts_from_text, ts_to_text, ReceiptLookup, ReceiptTransactions};
                use crate::storage::StorageError;

                let stmt = Query::select()
                    .column((ReceiptTransactions::Table, ReceiptTransactions::TransactionId))
                    .column((ReceiptTransactions::Table, ReceiptTransactions::TransactionTs))
                    .from(ReceiptTransactions::Table)
                    .left_join(
                        ReceiptLookup::Table,
                        Expr::col((ReceiptTransactions::Table, ReceiptTransactions::TransactionId))
                            .equals((ReceiptLookup::Table, ReceiptLookup::TransactionId)),
                    )
                    .and_where(Expr::col((ReceiptLookup::Table, ReceiptLookup::TransactionId)).is_null())
                    .and_where(
                        Expr::col((ReceiptTransactions::Table, ReceiptTransactions::TransactionTs))
                            .gte(ts_to_text(cutoff)),
                    )
                    .order_by(
                        (ReceiptTransactions::Table, ReceiptTransactions::TransactionTs),
                        Order::Asc,
                    )
                    .to_owned();

                let (sql, values) = <$db_type as SqlDatabase>::build_select(stmt);
                let pool = self.pool.get_pool().await.map_err(StorageError::from)?;
                let rows = sqlx::query_with(&sql, values)
                    .fetch_all(&pool)
                    .await
                    .map_err(StorageError::from)?;

                let mut missing = Vec::with_capacity(rows.len());
                for row in rows {
                    let transaction_id: String = row.try_get(0).map_err(StorageError::from)?;
                    let raw_ts: String = row.try_get(1).map_err(StorageError::from)?;
                    let transaction_ts = ts_from_text(&raw_ts).map_err(|e| {
                        ReconcileError::Query(format!("bad transaction_ts '{}': {}", raw_ts, e))
                    })?;
                    missing.push(MissingReceipt {
                        transaction_id,
                        transaction_ts,
                    });
                }
                Ok(missing)
            }
        }

        #[cfg(feature = $feature)]
        #[async_trait::async_trait]
        impl crate::reconcile::SyncMonitor for SqlReceiptStore<$db_type> {
            async fn table_states(
                &self,
            ) -> Result<Vec<crate::reconcile::TableStatus>, crate::reconcile::ReconcileError> {
                use sea_query::{Expr, Query};
                use sqlx::Row;

                use crate::reconcile::{SyncState, TableStatus};
                use crate::storage::schema::ReceiptLookup;
                use crate::storage::StorageError;

                let stmt = Query::select()
                    .expr(Expr::col(ReceiptLookup::TransactionId).count())
                    .from(ReceiptLookup::Table)
                    .to_owned();

                let (sql, values) = <$db_type as SqlDatabase>::build_select(stmt);
                let pool = self.pool.get_pool().await.map_err(StorageError::from)?;

                let status = match sqlx::query_with(&sql, values).fetch_one(&pool).await {
                    Ok(row) => {
                        let count: i64 = row.try_get(0).map_err(StorageError::from)?;
                        TableStatus::new("receipt_lookup", SyncState::Active)
                            .with_message(format!("{} rows", count))
                    }
                    Err(e) => TableStatus::new("receipt_lookup", SyncState::Failed)
                        .with_message(e.to_string()),
                };
                Ok(vec![status])
            }
        }
    };
}

// Generate implementations for each SQL backend
impl_receipt_store!(super::postgres::Postgres, "postgres");
impl_receipt_store!(super::sqlite::Sqlite, "sqlite");
