//! Unified SQL storage implementations.
//!
//! One receipt store parameterized by database type through the
//! `SqlDatabase` trait; a macro generates the trait impls per backend.

mod query;
mod receipt_store;

pub use query::SqlDatabase;
pub use receipt_store::SqlReceiptStore;

#[cfg(feature = "postgres")]
pub mod postgres {
    //! PostgreSQL database backend.

    use sea_query::PostgresQueryBuilder;
    use sea_query_binder::{SqlxBinder, SqlxValues};
    use sqlx::PgPool;

    use crate::pool::PostgresPoolFactory;
    use crate::storage::schema::POSTGRES_SCHEMA;

    /// PostgreSQL database marker type.
    pub struct Postgres;

    impl super::SqlDatabase for Postgres {
        type Pool = PgPool;
        type Factory = PostgresPoolFactory;

        const NAME: &'static str = "postgres";

        fn schema() -> &'static [&'static str] {
            POSTGRES_SCHEMA
        }

        fn build_select(stmt: sea_query::SelectStatement) -> (String, SqlxValues) {
            stmt.build_sqlx(PostgresQueryBuilder)
        }

        fn build_insert(stmt: sea_query::InsertStatement) -> (String, SqlxValues) {
            stmt.build_sqlx(PostgresQueryBuilder)
        }
    }

    /// PostgreSQL receipt store.
    pub type PostgresReceiptStore = super::SqlReceiptStore<Postgres>;
}

#[cfg(feature = "sqlite")]
pub mod sqlite {
    //! SQLite database backend.

    use sea_query::SqliteQueryBuilder;
    use sea_query_binder::{SqlxBinder, SqlxValues};
    use sqlx::SqlitePool;

    use crate::pool::SqlitePoolFactory;
    use crate::storage::schema::SQLITE_SCHEMA;

    /// SQLite database marker type.
    pub struct Sqlite;

    impl super::SqlDatabase for Sqlite {
        type Pool = SqlitePool;
        type Factory = SqlitePoolFactory;

        const NAME: &'static str = "sqlite";

        fn schema() -> &'static [&'static str] {
            SQLITE_SCHEMA
        }

        fn build_select(stmt: sea_query::SelectStatement) -> (String, SqlxValues) {
            stmt.build_sqlx(SqliteQueryBuilder)
        }

        fn build_insert(stmt: sea_query::InsertStatement) -> (String, SqlxValues) {
            stmt.build_sqlx(SqliteQueryBuilder)
        }
    }

    /// SQLite receipt store.
    pub type SqliteReceiptStore = super::SqlReceiptStore<Sqlite>;
}
