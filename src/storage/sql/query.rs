//! SQL database abstraction trait.

use sea_query_binder::SqlxValues;

use crate::pool::PoolFactory;

/// Trait for SQL database backends.
///
/// Abstracts over PostgreSQL and SQLite by providing the pool factory,
/// schema, and parameterized query building.
pub trait SqlDatabase: Send + Sync + 'static {
    /// The connection pool type for this database.
    type Pool: Clone + Send + Sync + 'static;

    /// Factory that opens pools for this backend.
    type Factory: PoolFactory<Pool = Self::Pool>;

    /// Human-readable backend name for logs.
    const NAME: &'static str;

    /// DDL statements executed by `init`.
    fn schema() -> &'static [&'static str];

    /// Build a parameterized SELECT.
    fn build_select(stmt: sea_query::SelectStatement) -> (String, SqlxValues);

    /// Build a parameterized INSERT.
    fn build_insert(stmt: sea_query::InsertStatement) -> (String, SqlxValues);
}
