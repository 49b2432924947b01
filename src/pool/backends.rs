//! sqlx-backed pool factories.

use std::marker::PhantomData;

use super::PoolSettings;

/// Pool factory for a sqlx database driver.
pub struct SqlxPoolFactory<DB> {
    url: String,
    settings: PoolSettings,
    _marker: PhantomData<fn() -> DB>,
}

impl<DB> SqlxPoolFactory<DB> {
    pub fn new(url: impl Into<String>, settings: PoolSettings) -> Self {
        Self {
            url: url.into(),
            settings,
            _marker: PhantomData,
        }
    }

    pub fn settings(&self) -> PoolSettings {
        self.settings
    }
}

#[cfg(feature = "sqlite")]
pub type SqlitePoolFactory = SqlxPoolFactory<sqlx::Sqlite>;

#[cfg(feature = "postgres")]
pub type PostgresPoolFactory = SqlxPoolFactory<sqlx::Postgres>;

#[cfg(feature = "sqlite")]
impl SqlitePoolFactory {
    /// SQLite file database, created on first connect.
    pub fn for_path(path: &str, settings: PoolSettings) -> Self {
        Self::new(format!("sqlite:{}?mode=rwc", path), settings)
    }
}

macro_rules! impl_pool_factory {
    ($db:ty, $feature:literal) => {
        #[cfg(feature = $feature)]
        #[async_trait::async_trait]
        impl super::PoolFactory for SqlxPoolFactory<$db> {
            type Pool = sqlx::Pool<$db>;

            async fn create(&self) -> Result<Self::Pool, super::PoolError> {
                if self.settings.min_connections > self.settings.max_connections {
                    return Err(super::PoolError::Config(format!(
                        "min_connections ({}) exceeds max_connections ({})",
                        self.settings.min_connections, self.settings.max_connections
                    )));
                }

                let pool = sqlx::pool::PoolOptions::<$db>::new()
                    .min_connections(self.settings.min_connections)
                    .max_connections(self.settings.max_connections)
                    .acquire_timeout(self.settings.acquire_timeout)
                    .connect(&self.url)
                    .await?;
                Ok(pool)
            }

            fn is_closed(&self, pool: &Self::Pool) -> bool {
                pool.is_closed()
            }

            async fn close_pool(&self, pool: &Self::Pool) {
                pool.close().await;
            }
        }
    };
}

impl_pool_factory!(sqlx::Sqlite, "sqlite");
impl_pool_factory!(sqlx::Postgres, "postgres");
