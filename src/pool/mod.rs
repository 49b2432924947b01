//! Lazily created, shared connection pool.
//!
//! [`LazyPool`] owns at most one live pool handle. The first caller creates
//! it; concurrent first callers wait on an async creation lock and re-check,
//! so exactly one pool is built per generation. A closed handle is replaced
//! on the next call.
//!
//! The pool is an explicit resource owned by the service context and passed
//! by handle. Backends plug in through [`PoolFactory`].

mod backends;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{PoisonError, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::{debug, info};

#[cfg(feature = "postgres")]
pub use backends::PostgresPoolFactory;
#[cfg(feature = "sqlite")]
pub use backends::SqlitePoolFactory;
pub use backends::SqlxPoolFactory;

/// Errors raised while creating a pool.
#[derive(Debug, thiserror::Error)]
pub enum PoolError {
    #[error("Failed to connect: {0}")]
    Connect(#[from] sqlx::Error),

    #[error("Invalid pool configuration: {0}")]
    Config(String),

    #[error("Failed to prepare database location: {0}")]
    Io(#[from] std::io::Error),
}

/// Pool sizing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolSettings {
    /// Warm connections kept open.
    pub min_connections: u32,
    /// Burst limit.
    pub max_connections: u32,
    /// Upper bound on waiting for a free connection.
    pub acquire_timeout: Duration,
}

impl Default for PoolSettings {
    fn default() -> Self {
        Self {
            min_connections: 2,
            max_connections: 10,
            acquire_timeout: Duration::from_secs(30),
        }
    }
}

/// Creates and inspects pool handles for one backend.
#[async_trait]
pub trait PoolFactory: Send + Sync + 'static {
    type Pool: Clone + Send + Sync + 'static;

    /// Open a new pool.
    async fn create(&self) -> Result<Self::Pool, PoolError>;

    /// Whether the handle has been closed and must be replaced.
    fn is_closed(&self, pool: &Self::Pool) -> bool;

    /// Close the handle, waiting for checked-out connections to return.
    async fn close_pool(&self, pool: &Self::Pool);
}

/// Shared pool handle with check-lock-recheck creation.
pub struct LazyPool<F: PoolFactory> {
    factory: F,
    current: RwLock<Option<F::Pool>>,
    create_lock: Mutex<()>,
    creations: AtomicU64,
}

impl<F: PoolFactory> LazyPool<F> {
    pub fn new(factory: F) -> Self {
        Self {
            factory,
            current: RwLock::new(None),
            create_lock: Mutex::new(()),
            creations: AtomicU64::new(0),
        }
    }

    pub fn factory(&self) -> &F {
        &self.factory
    }

    fn open_handle(&self) -> Option<F::Pool> {
        let current = self.current.read().unwrap_or_else(PoisonError::into_inner);
        current
            .as_ref()
            .filter(|pool| !self.factory.is_closed(pool))
            .cloned()
    }

    /// Return the live pool, creating it if absent or closed.
    pub async fn get_pool(&self) -> Result<F::Pool, PoolError> {
        if let Some(pool) = self.open_handle() {
            return Ok(pool);
        }

        let _guard = self.create_lock.lock().await;

        // another caller may have created it while we waited
        if let Some(pool) = self.open_handle() {
            debug!("Pool created by concurrent caller");
            return Ok(pool);
        }

        let pool = self.factory.create().await?;
        *self.current.write().unwrap_or_else(PoisonError::into_inner) = Some(pool.clone());
        let generation = self.creations.fetch_add(1, Ordering::SeqCst) + 1;
        info!(generation, "Connection pool created");

        Ok(pool)
    }

    /// Close the current handle, if any. The next `get_pool` creates a new one.
    pub async fn close(&self) {
        let pool = self
            .current
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .take();

        if let Some(pool) = pool {
            self.factory.close_pool(&pool).await;
            info!("Connection pool closed");
        }
    }

    /// Number of pools created over the lifetime of this handle.
    pub fn creations(&self) -> u64 {
        self.creations.load(Ordering::SeqCst)
    }
}
