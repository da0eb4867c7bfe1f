//! Short-lived dispatch locks.
//!
//! A dispatch lock marks "a render job for this key was just submitted". It
//! is best-effort de-duplication: it expires on its own after the TTL, so a
//! lost job is retried by the next caller once the window passes.

mod memory;
#[cfg(feature = "redis-lock")]
mod redis_store;

pub use memory::InMemoryLockStore;
#[cfg(feature = "redis-lock")]
pub use redis_store::RedisLockStore;

use async_trait::async_trait;
use folio_core::{Config, DispatchLockBackend};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LockError {
    #[error("Lock backend unavailable: {0}")]
    Unavailable(String),

    #[error("Lock command failed: {0}")]
    Command(String),

    #[error("Lock configuration error: {0}")]
    Config(String),
}

pub type LockResult<T> = Result<T, LockError>;

/// Atomic set-if-absent store with per-key expiry.
#[async_trait]
pub trait DispatchLockStore: Send + Sync {
    /// Take the lock for `key` unless someone holds an unexpired one.
    ///
    /// Returns `true` when this caller now holds the lock. Two concurrent
    /// callers for the same key never both receive `true`.
    async fn acquire_if_absent(&self, key: &str, ttl: Duration) -> LockResult<bool>;

    /// Drop the lock for `key`. Releasing a missing lock is not an error.
    async fn release(&self, key: &str) -> LockResult<()>;
}

/// Create the configured dispatch lock store.
pub async fn create_lock_store(config: &Config) -> LockResult<Arc<dyn DispatchLockStore>> {
    match config.dispatch_lock_backend() {
        DispatchLockBackend::Memory => {
            tracing::info!("Using in-memory dispatch lock store");
            Ok(Arc::new(InMemoryLockStore::new()))
        }
        #[cfg(feature = "redis-lock")]
        DispatchLockBackend::Redis => {
            let url = config.redis_url().ok_or_else(|| {
                LockError::Config(
                    "REDIS_URL must be set when DISPATCH_LOCK_BACKEND=redis".to_string(),
                )
            })?;
            let store = RedisLockStore::connect(url).await?;
            tracing::info!("Using Redis dispatch lock store");
            Ok(Arc::new(store))
        }
        #[cfg(not(feature = "redis-lock"))]
        DispatchLockBackend::Redis => Err(LockError::Config(
            "Redis lock backend not available (redis-lock feature not enabled)".to_string(),
        )),
    }
}
