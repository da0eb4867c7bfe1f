use std::time::Duration;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client};

use super::{DispatchLockStore, LockError, LockResult};

const KEY_PREFIX: &str = "folio";

/// Redis-backed lock store shared by every API instance.
///
/// Acquisition is a single `SET key 1 NX PX ttl`, so Redis decides the winner
/// and expires the key itself.
#[derive(Clone)]
pub struct RedisLockStore {
    connection: ConnectionManager,
}

impl RedisLockStore {
    pub async fn connect(url: &str) -> LockResult<Self> {
        let client = Client::open(url)
            .map_err(|e| LockError::Config(format!("Failed to create Redis client: {}", e)))?;
        let connection = ConnectionManager::new(client)
            .await
            .map_err(|e| LockError::Unavailable(format!("Failed to connect to Redis: {}", e)))?;
        Ok(Self { connection })
    }

    fn key(key: &str) -> String {
        format!("{}:{}", KEY_PREFIX, key)
    }
}

#[async_trait]
impl DispatchLockStore for RedisLockStore {
    async fn acquire_if_absent(&self, key: &str, ttl: Duration) -> LockResult<bool> {
        let full_key = Self::key(key);
        let mut conn = self.connection.clone();

        // PX needs at least one millisecond
        let ttl_ms = ttl.as_millis().max(1) as u64;

        let reply: Option<String> = redis::cmd("SET")
            .arg(&full_key)
            .arg(1)
            .arg("NX")
            .arg("PX")
            .arg(ttl_ms)
            .query_async(&mut conn)
            .await
            .map_err(|e| LockError::Command(format!("SET NX failed for '{}': {}", full_key, e)))?;

        let acquired = reply.is_some();
        tracing::trace!(key = %full_key, acquired, ttl_ms, "Redis dispatch lock");
        Ok(acquired)
    }

    async fn release(&self, key: &str) -> LockResult<()> {
        let full_key = Self::key(key);
        let mut conn = self.connection.clone();
        let _: i64 = conn
            .del(&full_key)
            .await
            .map_err(|e| LockError::Command(format!("DEL failed for '{}': {}", full_key, e)))?;
        Ok(())
    }
}
