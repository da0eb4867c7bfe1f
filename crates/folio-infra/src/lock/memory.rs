use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tokio::time::Instant;

use super::{DispatchLockStore, LockResult};

const DEFAULT_SHARD_COUNT: usize = 16;

/// Expired entries in a shard are swept once it grows past this size.
const SWEEP_THRESHOLD: usize = 1024;

/// Process-local lock store.
///
/// Keys are spread over independently locked shards so unrelated documents
/// rarely contend. Expiry uses `tokio::time::Instant`, which lets tests drive
/// TTLs with a paused clock.
pub struct InMemoryLockStore {
    shards: Vec<Mutex<HashMap<String, Instant>>>,
}

impl InMemoryLockStore {
    pub fn new() -> Self {
        Self::with_shards(DEFAULT_SHARD_COUNT)
    }

    pub fn with_shards(shard_count: usize) -> Self {
        let shards = (0..shard_count.max(1))
            .map(|_| Mutex::new(HashMap::new()))
            .collect();
        Self { shards }
    }

    fn shard(&self, key: &str) -> &Mutex<HashMap<String, Instant>> {
        let mut hasher = DefaultHasher::new();
        key.hash(&mut hasher);
        &self.shards[(hasher.finish() as usize) % self.shards.len()]
    }

    /// Number of unexpired locks. Test and diagnostics helper.
    pub async fn active_locks(&self) -> usize {
        let now = Instant::now();
        let mut total = 0;
        for shard in &self.shards {
            total += shard.lock().await.values().filter(|exp| **exp > now).count();
        }
        total
    }
}

impl Default for InMemoryLockStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DispatchLockStore for InMemoryLockStore {
    async fn acquire_if_absent(&self, key: &str, ttl: Duration) -> LockResult<bool> {
        let now = Instant::now();
        let mut entries = self.shard(key).lock().await;

        if let Some(expires_at) = entries.get(key) {
            if *expires_at > now {
                tracing::trace!(key = %key, "Dispatch lock held");
                return Ok(false);
            }
        }

        if entries.len() >= SWEEP_THRESHOLD {
            entries.retain(|_, expires_at| *expires_at > now);
        }

        entries.insert(key.to_string(), now + ttl);
        tracing::trace!(key = %key, ttl_ms = ttl.as_millis() as u64, "Dispatch lock acquired");
        Ok(true)
    }

    async fn release(&self, key: &str) -> LockResult<()> {
        self.shard(key).lock().await.remove(key);
        Ok(())
    }
}
