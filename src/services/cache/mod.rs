//! Write-through copies of persisted snapshots.
//!
//! Only the persist path writes to a cache: a successful replace stores the
//! new entries and an empty replace or invalidation removes the key. Reads
//! that miss go to the snapshot store and never populate the cache, so a
//! slow reader cannot put back rows that were replaced in the meantime.

use crate::error::Result;
use crate::models::{RecommendationEntry, UserId};
use async_trait::async_trait;
use dashmap::DashMap;
use redis::AsyncCommands;
use std::sync::Arc;
use tracing::warn;

/// Best-effort snapshot cache. Implementations log and swallow their own
/// failures; a failed read is a miss.
#[async_trait]
pub trait SnapshotCache: Send + Sync {
    async fn get(&self, user_id: UserId) -> Option<Vec<RecommendationEntry>>;

    /// Mirror a committed snapshot. Empty entries remove the key.
    async fn store(&self, user_id: UserId, entries: &[RecommendationEntry]);

    async fn evict(&self, user_id: UserId);
}

#[derive(Clone)]
pub struct RedisSnapshotCache {
    client: Arc<redis::Client>,
    ttl_seconds: u64,
}

impl RedisSnapshotCache {
    pub fn new(client: Arc<redis::Client>, ttl_seconds: u64) -> Self {
        Self { client, ttl_seconds }
    }

    pub fn open(url: &str, ttl_seconds: u64) -> Result<Self> {
        let client = redis::Client::open(url)?;
        Ok(Self::new(Arc::new(client), ttl_seconds))
    }

    fn key(user_id: UserId) -> String {
        format!("recommendations:{}", user_id)
    }

    async fn try_get(&self, user_id: UserId) -> Result<Option<Vec<RecommendationEntry>>> {
        let mut conn = self.client.get_async_connection().await?;
        let cached: Option<String> = conn.get(Self::key(user_id)).await?;
        match cached {
            Some(data) => Ok(Some(serde_json::from_str(&data)?)),
            None => Ok(None),
        }
    }

    async fn try_put(&self, user_id: UserId, entries: &[RecommendationEntry]) -> Result<()> {
        let mut conn = self.client.get_async_connection().await?;
        let payload = serde_json::to_string(entries)?;
        let _: () = conn.set_ex(Self::key(user_id), payload, self.ttl_seconds).await?;
        Ok(())
    }

    async fn try_del(&self, user_id: UserId) -> Result<()> {
        let mut conn = self.client.get_async_connection().await?;
        let _: () = conn.del(Self::key(user_id)).await?;
        Ok(())
    }
}

#[async_trait]
impl SnapshotCache for RedisSnapshotCache {
    async fn get(&self, user_id: UserId) -> Option<Vec<RecommendationEntry>> {
        match self.try_get(user_id).await {
            Ok(entries) => entries,
            Err(e) => {
                warn!("Snapshot cache read failed for user {}: {}", user_id, e);
                None
            }
        }
    }

    async fn store(&self, user_id: UserId, entries: &[RecommendationEntry]) {
        if entries.is_empty() {
            self.evict(user_id).await;
            return;
        }

        if let Err(e) = self.try_put(user_id, entries).await {
            // the old value must not outlive the snapshot it mirrors
            warn!("Snapshot cache write failed for user {}: {}", user_id, e);
            self.evict(user_id).await;
        }
    }

    async fn evict(&self, user_id: UserId) {
        if let Err(e) = self.try_del(user_id).await {
            warn!("Snapshot cache eviction failed for user {}: {}", user_id, e);
        }
    }
}

/// Process-local cache for tests and single-node setups.
#[derive(Debug, Default)]
pub struct MemorySnapshotCache {
    entries: DashMap<UserId, Vec<RecommendationEntry>>,
}

impl MemorySnapshotCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, user_id: UserId) -> bool {
        self.entries.contains_key(&user_id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait]
impl SnapshotCache for MemorySnapshotCache {
    async fn get(&self, user_id: UserId) -> Option<Vec<RecommendationEntry>> {
        self.entries.get(&user_id).map(|e| e.value().clone())
    }

    async fn store(&self, user_id: UserId, entries: &[RecommendationEntry]) {
        if entries.is_empty() {
            self.entries.remove(&user_id);
        } else {
            self.entries.insert(user_id, entries.to_vec());
        }
    }

    async fn evict(&self, user_id: UserId) {
        self.entries.remove(&user_id);
    }
}
