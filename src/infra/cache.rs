//! Process-local content cache for development runs and tests.

use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use time::OffsetDateTime;
use tokio::sync::RwLock;

use crate::{
    application::repos::{ContentCacheRepo, RepoError},
    domain::{cache_key::CacheKey, entities::CacheRecord},
};

/// Same upsert and expiry semantics as the Postgres table, without durability.
#[derive(Clone, Default)]
pub struct InMemoryContentCache {
    entries: Arc<RwLock<HashMap<String, CacheRecord>>>,
}

impl InMemoryContentCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    /// Raw lookup that ignores expiry.
    pub async fn peek(&self, key: &str) -> Option<CacheRecord> {
        self.entries.read().await.get(key).cloned()
    }
}

#[async_trait]
impl ContentCacheRepo for InMemoryContentCache {
    async fn find_valid(
        &self,
        key: &CacheKey,
        now: OffsetDateTime,
    ) -> Result<Option<CacheRecord>, RepoError> {
        let guard = self.entries.read().await;
        Ok(guard
            .get(key.as_str())
            .filter(|record| record.is_valid_at(now))
            .cloned())
    }

    async fn upsert(&self, record: &CacheRecord) -> Result<(), RepoError> {
        let mut guard = self.entries.write().await;
        guard.insert(record.key.as_str().to_string(), record.clone());
        Ok(())
    }

    async fn delete_expired(&self, now: OffsetDateTime) -> Result<u64, RepoError> {
        let mut guard = self.entries.write().await;
        let before = guard.len();
        guard.retain(|_, record| record.is_valid_at(now));
        Ok((before - guard.len()) as u64)
    }
}
