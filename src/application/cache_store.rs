//! TTL semantics over a [`ContentCacheRepo`].

use std::sync::Arc;

use thiserror::Error;
use time::{Duration, OffsetDateTime};

use crate::application::repos::{ContentCacheRepo, RepoError};
use crate::domain::{cache_key::CacheKey, entities::CacheRecord, error::DomainError};

#[derive(Debug, Error)]
pub enum CacheStoreError {
    #[error(transparent)]
    Repo(#[from] RepoError),
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error("ttl must be between 1 and {} days", MAX_TTL_DAYS)]
    InvalidTtl,
}

/// Longest accepted TTL, one hundred years.
pub const MAX_TTL_DAYS: u32 = 36_500;

/// Reads return only records that are still valid; writes replace by key.
///
/// Expiry is checked lazily on read. Nothing sweeps the table unless an
/// operator runs [`CacheStore::purge_expired`].
#[derive(Clone)]
pub struct CacheStore {
    repo: Arc<dyn ContentCacheRepo>,
}

impl CacheStore {
    pub fn new(repo: Arc<dyn ContentCacheRepo>) -> Self {
        Self { repo }
    }

    pub async fn get(&self, key: &CacheKey) -> Result<Option<CacheRecord>, CacheStoreError> {
        self.get_at(key, OffsetDateTime::now_utc()).await
    }

    pub async fn get_at(
        &self,
        key: &CacheKey,
        now: OffsetDateTime,
    ) -> Result<Option<CacheRecord>, CacheStoreError> {
        let record = self.repo.find_valid(key, now).await?;
        Ok(record.filter(|record| record.is_valid_at(now)))
    }

    pub async fn put(
        &self,
        key: &CacheKey,
        content: &str,
        ttl_days: u32,
    ) -> Result<CacheRecord, CacheStoreError> {
        self.put_at(key, content, ttl_days, OffsetDateTime::now_utc())
            .await
    }

    pub async fn put_at(
        &self,
        key: &CacheKey,
        content: &str,
        ttl_days: u32,
        now: OffsetDateTime,
    ) -> Result<CacheRecord, CacheStoreError> {
        if ttl_days == 0 || ttl_days > MAX_TTL_DAYS {
            return Err(CacheStoreError::InvalidTtl);
        }

        let expires_at = now
            .checked_add(Duration::days(i64::from(ttl_days)))
            .ok_or(CacheStoreError::InvalidTtl)?;
        let record = CacheRecord::new(key.clone(), content.to_string(), now, expires_at)?;
        self.repo.upsert(&record).await?;
        Ok(record)
    }

    pub async fn purge_expired(&self) -> Result<u64, CacheStoreError> {
        let removed = self
            .repo
            .delete_expired(OffsetDateTime::now_utc())
            .await?;
        Ok(removed)
    }
}
