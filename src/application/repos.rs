//! Repository traits describing persistence adapters.

use async_trait::async_trait;
use thiserror::Error;
use time::OffsetDateTime;

use crate::domain::{cache_key::CacheKey, entities::CacheRecord};

#[derive(Debug, Error)]
pub enum RepoError {
    #[error("persistence error: {0}")]
    Persistence(String),
    #[error("resource not found")]
    NotFound,
    #[error("invalid input: {message}")]
    InvalidInput { message: String },
    #[error("integrity error: {message}")]
    Integrity { message: String },
    #[error("database timeout")]
    Timeout,
}

impl RepoError {
    pub fn from_persistence(err: impl std::fmt::Display) -> Self {
        Self::Persistence(err.to_string())
    }
}

/// Storage for generated copy, one row per cache key.
///
/// Implementations must tolerate concurrent readers and upserts; the last
/// upsert for a key wins.
#[async_trait]
pub trait ContentCacheRepo: Send + Sync {
    /// Return the record for `key` when it is still valid at `now`.
    async fn find_valid(
        &self,
        key: &CacheKey,
        now: OffsetDateTime,
    ) -> Result<Option<CacheRecord>, RepoError>;

    /// Insert the record or replace the existing row with the same key.
    async fn upsert(&self, record: &CacheRecord) -> Result<(), RepoError>;

    /// Remove rows whose expiry is at or before `now`; returns the number removed.
    async fn delete_expired(&self, now: OffsetDateTime) -> Result<u64, RepoError>;
}
