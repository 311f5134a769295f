use async_trait::async_trait;
use time::OffsetDateTime;

use crate::{
    application::repos::{ContentCacheRepo, RepoError},
    domain::{cache_key::CacheKey, entities::CacheRecord},
};

use super::{PostgresRepositories, map_sqlx_error};

#[derive(sqlx::FromRow)]
struct ContentCacheRow {
    cache_key: String,
    content: String,
    created_at: OffsetDateTime,
    expires_at: OffsetDateTime,
}

impl TryFrom<ContentCacheRow> for CacheRecord {
    type Error = RepoError;

    fn try_from(row: ContentCacheRow) -> Result<Self, Self::Error> {
        CacheRecord::new(
            CacheKey::from_raw(row.cache_key),
            row.content,
            row.created_at,
            row.expires_at,
        )
        .map_err(|err| RepoError::Integrity {
            message: err.to_string(),
        })
    }
}

#[async_trait]
impl ContentCacheRepo for PostgresRepositories {
    async fn find_valid(
        &self,
        key: &CacheKey,
        now: OffsetDateTime,
    ) -> Result<Option<CacheRecord>, RepoError> {
        let row = sqlx::query_as::<_, ContentCacheRow>(
            r#"
            SELECT cache_key, content, created_at, expires_at
            FROM content_cache
            WHERE cache_key = $1 AND expires_at > $2
            "#,
        )
        .bind(key.as_str())
        .bind(now)
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        row.map(CacheRecord::try_from).transpose()
    }

    async fn upsert(&self, record: &CacheRecord) -> Result<(), RepoError> {
        sqlx::query(
            r#"
            INSERT INTO content_cache (cache_key, content, created_at, expires_at)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (cache_key) DO UPDATE
            SET content = EXCLUDED.content,
                created_at = EXCLUDED.created_at,
                expires_at = EXCLUDED.expires_at
            "#,
        )
        .bind(record.key.as_str())
        .bind(&record.content)
        .bind(record.created_at)
        .bind(record.expires_at)
        .execute(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(())
    }

    async fn delete_expired(&self, now: OffsetDateTime) -> Result<u64, RepoError> {
        let result = sqlx::query(
            r#"
            DELETE FROM content_cache
            WHERE expires_at <= $1
            "#,
        )
        .bind(now)
        .execute(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(result.rows_affected())
    }
}
