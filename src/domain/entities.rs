//! Domain entities mirrored from persistent storage and batch artifacts.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::domain::{cache_key::CacheKey, error::DomainError, types::ServiceCategory};

/// One row of the content cache. `expires_at` is strictly after `created_at`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CacheRecord {
    pub key: CacheKey,
    pub content: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub expires_at: OffsetDateTime,
}

impl CacheRecord {
    pub fn new(
        key: CacheKey,
        content: String,
        created_at: OffsetDateTime,
        expires_at: OffsetDateTime,
    ) -> Result<Self, DomainError> {
        if expires_at <= created_at {
            return Err(DomainError::invariant(format!(
                "cache record `{key}` must expire after it is created"
            )));
        }
        Ok(Self {
            key,
            content,
            created_at,
            expires_at,
        })
    }

    /// Expiry is an exclusive bound: a record is stale at `expires_at` itself.
    pub fn is_valid_at(&self, now: OffsetDateTime) -> bool {
        now < self.expires_at
    }
}

/// Result of processing one (locality, service) pair in a batch run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchOutcome {
    pub locality: String,
    pub service: ServiceCategory,
    pub succeeded: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl BatchOutcome {
    pub fn success(locality: impl Into<String>, service: ServiceCategory) -> Self {
        Self {
            locality: locality.into(),
            service,
            succeeded: true,
            error: None,
        }
    }

    pub fn failure(
        locality: impl Into<String>,
        service: ServiceCategory,
        error: impl Into<String>,
    ) -> Self {
        Self {
            locality: locality.into(),
            service,
            succeeded: false,
            error: Some(error.into()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchSummary {
    pub run_id: Uuid,
    #[serde(with = "time::serde::rfc3339")]
    pub started_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub finished_at: OffsetDateTime,
    pub total_pairs: usize,
    pub succeeded_count: usize,
    pub failed_count: usize,
    pub failures: Vec<BatchOutcome>,
}

impl BatchSummary {
    pub fn from_outcomes(
        run_id: Uuid,
        started_at: OffsetDateTime,
        finished_at: OffsetDateTime,
        outcomes: Vec<BatchOutcome>,
    ) -> Self {
        let total_pairs = outcomes.len();
        let failures: Vec<BatchOutcome> = outcomes
            .into_iter()
            .filter(|outcome| !outcome.succeeded)
            .collect();
        let failed_count = failures.len();

        Self {
            run_id,
            started_at,
            finished_at,
            total_pairs,
            succeeded_count: total_pairs - failed_count,
            failed_count,
            failures,
        }
    }

    /// Partial success is still a failed run.
    pub fn is_success(&self) -> bool {
        self.failed_count == 0
    }
}

/// Journal line written the moment a batch pair fails.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureEntry {
    pub run_id: Uuid,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
    pub locality: String,
    pub service: ServiceCategory,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<CacheKey>,
    pub error: String,
}

#[cfg(test)]
mod tests {
    use time::{Duration, macros::datetime};

    use super::*;

    fn record(expires_in: Duration) -> CacheRecord {
        let created = datetime!(2026-01-01 00:00 UTC);
        CacheRecord::new(
            CacheKey::from_raw("plano-dynamic"),
            "copy".into(),
            created,
            created + expires_in,
        )
        .expect("valid record")
    }

    #[test]
    fn record_is_expired_exactly_at_expiry() {
        let record = record(Duration::days(1));
        assert!(record.is_valid_at(record.expires_at - Duration::seconds(1)));
        assert!(!record.is_valid_at(record.expires_at));
        assert!(!record.is_valid_at(record.expires_at + Duration::seconds(1)));
    }

    #[test]
    fn record_requires_expiry_after_creation() {
        let now = datetime!(2026-01-01 00:00 UTC);
        let err = CacheRecord::new(CacheKey::from_raw("x-dynamic"), String::new(), now, now)
            .expect_err("zero lifetime");
        assert!(matches!(err, DomainError::Invariant { .. }));
    }

    #[test]
    fn summary_counts_failures() {
        let now = datetime!(2026-01-01 00:00 UTC);
        let outcomes = vec![
            BatchOutcome::success("Plano", ServiceCategory::Residential),
            BatchOutcome::failure("Plano", ServiceCategory::Commercial, "boom"),
            BatchOutcome::success("Allen", ServiceCategory::Residential),
        ];
        let summary = BatchSummary::from_outcomes(Uuid::new_v4(), now, now, outcomes);

        assert_eq!(summary.total_pairs, 3);
        assert_eq!(summary.succeeded_count, 2);
        assert_eq!(summary.failed_count, 1);
        assert_eq!(summary.failures[0].service, ServiceCategory::Commercial);
        assert!(!summary.is_success());
    }
}
