//! Sequential pre-generation sweep over every (locality, service) pair.

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use thiserror::Error;
use time::OffsetDateTime;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::application::{
    cache_store::CacheStore, generation::ContentGenerator, generation::GenerationRequest,
    prompts::PromptLibrary,
};
use crate::domain::{
    cache_key::CacheKey,
    catalog::{ContentPair, cross_product},
    entities::{BatchOutcome, BatchSummary, FailureEntry},
    types::ServiceCategory,
};

pub const DEFAULT_PAIR_DELAY: Duration = Duration::from_secs(2);

#[derive(Debug, Error)]
pub enum JournalError {
    #[error("journal io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to encode journal entry: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Durable record of a batch run.
#[async_trait]
pub trait BatchJournal: Send + Sync {
    /// Persist one failure before the runner moves on to the next pair.
    async fn record_failure(&self, entry: &FailureEntry) -> Result<(), JournalError>;

    async fn record_summary(&self, summary: &BatchSummary) -> Result<(), JournalError>;
}

pub struct BatchRunner {
    generator: ContentGenerator,
    store: CacheStore,
    prompts: PromptLibrary,
    journal: Arc<dyn BatchJournal>,
    pair_delay: Duration,
}

impl BatchRunner {
    pub fn new(
        generator: ContentGenerator,
        store: CacheStore,
        prompts: PromptLibrary,
        journal: Arc<dyn BatchJournal>,
        pair_delay: Duration,
    ) -> Self {
        Self {
            generator,
            store,
            prompts,
            journal,
            pair_delay,
        }
    }

    /// Localities outer, services inner, both in the order given.
    pub async fn run_all(
        &self,
        localities: &[String],
        services: &[ServiceCategory],
        ttl_days: u32,
    ) -> BatchSummary {
        self.run_pairs(&cross_product(localities, services), ttl_days)
            .await
    }

    /// Process `pairs` in order. One pair failing never stops the run.
    ///
    /// The pair delay is awaited after each successful pair except the last
    /// one. Failed pairs are not followed by a delay.
    pub async fn run_pairs(&self, pairs: &[ContentPair], ttl_days: u32) -> BatchSummary {
        let run_id = Uuid::new_v4();
        let started_at = OffsetDateTime::now_utc();
        let total = pairs.len();
        let mut outcomes = Vec::with_capacity(total);

        info!(
            target = "fenceline::batch",
            %run_id,
            total_pairs = total,
            "starting content generation run"
        );

        for (index, pair) in pairs.iter().enumerate() {
            let outcome = match self.process_pair(pair, ttl_days).await {
                Ok(key) => {
                    info!(
                        target = "fenceline::batch",
                        %run_id,
                        position = index + 1,
                        total,
                        key = %key,
                        "pair generated"
                    );
                    BatchOutcome::success(pair.locality.clone(), pair.service)
                }
                Err(failure) => {
                    error!(
                        target = "fenceline::batch",
                        %run_id,
                        position = index + 1,
                        total,
                        locality = %pair.locality,
                        service = pair.service.key_slug(),
                        error = %failure.message,
                        "pair failed"
                    );
                    self.journal_failure(run_id, pair, failure.key, &failure.message)
                        .await;
                    BatchOutcome::failure(pair.locality.clone(), pair.service, failure.message)
                }
            };

            let is_last = index + 1 == total;
            let succeeded = outcome.succeeded;
            outcomes.push(outcome);

            if succeeded && !is_last && !self.pair_delay.is_zero() {
                tokio::time::sleep(self.pair_delay).await;
            }
        }

        let summary =
            BatchSummary::from_outcomes(run_id, started_at, OffsetDateTime::now_utc(), outcomes);

        info!(
            target = "fenceline::batch",
            %run_id,
            total_pairs = summary.total_pairs,
            succeeded = summary.succeeded_count,
            failed = summary.failed_count,
            "content generation run finished"
        );

        if let Err(err) = self.journal.record_summary(&summary).await {
            warn!(
                target = "fenceline::batch",
                %run_id,
                error = %err,
                "failed to write batch summary"
            );
        }

        summary
    }

    async fn process_pair(
        &self,
        pair: &ContentPair,
        ttl_days: u32,
    ) -> Result<CacheKey, PairFailure> {
        let key = CacheKey::derive(&pair.locality, pair.service).map_err(|err| PairFailure {
            key: None,
            message: err.to_string(),
        })?;

        let request = GenerationRequest {
            prompt: self.prompts.render_for(&pair.locality, pair.service),
            locality: pair.locality.trim().to_string(),
            service: pair.service,
        };

        let content = self
            .generator
            .generate(&request)
            .await
            .map_err(|err| PairFailure {
                key: Some(key.clone()),
                message: err.to_string(),
            })?;

        self.store
            .put(&key, &content, ttl_days)
            .await
            .map_err(|err| PairFailure {
                key: Some(key.clone()),
                message: format!("failed to store generated content: {err}"),
            })?;

        Ok(key)
    }

    async fn journal_failure(
        &self,
        run_id: Uuid,
        pair: &ContentPair,
        key: Option<CacheKey>,
        message: &str,
    ) {
        let entry = FailureEntry {
            run_id,
            timestamp: OffsetDateTime::now_utc(),
            locality: pair.locality.clone(),
            service: pair.service,
            key,
            error: message.to_string(),
        };

        if let Err(err) = self.journal.record_failure(&entry).await {
            warn!(
                target = "fenceline::batch",
                %run_id,
                locality = %pair.locality,
                service = pair.service.key_slug(),
                error = %err,
                "failed to journal pair failure"
            );
        }
    }
}

struct PairFailure {
    key: Option<CacheKey>,
    message: String,
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::num::NonZeroU32;
    use std::sync::Mutex;

    use tokio::time::Instant;

    use super::*;
    use crate::application::generation::{
        ProviderError, TextGenerator, testing::ScriptedGenerator,
    };
    use crate::application::repos::{ContentCacheRepo, RepoError};
    use crate::application::retry::RetryPolicy;
    use crate::domain::entities::CacheRecord;

    #[derive(Default)]
    struct MemoryRepo {
        rows: Mutex<HashMap<String, CacheRecord>>,
    }

    #[async_trait]
    impl ContentCacheRepo for MemoryRepo {
        async fn find_valid(
            &self,
            key: &CacheKey,
            _now: OffsetDateTime,
        ) -> Result<Option<CacheRecord>, RepoError> {
            Ok(self.rows.lock().unwrap().get(key.as_str()).cloned())
        }

        async fn upsert(&self, record: &CacheRecord) -> Result<(), RepoError> {
            self.rows
                .lock()
                .unwrap()
                .insert(record.key.as_str().to_string(), record.clone());
            Ok(())
        }

        async fn delete_expired(&self, _now: OffsetDateTime) -> Result<u64, RepoError> {
            Ok(0)
        }
    }

    #[derive(Default)]
    struct RecordingJournal {
        failures: Mutex<Vec<FailureEntry>>,
        summaries: Mutex<Vec<BatchSummary>>,
    }

    #[async_trait]
    impl BatchJournal for RecordingJournal {
        async fn record_failure(&self, entry: &FailureEntry) -> Result<(), JournalError> {
            self.failures.lock().unwrap().push(entry.clone());
            Ok(())
        }

        async fn record_summary(&self, summary: &BatchSummary) -> Result<(), JournalError> {
            self.summaries.lock().unwrap().push(summary.clone());
            Ok(())
        }
    }

    /// Fails every request for the listed localities; succeeds otherwise.
    struct LocalityFailures {
        failing: Vec<&'static str>,
        seen: Mutex<Vec<(String, ServiceCategory)>>,
    }

    #[async_trait]
    impl TextGenerator for LocalityFailures {
        async fn complete(&self, request: &GenerationRequest) -> Result<String, ProviderError> {
            self.seen
                .lock()
                .unwrap()
                .push((request.locality.clone(), request.service));
            if self.failing.contains(&request.locality.as_str()) {
                Err(ProviderError::Status {
                    status: 503,
                    message: "overloaded".into(),
                })
            } else {
                Ok(format!("{} in {}", request.service, request.locality))
            }
        }
    }

    fn single_attempt() -> RetryPolicy {
        RetryPolicy::new(NonZeroU32::MIN, Duration::ZERO)
    }

    fn runner(
        provider: Arc<dyn TextGenerator>,
        repo: Arc<MemoryRepo>,
        journal: Arc<RecordingJournal>,
        pair_delay: Duration,
    ) -> BatchRunner {
        BatchRunner::new(
            ContentGenerator::new(provider, single_attempt()),
            CacheStore::new(repo),
            PromptLibrary::new(),
            journal,
            pair_delay,
        )
    }

    fn localities(names: &[&str]) -> Vec<String> {
        names.iter().map(|name| name.to_string()).collect()
    }

    #[tokio::test]
    async fn partial_failures_are_counted_and_journaled() {
        let provider = Arc::new(LocalityFailures {
            failing: vec!["Frisco"],
            seen: Mutex::new(Vec::new()),
        });
        let repo = Arc::new(MemoryRepo::default());
        let journal = Arc::new(RecordingJournal::default());
        let runner = runner(provider, repo.clone(), journal.clone(), Duration::ZERO);
        let services = [ServiceCategory::Residential, ServiceCategory::Commercial];

        let summary = runner
            .run_all(
                &localities(&["Plano", "Allen", "Frisco", "McKinney", "Wylie"]),
                &services,
                365,
            )
            .await;

        assert_eq!(summary.total_pairs, 10);
        assert_eq!(summary.succeeded_count, 8);
        assert_eq!(summary.failed_count, 2);
        assert!(!summary.is_success());
        assert_eq!(repo.rows.lock().unwrap().len(), 8);

        let failures = journal.failures.lock().unwrap();
        assert_eq!(failures.len(), 2);
        assert!(failures.iter().all(|entry| entry.run_id == summary.run_id));
        assert_eq!(
            failures[1].key.as_ref().map(CacheKey::as_str),
            Some("frisco-commercial-fencing-dynamic")
        );

        let summaries = journal.summaries.lock().unwrap();
        assert_eq!(summaries.as_slice(), &[summary.clone()]);
    }

    #[tokio::test]
    async fn pairs_run_locality_major_in_declaration_order() {
        let provider = Arc::new(LocalityFailures {
            failing: Vec::new(),
            seen: Mutex::new(Vec::new()),
        });
        let runner = runner(
            provider.clone(),
            Arc::new(MemoryRepo::default()),
            Arc::new(RecordingJournal::default()),
            Duration::ZERO,
        );

        runner
            .run_all(&localities(&["DFW", "Plano"]), &ServiceCategory::ALL, 30)
            .await;

        let seen = provider.seen.lock().unwrap();
        let expected: Vec<(String, ServiceCategory)> = ["DFW", "Plano"]
            .into_iter()
            .flat_map(|locality| {
                ServiceCategory::ALL
                    .into_iter()
                    .map(move |service| (locality.to_string(), service))
            })
            .collect();
        assert_eq!(*seen, expected);
    }

    #[tokio::test(start_paused = true)]
    async fn delay_follows_successes_only() {
        let provider = Arc::new(LocalityFailures {
            failing: vec!["Frisco"],
            seen: Mutex::new(Vec::new()),
        });
        let runner = runner(
            provider,
            Arc::new(MemoryRepo::default()),
            Arc::new(RecordingJournal::default()),
            Duration::from_secs(2),
        );
        let started = Instant::now();

        // Plano ok (delay), Frisco fails (no delay), Allen ok but last (no delay).
        runner
            .run_all(
                &localities(&["Plano", "Frisco", "Allen"]),
                &[ServiceCategory::Residential],
                30,
            )
            .await;

        assert_eq!(started.elapsed(), Duration::from_secs(2));
    }

    #[tokio::test]
    async fn invalid_locality_fails_without_calling_the_provider() {
        let provider = Arc::new(ScriptedGenerator::new([Ok("copy".to_string())]));
        let journal = Arc::new(RecordingJournal::default());
        let runner = runner(
            provider.clone(),
            Arc::new(MemoryRepo::default()),
            journal.clone(),
            Duration::ZERO,
        );

        let summary = runner
            .run_pairs(
                &[
                    ContentPair::new("   ", ServiceCategory::Residential),
                    ContentPair::new("Plano", ServiceCategory::Residential),
                ],
                30,
            )
            .await;

        assert_eq!(summary.failed_count, 1);
        assert_eq!(provider.call_count(), 1);
        let failures = journal.failures.lock().unwrap();
        assert!(failures[0].key.is_none());
    }

    #[tokio::test]
    async fn store_failure_marks_pair_failed() {
        let provider = Arc::new(ScriptedGenerator::new([Ok("copy".to_string())]));
        let journal = Arc::new(RecordingJournal::default());
        let runner = runner(
            provider,
            Arc::new(MemoryRepo::default()),
            journal.clone(),
            Duration::ZERO,
        );

        // ttl of zero is rejected by the store after generation succeeded.
        let summary = runner
            .run_pairs(&[ContentPair::new("Plano", ServiceCategory::Residential)], 0)
            .await;

        assert_eq!(summary.failed_count, 1);
        let failures = journal.failures.lock().unwrap();
        assert!(failures[0].error.starts_with("failed to store generated content"));
    }

    #[tokio::test]
    async fn empty_run_produces_empty_summary() {
        let journal = Arc::new(RecordingJournal::default());
        let runner = runner(
            Arc::new(ScriptedGenerator::default()),
            Arc::new(MemoryRepo::default()),
            journal.clone(),
            DEFAULT_PAIR_DELAY,
        );

        let summary = runner.run_pairs(&[], 30).await;

        assert_eq!(summary.total_pairs, 0);
        assert!(summary.is_success());
        assert_eq!(journal.summaries.lock().unwrap().len(), 1);
    }
}
