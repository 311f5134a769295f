use std::collections::VecDeque;
use std::num::NonZeroU32;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use fenceline::application::batch::BatchRunner;
use fenceline::application::cache_store::CacheStore;
use fenceline::application::generation::{
    ContentGenerator, GenerationRequest, ProviderError, TextGenerator,
};
use fenceline::application::orchestrator::{ContentOrchestrator, ContentSource};
use fenceline::application::prompts::PromptLibrary;
use fenceline::application::retry::RetryPolicy;
use fenceline::domain::catalog::ContentPair;
use fenceline::domain::types::ServiceCategory;
use fenceline::infra::cache::InMemoryContentCache;
use fenceline::infra::journal::{FileBatchJournal, read_failure_pairs};
use tokio::time::Instant;

/// Each listed locality fails one call with a 503, then succeeds.
struct FlakyProvider {
    outages: Mutex<VecDeque<&'static str>>,
    calls: Mutex<Vec<String>>,
}

impl FlakyProvider {
    fn new(outages: impl IntoIterator<Item = &'static str>) -> Self {
        Self {
            outages: Mutex::new(outages.into_iter().collect()),
            calls: Mutex::new(Vec::new()),
        }
    }

    fn calls(&self) -> Vec<String> {
        self.calls.lock().expect("calls lock").clone()
    }
}

#[async_trait]
impl TextGenerator for FlakyProvider {
    async fn complete(&self, request: &GenerationRequest) -> Result<String, ProviderError> {
        self.calls
            .lock()
            .expect("calls lock")
            .push(format!("{}|{}", request.locality, request.service.key_slug()));

        let mut outages = self.outages.lock().expect("outages lock");
        if let Some(position) = outages
            .iter()
            .position(|locality| *locality == request.locality)
        {
            outages.remove(position);
            return Err(ProviderError::Status {
                status: 503,
                message: "overloaded".into(),
            });
        }

        Ok(format!(
            "## {} in {}\n\nLocal crews, free estimates.",
            request.service, request.locality
        ))
    }
}

fn generator(provider: Arc<FlakyProvider>, attempts: u32) -> ContentGenerator {
    ContentGenerator::new(
        provider,
        RetryPolicy::new(
            NonZeroU32::new(attempts).expect("non-zero attempts"),
            Duration::from_secs(5),
        ),
    )
}

#[tokio::test(start_paused = true)]
async fn plano_commercial_is_generated_once_and_served_from_cache() {
    let cache = InMemoryContentCache::new();
    let provider = Arc::new(FlakyProvider::new([]));
    let orchestrator = ContentOrchestrator::new(
        CacheStore::new(Arc::new(cache.clone())),
        generator(provider.clone(), 3),
        PromptLibrary::new(),
        365,
    );

    let first = orchestrator
        .content_for("Plano", ServiceCategory::Commercial)
        .await
        .expect("content");
    let second = orchestrator
        .content_for("Plano", ServiceCategory::Commercial)
        .await
        .expect("content");

    assert_eq!(first.key.as_str(), "plano-commercial-fencing-dynamic");
    assert_eq!(first.source, ContentSource::Generated);
    assert_eq!(second.source, ContentSource::Cache);
    assert_eq!(first.content, second.content);
    assert_eq!(provider.calls().len(), 1);

    let record = cache
        .peek("plano-commercial-fencing-dynamic")
        .await
        .expect("cached row");
    assert_eq!(
        record.expires_at - record.created_at,
        time::Duration::days(365)
    );
}

#[tokio::test(start_paused = true)]
async fn dfw_default_service_recovers_on_third_attempt() {
    let provider = Arc::new(FlakyProvider::new(["DFW", "DFW"]));
    let orchestrator = ContentOrchestrator::new(
        CacheStore::new(Arc::new(InMemoryContentCache::new())),
        generator(provider.clone(), 3),
        PromptLibrary::new(),
        365,
    );
    let started = Instant::now();

    let response = orchestrator
        .content_for("DFW", ServiceCategory::Residential)
        .await
        .expect("content");

    assert_eq!(response.key.as_str(), "dfw-dynamic");
    assert_eq!(response.source, ContentSource::Generated);
    assert_eq!(provider.calls().len(), 3);
    assert_eq!(started.elapsed(), Duration::from_secs(10));
}

#[tokio::test(start_paused = true)]
async fn identical_runs_report_identical_counts() {
    let dir = tempfile::tempdir().expect("tempdir");
    let provider = Arc::new(FlakyProvider::new([]));
    let runner = BatchRunner::new(
        generator(provider.clone(), 3),
        CacheStore::new(Arc::new(InMemoryContentCache::new())),
        PromptLibrary::new(),
        Arc::new(FileBatchJournal::new(
            dir.path().join("failures.jsonl"),
            dir.path().join("summary.json"),
        )),
        Duration::from_secs(2),
    );
    let localities: Vec<String> = ["DFW", "Fort Worth", "Plano", "McKinney"]
        .iter()
        .map(|name| name.to_string())
        .collect();

    let first = runner
        .run_all(&localities, &ServiceCategory::ALL, 365)
        .await;
    let calls_after_first = provider.calls();
    let second = runner
        .run_all(&localities, &ServiceCategory::ALL, 365)
        .await;

    assert_eq!(first.total_pairs, localities.len() * ServiceCategory::ALL.len());
    assert_eq!(
        (first.total_pairs, first.succeeded_count, first.failed_count),
        (second.total_pairs, second.succeeded_count, second.failed_count)
    );
    assert_eq!(first.failed_count, 0);
    assert_ne!(first.run_id, second.run_id);
    let calls = provider.calls();
    assert_eq!(&calls[calls_after_first.len()..], calls_after_first.as_slice());
    assert!(!dir.path().join("failures.jsonl").exists());
}

#[tokio::test(start_paused = true)]
async fn failed_pairs_can_be_retried_from_the_journal() {
    let dir = tempfile::tempdir().expect("tempdir");
    let failure_log = dir.path().join("failures.jsonl");
    let cache = InMemoryContentCache::new();
    let provider = Arc::new(FlakyProvider::new(["Frisco", "Frisco"]));
    let localities: Vec<String> = ["Plano", "Frisco", "Allen"]
        .iter()
        .map(|name| name.to_string())
        .collect();
    let services = [ServiceCategory::Residential, ServiceCategory::Commercial];

    let runner = BatchRunner::new(
        generator(provider.clone(), 1),
        CacheStore::new(Arc::new(cache.clone())),
        PromptLibrary::new(),
        Arc::new(FileBatchJournal::new(
            failure_log.clone(),
            dir.path().join("summary.json"),
        )),
        Duration::from_secs(2),
    );

    let first = runner.run_all(&localities, &services, 365).await;
    assert_eq!(first.total_pairs, 6);
    assert_eq!(first.failed_count, 2);
    assert_eq!(cache.len().await, 4);

    let pairs = read_failure_pairs(&failure_log).await.expect("pairs");
    assert_eq!(
        pairs,
        vec![
            ContentPair::new("Frisco", ServiceCategory::Residential),
            ContentPair::new("Frisco", ServiceCategory::Commercial),
        ]
    );

    let retry = runner.run_pairs(&pairs, 365).await;
    assert!(retry.is_success());
    assert_eq!(cache.len().await, 6);
    assert!(cache.peek("frisco-commercial-fencing-dynamic").await.is_some());

    let summary: serde_json::Value = serde_json::from_str(
        &std::fs::read_to_string(dir.path().join("summary.json")).expect("summary file"),
    )
    .expect("summary json");
    assert_eq!(summary["run_id"], retry.run_id.to_string());
    assert_eq!(summary["failed_count"], 0);
}
