//! File-backed batch journal: JSON lines for failures, one JSON document per summary.

use std::{
    collections::HashSet,
    path::{Path, PathBuf},
};

use async_trait::async_trait;
use tokio::{
    fs::{self, OpenOptions},
    io::AsyncWriteExt,
    sync::Mutex,
};

use crate::{
    application::batch::{BatchJournal, JournalError},
    domain::{
        catalog::ContentPair,
        entities::{BatchSummary, FailureEntry},
    },
};

#[derive(Debug)]
pub struct FileBatchJournal {
    failure_log: PathBuf,
    summary_path: PathBuf,
    write_lock: Mutex<()>,
}

impl FileBatchJournal {
    pub fn new(failure_log: impl Into<PathBuf>, summary_path: impl Into<PathBuf>) -> Self {
        Self {
            failure_log: failure_log.into(),
            summary_path: summary_path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn failure_log(&self) -> &Path {
        &self.failure_log
    }

    pub fn summary_path(&self) -> &Path {
        &self.summary_path
    }
}

async fn ensure_parent(path: &Path) -> Result<(), JournalError> {
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent).await?;
    }
    Ok(())
}

#[async_trait]
impl BatchJournal for FileBatchJournal {
    async fn record_failure(&self, entry: &FailureEntry) -> Result<(), JournalError> {
        let mut line = serde_json::to_vec(entry)?;
        line.push(b'\n');

        let _guard = self.write_lock.lock().await;
        ensure_parent(&self.failure_log).await?;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.failure_log)
            .await?;
        file.write_all(&line).await?;
        file.flush().await?;
        file.sync_data().await?;
        Ok(())
    }

    async fn record_summary(&self, summary: &BatchSummary) -> Result<(), JournalError> {
        let document = serde_json::to_vec_pretty(summary)?;

        let _guard = self.write_lock.lock().await;
        ensure_parent(&self.summary_path).await?;
        fs::write(&self.summary_path, document).await?;
        Ok(())
    }
}

/// Read the (locality, service) pairs recorded in a failure log.
///
/// Pairs keep the order of their first appearance; repeats are dropped.
pub async fn read_failure_pairs(path: &Path) -> Result<Vec<ContentPair>, JournalError> {
    let raw = fs::read_to_string(path).await?;
    let mut seen = HashSet::new();
    let mut pairs = Vec::new();

    for line in raw.lines().filter(|line| !line.trim().is_empty()) {
        let entry: FailureEntry = serde_json::from_str(line)?;
        let pair = ContentPair::new(entry.locality, entry.service);
        if seen.insert(pair.clone()) {
            pairs.push(pair);
        }
    }

    Ok(pairs)
}

#[cfg(test)]
mod tests {
    use time::OffsetDateTime;
    use uuid::Uuid;

    use super::*;
    use crate::domain::{
        cache_key::CacheKey,
        entities::BatchOutcome,
        types::ServiceCategory,
    };

    fn entry(run_id: Uuid, locality: &str, service: ServiceCategory) -> FailureEntry {
        FailureEntry {
            run_id,
            timestamp: OffsetDateTime::now_utc(),
            locality: locality.to_string(),
            service,
            key: CacheKey::derive(locality, service).ok(),
            error: "provider returned status 503: overloaded".to_string(),
        }
    }

    #[tokio::test]
    async fn failures_append_as_json_lines() {
        let dir = tempfile::tempdir().expect("tempdir");
        let journal = FileBatchJournal::new(
            dir.path().join("logs/failures.jsonl"),
            dir.path().join("logs/summary.json"),
        );
        let run_id = Uuid::new_v4();

        journal
            .record_failure(&entry(run_id, "Plano", ServiceCategory::Commercial))
            .await
            .expect("first");
        journal
            .record_failure(&entry(run_id, "Frisco", ServiceCategory::Residential))
            .await
            .expect("second");

        let raw = std::fs::read_to_string(journal.failure_log()).expect("log");
        let lines: Vec<&str> = raw.lines().collect();
        assert_eq!(lines.len(), 2);
        let first: serde_json::Value = serde_json::from_str(lines[0]).expect("json");
        assert_eq!(first["locality"], "Plano");
        assert_eq!(first["service"], "commercial");
        assert_eq!(first["key"], "plano-commercial-fencing-dynamic");
    }

    #[tokio::test]
    async fn summary_overwrites_previous_document() {
        let dir = tempfile::tempdir().expect("tempdir");
        let journal = FileBatchJournal::new(
            dir.path().join("failures.jsonl"),
            dir.path().join("summary.json"),
        );
        let now = OffsetDateTime::now_utc();

        for failed in [true, false] {
            let outcomes = if failed {
                vec![BatchOutcome::failure("Plano", ServiceCategory::Residential, "x")]
            } else {
                vec![BatchOutcome::success("Plano", ServiceCategory::Residential)]
            };
            let summary = BatchSummary::from_outcomes(Uuid::new_v4(), now, now, outcomes);
            journal.record_summary(&summary).await.expect("summary");
        }

        let raw = std::fs::read_to_string(journal.summary_path()).expect("summary");
        let summary: BatchSummary = serde_json::from_str(&raw).expect("decode");
        assert!(summary.is_success());
        assert_eq!(summary.total_pairs, 1);
    }

    #[tokio::test]
    async fn failure_pairs_are_deduplicated_in_log_order() {
        let dir = tempfile::tempdir().expect("tempdir");
        let journal = FileBatchJournal::new(
            dir.path().join("failures.jsonl"),
            dir.path().join("summary.json"),
        );
        let first_run = Uuid::new_v4();
        let second_run = Uuid::new_v4();

        for (run_id, locality, service) in [
            (first_run, "Plano", ServiceCategory::Commercial),
            (first_run, "Allen", ServiceCategory::FenceRepair),
            (second_run, "Plano", ServiceCategory::Commercial),
            (second_run, "DFW", ServiceCategory::Residential),
        ] {
            journal
                .record_failure(&entry(run_id, locality, service))
                .await
                .expect("record");
        }

        let pairs = read_failure_pairs(journal.failure_log())
            .await
            .expect("pairs");

        assert_eq!(
            pairs,
            vec![
                ContentPair::new("Plano", ServiceCategory::Commercial),
                ContentPair::new("Allen", ServiceCategory::FenceRepair),
                ContentPair::new("DFW", ServiceCategory::Residential),
            ]
        );
    }

    #[tokio::test]
    async fn missing_log_is_an_io_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let err = read_failure_pairs(&dir.path().join("absent.jsonl"))
            .await
            .expect_err("missing");
        assert!(matches!(err, JournalError::Io(_)));
    }
}
