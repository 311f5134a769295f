//! Read-through / write-through coordination for page content.

use metrics::counter;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::application::{
    cache_store::{CacheStore, CacheStoreError},
    generation::{ContentGenerator, GenerationError, GenerationRequest},
    prompts::{self, PromptLibrary},
};
use crate::domain::{
    cache_key::CacheKey, entities::CacheRecord, error::DomainError, fallback::fallback_content,
    types::ServiceCategory,
};

/// Where the returned content came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentSource {
    Cache,
    Generated,
    /// Generated, but the cache write failed; the next miss will generate again.
    GeneratedUnsaved,
    Fallback,
}

#[derive(Debug, Clone, Serialize)]
pub struct ContentResponse {
    pub key: CacheKey,
    pub locality: String,
    pub service: ServiceCategory,
    pub source: ContentSource,
    pub content: String,
}

#[derive(Debug, Error)]
pub enum RegenerateError {
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error(transparent)]
    Generation(#[from] GenerationError),
    #[error("failed to persist generated content: {0}")]
    Store(#[from] CacheStoreError),
}

/// Stateless between calls; concurrent calls coordinate only through the store.
#[derive(Clone)]
pub struct ContentOrchestrator {
    store: CacheStore,
    generator: ContentGenerator,
    prompts: PromptLibrary,
    ttl_days: u32,
}

impl ContentOrchestrator {
    pub fn new(
        store: CacheStore,
        generator: ContentGenerator,
        prompts: PromptLibrary,
        ttl_days: u32,
    ) -> Self {
        Self {
            store,
            generator,
            prompts,
            ttl_days,
        }
    }

    pub fn store(&self) -> &CacheStore {
        &self.store
    }

    /// Serve content using the configured prompt template and TTL.
    pub async fn content_for(
        &self,
        locality: &str,
        service: ServiceCategory,
    ) -> Result<ContentResponse, DomainError> {
        let template = self.prompts.template_for(service).to_string();
        self.get_or_generate(locality, service, &template, self.ttl_days)
            .await
    }

    /// Return cached content, generating and caching it on a miss.
    ///
    /// Generation and storage failures never surface here: a failed write
    /// still returns the generated copy and exhausted generation returns the
    /// static fallback. Only a locality that yields no key is an error.
    pub async fn get_or_generate(
        &self,
        locality: &str,
        service: ServiceCategory,
        prompt_template: &str,
        ttl_days: u32,
    ) -> Result<ContentResponse, DomainError> {
        let key = CacheKey::derive(locality, service)?;
        let locality = locality.trim().to_string();

        match self.store.get(&key).await {
            Ok(Some(record)) => {
                counter!("fenceline_content_cache_hit_total").increment(1);
                debug!(key = %key, "content cache hit");
                return Ok(ContentResponse {
                    key,
                    locality,
                    service,
                    source: ContentSource::Cache,
                    content: record.content,
                });
            }
            Ok(None) => {
                counter!("fenceline_content_cache_miss_total").increment(1);
                debug!(key = %key, "content cache miss");
            }
            Err(err) => {
                counter!("fenceline_content_cache_miss_total").increment(1);
                warn!(key = %key, error = %err, "content cache read failed; treating as miss");
            }
        }

        let request = GenerationRequest {
            prompt: prompts::render(prompt_template, &locality, service),
            locality: locality.clone(),
            service,
        };

        let content = match self.generator.generate(&request).await {
            Ok(content) => content,
            Err(err) => {
                counter!("fenceline_content_fallback_total").increment(1);
                warn!(key = %key, error = %err, "serving fallback content");
                return Ok(ContentResponse {
                    content: fallback_content(&locality, service),
                    key,
                    locality,
                    service,
                    source: ContentSource::Fallback,
                });
            }
        };

        let source = match self.store.put(&key, &content, ttl_days).await {
            Ok(record) => {
                info!(key = %key, expires_at = %record.expires_at, "cached generated content");
                ContentSource::Generated
            }
            Err(err) => {
                counter!("fenceline_cache_write_failure_total").increment(1);
                warn!(key = %key, error = %err, "failed to cache generated content");
                ContentSource::GeneratedUnsaved
            }
        };

        Ok(ContentResponse {
            key,
            locality,
            service,
            source,
            content,
        })
    }

    /// Generate fresh copy for one pair regardless of what is cached.
    ///
    /// Operator path: failures are returned instead of replaced by fallback copy.
    pub async fn regenerate(
        &self,
        locality: &str,
        service: ServiceCategory,
    ) -> Result<CacheRecord, RegenerateError> {
        let key = CacheKey::derive(locality, service)?;
        let request = GenerationRequest {
            prompt: self.prompts.render_for(locality, service),
            locality: locality.trim().to_string(),
            service,
        };

        let content = self.generator.generate(&request).await?;
        let record = self.store.put(&key, &content, self.ttl_days).await?;
        info!(
            target = "fenceline::regenerate",
            key = %key,
            expires_at = %record.expires_at,
            "regenerated content"
        );
        Ok(record)
    }
}
