//! Content generation against an external text-generation provider.

use std::{sync::Arc, time::Instant};

use async_trait::async_trait;
use metrics::{counter, histogram};
use thiserror::Error;
use tracing::{error, info, warn};

use crate::application::retry::RetryPolicy;
use crate::domain::types::ServiceCategory;

/// A fully rendered prompt for one (locality, service) slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationRequest {
    pub locality: String,
    pub service: ServiceCategory,
    pub prompt: String,
}

/// Failure of a single provider round trip.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ProviderError {
    #[error("request failed: {0}")]
    Transport(String),
    #[error("request timed out")]
    Timeout,
    #[error("provider returned status {status}: {message}")]
    Status { status: u16, message: String },
    #[error("malformed provider response: {0}")]
    Malformed(String),
    #[error("provider returned empty content")]
    EmptyContent,
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("content generation failed after {attempts} attempt(s): {cause}")]
pub struct GenerationError {
    pub attempts: u32,
    #[source]
    pub cause: ProviderError,
}

/// One round trip to a text-generation backend.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn complete(&self, request: &GenerationRequest) -> Result<String, ProviderError>;
}

#[derive(Clone)]
pub struct ContentGenerator {
    provider: Arc<dyn TextGenerator>,
    retry: RetryPolicy,
}

impl ContentGenerator {
    pub fn new(provider: Arc<dyn TextGenerator>, retry: RetryPolicy) -> Self {
        Self { provider, retry }
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        self.retry
    }

    /// Generate copy for the request, retrying every kind of failure alike.
    pub async fn generate(&self, request: &GenerationRequest) -> Result<String, GenerationError> {
        let max_attempts = self.retry.max_attempts();

        let outcome = self
            .retry
            .run(|attempt| async move {
                info!(
                    target = "fenceline::generation",
                    attempt,
                    max_attempts,
                    locality = %request.locality,
                    service = request.service.key_slug(),
                    "requesting generated content"
                );
                counter!("fenceline_generation_attempt_total").increment(1);

                let started = Instant::now();
                let result = self
                    .provider
                    .complete(request)
                    .await
                    .and_then(non_empty_content);
                histogram!("fenceline_generation_ms").record(started.elapsed().as_secs_f64() * 1000.0);

                if let Err(err) = &result {
                    warn!(
                        target = "fenceline::generation",
                        attempt,
                        max_attempts,
                        locality = %request.locality,
                        service = request.service.key_slug(),
                        error = %err,
                        "generation attempt failed"
                    );
                }
                result
            })
            .await;

        outcome.map_err(|exhausted| {
            counter!("fenceline_generation_failure_total").increment(1);
            error!(
                target = "fenceline::generation",
                attempts = exhausted.attempts,
                locality = %request.locality,
                service = request.service.key_slug(),
                error = %exhausted.last_error,
                "content generation exhausted retries"
            );
            GenerationError {
                attempts: exhausted.attempts,
                cause: exhausted.last_error,
            }
        })
    }
}

fn non_empty_content(content: String) -> Result<String, ProviderError> {
    let trimmed = content.trim();
    if trimmed.is_empty() {
        return Err(ProviderError::EmptyContent);
    }
    Ok(trimmed.to_string())
}

#[cfg(test)]
pub(crate) mod testing {
    use std::collections::VecDeque;
    use std::sync::Mutex;

    use super::*;

    /// Replays scripted responses in order and records every request it saw.
    #[derive(Default)]
    pub struct ScriptedGenerator {
        responses: Mutex<VecDeque<Result<String, ProviderError>>>,
        pub requests: Mutex<Vec<GenerationRequest>>,
    }

    impl ScriptedGenerator {
        pub fn new(responses: impl IntoIterator<Item = Result<String, ProviderError>>) -> Self {
            Self {
                responses: Mutex::new(responses.into_iter().collect()),
                requests: Mutex::new(Vec::new()),
            }
        }

        pub fn call_count(&self) -> usize {
            self.requests.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl TextGenerator for ScriptedGenerator {
        async fn complete(&self, request: &GenerationRequest) -> Result<String, ProviderError> {
            self.requests.lock().unwrap().push(request.clone());
            self.responses
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(ProviderError::Transport("script exhausted".into())))
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{num::NonZeroU32, time::Duration};

    use tokio::time::Instant;

    use super::testing::ScriptedGenerator;
    use super::*;

    fn request() -> GenerationRequest {
        GenerationRequest {
            locality: "Plano".into(),
            service: ServiceCategory::Commercial,
            prompt: "Write about commercial fencing in Plano".into(),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn always_failing_provider_is_called_three_times() {
        let provider = Arc::new(ScriptedGenerator::new([
            Err(ProviderError::Timeout),
            Err(ProviderError::Status {
                status: 502,
                message: "bad gateway".into(),
            }),
            Err(ProviderError::Transport("connection reset".into())),
        ]));
        let generator = ContentGenerator::new(provider.clone(), RetryPolicy::default());
        let started = Instant::now();

        let err = generator.generate(&request()).await.expect_err("exhausted");

        assert_eq!(provider.call_count(), 3);
        assert_eq!(err.attempts, 3);
        assert_eq!(
            err.cause,
            ProviderError::Transport("connection reset".into())
        );
        assert_eq!(started.elapsed(), Duration::from_secs(10));
    }

    #[tokio::test(start_paused = true)]
    async fn empty_content_consumes_an_attempt() {
        let provider = Arc::new(ScriptedGenerator::new([
            Ok("   \n".to_string()),
            Ok("  Sturdy fences for Plano businesses.  ".to_string()),
        ]));
        let generator = ContentGenerator::new(provider.clone(), RetryPolicy::default());

        let content = generator.generate(&request()).await.expect("second attempt");

        assert_eq!(content, "Sturdy fences for Plano businesses.");
        assert_eq!(provider.call_count(), 2);
    }

    #[tokio::test]
    async fn prompt_is_passed_through_untouched() {
        let provider = Arc::new(ScriptedGenerator::new([Ok("copy".to_string())]));
        let generator = ContentGenerator::new(
            provider.clone(),
            RetryPolicy::new(NonZeroU32::MIN, Duration::ZERO),
        );

        generator.generate(&request()).await.expect("generated");

        let seen = provider.requests.lock().unwrap();
        assert_eq!(seen.as_slice(), &[request()]);
    }
}
