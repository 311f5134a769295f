use std::sync::Once;

use metrics::{Unit, describe_counter, describe_histogram};
use tracing_error::ErrorLayer;
use tracing_subscriber::{
    EnvFilter, fmt,
    layer::{Layer, SubscriberExt},
    util::SubscriberInitExt,
};

use crate::config::{LogFormat, LoggingSettings};

use super::error::InfraError;

static METRIC_DESCRIPTIONS: Once = Once::new();

/// Install a global tracing subscriber using the provided logging settings.
pub fn init(logging: &LoggingSettings) -> Result<(), InfraError> {
    describe_metrics();

    let env_filter = EnvFilter::builder()
        .with_default_directive(logging.level.into())
        .from_env_lossy();

    let fmt_layer = match logging.format {
        LogFormat::Json => fmt::layer()
            .json()
            .with_current_span(true)
            .with_span_list(true)
            .with_target(true)
            .boxed(),
        LogFormat::Compact => fmt::layer().compact().with_target(true).boxed(),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(ErrorLayer::default())
        .with(fmt_layer)
        .try_init()
        .map_err(|err| {
            InfraError::telemetry(format!("failed to install tracing subscriber: {err}"))
        })
}

fn describe_metrics() {
    METRIC_DESCRIPTIONS.call_once(|| {
        describe_counter!(
            "fenceline_content_cache_hit_total",
            Unit::Count,
            "Content requests served from a valid cache record."
        );
        describe_counter!(
            "fenceline_content_cache_miss_total",
            Unit::Count,
            "Content requests that found no valid cache record."
        );
        describe_counter!(
            "fenceline_content_fallback_total",
            Unit::Count,
            "Content requests answered with static fallback copy."
        );
        describe_counter!(
            "fenceline_generation_attempt_total",
            Unit::Count,
            "Individual calls made to the text-generation provider."
        );
        describe_counter!(
            "fenceline_generation_failure_total",
            Unit::Count,
            "Generations that failed after exhausting every attempt."
        );
        describe_counter!(
            "fenceline_cache_write_failure_total",
            Unit::Count,
            "Generated content that could not be written to the cache."
        );
        describe_histogram!(
            "fenceline_generation_ms",
            Unit::Milliseconds,
            "Latency of a single provider call in milliseconds."
        );
    });
}
