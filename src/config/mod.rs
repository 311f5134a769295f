//! Configuration layer: typed settings with layered precedence (file → env → CLI).

mod cli;

pub use cli::{
    CliArgs, Command, CommonOverrides, PairArgs, PurgeArgs, RegenerateAllArgs, ServeArgs,
};

use std::{
    net::SocketAddr,
    num::{NonZeroU32, NonZeroU64},
    path::PathBuf,
    str::FromStr,
    time::Duration,
};

use clap::Parser;
use config::{Config, Environment, File};
use serde::Deserialize;
use thiserror::Error;
use tracing::level_filters::LevelFilter;
use url::Url;

use crate::application::cache_store::MAX_TTL_DAYS;
use crate::application::retry::RetryPolicy;
use crate::domain::catalog::{default_localities, validate_localities};

const DEFAULT_CONFIG_BASENAME: &str = "config/default";
const LOCAL_CONFIG_BASENAME: &str = "fenceline";
const ENV_PREFIX: &str = "FENCELINE";
const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 3000;
const DEFAULT_DB_MAX_CONNECTIONS: u32 = 8;
const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
const DEFAULT_MODEL: &str = "gpt-4o-mini";
const DEFAULT_MAX_TOKENS: u32 = 1200;
const DEFAULT_TEMPERATURE: f32 = 0.7;
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 60;
const DEFAULT_MAX_ATTEMPTS: u32 = 3;
const DEFAULT_RETRY_DELAY_SECS: u64 = 5;
const DEFAULT_TTL_DAYS: u32 = 365;
const DEFAULT_PAIR_DELAY_SECS: u64 = 2;
const DEFAULT_FAILURE_LOG: &str = "logs/generation-failures.jsonl";
const DEFAULT_SUMMARY_PATH: &str = "logs/generation-summary.json";

/// Fully-resolved deployment settings after precedence resolution and validation.
#[derive(Debug, Clone)]
pub struct Settings {
    pub server: ServerSettings,
    pub logging: LoggingSettings,
    pub database: DatabaseSettings,
    pub generation: GenerationSettings,
    pub content: ContentSettings,
    pub batch: BatchSettings,
    pub catalog: CatalogSettings,
}

#[derive(Debug, Clone)]
pub struct ServerSettings {
    pub addr: SocketAddr,
}

#[derive(Debug, Clone)]
pub struct LoggingSettings {
    pub level: LevelFilter,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Copy)]
pub enum LogFormat {
    Json,
    Compact,
}

#[derive(Debug, Clone)]
pub struct DatabaseSettings {
    pub url: Option<String>,
    pub max_connections: NonZeroU32,
}

#[derive(Clone)]
pub struct GenerationSettings {
    pub api_key: Option<String>,
    /// Validated http(s) URL, without a trailing slash.
    pub base_url: String,
    pub model: String,
    pub max_tokens: NonZeroU32,
    pub temperature: f32,
    pub request_timeout: Duration,
    pub max_attempts: NonZeroU32,
    pub retry_delay: Duration,
}

impl GenerationSettings {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.max_attempts, self.retry_delay)
    }
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            max_tokens: NonZeroU32::MIN.saturating_add(DEFAULT_MAX_TOKENS - 1),
            temperature: DEFAULT_TEMPERATURE,
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            max_attempts: NonZeroU32::MIN.saturating_add(DEFAULT_MAX_ATTEMPTS - 1),
            retry_delay: Duration::from_secs(DEFAULT_RETRY_DELAY_SECS),
        }
    }
}

impl std::fmt::Debug for GenerationSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GenerationSettings")
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("max_tokens", &self.max_tokens)
            .field("temperature", &self.temperature)
            .field("request_timeout", &self.request_timeout)
            .field("max_attempts", &self.max_attempts)
            .field("retry_delay", &self.retry_delay)
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct ContentSettings {
    pub ttl_days: NonZeroU32,
}

#[derive(Debug, Clone)]
pub struct BatchSettings {
    pub pair_delay: Duration,
    pub failure_log: PathBuf,
    pub summary_path: PathBuf,
}

#[derive(Debug, Clone)]
pub struct CatalogSettings {
    pub localities: Vec<String>,
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to build configuration: {0}")]
    Build(#[from] config::ConfigError),
    #[error("invalid configuration for `{key}`: {reason}")]
    Invalid { key: &'static str, reason: String },
}

impl LoadError {
    fn invalid(key: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            key,
            reason: reason.into(),
        }
    }
}

/// Load settings using the configured precedence (file → environment → CLI).
pub fn load(cli: &CliArgs) -> Result<Settings, LoadError> {
    let mut builder = Config::builder()
        .add_source(File::with_name(DEFAULT_CONFIG_BASENAME).required(false))
        .add_source(File::with_name(LOCAL_CONFIG_BASENAME).required(false));

    if let Some(path) = cli.config_file.as_ref() {
        builder = builder.add_source(File::from(path.as_path()).required(true));
    }

    builder = builder.add_source(Environment::with_prefix(ENV_PREFIX).separator("__"));

    let mut raw: RawSettings = builder.build()?.try_deserialize()?;

    match cli.command.as_ref() {
        Some(Command::Serve(args)) => raw.apply_serve_overrides(args),
        Some(Command::RegenerateAll(args)) => raw.apply_regenerate_all_overrides(args),
        Some(command) => raw.apply_common_overrides(command.common()),
        None => raw.apply_serve_overrides(&ServeArgs::default()),
    }

    Settings::from_raw(raw)
}

/// Resolve configuration using the supplied CLI arguments, returning both for downstream use.
pub fn load_with_cli() -> Result<(CliArgs, Settings), LoadError> {
    let args = CliArgs::parse();
    let settings = load(&args)?;
    Ok((args, settings))
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSettings {
    server: RawServerSettings,
    logging: RawLoggingSettings,
    database: RawDatabaseSettings,
    generation: RawGenerationSettings,
    content: RawContentSettings,
    batch: RawBatchSettings,
    catalog: RawCatalogSettings,
}

impl RawSettings {
    fn apply_common_overrides(&mut self, overrides: &CommonOverrides) {
        if let Some(url) = overrides.database_url.as_ref() {
            self.database.url = Some(url.clone());
        }
        if let Some(level) = overrides.log_level.as_ref() {
            self.logging.level = Some(level.clone());
        }
        if let Some(json) = overrides.log_json {
            self.logging.json = Some(json);
        }
    }

    fn apply_serve_overrides(&mut self, args: &ServeArgs) {
        self.apply_common_overrides(&args.common);
        if let Some(host) = args.server_host.as_ref() {
            self.server.host = Some(host.clone());
        }
        if let Some(port) = args.server_port {
            self.server.port = Some(port);
        }
    }

    fn apply_regenerate_all_overrides(&mut self, args: &RegenerateAllArgs) {
        self.apply_common_overrides(&args.common);
        if let Some(seconds) = args.pair_delay_seconds {
            self.batch.pair_delay_seconds = Some(seconds);
        }
    }
}

impl Settings {
    fn from_raw(raw: RawSettings) -> Result<Self, LoadError> {
        let RawSettings {
            server,
            logging,
            database,
            generation,
            content,
            batch,
            catalog,
        } = raw;

        Ok(Self {
            server: build_server_settings(server)?,
            logging: build_logging_settings(logging)?,
            database: build_database_settings(database)?,
            generation: build_generation_settings(generation)?,
            content: build_content_settings(content)?,
            batch: build_batch_settings(batch)?,
            catalog: build_catalog_settings(catalog)?,
        })
    }
}

fn build_server_settings(server: RawServerSettings) -> Result<ServerSettings, LoadError> {
    let host = server.host.unwrap_or_else(|| DEFAULT_HOST.to_string());

    let port = server.port.unwrap_or(DEFAULT_PORT);
    if port == 0 {
        return Err(LoadError::invalid(
            "server.port",
            "port must be greater than zero",
        ));
    }

    let addr = parse_socket_addr(&host, port)
        .map_err(|reason| LoadError::invalid("server.addr", reason))?;

    Ok(ServerSettings { addr })
}

fn build_logging_settings(logging: RawLoggingSettings) -> Result<LoggingSettings, LoadError> {
    let level = match logging.level {
        Some(level) => LevelFilter::from_str(level.as_str()).map_err(|err| {
            LoadError::invalid("logging.level", format!("failed to parse: {err}"))
        })?,
        None => LevelFilter::INFO,
    };

    let format = if logging.json.unwrap_or(false) {
        LogFormat::Json
    } else {
        LogFormat::Compact
    };

    Ok(LoggingSettings { level, format })
}

fn build_database_settings(database: RawDatabaseSettings) -> Result<DatabaseSettings, LoadError> {
    let url = non_blank(database.url);
    let max_connections = non_zero_u32(
        database
            .max_connections
            .unwrap_or(DEFAULT_DB_MAX_CONNECTIONS)
            .into(),
        "database.max_connections",
    )?;

    Ok(DatabaseSettings {
        url,
        max_connections,
    })
}

fn build_generation_settings(
    generation: RawGenerationSettings,
) -> Result<GenerationSettings, LoadError> {
    let api_key = non_blank(generation.api_key);

    let base_url_value = generation
        .base_url
        .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
    let base_url = Url::parse(base_url_value.trim())
        .map_err(|err| LoadError::invalid("generation.base_url", format!("invalid url: {err}")))?;
    if !matches!(base_url.scheme(), "http" | "https") {
        return Err(LoadError::invalid(
            "generation.base_url",
            "scheme must be http or https",
        ));
    }

    let model = generation
        .model
        .map(|model| model.trim().to_string())
        .unwrap_or_else(|| DEFAULT_MODEL.to_string());
    if model.is_empty() {
        return Err(LoadError::invalid("generation.model", "must not be empty"));
    }

    let max_tokens = non_zero_u32(
        generation.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS).into(),
        "generation.max_tokens",
    )?;

    let temperature = generation.temperature.unwrap_or(DEFAULT_TEMPERATURE);
    if !(0.0..=2.0).contains(&temperature) {
        return Err(LoadError::invalid(
            "generation.temperature",
            "must be between 0.0 and 2.0",
        ));
    }

    let timeout_secs = generation
        .request_timeout_seconds
        .unwrap_or(DEFAULT_REQUEST_TIMEOUT_SECS);
    let request_timeout = NonZeroU64::new(timeout_secs)
        .map(|secs| Duration::from_secs(secs.get()))
        .ok_or_else(|| {
            LoadError::invalid(
                "generation.request_timeout_seconds",
                "must be greater than zero",
            )
        })?;

    let max_attempts = non_zero_u32(
        generation
            .max_attempts
            .unwrap_or(DEFAULT_MAX_ATTEMPTS)
            .into(),
        "generation.max_attempts",
    )?;

    let retry_delay = Duration::from_secs(
        generation
            .retry_delay_seconds
            .unwrap_or(DEFAULT_RETRY_DELAY_SECS),
    );

    Ok(GenerationSettings {
        api_key,
        base_url: base_url.as_str().trim_end_matches('/').to_string(),
        model,
        max_tokens,
        temperature,
        request_timeout,
        max_attempts,
        retry_delay,
    })
}

fn build_content_settings(content: RawContentSettings) -> Result<ContentSettings, LoadError> {
    let ttl_days = non_zero_u32(
        content.ttl_days.unwrap_or(DEFAULT_TTL_DAYS).into(),
        "content.ttl_days",
    )?;
    if ttl_days.get() > MAX_TTL_DAYS {
        return Err(LoadError::invalid(
            "content.ttl_days",
            format!("must not exceed {MAX_TTL_DAYS} days"),
        ));
    }
    Ok(ContentSettings { ttl_days })
}

fn build_batch_settings(batch: RawBatchSettings) -> Result<BatchSettings, LoadError> {
    let pair_delay = Duration::from_secs(
        batch
            .pair_delay_seconds
            .unwrap_or(DEFAULT_PAIR_DELAY_SECS),
    );

    let failure_log = batch
        .failure_log
        .unwrap_or_else(|| PathBuf::from(DEFAULT_FAILURE_LOG));
    if failure_log.as_os_str().is_empty() {
        return Err(LoadError::invalid(
            "batch.failure_log",
            "path must not be empty",
        ));
    }

    let summary_path = batch
        .summary_path
        .unwrap_or_else(|| PathBuf::from(DEFAULT_SUMMARY_PATH));
    if summary_path.as_os_str().is_empty() {
        return Err(LoadError::invalid(
            "batch.summary_path",
            "path must not be empty",
        ));
    }

    Ok(BatchSettings {
        pair_delay,
        failure_log,
        summary_path,
    })
}

fn build_catalog_settings(catalog: RawCatalogSettings) -> Result<CatalogSettings, LoadError> {
    let localities = match catalog.localities {
        Some(localities) if !localities.is_empty() => validate_localities(&localities)
            .map_err(|err| LoadError::invalid("catalog.localities", err.to_string()))?,
        Some(_) => {
            return Err(LoadError::invalid(
                "catalog.localities",
                "must list at least one locality",
            ));
        }
        None => default_localities(),
    };

    Ok(CatalogSettings { localities })
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawServerSettings {
    host: Option<String>,
    port: Option<u16>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawLoggingSettings {
    level: Option<String>,
    json: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawDatabaseSettings {
    url: Option<String>,
    max_connections: Option<u32>,
}

#[derive(Clone, Deserialize, Default)]
#[serde(default)]
struct RawGenerationSettings {
    api_key: Option<String>,
    base_url: Option<String>,
    model: Option<String>,
    max_tokens: Option<u32>,
    temperature: Option<f32>,
    request_timeout_seconds: Option<u64>,
    max_attempts: Option<u32>,
    retry_delay_seconds: Option<u64>,
}

impl std::fmt::Debug for RawGenerationSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RawGenerationSettings")
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawContentSettings {
    ttl_days: Option<u32>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawBatchSettings {
    pair_delay_seconds: Option<u64>,
    failure_log: Option<PathBuf>,
    summary_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawCatalogSettings {
    localities: Option<Vec<String>>,
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.and_then(|value| {
        let trimmed = value.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    })
}

fn parse_socket_addr(host: &str, port: u16) -> Result<SocketAddr, String> {
    let candidate = format!("{host}:{port}");
    candidate
        .parse()
        .map_err(|err| format!("invalid address `{candidate}`: {err}"))
}

fn non_zero_u32(value: u64, key: &'static str) -> Result<NonZeroU32, LoadError> {
    if value == 0 {
        return Err(LoadError::invalid(key, "must be greater than zero"));
    }
    let value_u32: u32 = value
        .try_into()
        .map_err(|_| LoadError::invalid(key, "value exceeds supported range for u32"))?;
    NonZeroU32::new(value_u32).ok_or_else(|| LoadError::invalid(key, "must be greater than zero"))
}
