use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueHint, builder::BoolishValueParser};

use crate::domain::types::ServiceCategory;

/// Command-line arguments for the fenceline binary.
#[derive(Debug, Parser)]
#[command(
    name = "fenceline",
    version,
    about = "Location-aware content generation and cache for fence installation pages"
)]
pub struct CliArgs {
    /// Optional path to a configuration file.
    #[arg(long = "config-file", env = "FENCELINE_CONFIG_FILE", value_name = "PATH")]
    pub config_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Serve cached content over HTTP.
    Serve(ServeArgs),
    /// Pre-generate content for every locality and service.
    #[command(name = "regenerate-all")]
    RegenerateAll(RegenerateAllArgs),
    /// Regenerate one (locality, service) pair, bypassing the cache.
    Regenerate(PairArgs),
    /// Print the content served for one pair, generating it on a miss.
    Show(PairArgs),
    /// Delete expired cache rows.
    #[command(name = "purge-expired")]
    PurgeExpired(PurgeArgs),
}

impl Command {
    pub fn common(&self) -> &CommonOverrides {
        match self {
            Command::Serve(args) => &args.common,
            Command::RegenerateAll(args) => &args.common,
            Command::Regenerate(args) | Command::Show(args) => &args.common,
            Command::PurgeExpired(args) => &args.common,
        }
    }
}

/// Overrides accepted by every command.
#[derive(Debug, Args, Default, Clone)]
pub struct CommonOverrides {
    /// Override the database connection URL.
    #[arg(long = "database-url", value_name = "URL")]
    pub database_url: Option<String>,

    /// Override the base log level (trace|debug|info|warn|error).
    #[arg(long = "log-level", value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Toggle JSON logging.
    #[arg(
        long = "log-json",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new()
    )]
    pub log_json: Option<bool>,
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeArgs {
    #[command(flatten)]
    pub common: CommonOverrides,

    /// Override the listener host.
    #[arg(long = "server-host", value_name = "HOST")]
    pub server_host: Option<String>,

    /// Override the listener port.
    #[arg(long = "server-port", value_name = "PORT")]
    pub server_port: Option<u16>,
}

#[derive(Debug, Args, Default, Clone)]
pub struct RegenerateAllArgs {
    #[command(flatten)]
    pub common: CommonOverrides,

    /// Restrict the run to these services; repeatable. Defaults to every service.
    #[arg(long = "service", value_name = "SERVICE")]
    pub services: Vec<ServiceCategory>,

    /// Re-run only the pairs recorded in a failure log.
    #[arg(
        long = "retry-failures",
        value_name = "FILE",
        value_hint = ValueHint::FilePath,
        conflicts_with = "services"
    )]
    pub retry_failures: Option<PathBuf>,

    /// Override the delay after each successful pair.
    #[arg(long = "pair-delay-seconds", value_name = "SECONDS")]
    pub pair_delay_seconds: Option<u64>,
}

#[derive(Debug, Args, Clone)]
pub struct PairArgs {
    #[command(flatten)]
    pub common: CommonOverrides,

    /// Locality name as shown on the site, e.g. "Fort Worth".
    #[arg(value_name = "LOCALITY")]
    pub locality: String,

    /// Service category; defaults to residential fencing.
    #[arg(long = "service", value_name = "SERVICE")]
    pub service: Option<ServiceCategory>,
}

impl PairArgs {
    pub fn service(&self) -> ServiceCategory {
        self.service.unwrap_or(ServiceCategory::DEFAULT)
    }
}

#[derive(Debug, Args, Default, Clone)]
pub struct PurgeArgs {
    #[command(flatten)]
    pub common: CommonOverrides,
}
