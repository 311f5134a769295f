use std::{collections::HashSet, process, sync::Arc};

use fenceline::{
    application::{
        batch::BatchRunner,
        cache_store::CacheStore,
        error::AppError,
        generation::ContentGenerator,
        orchestrator::ContentOrchestrator,
        prompts::PromptLibrary,
        repos::ContentCacheRepo,
    },
    config::{self, Command, PairArgs, RegenerateAllArgs},
    domain::types::ServiceCategory,
    infra::{
        cache::InMemoryContentCache,
        db::PostgresRepositories,
        error::InfraError,
        http::{self, HttpState},
        journal::{FileBatchJournal, read_failure_pairs},
        llm::OpenAiClient,
        telemetry,
    },
};
use tracing::{Dispatch, Level, dispatcher, error, info, warn};
use tracing_subscriber::fmt as tracing_fmt;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        report_application_error(&error);
        process::exit(1);
    }
}

fn report_application_error(error: &AppError) {
    if dispatcher::has_been_set() {
        error!(error = %error, "application error");
        return;
    }

    let subscriber = tracing_fmt().with_max_level(Level::ERROR).finish();
    let dispatch = Dispatch::new(subscriber);
    dispatcher::with_default(&dispatch, || {
        error!(error = %error, "application error");
    });
}

async fn run() -> Result<(), AppError> {
    let (cli_args, settings) = config::load_with_cli()
        .map_err(|err| AppError::unexpected(format!("failed to load configuration: {err}")))?;

    let command = cli_args
        .command
        .unwrap_or(Command::Serve(config::ServeArgs::default()));

    telemetry::init(&settings.logging).map_err(AppError::from)?;

    match command {
        Command::Serve(_) => run_serve(settings).await,
        Command::RegenerateAll(args) => run_regenerate_all(settings, args).await,
        Command::Regenerate(args) => run_regenerate(settings, args).await,
        Command::Show(args) => run_show(settings, args).await,
        Command::PurgeExpired(_) => run_purge_expired(settings).await,
    }
}

async fn connect_repositories(
    settings: &config::Settings,
) -> Result<Option<Arc<PostgresRepositories>>, AppError> {
    let Some(database_url) = settings.database.url.as_ref() else {
        return Ok(None);
    };

    let pool = PostgresRepositories::connect(database_url, settings.database.max_connections.get())
        .await
        .map_err(InfraError::from)?;

    PostgresRepositories::run_migrations(&pool)
        .await
        .map_err(InfraError::from)?;

    Ok(Some(Arc::new(PostgresRepositories::new(pool))))
}

async fn require_repositories(
    settings: &config::Settings,
) -> Result<Arc<PostgresRepositories>, AppError> {
    connect_repositories(settings).await?.ok_or_else(|| {
        AppError::from(InfraError::configuration(
            "database url is not configured; set database.url or --database-url",
        ))
    })
}

/// Fall back to a process-local cache when no database is configured.
async fn cache_repo(
    settings: &config::Settings,
) -> Result<(Arc<dyn ContentCacheRepo>, Option<Arc<PostgresRepositories>>), AppError> {
    match connect_repositories(settings).await? {
        Some(db) => {
            let repo: Arc<dyn ContentCacheRepo> = db.clone();
            Ok((repo, Some(db)))
        }
        None => {
            warn!(
                target = "fenceline::startup",
                "database url is not configured; content is cached in memory only"
            );
            let repo: Arc<dyn ContentCacheRepo> = Arc::new(InMemoryContentCache::new());
            Ok((repo, None))
        }
    }
}

fn build_generator(settings: &config::Settings) -> Result<ContentGenerator, AppError> {
    let client = OpenAiClient::from_settings(&settings.generation)?;
    Ok(ContentGenerator::new(
        Arc::new(client),
        settings.generation.retry_policy(),
    ))
}

fn build_orchestrator(
    settings: &config::Settings,
    repo: Arc<dyn ContentCacheRepo>,
) -> Result<ContentOrchestrator, AppError> {
    Ok(ContentOrchestrator::new(
        CacheStore::new(repo),
        build_generator(settings)?,
        PromptLibrary::new(),
        settings.content.ttl_days.get(),
    ))
}

async fn run_serve(settings: config::Settings) -> Result<(), AppError> {
    let (repo, db) = cache_repo(&settings).await?;
    let orchestrator = build_orchestrator(&settings, repo)?;

    let router = http::build_router(HttpState {
        content: Arc::new(orchestrator),
        db,
    });

    let listener = tokio::net::TcpListener::bind(settings.server.addr)
        .await
        .map_err(|err| AppError::from(InfraError::from(err)))?;

    info!(
        target = "fenceline::startup",
        addr = %settings.server.addr,
        "serving content"
    );

    axum::serve(listener, router.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|err| AppError::unexpected(format!("server error: {err}")))?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!(
            target = "fenceline::startup",
            error = %err,
            "failed to listen for shutdown signal"
        );
        std::future::pending::<()>().await;
    }
    info!(target = "fenceline::startup", "shutdown signal received");
}

async fn run_regenerate_all(
    settings: config::Settings,
    args: RegenerateAllArgs,
) -> Result<(), AppError> {
    let db = require_repositories(&settings).await?;
    let journal = Arc::new(FileBatchJournal::new(
        settings.batch.failure_log.clone(),
        settings.batch.summary_path.clone(),
    ));
    let runner = BatchRunner::new(
        build_generator(&settings)?,
        CacheStore::new(db),
        PromptLibrary::new(),
        journal,
        settings.batch.pair_delay,
    );
    let ttl_days = settings.content.ttl_days.get();

    let summary = match args.retry_failures.as_ref() {
        Some(path) => {
            let pairs = read_failure_pairs(path).await?;
            info!(
                target = "fenceline::batch",
                log = %path.display(),
                pairs = pairs.len(),
                "retrying pairs from failure log"
            );
            runner.run_pairs(&pairs, ttl_days).await
        }
        None => {
            let services = selected_services(&args.services);
            runner
                .run_all(&settings.catalog.localities, &services, ttl_days)
                .await
        }
    };

    if summary.is_success() {
        Ok(())
    } else {
        Err(AppError::BatchIncomplete {
            failed: summary.failed_count,
            total: summary.total_pairs,
        })
    }
}

/// Requested services in declaration order, or every service when none were named.
fn selected_services(requested: &[ServiceCategory]) -> Vec<ServiceCategory> {
    if requested.is_empty() {
        return ServiceCategory::ALL.to_vec();
    }
    let requested: HashSet<ServiceCategory> = requested.iter().copied().collect();
    ServiceCategory::ALL
        .into_iter()
        .filter(|service| requested.contains(service))
        .collect()
}

async fn run_regenerate(settings: config::Settings, args: PairArgs) -> Result<(), AppError> {
    let db = require_repositories(&settings).await?;
    let orchestrator = build_orchestrator(&settings, db)?;

    let record = orchestrator
        .regenerate(&args.locality, args.service())
        .await?;

    println!("{} (expires {})", record.key, record.expires_at);
    Ok(())
}

async fn run_show(settings: config::Settings, args: PairArgs) -> Result<(), AppError> {
    let (repo, _) = cache_repo(&settings).await?;
    let orchestrator = build_orchestrator(&settings, repo)?;

    let response = orchestrator
        .content_for(&args.locality, args.service())
        .await?;

    info!(
        target = "fenceline::show",
        key = %response.key,
        source = ?response.source,
        "resolved content"
    );
    println!("{}", response.content);
    Ok(())
}

async fn run_purge_expired(settings: config::Settings) -> Result<(), AppError> {
    let db = require_repositories(&settings).await?;
    let removed = CacheStore::new(db).purge_expired().await?;

    info!(
        target = "fenceline::maintenance",
        removed,
        "purged expired cache rows"
    );
    println!("removed {removed} expired row(s)");
    Ok(())
}
