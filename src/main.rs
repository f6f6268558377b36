use std::{process, sync::Arc};

use folio::{
    application::{
        error::AppError,
        jobs::PublishWorker,
        posts::PostsService,
        repos::{
            CdnPurger, JobsRepo, MediaRepo, PostsRepo, PostsWriteRepo, SearchIndex, Summarizer,
            TagsRepo,
        },
    },
    cache::CacheStore,
    config,
    infra::{
        cdn::HttpCdnPurger,
        db::PostgresRepositories,
        error::InfraError,
        http::{AdminState, PublicState, build_admin_router, build_public_router},
        search::HttpSearchIndex,
        summary::HttpSummarizer,
        telemetry,
    },
};
use tokio::try_join;
use tracing::{Dispatch, Level, debug, dispatcher, error, info};
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
        .unwrap_or(config::Command::Serve(Box::<config::ServeArgs>::default()));

    telemetry::init(&settings.logging).map_err(AppError::from)?;

    match command {
        config::Command::Serve(_) => run_serve(settings).await,
        config::Command::Migrate => run_migrate(settings).await,
    }
}

async fn run_migrate(settings: config::Settings) -> Result<(), AppError> {
    let pool = connect(&settings).await?;
    PostgresRepositories::run_migrations(&pool)
        .await
        .map_err(|err| AppError::from(InfraError::database(err.to_string())))?;
    info!(target = "folio::migrate", "migrations applied");
    Ok(())
}

async fn run_serve(settings: config::Settings) -> Result<(), AppError> {
    let admin_token = settings
        .admin
        .token
        .clone()
        .ok_or_else(|| InfraError::configuration("admin token is not configured"))
        .map_err(AppError::from)?;

    let pool = connect(&settings).await?;
    PostgresRepositories::run_migrations(&pool)
        .await
        .map_err(|err| AppError::from(InfraError::database(err.to_string())))?;
    let repositories = Arc::new(PostgresRepositories::new(pool));

    let cache = Arc::new(CacheStore::new());
    let client = reqwest::Client::new();

    let posts_repo: Arc<dyn PostsRepo> = repositories.clone();
    let posts_write_repo: Arc<dyn PostsWriteRepo> = repositories.clone();
    let tags_repo: Arc<dyn TagsRepo> = repositories.clone();
    let media_repo: Arc<dyn MediaRepo> = repositories.clone();
    let jobs_repo: Arc<dyn JobsRepo> = repositories.clone();
    let search: Arc<dyn SearchIndex> = Arc::new(HttpSearchIndex::new(
        client.clone(),
        settings.collaborators.search_url.clone(),
    ));
    let cdn: Arc<dyn CdnPurger> = Arc::new(HttpCdnPurger::new(
        client.clone(),
        settings.collaborators.cdn_url.clone(),
    ));
    let summarizer: Arc<dyn Summarizer> = Arc::new(HttpSummarizer::new(
        client,
        settings.collaborators.summarizer_url.clone(),
    ));

    let posts_service = Arc::new(PostsService::new(
        posts_repo,
        posts_write_repo,
        tags_repo,
        media_repo,
        jobs_repo.clone(),
        search,
        cdn,
        summarizer,
        cache.clone(),
        settings.cache.public_ttl,
    ));

    let sweep_handle = spawn_cache_sweeper(cache, settings.cache.sweep_interval);

    let worker = PublishWorker::new(jobs_repo, posts_service.clone());
    let worker_handle = tokio::spawn(worker.run(settings.jobs.poll_interval));

    let result = serve_http(&settings, posts_service, admin_token).await;

    worker_handle.abort();
    let _ = worker_handle.await;
    sweep_handle.abort();
    let _ = sweep_handle.await;

    result
}

async fn connect(settings: &config::Settings) -> Result<sqlx::PgPool, AppError> {
    let database_url = settings
        .database
        .url
        .as_ref()
        .ok_or_else(|| InfraError::configuration("database url is not configured"))
        .map_err(AppError::from)?;

    PostgresRepositories::connect(database_url, settings.database.max_connections.get())
        .await
        .map_err(|err| AppError::from(InfraError::database(err.to_string())))
}

fn spawn_cache_sweeper(
    cache: Arc<CacheStore>,
    sweep_interval: std::time::Duration,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(sweep_interval);
        interval.tick().await; // Skip the first immediate tick
        loop {
            interval.tick().await;
            let removed = cache.sweep();
            if removed > 0 {
                debug!(removed, "expired cache entries swept");
            }
        }
    })
}

async fn serve_http(
    settings: &config::Settings,
    posts: Arc<PostsService>,
    admin_token: String,
) -> Result<(), AppError> {
    let public_router = build_public_router(PublicState {
        posts: posts.clone(),
    });
    let admin_router = build_admin_router(AdminState {
        posts,
        token: Arc::from(admin_token),
    });

    let public_listener = tokio::net::TcpListener::bind(settings.server.public_addr)
        .await
        .map_err(|err| AppError::from(InfraError::from(err)))?;
    let admin_listener = tokio::net::TcpListener::bind(settings.server.admin_addr)
        .await
        .map_err(|err| AppError::from(InfraError::from(err)))?;

    info!(
        public = %settings.server.public_addr,
        admin = %settings.server.admin_addr,
        "folio listening"
    );

    let public_server = axum::serve(public_listener, public_router.into_make_service());
    let admin_server = axum::serve(admin_listener, admin_router.into_make_service());

    try_join!(public_server, admin_server)
        .map_err(|err| AppError::unexpected(format!("server error: {err}")))?;

    Ok(())
}
