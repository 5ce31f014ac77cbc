//! Main entry point for the Generative Media Task Gateway

use media_gen_gateway::{
    api,
    client::HttpGenerationBackend,
    config::Settings,
    events::EventBroadcaster,
    limiter::RateLimiter,
    queue::{task_queue::TaskQueue, worker, WorkerPool},
    version::VersionStore,
    AppState,
};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // Load configuration
    let settings = Settings::load()?;
    settings.validate()?;

    // Initialize logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(settings.logging.level.clone()));
    let registry = tracing_subscriber::registry().with(filter);
    if settings.logging.format == "json" {
        registry.with(fmt::layer().json()).init();
    } else {
        registry.with(fmt::layer()).init();
    }

    info!("Starting Generative Media Task Gateway");
    info!(
        "Loaded configuration: server={}:{} projects_root={}",
        settings.server.host, settings.server.port, settings.storage.projects_root
    );

    let settings = Arc::new(settings);

    // Shared services
    let broadcaster = Arc::new(EventBroadcaster::new(&settings.events));
    let queue = Arc::new(TaskQueue::new(broadcaster.clone()));
    let versions = Arc::new(VersionStore::new(settings.storage.projects_root.clone()));
    let limiter = Arc::new(RateLimiter::new(&settings.rate_limit));
    let backend = Arc::new(HttpGenerationBackend::new(&settings.generation)?);

    // Start the worker pools
    let context = worker::build_context(
        &settings,
        queue.clone(),
        versions.clone(),
        backend,
        limiter,
    );
    let pool = WorkerPool::start(&settings, context);

    // Build the router
    let state = AppState {
        settings: settings.clone(),
        queue,
        versions,
        broadcaster,
    };
    let app = api::build_router(state);

    let addr = format!("{}:{}", settings.server.host, settings.server.port);
    info!("Server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // Let in-flight generations reach a terminal state before exiting.
    pool.stop().await;

    Ok(())
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    info!("Shutdown signal received");
}
