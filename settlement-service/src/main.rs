use settlement_core::observability::init_tracing;
use settlement_service::config::SettlementConfig;
use settlement_service::services::{
    CachedProfiles, JobService, MemoryStore, RedisStore, StaticProfileSource, TtlStore,
    init_metrics, mapper,
};
use settlement_service::startup::{AppState, build_router};
use settlement_service::workers::JobOrchestrator;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::signal;

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}

#[tokio::main]
async fn main() -> std::io::Result<()> {
    // Metrics recorder must exist before any metrics are recorded.
    init_metrics();
    init_tracing("settlement-service", "info");

    let config = SettlementConfig::load().map_err(|e| {
        tracing::error!("Failed to load configuration: {}", e);
        std::io::Error::other(format!("Configuration error: {}", e))
    })?;

    // The field dictionary is static; reject a non-bijective edit outright.
    mapper::validate_dictionary().map_err(|e| {
        tracing::error!("Field dictionary validation failed: {}", e);
        std::io::Error::other(format!("Field dictionary error: {}", e))
    })?;

    let store: Arc<dyn TtlStore> = match config.redis.url.as_deref() {
        Some(url) => Arc::new(RedisStore::connect(url).await.map_err(|e| {
            tracing::error!("Failed to connect to Redis: {}", e);
            std::io::Error::other(format!("Redis connection error: {}", e))
        })?),
        None => {
            tracing::info!("No Redis URL configured, using in-process store");
            Arc::new(MemoryStore::new())
        }
    };

    let source = match config.profiles.seed_path.as_deref() {
        Some(path) => StaticProfileSource::from_seed_file(path).await.map_err(|e| {
            tracing::error!("Failed to load profile seed: {}", e);
            std::io::Error::other(format!("Profile seed error: {}", e))
        })?,
        None => StaticProfileSource::new(),
    };
    let profiles = Arc::new(CachedProfiles::new(
        Arc::new(source),
        store.clone(),
        config.cache.profile_ttl(),
    ));

    let (orchestrator, job_tx) = JobOrchestrator::new(
        config.worker.clone(),
        &config.cache,
        store.clone(),
        profiles.clone(),
    );

    let workers_shutdown = orchestrator.shutdown_handle();
    tokio::spawn(async move {
        orchestrator.start().await;
    });

    let jobs = Arc::new(JobService::new(
        store.clone(),
        profiles.clone(),
        job_tx,
        &config.cache,
        &config.limits,
        &config.worker,
    ));

    let state = AppState {
        config: config.clone(),
        store,
        profiles,
        jobs,
    };

    let router = build_router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.common.port));
    let listener = TcpListener::bind(addr).await.map_err(|e| {
        tracing::error!("Failed to bind listener to {}: {}", addr, e);
        e
    })?;
    tracing::info!("settlement-service listening on {}", addr);

    axum::serve(
        listener,
        router.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    tracing::info!("Stopping worker pool");
    workers_shutdown.cancel();

    Ok(())
}
