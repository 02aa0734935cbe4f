use std::sync::Arc;

use anyhow::Context;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use ledgerlift_events::{EventBus, EventLogger};
use ledgerlift_pipeline::{ImportPipeline, PgImportStore, PipelineConfig};
use ledgerlift_worker::{JobPoller, WorkerConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "ledgerlift_worker=debug,ledgerlift_pipeline=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // --- Configuration ---
    let worker_config = WorkerConfig::from_env().context("invalid worker configuration")?;
    let pipeline_config = PipelineConfig::from_env().context("invalid pipeline configuration")?;
    tracing::info!(
        poll_interval_secs = worker_config.poll_interval.as_secs(),
        processing_workers = pipeline_config.processing_workers,
        "Loaded worker configuration"
    );

    // --- Database ---
    let pool = ledgerlift_db::create_pool(&worker_config.database_url, worker_config.max_connections)
        .await
        .context("failed to connect to database")?;
    ledgerlift_db::health_check(&pool)
        .await
        .context("database health check failed")?;
    ledgerlift_db::run_migrations(&pool)
        .await
        .context("failed to run database migrations")?;

    // --- Event bus ---
    let event_bus = Arc::new(EventBus::default());
    let logger_handle = tokio::spawn(EventLogger::run(event_bus.subscribe()));

    // --- Pipeline ---
    let pipeline = ImportPipeline::new(Arc::new(PgImportStore::new(pool.clone())), Arc::clone(&event_bus))
        .with_config(pipeline_config);

    let cancel = CancellationToken::new();
    let poller = JobPoller::new(pipeline, &worker_config);
    let poller_handle = tokio::spawn(poller.run(cancel.clone()));

    shutdown_signal().await;
    cancel.cancel();

    if let Err(e) = poller_handle.await {
        tracing::error!(error = %e, "Import worker task panicked");
    }
    drop(event_bus);
    let _ = logger_handle.await;
    pool.close().await;

    tracing::info!("Graceful shutdown complete");
    Ok(())
}

/// Wait for SIGINT or, on Unix, SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => tracing::info!("Received SIGINT (Ctrl-C), shutting down"),
        () = terminate => tracing::info!("Received SIGTERM, shutting down"),
    }
}
