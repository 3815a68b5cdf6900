use telemetry_service::api;
use telemetry_service::config::{Config, StorageBackend};
use telemetry_service::engine::{SimulatedAnalysis, WorkerPool};
use telemetry_service::repositories::{
    InMemoryTelemetryRepository, PgTelemetryRepository, TelemetryRepository,
};
use telemetry_service::services::DeadLetterSink;

use anyhow::Context;
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "telemetry_service=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting telemetry-service v{}", env!("CARGO_PKG_VERSION"));

    let config = Config::from_env()?;

    let repository: Arc<dyn TelemetryRepository> = match config.storage {
        StorageBackend::Postgres => {
            let database_url = config
                .database_url
                .as_deref()
                .context("DATABASE_URL must be set")?;

            info!("Connecting to database...");
            let pool = PgPoolOptions::new()
                .max_connections(config.database_max_connections)
                .connect(database_url)
                .await?;

            sqlx::migrate!("src/db/migrations").run(&pool).await?;
            info!("Database connected");

            Arc::new(PgTelemetryRepository::new(pool))
        }
        StorageBackend::Memory => {
            warn!("Using in-memory storage; events are lost on restart");
            Arc::new(InMemoryTelemetryRepository::new())
        }
    };

    let dead_letter = DeadLetterSink::new(config.dead_letter_webhook_url.clone())?;

    let pool = Arc::new(WorkerPool::start(
        config.ingest_workers,
        Arc::new(SimulatedAnalysis::new(config.analysis_delay)),
        repository.clone(),
        dead_letter,
    ));

    let app = api::build_router(repository, pool.clone())
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let addr = config.bind_addr();
    info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    pool.shutdown(config.shutdown_timeout).await;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
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
                warn!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}
