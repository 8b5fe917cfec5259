use std::sync::Arc;
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use capacity_axum::{
    db, handlers,
    repository::{AllocationRepository, InMemoryAllocationRepository, PgAllocationRepository},
    startup, AppConfig, AppState,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing with conditional JSON/text output
    let use_json = std::env::var("LOG_FORMAT")
        .unwrap_or_else(|_| "text".to_string()) == "json";

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info,capacity_axum=debug,tower_http=debug".into());

    if use_json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }

    dotenvy::dotenv().ok();

    let config = AppConfig::from_env().map_err(|e| {
        tracing::error!("Configuration error: {}", e);
        e
    })?;

    let repo: Arc<dyn AllocationRepository> = match &config.database_url {
        Some(url) => {
            let pool = db::create_pool(url, config.db_max_connections)
                .await
                .map_err(|e| {
                    tracing::error!("Failed to create database pool: {}", e);
                    e
                })?;
            let repo = PgAllocationRepository::new(pool);
            repo.ensure_schema().await?;
            tracing::info!("Using PostgreSQL allocation store");
            Arc::new(repo)
        }
        None => {
            tracing::warn!("DATABASE_URL not set, allocations are kept in memory");
            Arc::new(InMemoryAllocationRepository::new())
        }
    };

    let metrics_state = Arc::new(handlers::setup_metrics_recorder()?);
    tracing::info!("Metrics recorder initialized");

    let bind_addr = config.bind_addr;
    let state = Arc::new(AppState::new(repo, config, metrics_state));

    let app = startup::build_router(state);

    let listener = TcpListener::bind(bind_addr).await?;
    tracing::info!("Server listening on {}", listener.local_addr()?);

    axum::serve(listener, app).await?;

    Ok(())
}
