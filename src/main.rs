use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use axum::Router;
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use con_signup::api::{create_app, AppState};
use con_signup::domain::repositories::AllocationRepository;
use con_signup::infrastructure::config::AppConfig;
use con_signup::infrastructure::database::repositories::{
    MemoryAllocationRepository, SqliteAllocationRepository,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "con_signup=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = AppConfig::from_env().context("invalid configuration")?;
    tracing::info!(
        "Convention runs {} to {}",
        config.window.start,
        config.window.end
    );

    let app = if config.uses_memory_store() {
        tracing::warn!("Using the in-memory store, nothing will survive a restart");
        build_app(MemoryAllocationRepository::new(config.db_busy_timeout), &config)
    } else {
        let url = config.sqlite_url();
        tracing::info!("Connecting to {}", url);
        let repo = SqliteAllocationRepository::connect(&url, config.db_busy_timeout)
            .await
            .with_context(|| format!("failed to open database {}", url))?;
        build_app(repo, &config)
    };

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("Starting con-signup backend on {}", addr);

    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

fn build_app<R: AllocationRepository>(repo: R, config: &AppConfig) -> Router {
    let state = Arc::new(AppState::new(Arc::new(repo), config));
    create_app(state)
}
