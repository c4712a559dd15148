use std::sync::Arc;

use axum::{extract::State, Json};
use serde::Serialize;

use crate::api::AppState;
use crate::domain::repositories::AllocationRepository;

#[derive(Serialize)]
pub struct HealthResponse {
    status: &'static str,
    version: String,
    uptime_seconds: u64,
    storage: &'static str,
}

static START_TIME: std::sync::OnceLock<std::time::Instant> = std::sync::OnceLock::new();

/// Liveness plus a storage probe: opening a transaction is the cheapest
/// thing that proves the store answers
pub async fn health_handler<R: AllocationRepository>(
    State(state): State<Arc<AppState<R>>>,
) -> Json<HealthResponse> {
    let start = START_TIME.get_or_init(std::time::Instant::now);

    let storage = match state.allocation.repository().begin_read().await {
        Ok(_) => "ok",
        Err(e) => {
            tracing::warn!("Health check could not reach storage: {}", e);
            "unavailable"
        }
    };

    Json(HealthResponse {
        status: if storage == "ok" { "ok" } else { "degraded" },
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: start.elapsed().as_secs(),
        storage,
    })
}
