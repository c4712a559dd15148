pub mod error;
pub mod extract;
pub mod middleware;
pub mod routes;
pub mod sse;

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::domain::repositories::AllocationRepository;

// Re-export for convenience
pub use crate::infrastructure::app_state::AppState;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Full application router: `/api`, `/health` and the HTTP layers
pub fn create_app<R: AllocationRepository>(state: Arc<AppState<R>>) -> Router {
    Router::new()
        .nest("/api", routes::create_api_router(state.clone()))
        .route(
            "/health",
            axum::routing::get(routes::health::health_handler::<R>),
        )
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(REQUEST_TIMEOUT))
        .with_state(state)
}
