use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{Query, State},
    response::sse::{Event, KeepAlive, Sse},
};
use futures::stream::Stream;
use serde::Deserialize;

use crate::domain::repositories::AllocationRepository;
use crate::infrastructure::app_state::AppState;

const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(20);

#[derive(Deserialize)]
pub struct SseParams {
    token: Option<String>,
}

/// GET /api/events - Allocation events as server-sent events
///
/// EventSource cannot set headers, so the token travels in the query string.
/// Anonymous or invalid tokens still get the public events.
pub async fn sse_handler<R: AllocationRepository>(
    State(state): State<Arc<AppState<R>>>,
    Query(params): Query<SseParams>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let viewer = params
        .token
        .and_then(|token| state.jwt_service.verify(&token).ok())
        .map(|claims| claims.user_id);

    let mut receiver = state.event_receiver.activate_cloned();

    let stream = async_stream::stream! {
        tracing::debug!("SSE stream started for {:?}", viewer);

        yield Ok(Event::default()
            .event("connected")
            .data(serde_json::json!({
                "message": "Connected to SSE stream",
                "timestamp": chrono::Utc::now().timestamp_millis()
            }).to_string()));

        let mut heartbeat_interval = tokio::time::interval(HEARTBEAT_INTERVAL);

        loop {
            tokio::select! {
                _ = heartbeat_interval.tick() => {
                    tracing::trace!("SSE heartbeat");
                    yield Ok(Event::default().comment("heartbeat"));
                }
                result = receiver.recv() => {
                    match result {
                        Ok(event) => {
                            if !event.is_visible_to(viewer.as_deref()) {
                                continue;
                            }
                            tracing::debug!("SSE sending event: {}", event.event_type);
                            let json = serde_json::to_string(&event).unwrap_or_default();
                            yield Ok(Event::default()
                                .event("event")
                                .data(json));
                        }
                        Err(async_broadcast::RecvError::Overflowed(skipped)) => {
                            tracing::warn!("SSE client lagged, {} events skipped", skipped);
                        }
                        Err(e) => {
                            tracing::warn!("SSE receiver error: {:?}, closing stream", e);
                            break;
                        }
                    }
                }
            }
        }
    };

    Sse::new(stream).keep_alive(KeepAlive::default())
}
