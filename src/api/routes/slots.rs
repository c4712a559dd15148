use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
    Extension,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::api::error::ApiError;
use crate::api::extract::ApiJson;
use crate::api::middleware::Claims;
use crate::api::AppState;
use crate::domain::entities::Slot;
use crate::domain::repositories::AllocationRepository;
use crate::infrastructure::app_state::AllocationEvent;

/// RFC 3339 instants
#[derive(Debug, Deserialize)]
pub struct SlotRequest {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct SlotResponse {
    pub success: bool,
    pub slot: Slot,
}

/// POST /api/games/:slug/slots - Schedule a slot
pub async fn create_slot<R: AllocationRepository>(
    State(state): State<Arc<AppState<R>>>,
    Extension(claims): Extension<Claims>,
    Path(slug): Path<String>,
    ApiJson(body): ApiJson<SlotRequest>,
) -> Result<(StatusCode, Json<SlotResponse>), ApiError> {
    let slot = state
        .allocation
        .create_slot(&claims.actor(), &slug, body.start, body.end)
        .await?;

    state.broadcast_event(AllocationEvent::slot("slotCreated", &slug, &slot));

    Ok((
        StatusCode::CREATED,
        Json(SlotResponse {
            success: true,
            slot,
        }),
    ))
}

/// PATCH /api/games/:slug/slots/:slotId - Move a slot
pub async fn update_slot<R: AllocationRepository>(
    State(state): State<Arc<AppState<R>>>,
    Extension(claims): Extension<Claims>,
    Path((slug, slot_id)): Path<(String, String)>,
    ApiJson(body): ApiJson<SlotRequest>,
) -> Result<Json<SlotResponse>, ApiError> {
    let slot = state
        .allocation
        .update_slot(&claims.actor(), &slug, &slot_id, body.start, body.end)
        .await?;

    state.broadcast_event(AllocationEvent::slot("slotUpdated", &slug, &slot));

    Ok(Json(SlotResponse {
        success: true,
        slot,
    }))
}

/// DELETE /api/games/:slug/slots/:slotId - Remove a slot and its entries
pub async fn delete_slot<R: AllocationRepository>(
    State(state): State<Arc<AppState<R>>>,
    Extension(claims): Extension<Claims>,
    Path((slug, slot_id)): Path<(String, String)>,
) -> Result<Json<SlotResponse>, ApiError> {
    let slot = state
        .allocation
        .delete_slot(&claims.actor(), &slug, &slot_id)
        .await?;

    state.broadcast_event(AllocationEvent::slot("slotDeleted", &slug, &slot));

    Ok(Json(SlotResponse {
        success: true,
        slot,
    }))
}
