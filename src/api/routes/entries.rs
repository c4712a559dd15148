use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
    Extension,
};
use serde::{Deserialize, Serialize};

use crate::api::error::ApiError;
use crate::api::extract::{number_or_string, ApiJson};
use crate::api::middleware::Claims;
use crate::api::AppState;
use crate::application::allocation::SlotEntries;
use crate::domain::entities::{Entry, EntryState};
use crate::domain::repositories::AllocationRepository;
use crate::infrastructure::app_state::AllocationEvent;

// ============================================================================
// Request/Response DTOs
// ============================================================================

/// Raw priority; range checked by the service so the error names the value
#[derive(Debug, Deserialize)]
pub struct PriorityRequest {
    #[serde(deserialize_with = "number_or_string")]
    pub priority: i64,
}

#[derive(Debug, Deserialize)]
pub struct DecisionRequest {
    pub state: EntryState,
}

#[derive(Debug, Serialize)]
pub struct EntryResponse {
    pub success: bool,
    pub entry: Entry,
}

#[derive(Debug, Serialize)]
pub struct SlotEntriesResponse {
    pub success: bool,
    #[serde(flatten)]
    pub entries: SlotEntries,
}

// ============================================================================
// Route Handlers
// ============================================================================

/// GET /api/games/:slug/slots/:slotId/entries - Ranked entries (organizer)
pub async fn list_entries<R: AllocationRepository>(
    State(state): State<Arc<AppState<R>>>,
    Extension(claims): Extension<Claims>,
    Path((slug, slot_id)): Path<(String, String)>,
) -> Result<Json<SlotEntriesResponse>, ApiError> {
    let entries = state
        .allocation
        .list_entries(&claims.actor(), &slug, &slot_id)
        .await?;

    Ok(Json(SlotEntriesResponse {
        success: true,
        entries,
    }))
}

/// POST /api/games/:slug/slots/:slotId/entries - Enter a slot
pub async fn submit_entry<R: AllocationRepository>(
    State(state): State<Arc<AppState<R>>>,
    Extension(claims): Extension<Claims>,
    Path((slug, slot_id)): Path<(String, String)>,
    ApiJson(body): ApiJson<PriorityRequest>,
) -> Result<(StatusCode, Json<EntryResponse>), ApiError> {
    let output = state
        .allocation
        .submit_entry(&claims.actor(), &slug, &slot_id, body.priority)
        .await?;

    state.broadcast_event(AllocationEvent::entry(
        "entrySubmitted",
        &output.game,
        &output.entry,
    ));

    Ok((
        StatusCode::CREATED,
        Json(EntryResponse {
            success: true,
            entry: output.entry,
        }),
    ))
}

/// GET /api/games/:slug/slots/:slotId/entries/mine - The caller's entry
pub async fn get_own_entry<R: AllocationRepository>(
    State(state): State<Arc<AppState<R>>>,
    Extension(claims): Extension<Claims>,
    Path((slug, slot_id)): Path<(String, String)>,
) -> Result<Json<EntryResponse>, ApiError> {
    let entry = state
        .allocation
        .get_own_entry(&claims.actor(), &slug, &slot_id)
        .await?;

    Ok(Json(EntryResponse {
        success: true,
        entry,
    }))
}

/// PATCH /api/games/:slug/slots/:slotId/entries/mine - Change priority
pub async fn update_priority<R: AllocationRepository>(
    State(state): State<Arc<AppState<R>>>,
    Extension(claims): Extension<Claims>,
    Path((slug, slot_id)): Path<(String, String)>,
    ApiJson(body): ApiJson<PriorityRequest>,
) -> Result<Json<EntryResponse>, ApiError> {
    let output = state
        .allocation
        .update_priority(&claims.actor(), &slug, &slot_id, body.priority)
        .await?;

    state.broadcast_event(AllocationEvent::entry(
        "entryUpdated",
        &output.game,
        &output.entry,
    ));

    Ok(Json(EntryResponse {
        success: true,
        entry: output.entry,
    }))
}

/// DELETE /api/games/:slug/slots/:slotId/entries/mine - Withdraw
pub async fn withdraw_entry<R: AllocationRepository>(
    State(state): State<Arc<AppState<R>>>,
    Extension(claims): Extension<Claims>,
    Path((slug, slot_id)): Path<(String, String)>,
) -> Result<Json<EntryResponse>, ApiError> {
    let output = state
        .allocation
        .withdraw_entry(&claims.actor(), &slug, &slot_id)
        .await?;

    state.broadcast_event(AllocationEvent::entry(
        "entryWithdrawn",
        &output.game,
        &output.entry,
    ));

    Ok(Json(EntryResponse {
        success: true,
        entry: output.entry,
    }))
}

/// PATCH /api/games/:slug/slots/:slotId/entries/:entryId - Accept or reject
pub async fn decide_entry<R: AllocationRepository>(
    State(state): State<Arc<AppState<R>>>,
    Extension(claims): Extension<Claims>,
    Path((slug, slot_id, entry_id)): Path<(String, String, String)>,
    ApiJson(body): ApiJson<DecisionRequest>,
) -> Result<Json<EntryResponse>, ApiError> {
    let output = state
        .allocation
        .set_entry_state(&claims.actor(), &slug, &slot_id, &entry_id, body.state)
        .await?;

    state.broadcast_event(AllocationEvent::decision(&output.game, &output.entry));

    Ok(Json(EntryResponse {
        success: true,
        entry: output.entry,
    }))
}
