use std::sync::Arc;

use axum::{extract::State, response::Json, Extension};
use serde::Serialize;

use crate::api::error::ApiError;
use crate::api::middleware::Claims;
use crate::api::AppState;
use crate::application::allocation::Schedule;
use crate::domain::repositories::AllocationRepository;

#[derive(Debug, Serialize)]
pub struct ScheduleResponse {
    pub success: bool,
    #[serde(flatten)]
    pub schedule: Schedule,
}

/// GET /api/schedule - Every slot, split by the viewer's involvement
pub async fn get_schedule<R: AllocationRepository>(
    State(state): State<Arc<AppState<R>>>,
    claims: Option<Extension<Claims>>,
) -> Result<Json<ScheduleResponse>, ApiError> {
    let viewer = claims.as_ref().map(|c| c.user_id.as_str());
    let schedule = state.allocation.schedule(viewer).await?;

    Ok(Json(ScheduleResponse {
        success: true,
        schedule,
    }))
}
