use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
    Extension,
};
use serde::{Deserialize, Serialize};

use crate::api::error::ApiError;
use crate::api::extract::ApiJson;
use crate::api::middleware::Claims;
use crate::api::AppState;
use crate::application::allocation::{CreateGameInput, GameDetails, GameListing};
use crate::domain::entities::Game;
use crate::domain::repositories::AllocationRepository;
use crate::domain::value_objects::{GameFilter, PlayerBounds};
use crate::infrastructure::app_state::AllocationEvent;

// ============================================================================
// Request/Response DTOs
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListGamesQuery {
    pub page: Option<u32>,
    /// Comma separated warnings to hide
    pub content_warnings: Option<String>,
    pub entered: Option<bool>,
    pub running: Option<bool>,
    pub text: Option<String>,
}

impl ListGamesQuery {
    fn filter(&self) -> GameFilter {
        GameFilter {
            content_warnings: self
                .content_warnings
                .as_deref()
                .map(|cws| {
                    cws.split(',')
                        .map(str::trim)
                        .filter(|cw| !cw.is_empty())
                        .map(String::from)
                        .collect()
                })
                .unwrap_or_default(),
            entered: self.entered,
            running: self.running,
            text: self.text.clone(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ListGamesResponse {
    pub success: bool,
    #[serde(flatten)]
    pub listing: GameListing,
}

#[derive(Debug, Serialize)]
pub struct GameResponse {
    pub success: bool,
    pub game: Game,
}

#[derive(Debug, Serialize)]
pub struct GameDetailsResponse {
    pub success: bool,
    #[serde(flatten)]
    pub details: GameDetails,
    #[serde(rename = "isOrganizer")]
    pub is_organizer: bool,
}

// ============================================================================
// Route Handlers
// ============================================================================

/// GET /api/games - Filtered, paginated game list
pub async fn list_games<R: AllocationRepository>(
    State(state): State<Arc<AppState<R>>>,
    claims: Option<Extension<Claims>>,
    Query(query): Query<ListGamesQuery>,
) -> Result<Json<ListGamesResponse>, ApiError> {
    let viewer = claims.as_ref().map(|c| c.user_id.as_str());
    let listing = state
        .allocation
        .list_games(viewer, &query.filter(), query.page.unwrap_or(1))
        .await?;

    Ok(Json(ListGamesResponse {
        success: true,
        listing,
    }))
}

/// POST /api/games - Create a game owned by the caller
pub async fn create_game<R: AllocationRepository>(
    State(state): State<Arc<AppState<R>>>,
    Extension(claims): Extension<Claims>,
    ApiJson(body): ApiJson<CreateGameInput>,
) -> Result<(StatusCode, Json<GameResponse>), ApiError> {
    let game = state.allocation.create_game(&claims.actor(), body).await?;

    state.broadcast_event(AllocationEvent::game_created(&game));

    Ok((
        StatusCode::CREATED,
        Json(GameResponse {
            success: true,
            game,
        }),
    ))
}

/// GET /api/games/:slug - Game with its slots
pub async fn get_game<R: AllocationRepository>(
    State(state): State<Arc<AppState<R>>>,
    claims: Option<Extension<Claims>>,
    Path(slug): Path<String>,
) -> Result<Json<GameDetailsResponse>, ApiError> {
    let viewer = claims.as_ref().map(|c| c.user_id.as_str());
    let details = state.allocation.get_game(&slug, viewer).await?;
    let is_organizer = viewer.map_or(false, |v| details.game.is_organized_by(v));

    Ok(Json(GameDetailsResponse {
        success: true,
        details,
        is_organizer,
    }))
}

/// PATCH /api/games/:slug/bounds - Set min/max players
pub async fn set_bounds<R: AllocationRepository>(
    State(state): State<Arc<AppState<R>>>,
    Extension(claims): Extension<Claims>,
    Path(slug): Path<String>,
    ApiJson(bounds): ApiJson<PlayerBounds>,
) -> Result<Json<GameResponse>, ApiError> {
    let game = state
        .allocation
        .set_player_bounds(&claims.actor(), &slug, bounds)
        .await?;

    Ok(Json(GameResponse {
        success: true,
        game,
    }))
}

/// DELETE /api/games/:slug - Delete a game with its slots and entries
pub async fn delete_game<R: AllocationRepository>(
    State(state): State<Arc<AppState<R>>>,
    Extension(claims): Extension<Claims>,
    Path(slug): Path<String>,
) -> Result<Json<GameResponse>, ApiError> {
    let game = state.allocation.delete_game(&claims.actor(), &slug).await?;

    state.broadcast_event(AllocationEvent::game_deleted(&game));

    Ok(Json(GameResponse {
        success: true,
        game,
    }))
}
