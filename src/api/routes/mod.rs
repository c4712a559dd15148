pub mod entries;
pub mod games;
pub mod health;
pub mod schedule;
pub mod slots;

use std::sync::Arc;

use axum::{
    middleware,
    routing::{delete, get, patch, post},
    Router,
};

use crate::api::middleware::{auth_middleware, optional_auth_middleware};
use crate::api::sse;
use crate::api::AppState;
use crate::domain::repositories::AllocationRepository;

/// Create the main API router
pub fn create_api_router<R: AllocationRepository>(
    state: Arc<AppState<R>>,
) -> Router<Arc<AppState<R>>> {
    Router::new()
        .nest("/games", create_games_router(state.clone()))
        .route(
            "/schedule",
            get(schedule::get_schedule::<R>).layer(middleware::from_fn_with_state(
                state.jwt_service.clone(),
                optional_auth_middleware,
            )),
        )
        .route("/events", get(sse::sse_handler::<R>))
        .with_state(state)
}

/// Games, their slots and the entries on those slots
fn create_games_router<R: AllocationRepository>(
    state: Arc<AppState<R>>,
) -> Router<Arc<AppState<R>>> {
    let jwt = state.jwt_service.clone();

    Router::new()
        // Public routes (optional auth)
        .route(
            "/",
            get(games::list_games::<R>).layer(middleware::from_fn_with_state(
                jwt.clone(),
                optional_auth_middleware,
            )),
        )
        .route(
            "/:slug",
            get(games::get_game::<R>).layer(middleware::from_fn_with_state(
                jwt.clone(),
                optional_auth_middleware,
            )),
        )
        // Protected routes (require auth)
        .route(
            "/",
            post(games::create_game::<R>)
                .layer(middleware::from_fn_with_state(jwt.clone(), auth_middleware)),
        )
        .route(
            "/:slug",
            delete(games::delete_game::<R>)
                .layer(middleware::from_fn_with_state(jwt.clone(), auth_middleware)),
        )
        .route(
            "/:slug/bounds",
            patch(games::set_bounds::<R>)
                .layer(middleware::from_fn_with_state(jwt.clone(), auth_middleware)),
        )
        .route(
            "/:slug/slots",
            post(slots::create_slot::<R>)
                .layer(middleware::from_fn_with_state(jwt.clone(), auth_middleware)),
        )
        .route(
            "/:slug/slots/:slotId",
            patch(slots::update_slot::<R>)
                .layer(middleware::from_fn_with_state(jwt.clone(), auth_middleware)),
        )
        .route(
            "/:slug/slots/:slotId",
            delete(slots::delete_slot::<R>)
                .layer(middleware::from_fn_with_state(jwt.clone(), auth_middleware)),
        )
        .route(
            "/:slug/slots/:slotId/entries",
            get(entries::list_entries::<R>)
                .layer(middleware::from_fn_with_state(jwt.clone(), auth_middleware)),
        )
        .route(
            "/:slug/slots/:slotId/entries",
            post(entries::submit_entry::<R>)
                .layer(middleware::from_fn_with_state(jwt.clone(), auth_middleware)),
        )
        .route(
            "/:slug/slots/:slotId/entries/mine",
            get(entries::get_own_entry::<R>)
                .layer(middleware::from_fn_with_state(jwt.clone(), auth_middleware)),
        )
        .route(
            "/:slug/slots/:slotId/entries/mine",
            patch(entries::update_priority::<R>)
                .layer(middleware::from_fn_with_state(jwt.clone(), auth_middleware)),
        )
        .route(
            "/:slug/slots/:slotId/entries/mine",
            delete(entries::withdraw_entry::<R>)
                .layer(middleware::from_fn_with_state(jwt.clone(), auth_middleware)),
        )
        .route(
            "/:slug/slots/:slotId/entries/:entryId",
            patch(entries::decide_entry::<R>)
                .layer(middleware::from_fn_with_state(jwt, auth_middleware)),
        )
        .with_state(state)
}
