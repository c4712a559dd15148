//! API integration tests for the con-signup backend
//!
//! Drives the full router over HTTP requests, against both the in-memory
//! store and SQLite.

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tower::{Service, ServiceExt};

use con_signup::api::{create_app, AppState};
use con_signup::application::Actor;
use con_signup::domain::repositories::AllocationRepository;
use con_signup::infrastructure::auth::JwtService;
use con_signup::infrastructure::config::AppConfig;
use con_signup::infrastructure::database::repositories::{
    MemoryAllocationRepository, SqliteAllocationRepository,
};

const SECRET: &str = "test-secret-key";

fn test_config() -> AppConfig {
    let vars: HashMap<&str, &str> = [
        ("JWT_SECRET", SECRET),
        ("START_OF_CON", "2024-08-09T00:00:00Z"),
        ("END_OF_CON", "2024-08-18T23:59:59Z"),
        ("LOCK_TIMEOUT_MS", "500"),
    ]
    .into_iter()
    .collect();
    AppConfig::from_lookup(|key| vars.get(key).map(|v| v.to_string())).unwrap()
}

fn app_with<R: AllocationRepository>(repo: R) -> Router {
    let state = AppState::new(Arc::new(repo), &test_config());
    create_app(Arc::new(state))
}

/// Helper to create a test application on the in-memory store
fn create_test_app() -> Router {
    app_with(MemoryAllocationRepository::new(Duration::from_millis(500)))
}

async fn create_sqlite_app() -> Router {
    let repo = SqliteAllocationRepository::connect("sqlite::memory:", Duration::from_millis(500))
        .await
        .expect("Failed to open in-memory SQLite");
    app_with(repo)
}

fn token(actor: &Actor) -> String {
    JwtService::new(SECRET).sign(actor).unwrap()
}

fn organizer_token() -> String {
    token(&Actor::organizer("org-1", "keeper"))
}

fn player_token(id: &str) -> String {
    token(&Actor::player(id, format!("player {}", id)))
}

/// Send a request and decode the JSON body (Null when empty)
async fn send(
    app: &mut Router,
    method: &str,
    path: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(path);
    if let Some(token) = token {
        builder = builder.header("Authorization", format!("Bearer {}", token));
    }
    let request = match body {
        Some(body) => builder
            .header("Content-Type", "application/json")
            .body(Body::from(serde_json::to_string(&body).unwrap()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = ServiceExt::<Request<Body>>::ready(app)
        .await
        .unwrap()
        .call(request)
        .await
        .unwrap();

    let status = response.status();
    let body_bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json: Value = serde_json::from_slice(&body_bytes).unwrap_or(Value::Null);

    (status, json)
}

async fn get(app: &mut Router, path: &str, token: Option<&str>) -> (StatusCode, Value) {
    send(app, "GET", path, token, None).await
}

async fn post(app: &mut Router, path: &str, token: &str, body: Value) -> (StatusCode, Value) {
    send(app, "POST", path, Some(token), Some(body)).await
}

async fn patch(app: &mut Router, path: &str, token: &str, body: Value) -> (StatusCode, Value) {
    send(app, "PATCH", path, Some(token), Some(body)).await
}

/// Create a game with one slot and return the slot's path
async fn game_with_slot(
    app: &mut Router,
    organizer: &str,
    name: &str,
    max_players: Option<u32>,
    start: &str,
    end: &str,
) -> String {
    let (status, body) = post(
        app,
        "/api/games",
        organizer,
        json!({ "name": name, "maxPlayers": max_players }),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    let slug = body["game"]["slug"].as_str().unwrap().to_string();

    let (status, body) = post(
        app,
        &format!("/api/games/{}/slots", slug),
        organizer,
        json!({ "start": start, "end": end }),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    let slot_id = body["slot"]["id"].as_str().unwrap();

    format!("/api/games/{}/slots/{}", slug, slot_id)
}

async fn enter(app: &mut Router, slot_path: &str, player: &str, priority: i64) -> String {
    let (status, body) = post(
        app,
        &format!("{}/entries", slot_path),
        player,
        json!({ "priority": priority }),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    body["entry"]["id"].as_str().unwrap().to_string()
}

async fn decide(
    app: &mut Router,
    slot_path: &str,
    entry_id: &str,
    organizer: &str,
    state: &str,
) -> (StatusCode, Value) {
    patch(
        app,
        &format!("{}/entries/{}", slot_path, entry_id),
        organizer,
        json!({ "state": state }),
    )
    .await
}

// ============================================================================
// Health
// ============================================================================

#[tokio::test]
async fn test_health_reports_storage() {
    let mut app = create_test_app();

    let (status, body) = get(&mut app, "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["storage"], "ok");
}

// ============================================================================
// Games
// ============================================================================

#[tokio::test]
async fn test_create_game_requires_auth() {
    let mut app = create_test_app();

    let (status, _) = send(
        &mut app,
        "POST",
        "/api/games",
        None,
        Some(json!({ "name": "Jaws" })),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = send(
        &mut app,
        "POST",
        "/api/games",
        Some("not-a-token"),
        Some(json!({ "name": "Jaws" })),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_plain_player_cannot_create_game() {
    let mut app = create_test_app();

    let (status, body) = post(
        &mut app,
        "/api/games",
        &player_token("p1"),
        json!({ "name": "Jaws" }),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["code"], "FORBIDDEN");
}

#[tokio::test]
async fn test_create_and_list_games() {
    let mut app = create_test_app();
    let org = organizer_token();

    let (status, body) = post(
        &mut app,
        "/api/games",
        &org,
        json!({ "name": "Masks of Nyarlathotep", "minPlayers": 3, "maxPlayers": 5 }),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["success"], true);
    assert_eq!(body["game"]["slug"], "masks-of-nyarlathotep");
    assert_eq!(body["game"]["organizerId"], "org-1");

    let (status, body) = post(
        &mut app,
        "/api/games",
        &org,
        json!({ "name": "Bad bounds", "minPlayers": 6, "maxPlayers": 2 }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "VALIDATION_ERROR");

    let (status, body) = get(&mut app, "/api/games", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 1);
    assert_eq!(body["page"], 1);
    assert_eq!(body["games"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_unknown_game_is_not_found() {
    let mut app = create_test_app();

    let (status, body) = get(&mut app, "/api/games/no-such-game", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "NOT_FOUND");
}

#[tokio::test]
async fn test_only_owner_manages_game() {
    let mut app = create_test_app();
    let slot_path = game_with_slot(
        &mut app,
        &organizer_token(),
        "Jaws",
        None,
        "2024-08-10T10:00:00Z",
        "2024-08-10T14:00:00Z",
    )
    .await;
    let other = token(&Actor::organizer("org-2", "rival"));

    let (status, _) = send(&mut app, "DELETE", &slot_path, Some(&other), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = get(&mut app, &format!("{}/entries", slot_path), Some(&other)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = send(&mut app, "DELETE", "/api/games/jaws", Some(&other), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

// ============================================================================
// Slots
// ============================================================================

#[tokio::test]
async fn test_slot_time_validation() {
    let mut app = create_test_app();
    let org = organizer_token();
    post(&mut app, "/api/games", &org, json!({ "name": "Jaws" })).await;

    let (status, body) = post(
        &mut app,
        "/api/games/jaws/slots",
        &org,
        json!({ "start": "2024-08-10T14:00:00Z", "end": "2024-08-10T10:00:00Z" }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "INVALID_RANGE");

    let (status, body) = post(
        &mut app,
        "/api/games/jaws/slots",
        &org,
        json!({ "start": "2024-08-20T10:00:00Z", "end": "2024-08-20T14:00:00Z" }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "OUT_OF_WINDOW");
}

// ============================================================================
// Entries and decisions
// ============================================================================

#[tokio::test]
async fn test_entry_lifecycle() {
    let mut app = create_test_app();
    let org = organizer_token();
    let p1 = player_token("p1");
    let slot_path = game_with_slot(
        &mut app,
        &org,
        "Jaws",
        Some(4),
        "2024-08-10T10:00:00Z",
        "2024-08-10T14:00:00Z",
    )
    .await;

    let entry_id = enter(&mut app, &slot_path, &p1, 2).await;

    let (status, body) = post(
        &mut app,
        &format!("{}/entries", slot_path),
        &p1,
        json!({ "priority": 3 }),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "DUPLICATE_ENTRY");

    let mine = format!("{}/entries/mine", slot_path);
    let (status, body) = patch(&mut app, &mine, &p1, json!({ "priority": 1 })).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["entry"]["priority"], 1);
    assert_eq!(body["entry"]["state"], "pending");

    let (status, body) = get(&mut app, &format!("{}/entries", slot_path), Some(&org)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["entries"][0]["id"], entry_id.as_str());
    assert_eq!(body["entries"][0]["player"]["username"], "player p1");

    let (status, body) = decide(&mut app, &slot_path, &entry_id, &org, "accepted").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["entry"]["state"], "accepted");

    let (status, body) = patch(&mut app, &mine, &p1, json!({ "priority": 2 })).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "INVALID_STATE");

    let (status, body) = get(&mut app, "/api/games/jaws", Some(&p1)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["isOrganizer"], false);
    assert_eq!(body["slots"][0]["accepted"], 1);
    assert_eq!(body["slots"][0]["viewerAccepted"], true);

    let (status, _) = send(&mut app, "DELETE", &mine, Some(&p1), None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = get(&mut app, &mine, Some(&p1)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_priority_out_of_range() {
    let mut app = create_test_app();
    let slot_path = game_with_slot(
        &mut app,
        &organizer_token(),
        "Jaws",
        None,
        "2024-08-10T10:00:00Z",
        "2024-08-10T14:00:00Z",
    )
    .await;

    let (status, body) = post(
        &mut app,
        &format!("{}/entries", slot_path),
        &player_token("p1"),
        json!({ "priority": 9 }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "INVALID_PRIORITY");
}

#[tokio::test]
async fn test_accept_blocked_by_overlapping_acceptance() {
    let mut app = create_test_app();
    let org = organizer_token();
    let p1 = player_token("p1");

    let morning = game_with_slot(
        &mut app,
        &org,
        "Jaws",
        None,
        "2024-08-10T10:00:00Z",
        "2024-08-10T14:00:00Z",
    )
    .await;
    let lunch = game_with_slot(
        &mut app,
        &org,
        "Alien",
        None,
        "2024-08-10T12:00:00Z",
        "2024-08-10T16:00:00Z",
    )
    .await;

    let first = enter(&mut app, &morning, &p1, 1).await;
    let second = enter(&mut app, &lunch, &p1, 2).await;

    let (status, _) = decide(&mut app, &morning, &first, &org, "accepted").await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = decide(&mut app, &lunch, &second, &org, "accepted").await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "CONFLICT");

    // Rejecting is always allowed
    let (status, body) = decide(&mut app, &lunch, &second, &org, "rejected").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["entry"]["state"], "rejected");
}

#[tokio::test]
async fn test_accept_blocked_by_capacity() {
    let mut app = create_test_app();
    let org = organizer_token();
    let slot_path = game_with_slot(
        &mut app,
        &org,
        "Jaws",
        Some(3),
        "2024-08-10T10:00:00Z",
        "2024-08-10T14:00:00Z",
    )
    .await;

    let (status, body) = patch(&mut app, "/api/games/jaws/bounds", &org, json!({ "maxPlayers": 1 }))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["game"]["bounds"]["maxPlayers"], 1);

    let first = enter(&mut app, &slot_path, &player_token("p1"), 1).await;
    let second = enter(&mut app, &slot_path, &player_token("p2"), 1).await;

    let (status, _) = decide(&mut app, &slot_path, &first, &org, "accepted").await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = decide(&mut app, &slot_path, &second, &org, "accepted").await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "CAPACITY_EXCEEDED");
    assert_eq!(body["details"], "accepted=1 max=1");
}

#[tokio::test]
async fn test_decision_through_wrong_slot_is_not_found() {
    let mut app = create_test_app();
    let org = organizer_token();
    let jaws = game_with_slot(
        &mut app,
        &org,
        "Jaws",
        None,
        "2024-08-10T10:00:00Z",
        "2024-08-10T14:00:00Z",
    )
    .await;
    let alien = game_with_slot(
        &mut app,
        &org,
        "Alien",
        None,
        "2024-08-11T10:00:00Z",
        "2024-08-11T14:00:00Z",
    )
    .await;
    let entry_id = enter(&mut app, &jaws, &player_token("p1"), 1).await;

    let (status, _) = decide(&mut app, &alien, &entry_id, &org, "accepted").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

// ============================================================================
// Schedule
// ============================================================================

#[tokio::test]
async fn test_schedule_splits_by_viewer() {
    let mut app = create_test_app();
    let org = organizer_token();
    let p1 = player_token("p1");

    let jaws = game_with_slot(
        &mut app,
        &org,
        "Jaws",
        None,
        "2024-08-10T10:00:00Z",
        "2024-08-10T14:00:00Z",
    )
    .await;
    game_with_slot(
        &mut app,
        &org,
        "Alien",
        None,
        "2024-08-10T12:00:00Z",
        "2024-08-10T16:00:00Z",
    )
    .await;
    enter(&mut app, &jaws, &p1, 1).await;

    let (status, body) = get(&mut app, "/api/schedule", Some(&org)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["running"].as_array().unwrap().len(), 2);

    let (status, body) = get(&mut app, "/api/schedule", Some(&p1)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["entered"].as_array().unwrap().len(), 1);
    assert_eq!(body["entered"][0]["gameSlug"], "jaws");
    assert_eq!(body["entered"][0]["entryState"], "pending");
    assert_eq!(body["other"].as_array().unwrap().len(), 1);

    let (status, body) = get(&mut app, "/api/schedule", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["other"].as_array().unwrap().len(), 2);
}

// ============================================================================
// SQLite backend
// ============================================================================

#[tokio::test]
async fn test_sqlite_allocation_flow() {
    let mut app = create_sqlite_app().await;
    let org = organizer_token();
    let p1 = player_token("p1");

    let (status, body) = get(&mut app, "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");

    let morning = game_with_slot(
        &mut app,
        &org,
        "Jaws",
        Some(2),
        "2024-08-10T10:00:00Z",
        "2024-08-10T14:00:00Z",
    )
    .await;
    let lunch = game_with_slot(
        &mut app,
        &org,
        "Alien",
        None,
        "2024-08-10T13:00:00Z",
        "2024-08-10T16:00:00Z",
    )
    .await;

    let first = enter(&mut app, &morning, &p1, 1).await;
    let second = enter(&mut app, &lunch, &p1, 2).await;

    let (status, body) = post(
        &mut app,
        &format!("{}/entries", morning),
        &p1,
        json!({ "priority": 1 }),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "DUPLICATE_ENTRY");

    let (status, _) = decide(&mut app, &morning, &first, &org, "accepted").await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = decide(&mut app, &lunch, &second, &org, "accepted").await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "CONFLICT");

    // Moving the accepted slot clear of the other one frees the player
    let (status, _) = patch(
        &mut app,
        &morning,
        &org,
        json!({ "start": "2024-08-10T08:00:00Z", "end": "2024-08-10T12:00:00Z" }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = decide(&mut app, &lunch, &second, &org, "accepted").await;
    assert_eq!(status, StatusCode::OK);

    // Now moving it back would double-book
    let (status, body) = patch(
        &mut app,
        &morning,
        &org,
        json!({ "start": "2024-08-10T10:00:00Z", "end": "2024-08-10T14:00:00Z" }),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "CONFLICT");

    let (status, _) = send(&mut app, "DELETE", "/api/games/jaws", Some(&org), None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = get(&mut app, "/api/schedule", Some(&p1)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["entered"].as_array().unwrap().len(), 1);
    assert_eq!(body["entered"][0]["entryState"], "accepted");
}

#[tokio::test]
async fn test_priority_accepts_numeric_string() {
    let mut app = create_test_app();
    let p1 = player_token("p1");
    let slot_path = game_with_slot(
        &mut app,
        &organizer_token(),
        "Jaws",
        None,
        "2024-08-10T10:00:00Z",
        "2024-08-10T14:00:00Z",
    )
    .await;

    let (status, body) = post(
        &mut app,
        &format!("{}/entries", slot_path),
        &p1,
        json!({ "priority": "3" }),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    assert_eq!(body["entry"]["priority"], 3);

    let (status, body) = patch(
        &mut app,
        &format!("{}/entries/mine", slot_path),
        &p1,
        json!({ "priority": "5" }),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["entry"]["priority"], 5);
}

#[tokio::test]
async fn test_malformed_body_uses_error_shape() {
    let mut app = create_test_app();
    let slot_path = game_with_slot(
        &mut app,
        &organizer_token(),
        "Jaws",
        None,
        "2024-08-10T10:00:00Z",
        "2024-08-10T14:00:00Z",
    )
    .await;
    let entries = format!("{}/entries", slot_path);
    let p1 = player_token("p1");

    for bad in [json!({ "priority": "high" }), json!({})] {
        let (status, body) = post(&mut app, &entries, &p1, bad).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "VALIDATION_ERROR");
        assert!(body["error"].is_string());
    }

    let (status, body) = post(
        &mut app,
        "/api/games/jaws/slots",
        &organizer_token(),
        json!({ "start": "next tuesday", "end": "2024-08-10T14:00:00Z" }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "VALIDATION_ERROR");

    // No content type at all
    let (status, body) = send(&mut app, "POST", &entries, Some(&p1), None).await;
    assert_eq!(status, StatusCode::UNSUPPORTED_MEDIA_TYPE);
    assert_eq!(body["code"], "VALIDATION_ERROR");
}
