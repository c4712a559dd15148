use std::sync::Arc;

use async_broadcast::{broadcast, InactiveReceiver, Sender};
use serde::Serialize;

use crate::application::retry::RetryPolicy;
use crate::application::AllocationService;
use crate::domain::entities::{Entry, EntryState, Game, Slot};
use crate::domain::repositories::AllocationRepository;
use crate::infrastructure::auth::JwtService;
use crate::infrastructure::config::AppConfig;

const EVENT_CAPACITY: usize = 1000;

/// Application state shared across all handlers
pub struct AppState<R: AllocationRepository> {
    /// Every read and write of sign-up data goes through here
    pub allocation: Arc<AllocationService<R>>,

    /// JWT service for token verification
    pub jwt_service: Arc<JwtService>,

    /// Event broadcaster for SSE
    pub event_sender: Sender<AllocationEvent>,
    /// Keeps the channel open while no client listens
    pub event_receiver: InactiveReceiver<AllocationEvent>,
}

impl<R: AllocationRepository> AppState<R> {
    pub fn new(repo: Arc<R>, config: &AppConfig) -> Self {
        let allocation = Arc::new(AllocationService::new(
            repo,
            config.window,
            config.lock_timeout,
            RetryPolicy::new(config.retry_attempts, RetryPolicy::default().backoff),
        ));
        let jwt_service = Arc::new(JwtService::new(&config.jwt_secret));

        // Slow SSE clients lose the oldest events instead of blocking writers
        let (mut event_sender, event_receiver) = broadcast(EVENT_CAPACITY);
        event_sender.set_overflow(true);

        Self {
            allocation,
            jwt_service,
            event_sender,
            event_receiver: event_receiver.deactivate(),
        }
    }

    /// Broadcast an event to all connected SSE clients
    pub fn broadcast_event(&self, event: AllocationEvent) {
        tracing::debug!(
            "Broadcasting event '{}' to {} receivers",
            event.event_type,
            self.event_sender.receiver_count()
        );
        match self.event_sender.try_broadcast(event) {
            Ok(None) => {}
            Ok(Some(_)) => {
                tracing::debug!("Event channel full, oldest event dropped");
            }
            Err(e) => {
                tracing::warn!("Failed to broadcast event: {:?}", e);
            }
        }
    }
}

/// Change notification pushed to SSE clients
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AllocationEvent {
    #[serde(rename = "type")]
    pub event_type: String,
    pub game_slug: String,
    /// Entity fields, flattened into the root
    #[serde(flatten)]
    pub data: serde_json::Value,
    pub timestamp: i64,
    /// Users allowed to see the event; `None` means everyone
    #[serde(skip)]
    pub audience: Option<Vec<String>>,
}

impl AllocationEvent {
    pub fn new(event_type: &str, game_slug: &str) -> Self {
        Self {
            event_type: event_type.to_string(),
            game_slug: game_slug.to_string(),
            data: serde_json::Value::Object(serde_json::Map::new()),
            timestamp: chrono::Utc::now().timestamp_millis(),
            audience: None,
        }
    }

    pub fn with_data(mut self, data: impl Serialize) -> Self {
        self.data = serde_json::to_value(data)
            .unwrap_or_else(|_| serde_json::Value::Object(serde_json::Map::new()));
        self
    }

    pub fn for_users(mut self, users: Vec<String>) -> Self {
        self.audience = Some(users);
        self
    }

    pub fn game_created(game: &Game) -> Self {
        Self::new("gameCreated", &game.slug).with_data(game)
    }

    pub fn game_deleted(game: &Game) -> Self {
        Self::new("gameDeleted", &game.slug).with_data(serde_json::json!({ "id": game.id }))
    }

    pub fn slot(event_type: &str, game_slug: &str, slot: &Slot) -> Self {
        Self::new(event_type, game_slug).with_data(slot)
    }

    /// Entry changes are only shown to the player and the organizer
    pub fn entry(event_type: &str, game: &Game, entry: &Entry) -> Self {
        Self::new(event_type, &game.slug)
            .with_data(entry)
            .for_users(vec![entry.player_id.clone(), game.organizer_id.clone()])
    }

    pub fn decision(game: &Game, entry: &Entry) -> Self {
        let event_type = match entry.state {
            EntryState::Accepted => "entryAccepted",
            EntryState::Rejected => "entryRejected",
            EntryState::Pending => "entryUpdated",
        };
        Self::entry(event_type, game, entry)
    }

    pub fn is_visible_to(&self, user_id: Option<&str>) -> bool {
        match (&self.audience, user_id) {
            (None, _) => true,
            (Some(users), Some(user_id)) => users.iter().any(|u| u == user_id),
            (Some(_), None) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::value_objects::{PlayerBounds, Priority};

    #[test]
    fn test_entry_events_are_private() {
        let game = Game::new(
            "g1".into(),
            "heist".into(),
            "Heist".into(),
            String::new(),
            "o1".into(),
            vec![],
            PlayerBounds::unbounded(),
        );
        let entry = Entry::new("e1".into(), "p1".into(), "s1".into(), Priority::LOWEST);
        let event = AllocationEvent::entry("entrySubmitted", &game, &entry);

        assert!(event.is_visible_to(Some("p1")));
        assert!(event.is_visible_to(Some("o1")));
        assert!(!event.is_visible_to(Some("p2")));
        assert!(!event.is_visible_to(None));
        assert!(AllocationEvent::game_created(&game).is_visible_to(None));
    }

    #[test]
    fn test_event_json_shape() {
        let event = AllocationEvent::new("slotDeleted", "heist")
            .with_data(serde_json::json!({ "id": "s1" }));
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "slotDeleted");
        assert_eq!(json["gameSlug"], "heist");
        assert_eq!(json["id"], "s1");
        assert!(json.get("audience").is_none());
    }
}
