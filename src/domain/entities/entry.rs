use serde::{Deserialize, Serialize};

use crate::domain::value_objects::Priority;

/// Acceptance state of an entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryState {
    Pending,
    Accepted,
    Rejected,
}

impl EntryState {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntryState::Pending => "pending",
            EntryState::Accepted => "accepted",
            EntryState::Rejected => "rejected",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(EntryState::Pending),
            "accepted" => Some(EntryState::Accepted),
            "rejected" => Some(EntryState::Rejected),
            _ => None,
        }
    }

    /// Whether an organizer decision may move an entry from `self` to `target`.
    ///
    /// Nothing ever returns to `Pending`; a rejected player resubmits instead.
    pub fn can_transition_to(&self, target: EntryState) -> bool {
        match target {
            EntryState::Pending => false,
            EntryState::Accepted | EntryState::Rejected => true,
        }
    }
}

/// A player's ranked interest in one slot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Entry {
    pub id: String,
    pub player_id: String,
    pub slot_id: String,
    pub priority: Priority,
    pub state: EntryState,
    /// Milliseconds since the epoch
    pub created_at: i64,
}

impl Entry {
    /// Create a new pending entry
    pub fn new(id: String, player_id: String, slot_id: String, priority: Priority) -> Self {
        Self {
            id,
            player_id,
            slot_id,
            priority,
            state: EntryState::Pending,
            created_at: chrono::Utc::now().timestamp_millis(),
        }
    }

    pub fn is_pending(&self) -> bool {
        self.state == EntryState::Pending
    }

    pub fn is_accepted(&self) -> bool {
        self.state == EntryState::Accepted
    }
}
