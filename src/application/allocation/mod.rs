//! Command and query surface of the sign-up system.
//!
//! Every mutation runs under the in-process locks of the slots and players it
//! touches, then inside a single repository transaction that re-reads and
//! re-validates everything it decides on. Contention is retried a bounded
//! number of times.

mod decisions;
mod entries;
mod games;
mod schedule;
mod slots;

use std::sync::Arc;

use chrono::{DateTime, Utc};

pub use entries::{EntryOutput, RankedEntry, SlotEntries};
pub use games::{CreateGameInput, GameDetails, GameListing, SlotSummary, GAMES_PER_PAGE};
pub use schedule::{Schedule, ScheduleKind, ScheduledSlot};

use crate::application::error::AllocationError;
use crate::application::locks::LockManager;
use crate::application::retry::RetryPolicy;
use crate::domain::entities::{Game, Slot};
use crate::domain::repositories::{AllocationRepository, AllocationTx};
use crate::domain::value_objects::ConWindow;

/// The authenticated caller of an operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Actor {
    pub player_id: String,
    pub username: String,
    pub is_organizer: bool,
    pub is_admin: bool,
}

impl Actor {
    pub fn player(player_id: impl Into<String>, username: impl Into<String>) -> Self {
        Self {
            player_id: player_id.into(),
            username: username.into(),
            is_organizer: false,
            is_admin: false,
        }
    }

    pub fn organizer(player_id: impl Into<String>, username: impl Into<String>) -> Self {
        Self {
            is_organizer: true,
            ..Self::player(player_id, username)
        }
    }

    pub fn may_create_games(&self) -> bool {
        self.is_organizer || self.is_admin
    }
}

pub struct AllocationService<R: AllocationRepository> {
    repo: Arc<R>,
    locks: LockManager,
    window: ConWindow,
    retry: RetryPolicy,
}

impl<R: AllocationRepository> AllocationService<R> {
    pub fn new(
        repo: Arc<R>,
        window: ConWindow,
        lock_timeout: std::time::Duration,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            repo,
            locks: LockManager::new(lock_timeout),
            window,
            retry,
        }
    }

    pub fn window(&self) -> ConWindow {
        self.window
    }

    pub fn repository(&self) -> &Arc<R> {
        &self.repo
    }

    /// Range and window checks shared by slot creation and edits
    fn validate_times(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> Result<(), AllocationError> {
        for instant in [start, end] {
            if !self.window.contains(instant) {
                return Err(AllocationError::OutOfWindow(instant));
            }
        }
        if start >= end {
            return Err(AllocationError::InvalidRange);
        }
        Ok(())
    }
}

/// Only the organizer of a game may manage it or decide on its entries
fn ensure_owner(actor: &Actor, game: &Game) -> Result<(), AllocationError> {
    if game.is_organized_by(&actor.player_id) {
        Ok(())
    } else {
        tracing::warn!(
            "{} tried to manage game {} owned by {}",
            actor.player_id,
            game.slug,
            game.organizer_id
        );
        Err(AllocationError::Forbidden(format!(
            "Only the organizer of {} can do this",
            game.name
        )))
    }
}

async fn load_game<T: AllocationTx>(tx: &mut T, slug: &str) -> Result<Game, AllocationError> {
    tx.find_game_by_slug(slug)
        .await?
        .ok_or(AllocationError::NotFound("Game"))
}

/// Load a slot and make sure it belongs to `game`
async fn load_slot<T: AllocationTx>(
    tx: &mut T,
    game: &Game,
    slot_id: &str,
) -> Result<Slot, AllocationError> {
    match tx.find_slot(slot_id).await? {
        Some(slot) if slot.game_id == game.id => Ok(slot),
        _ => Err(AllocationError::NotFound("Slot")),
    }
}
