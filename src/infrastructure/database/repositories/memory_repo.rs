use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::domain::entities::{Entry, EntryState, Game, Player, Slot};
use crate::domain::repositories::{AllocationRepository, AllocationTx, RepositoryError};
use crate::domain::value_objects::{GamePredicate, PlayerBounds};

#[derive(Debug, Clone, Default)]
struct MemoryState {
    /// Insertion order
    games: Vec<Game>,
    slots: HashMap<String, Slot>,
    /// Insertion order
    entries: Vec<Entry>,
    players: HashMap<String, Player>,
}

impl MemoryState {
    fn has_entered(&self, player_id: &str, game: &Game) -> bool {
        self.entries.iter().any(|e| {
            e.player_id == player_id
                && self
                    .slots
                    .get(&e.slot_id)
                    .map_or(false, |s| s.game_id == game.id)
        })
    }

    fn matching_games(&self, predicate: Option<&GamePredicate>) -> Vec<&Game> {
        let has_entered = |player: &str, game: &Game| self.has_entered(player, game);
        let mut games: Vec<&Game> = self
            .games
            .iter()
            .rev()
            .filter(|g| predicate.map_or(true, |p| p.matches(g, &has_entered)))
            .collect();
        games.sort_by_key(|g| std::cmp::Reverse(g.created_at));
        games
    }

    fn sorted_slots<'a>(&self, slots: impl Iterator<Item = &'a Slot>) -> Vec<Slot> {
        let mut slots: Vec<Slot> = slots.cloned().collect();
        slots.sort_by(|a, b| a.start.cmp(&b.start).then_with(|| a.id.cmp(&b.id)));
        slots
    }
}

/// In-process store.
///
/// A transaction holds the whole store exclusively and works on a copy that
/// replaces the shared state on commit, so transactions are serializable and
/// all-or-nothing. Used by tests and for throwaway instances.
pub struct MemoryAllocationRepository {
    state: Arc<Mutex<MemoryState>>,
    acquire_timeout: Duration,
}

impl MemoryAllocationRepository {
    pub fn new(acquire_timeout: Duration) -> Self {
        Self {
            state: Arc::new(Mutex::new(MemoryState::default())),
            acquire_timeout,
        }
    }
}

impl Default for MemoryAllocationRepository {
    fn default() -> Self {
        Self::new(Duration::from_secs(2))
    }
}

pub struct MemoryTx {
    guard: OwnedMutexGuard<MemoryState>,
    working: MemoryState,
}

#[async_trait]
impl AllocationRepository for MemoryAllocationRepository {
    type Tx = MemoryTx;

    async fn begin(&self) -> Result<MemoryTx, RepositoryError> {
        let guard = tokio::time::timeout(self.acquire_timeout, self.state.clone().lock_owned())
            .await
            .map_err(|_| RepositoryError::Busy("timed out waiting for in-memory store".into()))?;
        let working = guard.clone();
        Ok(MemoryTx { guard, working })
    }
}

#[async_trait]
impl AllocationTx for MemoryTx {
    async fn find_game(&mut self, id: &str) -> Result<Option<Game>, RepositoryError> {
        Ok(self.working.games.iter().find(|g| g.id == id).cloned())
    }

    async fn find_game_by_slug(&mut self, slug: &str) -> Result<Option<Game>, RepositoryError> {
        Ok(self.working.games.iter().find(|g| g.slug == slug).cloned())
    }

    async fn find_games_by_ids(&mut self, ids: &[String]) -> Result<Vec<Game>, RepositoryError> {
        Ok(self
            .working
            .games
            .iter()
            .filter(|g| ids.contains(&g.id))
            .cloned()
            .collect())
    }

    async fn list_games(
        &mut self,
        predicate: Option<&GamePredicate>,
        limit: u32,
        offset: u32,
    ) -> Result<Vec<Game>, RepositoryError> {
        Ok(self
            .working
            .matching_games(predicate)
            .into_iter()
            .skip(offset as usize)
            .take(limit as usize)
            .cloned()
            .collect())
    }

    async fn count_games(
        &mut self,
        predicate: Option<&GamePredicate>,
    ) -> Result<u64, RepositoryError> {
        Ok(self.working.matching_games(predicate).len() as u64)
    }

    async fn insert_game(&mut self, game: &Game) -> Result<(), RepositoryError> {
        if self.working.games.iter().any(|g| g.slug == game.slug) {
            return Err(RepositoryError::AlreadyExists(format!("game {}", game.slug)));
        }
        self.working.games.push(game.clone());
        Ok(())
    }

    async fn update_game_bounds(
        &mut self,
        game_id: &str,
        bounds: &PlayerBounds,
    ) -> Result<(), RepositoryError> {
        let game = self
            .working
            .games
            .iter_mut()
            .find(|g| g.id == game_id)
            .ok_or_else(|| RepositoryError::NotFound(format!("game {}", game_id)))?;
        game.bounds = *bounds;
        Ok(())
    }

    async fn delete_game(&mut self, id: &str) -> Result<(), RepositoryError> {
        let state = &mut self.working;
        state.games.retain(|g| g.id != id);
        let removed: Vec<String> = state
            .slots
            .values()
            .filter(|s| s.game_id == id)
            .map(|s| s.id.clone())
            .collect();
        for slot_id in &removed {
            state.slots.remove(slot_id);
        }
        state.entries.retain(|e| !removed.contains(&e.slot_id));
        Ok(())
    }

    async fn find_slot(&mut self, id: &str) -> Result<Option<Slot>, RepositoryError> {
        Ok(self.working.slots.get(id).cloned())
    }

    async fn slots_for_game(&mut self, game_id: &str) -> Result<Vec<Slot>, RepositoryError> {
        let state = &self.working;
        Ok(state.sorted_slots(state.slots.values().filter(|s| s.game_id == game_id)))
    }

    async fn all_slots(&mut self) -> Result<Vec<Slot>, RepositoryError> {
        let state = &self.working;
        Ok(state.sorted_slots(state.slots.values()))
    }

    async fn insert_slot(&mut self, slot: &Slot) -> Result<(), RepositoryError> {
        if !self.working.games.iter().any(|g| g.id == slot.game_id) {
            return Err(RepositoryError::NotFound(format!("game {}", slot.game_id)));
        }
        self.working.slots.insert(slot.id.clone(), slot.clone());
        Ok(())
    }

    async fn update_slot(&mut self, slot: &Slot) -> Result<(), RepositoryError> {
        match self.working.slots.get_mut(&slot.id) {
            Some(existing) => {
                *existing = slot.clone();
                Ok(())
            }
            None => Err(RepositoryError::NotFound(format!("slot {}", slot.id))),
        }
    }

    async fn delete_slot(&mut self, id: &str) -> Result<(), RepositoryError> {
        self.working.slots.remove(id);
        self.working.entries.retain(|e| e.slot_id != id);
        Ok(())
    }

    async fn find_entry(&mut self, id: &str) -> Result<Option<Entry>, RepositoryError> {
        Ok(self.working.entries.iter().find(|e| e.id == id).cloned())
    }

    async fn find_entry_for(
        &mut self,
        player_id: &str,
        slot_id: &str,
    ) -> Result<Option<Entry>, RepositoryError> {
        Ok(self
            .working
            .entries
            .iter()
            .find(|e| e.player_id == player_id && e.slot_id == slot_id)
            .cloned())
    }

    async fn entries_for_slot(&mut self, slot_id: &str) -> Result<Vec<Entry>, RepositoryError> {
        Ok(self
            .working
            .entries
            .iter()
            .filter(|e| e.slot_id == slot_id)
            .cloned()
            .collect())
    }

    async fn entries_for_player(
        &mut self,
        player_id: &str,
    ) -> Result<Vec<Entry>, RepositoryError> {
        Ok(self
            .working
            .entries
            .iter()
            .filter(|e| e.player_id == player_id)
            .cloned()
            .collect())
    }

    async fn count_accepted(&mut self, slot_id: &str) -> Result<u32, RepositoryError> {
        Ok(self
            .working
            .entries
            .iter()
            .filter(|e| e.slot_id == slot_id && e.state == EntryState::Accepted)
            .count() as u32)
    }

    async fn accepted_slots_for_player(
        &mut self,
        player_id: &str,
    ) -> Result<Vec<Slot>, RepositoryError> {
        let state = &self.working;
        let slot_ids: Vec<&String> = state
            .entries
            .iter()
            .filter(|e| e.player_id == player_id && e.state == EntryState::Accepted)
            .map(|e| &e.slot_id)
            .collect();
        Ok(state.sorted_slots(
            state
                .slots
                .values()
                .filter(|s| slot_ids.contains(&&s.id)),
        ))
    }

    async fn insert_entry(&mut self, entry: &Entry) -> Result<(), RepositoryError> {
        let state = &mut self.working;
        if !state.slots.contains_key(&entry.slot_id) {
            return Err(RepositoryError::NotFound(format!("slot {}", entry.slot_id)));
        }
        if state
            .entries
            .iter()
            .any(|e| e.player_id == entry.player_id && e.slot_id == entry.slot_id)
        {
            return Err(RepositoryError::AlreadyExists(format!(
                "entry for player {} on slot {}",
                entry.player_id, entry.slot_id
            )));
        }
        state.entries.push(entry.clone());
        Ok(())
    }

    async fn update_entry(&mut self, entry: &Entry) -> Result<(), RepositoryError> {
        match self.working.entries.iter_mut().find(|e| e.id == entry.id) {
            Some(existing) => {
                existing.priority = entry.priority;
                existing.state = entry.state;
                Ok(())
            }
            None => Err(RepositoryError::NotFound(format!("entry {}", entry.id))),
        }
    }

    async fn delete_entry(&mut self, id: &str) -> Result<(), RepositoryError> {
        self.working.entries.retain(|e| e.id != id);
        Ok(())
    }

    async fn upsert_player(&mut self, player: &Player) -> Result<(), RepositoryError> {
        self.working
            .players
            .insert(player.id.clone(), player.clone());
        Ok(())
    }

    async fn find_players_by_ids(
        &mut self,
        ids: &[String],
    ) -> Result<Vec<Player>, RepositoryError> {
        Ok(ids
            .iter()
            .filter_map(|id| self.working.players.get(id).cloned())
            .collect())
    }

    async fn commit(self) -> Result<(), RepositoryError> {
        let MemoryTx { mut guard, working } = self;
        *guard = working;
        Ok(())
    }
}
