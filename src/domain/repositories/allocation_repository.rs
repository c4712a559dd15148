use async_trait::async_trait;

use crate::domain::entities::{Entry, Game, Player, Slot};
use crate::domain::repositories::RepositoryError;
use crate::domain::value_objects::{GamePredicate, PlayerBounds};

/// Persistence for games, slots, entries and the players behind them.
///
/// All reads and writes go through a transaction obtained from [`begin`].
/// A transaction that is dropped without [`AllocationTx::commit`] leaves no
/// trace.
///
/// [`begin`]: AllocationRepository::begin
#[async_trait]
pub trait AllocationRepository: Send + Sync + 'static {
    type Tx: AllocationTx;

    /// Open a transaction. Fails with [`RepositoryError::Busy`] if the store
    /// cannot be acquired in bounded time.
    async fn begin(&self) -> Result<Self::Tx, RepositoryError>;

    /// Open a transaction that will only read. Nothing written through it
    /// may be committed.
    async fn begin_read(&self) -> Result<Self::Tx, RepositoryError> {
        self.begin().await
    }
}

/// One unit of work against the store
#[async_trait]
pub trait AllocationTx: Send + Sized {
    // ========== Games ==========

    async fn find_game(&mut self, id: &str) -> Result<Option<Game>, RepositoryError>;

    async fn find_game_by_slug(&mut self, slug: &str) -> Result<Option<Game>, RepositoryError>;

    /// Batch lookup (avoids N+1 on schedule views)
    async fn find_games_by_ids(&mut self, ids: &[String]) -> Result<Vec<Game>, RepositoryError>;

    /// Games matching `predicate` (all games for `None`), newest first
    async fn list_games(
        &mut self,
        predicate: Option<&GamePredicate>,
        limit: u32,
        offset: u32,
    ) -> Result<Vec<Game>, RepositoryError>;

    async fn count_games(&mut self, predicate: Option<&GamePredicate>)
        -> Result<u64, RepositoryError>;

    /// Fails with `AlreadyExists` on a duplicate slug
    async fn insert_game(&mut self, game: &Game) -> Result<(), RepositoryError>;

    async fn update_game_bounds(
        &mut self,
        game_id: &str,
        bounds: &PlayerBounds,
    ) -> Result<(), RepositoryError>;

    /// Deletes the game with its slots and their entries
    async fn delete_game(&mut self, id: &str) -> Result<(), RepositoryError>;

    // ========== Slots ==========

    async fn find_slot(&mut self, id: &str) -> Result<Option<Slot>, RepositoryError>;

    /// Slots of a game ordered by start
    async fn slots_for_game(&mut self, game_id: &str) -> Result<Vec<Slot>, RepositoryError>;

    /// Every slot of the convention ordered by start
    async fn all_slots(&mut self) -> Result<Vec<Slot>, RepositoryError>;

    async fn insert_slot(&mut self, slot: &Slot) -> Result<(), RepositoryError>;

    async fn update_slot(&mut self, slot: &Slot) -> Result<(), RepositoryError>;

    /// Deletes the slot and its entries
    async fn delete_slot(&mut self, id: &str) -> Result<(), RepositoryError>;

    // ========== Entries ==========

    async fn find_entry(&mut self, id: &str) -> Result<Option<Entry>, RepositoryError>;

    async fn find_entry_for(
        &mut self,
        player_id: &str,
        slot_id: &str,
    ) -> Result<Option<Entry>, RepositoryError>;

    /// Entries of a slot in submission order
    async fn entries_for_slot(&mut self, slot_id: &str) -> Result<Vec<Entry>, RepositoryError>;

    /// Entries of a player across all slots
    async fn entries_for_player(&mut self, player_id: &str)
        -> Result<Vec<Entry>, RepositoryError>;

    async fn count_accepted(&mut self, slot_id: &str) -> Result<u32, RepositoryError>;

    /// Slots the player holds an accepted entry on
    async fn accepted_slots_for_player(
        &mut self,
        player_id: &str,
    ) -> Result<Vec<Slot>, RepositoryError>;

    /// Fails with `AlreadyExists` if the (player, slot) pair already has an entry
    async fn insert_entry(&mut self, entry: &Entry) -> Result<(), RepositoryError>;

    /// Persist priority and state changes
    async fn update_entry(&mut self, entry: &Entry) -> Result<(), RepositoryError>;

    async fn delete_entry(&mut self, id: &str) -> Result<(), RepositoryError>;

    // ========== Players ==========

    /// Remember the latest display name for a player
    async fn upsert_player(&mut self, player: &Player) -> Result<(), RepositoryError>;

    async fn find_players_by_ids(&mut self, ids: &[String]) -> Result<Vec<Player>, RepositoryError>;

    // ========== Transaction ==========

    async fn commit(self) -> Result<(), RepositoryError>;
}
