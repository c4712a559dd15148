use serde::Serialize;

use super::{ensure_owner, load_game, load_slot, Actor, AllocationService};
use crate::application::error::AllocationError;
use crate::application::locks::LockKey;
use crate::application::retry::with_retry;
use crate::domain::entities::{Entry, Game, Player, Slot};
use crate::domain::repositories::{AllocationRepository, AllocationTx, RepositoryError};
use crate::domain::services::capacity_policy::{self, CapacityReport};
use crate::domain::services::priority_ranker;
use crate::domain::value_objects::Priority;

/// A changed entry together with the game it belongs to
#[derive(Debug, Clone)]
pub struct EntryOutput {
    pub game: Game,
    pub entry: Entry,
}

/// An entry with the identity of the player behind it
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RankedEntry {
    #[serde(flatten)]
    pub entry: Entry,
    pub player: Option<Player>,
}

/// Organizer view of a slot's entries
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SlotEntries {
    pub slot: Slot,
    pub capacity: CapacityReport,
    pub entries: Vec<RankedEntry>,
}

impl<R: AllocationRepository> AllocationService<R> {
    /// Register interest in a slot. New entries are always pending; conflicts
    /// are only checked once an organizer accepts.
    pub async fn submit_entry(
        &self,
        actor: &Actor,
        slug: &str,
        slot_id: &str,
        priority: i64,
    ) -> Result<EntryOutput, AllocationError> {
        let priority = Priority::new(priority)?;

        let output = with_retry(&self.retry, "submit_entry", || async move {
            let _locks = self
                .locks
                .acquire([
                    LockKey::Slot(slot_id.to_string()),
                    LockKey::Player(actor.player_id.clone()),
                ])
                .await?;

            let mut tx = self.repo.begin().await?;
            let game = load_game(&mut tx, slug).await?;
            let slot = load_slot(&mut tx, &game, slot_id).await?;
            if tx.find_entry_for(&actor.player_id, &slot.id).await?.is_some() {
                return Err(AllocationError::DuplicateEntry);
            }

            tx.upsert_player(&Player::new(&actor.player_id, &actor.username))
                .await?;
            let entry = Entry::new(
                uuid::Uuid::new_v4().to_string(),
                actor.player_id.clone(),
                slot.id,
                priority,
            );
            tx.insert_entry(&entry).await.map_err(|e| match e {
                RepositoryError::AlreadyExists(_) => AllocationError::DuplicateEntry,
                other => other.into(),
            })?;
            tx.commit().await?;
            Ok(EntryOutput { game, entry })
        })
        .await?;

        tracing::info!(
            "Player {} entered slot {} with priority {}",
            output.entry.player_id,
            output.entry.slot_id,
            output.entry.priority.value()
        );
        Ok(output)
    }

    /// Remove the caller's entry, whatever its state
    pub async fn withdraw_entry(
        &self,
        actor: &Actor,
        slug: &str,
        slot_id: &str,
    ) -> Result<EntryOutput, AllocationError> {
        let output = with_retry(&self.retry, "withdraw_entry", || async move {
            let _locks = self
                .locks
                .acquire([
                    LockKey::Slot(slot_id.to_string()),
                    LockKey::Player(actor.player_id.clone()),
                ])
                .await?;

            let mut tx = self.repo.begin().await?;
            let (game, entry) = own_entry(&mut tx, actor, slug, slot_id).await?;
            tx.delete_entry(&entry.id).await?;
            tx.commit().await?;
            Ok(EntryOutput { game, entry })
        })
        .await?;

        tracing::info!(
            "Player {} withdrew from slot {} ({})",
            output.entry.player_id,
            output.entry.slot_id,
            output.entry.state.as_str()
        );
        Ok(output)
    }

    /// Re-rank a pending entry
    pub async fn update_priority(
        &self,
        actor: &Actor,
        slug: &str,
        slot_id: &str,
        priority: i64,
    ) -> Result<EntryOutput, AllocationError> {
        let priority = Priority::new(priority)?;

        let output = with_retry(&self.retry, "update_priority", || async move {
            let _locks = self
                .locks
                .acquire([
                    LockKey::Slot(slot_id.to_string()),
                    LockKey::Player(actor.player_id.clone()),
                ])
                .await?;

            let mut tx = self.repo.begin().await?;
            let (game, mut entry) = own_entry(&mut tx, actor, slug, slot_id).await?;
            if !entry.is_pending() {
                return Err(AllocationError::InvalidState(format!(
                    "Priority can only change while pending, entry is {}",
                    entry.state.as_str()
                )));
            }
            entry.priority = priority;
            tx.update_entry(&entry).await?;
            tx.commit().await?;
            Ok(EntryOutput { game, entry })
        })
        .await?;

        tracing::info!(
            "Player {} changed priority on slot {} to {}",
            output.entry.player_id,
            output.entry.slot_id,
            output.entry.priority.value()
        );
        Ok(output)
    }

    /// The caller's own entry on a slot
    pub async fn get_own_entry(
        &self,
        actor: &Actor,
        slug: &str,
        slot_id: &str,
    ) -> Result<Entry, AllocationError> {
        with_retry(&self.retry, "get_own_entry", || async move {
            let mut tx = self.repo.begin_read().await?;
            let (_, entry) = own_entry(&mut tx, actor, slug, slot_id).await?;
            Ok(entry)
        })
        .await
    }

    /// Entries of a slot in organizer order, for the game's organizer only
    pub async fn list_entries(
        &self,
        actor: &Actor,
        slug: &str,
        slot_id: &str,
    ) -> Result<SlotEntries, AllocationError> {
        with_retry(&self.retry, "list_entries", || async move {
            let mut tx = self.repo.begin_read().await?;
            let game = load_game(&mut tx, slug).await?;
            ensure_owner(actor, &game)?;
            let slot = load_slot(&mut tx, &game, slot_id).await?;

            let entries = priority_ranker::rank(tx.entries_for_slot(&slot.id).await?);
            let accepted = entries.iter().filter(|e| e.is_accepted()).count() as u32;

            let player_ids: Vec<String> = entries.iter().map(|e| e.player_id.clone()).collect();
            let players = tx.find_players_by_ids(&player_ids).await?;

            let entries = entries
                .into_iter()
                .map(|entry| RankedEntry {
                    player: players.iter().find(|p| p.id == entry.player_id).cloned(),
                    entry,
                })
                .collect();

            Ok(SlotEntries {
                slot,
                capacity: capacity_policy::report(&game.bounds, accepted),
                entries,
            })
        })
        .await
    }
}

async fn own_entry<T: AllocationTx>(
    tx: &mut T,
    actor: &Actor,
    slug: &str,
    slot_id: &str,
) -> Result<(Game, Entry), AllocationError> {
    let game = load_game(tx, slug).await?;
    let slot = load_slot(tx, &game, slot_id).await?;
    let entry = tx
        .find_entry_for(&actor.player_id, &slot.id)
        .await?
        .ok_or(AllocationError::NotFound("Entry"))?;
    Ok((game, entry))
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use super::*;
    use crate::domain::entities::EntryState;

    #[tokio::test]
    async fn test_submit_then_list() {
        let service = service();
        let org = Actor::organizer("o1", "olga");
        let (game, slot) = game_with_slot(&service, &org, "Heist", None, at(10, 0), at(12, 0)).await;
        let player = Actor::player("p1", "pat");

        let entry = service.submit_entry(&player, &game.slug, &slot.id, 4).await.unwrap().entry;
        assert_eq!(entry.state, EntryState::Pending);
        assert_eq!(entry.priority.value(), 4);

        let listed = service.list_entries(&org, &game.slug, &slot.id).await.unwrap();
        assert_eq!(listed.entries.len(), 1);
        assert_eq!(listed.entries[0].entry, entry);
        assert_eq!(listed.entries[0].player.as_ref().unwrap().username, "pat");
        assert_eq!(listed.capacity.accepted, 0);

        let mine = service.get_own_entry(&player, &game.slug, &slot.id).await.unwrap();
        assert_eq!(mine.id, entry.id);
    }

    #[tokio::test]
    async fn test_duplicate_and_invalid_priority() {
        let service = service();
        let org = Actor::organizer("o1", "olga");
        let (game, slot) = game_with_slot(&service, &org, "Heist", None, at(10, 0), at(12, 0)).await;
        let player = Actor::player("p1", "pat");

        service.submit_entry(&player, &game.slug, &slot.id, 3).await.unwrap();
        assert!(matches!(
            service.submit_entry(&player, &game.slug, &slot.id, 5).await,
            Err(AllocationError::DuplicateEntry)
        ));
        for bad in [0, 6, -1] {
            assert!(matches!(
                service.submit_entry(&Actor::player("p2", "sam"), &game.slug, &slot.id, bad).await,
                Err(AllocationError::InvalidPriority(p)) if p == bad
            ));
        }
        let listed = service.list_entries(&org, &game.slug, &slot.id).await.unwrap();
        assert_eq!(listed.entries.len(), 1);
    }

    #[tokio::test]
    async fn test_submission_ignores_conflicts() {
        let service = service();
        let org = Actor::organizer("o1", "olga");
        let (heist, a) = game_with_slot(&service, &org, "Heist", None, at(10, 0), at(12, 0)).await;
        let (jaws, b) = game_with_slot(&service, &org, "Jaws", None, at(11, 0), at(13, 0)).await;
        let player = Actor::player("p1", "pat");

        let first = service.submit_entry(&player, &heist.slug, &a.id, 3).await.unwrap().entry;
        service.accept(&org, &first.id).await.unwrap();
        let second = service.submit_entry(&player, &jaws.slug, &b.id, 3).await.unwrap().entry;
        assert_eq!(second.state, EntryState::Pending);
    }

    #[tokio::test]
    async fn test_priority_only_changes_while_pending() {
        let service = service();
        let org = Actor::organizer("o1", "olga");
        let (game, slot) = game_with_slot(&service, &org, "Heist", None, at(10, 0), at(12, 0)).await;
        let player = Actor::player("p1", "pat");
        let entry = service.submit_entry(&player, &game.slug, &slot.id, 2).await.unwrap().entry;

        let updated = service.update_priority(&player, &game.slug, &slot.id, 5).await.unwrap().entry;
        assert_eq!(updated.priority.value(), 5);
        assert!(matches!(
            service.update_priority(&player, &game.slug, &slot.id, 9).await,
            Err(AllocationError::InvalidPriority(9))
        ));

        service.accept(&org, &entry.id).await.unwrap();
        assert!(matches!(
            service.update_priority(&player, &game.slug, &slot.id, 1).await,
            Err(AllocationError::InvalidState(_))
        ));
    }

    #[tokio::test]
    async fn test_withdraw_any_state() {
        let service = service();
        let org = Actor::organizer("o1", "olga");
        let (game, slot) = game_with_slot(&service, &org, "Heist", Some(1), at(10, 0), at(12, 0)).await;
        let player = Actor::player("p1", "pat");
        let entry = service.submit_entry(&player, &game.slug, &slot.id, 2).await.unwrap().entry;
        service.accept(&org, &entry.id).await.unwrap();

        let removed = service.withdraw_entry(&player, &game.slug, &slot.id).await.unwrap().entry;
        assert_eq!(removed.state, EntryState::Accepted);
        assert!(matches!(
            service.withdraw_entry(&player, &game.slug, &slot.id).await,
            Err(AllocationError::NotFound("Entry"))
        ));

        // capacity is freed for the next player
        let other = Actor::player("p2", "sam");
        let next = service.submit_entry(&other, &game.slug, &slot.id, 1).await.unwrap().entry;
        service.accept(&org, &next.id).await.unwrap();
    }

    #[tokio::test]
    async fn test_only_the_organizer_lists_entries() {
        let service = service();
        let org = Actor::organizer("o1", "olga");
        let (game, slot) = game_with_slot(&service, &org, "Heist", None, at(10, 0), at(12, 0)).await;
        assert!(matches!(
            service
                .list_entries(&Actor::player("p1", "pat"), &game.slug, &slot.id)
                .await,
            Err(AllocationError::Forbidden(_))
        ));
    }

    #[tokio::test]
    async fn test_list_is_ranked() {
        let service = service();
        let org = Actor::organizer("o1", "olga");
        let (game, slot) = game_with_slot(&service, &org, "Heist", None, at(10, 0), at(12, 0)).await;

        let low = service
            .submit_entry(&Actor::player("p1", "pat"), &game.slug, &slot.id, 1)
            .await
            .unwrap()
            .entry;
        let high = service
            .submit_entry(&Actor::player("p2", "sam"), &game.slug, &slot.id, 5)
            .await
            .unwrap()
            .entry;
        let rejected = service
            .submit_entry(&Actor::player("p3", "kim"), &game.slug, &slot.id, 5)
            .await
            .unwrap()
            .entry;
        service.accept(&org, &low.id).await.unwrap();
        service.reject(&org, &rejected.id).await.unwrap();

        let ids: Vec<String> = service
            .list_entries(&org, &game.slug, &slot.id)
            .await
            .unwrap()
            .entries
            .into_iter()
            .map(|e| e.entry.id)
            .collect();
        assert_eq!(ids, vec![low.id, high.id, rejected.id]);
    }
}
