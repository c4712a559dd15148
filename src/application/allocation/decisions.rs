use super::{ensure_owner, Actor, AllocationService, EntryOutput};
use crate::application::error::AllocationError;
use crate::application::locks::LockKey;
use crate::application::retry::with_retry;
use crate::domain::entities::EntryState;
use crate::domain::repositories::{AllocationRepository, AllocationTx};
use crate::domain::services::{capacity_policy, conflict_checker};

/// Where the caller claims the entry lives (game slug, slot id)
type Scope<'a> = Option<(&'a str, &'a str)>;

impl<R: AllocationRepository> AllocationService<R> {
    /// Accept an entry, gated by the slot's capacity and the player's other
    /// accepted slots. Accepting an accepted entry changes nothing.
    pub async fn accept(
        &self,
        actor: &Actor,
        entry_id: &str,
    ) -> Result<EntryOutput, AllocationError> {
        self.decide(actor, entry_id, EntryState::Accepted, None).await
    }

    /// Reject an entry. Rejecting a rejected entry changes nothing.
    pub async fn reject(
        &self,
        actor: &Actor,
        entry_id: &str,
    ) -> Result<EntryOutput, AllocationError> {
        self.decide(actor, entry_id, EntryState::Rejected, None).await
    }

    /// Organizer decision addressed through a game and slot. Fails with
    /// `NotFound` if the entry is not on that slot.
    pub async fn set_entry_state(
        &self,
        actor: &Actor,
        slug: &str,
        slot_id: &str,
        entry_id: &str,
        target: EntryState,
    ) -> Result<EntryOutput, AllocationError> {
        self.decide(actor, entry_id, target, Some((slug, slot_id))).await
    }

    async fn decide(
        &self,
        actor: &Actor,
        entry_id: &str,
        target: EntryState,
        scope: Scope<'_>,
    ) -> Result<EntryOutput, AllocationError> {
        let (output, changed) = with_retry(&self.retry, "decide", || async move {
            // Find out which slot and player to lock
            let (slot_id, player_id) = {
                let mut tx = self.repo.begin_read().await?;
                let entry = tx
                    .find_entry(entry_id)
                    .await?
                    .ok_or(AllocationError::NotFound("Entry"))?;
                (entry.slot_id, entry.player_id)
            };
            let _locks = self
                .locks
                .acquire([LockKey::Slot(slot_id), LockKey::Player(player_id)])
                .await?;

            let mut tx = self.repo.begin().await?;
            let mut entry = tx
                .find_entry(entry_id)
                .await?
                .ok_or(AllocationError::NotFound("Entry"))?;
            let slot = tx
                .find_slot(&entry.slot_id)
                .await?
                .ok_or(AllocationError::NotFound("Slot"))?;
            let game = tx
                .find_game(&slot.game_id)
                .await?
                .ok_or(AllocationError::NotFound("Game"))?;

            if let Some((slug, scoped_slot)) = scope {
                if game.slug != slug || slot.id != scoped_slot {
                    return Err(AllocationError::NotFound("Entry"));
                }
            }
            ensure_owner(actor, &game)?;

            if !entry.state.can_transition_to(target) {
                return Err(AllocationError::InvalidState(format!(
                    "Cannot move an entry from {} to {}",
                    entry.state.as_str(),
                    target.as_str()
                )));
            }
            if entry.state == target {
                return Ok((EntryOutput { game, entry }, false));
            }

            if target == EntryState::Accepted {
                let accepted = tx.count_accepted(&slot.id).await?;
                if !capacity_policy::can_accept(&game.bounds, accepted) {
                    return Err(AllocationError::CapacityExceeded {
                        accepted,
                        max: game.bounds.max_players.unwrap_or(accepted),
                    });
                }

                let held = tx.accepted_slots_for_player(&entry.player_id).await?;
                if let Some(clash) = conflict_checker::find_conflict(&slot, &held) {
                    return Err(AllocationError::Conflict(format!(
                        "Player is already accepted into slot {} ({} - {})",
                        clash.id, clash.start, clash.end
                    )));
                }
            }

            entry.state = target;
            tx.update_entry(&entry).await?;
            tx.commit().await?;
            Ok((EntryOutput { game, entry }, true))
        })
        .await
        .map_err(|e| {
            if !matches!(e, AllocationError::StorageFailure { .. }) {
                tracing::warn!("{} of entry {} refused: {}", target.as_str(), entry_id, e);
            }
            e
        })?;

        if changed {
            let entry = &output.entry;
            tracing::info!(
                "Entry {} of player {} on slot {} is now {}",
                entry.id,
                entry.player_id,
                entry.slot_id,
                entry.state.as_str()
            );
        }
        Ok(output)
    }
}
