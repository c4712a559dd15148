use chrono::{DateTime, Utc};

use super::{ensure_owner, load_game, load_slot, Actor, AllocationService};
use crate::application::error::AllocationError;
use crate::application::locks::LockKey;
use crate::application::retry::with_retry;
use crate::domain::entities::Slot;
use crate::domain::repositories::{AllocationRepository, AllocationTx};
use crate::domain::services::conflict_checker;

impl<R: AllocationRepository> AllocationService<R> {
    /// Schedule a new slot. Slots of different games may overlap freely.
    pub async fn create_slot(
        &self,
        actor: &Actor,
        slug: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Slot, AllocationError> {
        self.validate_times(start, end)?;

        let slot = with_retry(&self.retry, "create_slot", || async move {
            let mut tx = self.repo.begin().await?;
            let game = load_game(&mut tx, slug).await?;
            ensure_owner(actor, &game)?;

            let slot = Slot::new(uuid::Uuid::new_v4().to_string(), game.id, start, end);
            tx.insert_slot(&slot).await?;
            tx.commit().await?;
            Ok(slot)
        })
        .await?;

        tracing::info!("Slot {} created for {} ({} - {})", slot.id, slug, start, end);
        Ok(slot)
    }

    /// Move a slot. Refused with `Conflict` if a player accepted into it would
    /// end up overlapping another slot they are accepted into.
    pub async fn update_slot(
        &self,
        actor: &Actor,
        slug: &str,
        slot_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Slot, AllocationError> {
        self.validate_times(start, end)?;

        let slot = with_retry(&self.retry, "update_slot", || async move {
            let mut locks = self
                .locks
                .acquire([LockKey::Slot(slot_id.to_string())])
                .await?;

            // The accepted set of this slot cannot change while we hold its lock
            let accepted_players: Vec<String> = {
                let mut tx = self.repo.begin_read().await?;
                let game = load_game(&mut tx, slug).await?;
                ensure_owner(actor, &game)?;
                load_slot(&mut tx, &game, slot_id).await?;
                tx.entries_for_slot(slot_id)
                    .await?
                    .into_iter()
                    .filter(|e| e.is_accepted())
                    .map(|e| e.player_id)
                    .collect()
            };
            locks.merge(
                self.locks
                    .acquire(accepted_players.iter().cloned().map(LockKey::Player))
                    .await?,
            );

            let mut tx = self.repo.begin().await?;
            let game = load_game(&mut tx, slug).await?;
            let mut slot = load_slot(&mut tx, &game, slot_id).await?;
            slot.start = start;
            slot.end = end;

            for player_id in &accepted_players {
                let held = tx.accepted_slots_for_player(player_id).await?;
                if let Some(clash) = conflict_checker::find_conflict(&slot, &held) {
                    tracing::warn!(
                        "Refusing to move slot {}: player {} is accepted into overlapping slot {}",
                        slot.id,
                        player_id,
                        clash.id
                    );
                    return Err(AllocationError::Conflict(format!(
                        "Player {} is accepted into slot {} which would overlap",
                        player_id, clash.id
                    )));
                }
            }

            tx.update_slot(&slot).await?;
            tx.commit().await?;
            Ok(slot)
        })
        .await?;

        tracing::info!("Slot {} moved to {} - {}", slot.id, start, end);
        Ok(slot)
    }

    /// Remove a slot together with every entry on it
    pub async fn delete_slot(
        &self,
        actor: &Actor,
        slug: &str,
        slot_id: &str,
    ) -> Result<Slot, AllocationError> {
        let slot = with_retry(&self.retry, "delete_slot", || async move {
            let _locks = self
                .locks
                .acquire([LockKey::Slot(slot_id.to_string())])
                .await?;

            let mut tx = self.repo.begin().await?;
            let game = load_game(&mut tx, slug).await?;
            ensure_owner(actor, &game)?;
            let slot = load_slot(&mut tx, &game, slot_id).await?;
            tx.delete_slot(&slot.id).await?;
            tx.commit().await?;
            Ok(slot)
        })
        .await?;

        tracing::info!("Slot {} of {} deleted", slot.id, slug);
        Ok(slot)
    }
}
