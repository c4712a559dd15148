use std::collections::{BTreeSet, HashMap};

use serde::Serialize;

use super::AllocationService;
use crate::application::error::AllocationError;
use crate::application::retry::with_retry;
use crate::domain::entities::{EntryState, Slot};
use crate::domain::repositories::{AllocationRepository, AllocationTx};
use crate::domain::services::calendar::{self, Placement};
use crate::domain::value_objects::ConWindow;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ScheduleKind {
    Running,
    Entered,
    Other,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduledSlot {
    pub slot: Slot,
    pub game_slug: String,
    pub game_name: String,
    pub kind: ScheduleKind,
    /// The viewer's entry state, if they entered
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entry_state: Option<EntryState>,
    #[serde(flatten)]
    pub placement: Placement,
}

/// Every slot of the convention from one viewer's perspective
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Schedule {
    pub window: ConWindow,
    pub running: Vec<ScheduledSlot>,
    pub entered: Vec<ScheduledSlot>,
    pub other: Vec<ScheduledSlot>,
}

impl<R: AllocationRepository> AllocationService<R> {
    /// All slots ordered by start. Games the viewer runs come first, then slots
    /// they entered, then the rest. Calendar placement is computed across the
    /// whole convention.
    pub async fn schedule(&self, viewer: Option<&str>) -> Result<Schedule, AllocationError> {
        let window = self.window;

        with_retry(&self.retry, "schedule", || async move {
            let mut tx = self.repo.begin_read().await?;
            let slots = tx.all_slots().await?;

            let game_ids: Vec<String> = slots
                .iter()
                .map(|s| s.game_id.clone())
                .collect::<BTreeSet<_>>()
                .into_iter()
                .collect();
            let games: HashMap<String, _> = tx
                .find_games_by_ids(&game_ids)
                .await?
                .into_iter()
                .map(|g| (g.id.clone(), g))
                .collect();

            let states: HashMap<String, EntryState> = match viewer {
                Some(viewer) => tx
                    .entries_for_player(viewer)
                    .await?
                    .into_iter()
                    .map(|e| (e.slot_id, e.state))
                    .collect(),
                None => HashMap::new(),
            };

            let placements = calendar::layout(&slots);
            let mut schedule = Schedule {
                window,
                running: Vec::new(),
                entered: Vec::new(),
                other: Vec::new(),
            };

            for (slot, placement) in slots.into_iter().zip(placements) {
                let Some(game) = games.get(&slot.game_id) else {
                    continue;
                };
                let entry_state = states.get(&slot.id).copied();
                let kind = if viewer.map_or(false, |v| game.is_organized_by(v)) {
                    ScheduleKind::Running
                } else if entry_state.is_some() {
                    ScheduleKind::Entered
                } else {
                    ScheduleKind::Other
                };

                let scheduled = ScheduledSlot {
                    slot,
                    game_slug: game.slug.clone(),
                    game_name: game.name.clone(),
                    kind,
                    entry_state,
                    placement,
                };
                match kind {
                    ScheduleKind::Running => schedule.running.push(scheduled),
                    ScheduleKind::Entered => schedule.entered.push(scheduled),
                    ScheduleKind::Other => schedule.other.push(scheduled),
                }
            }

            Ok(schedule)
        })
        .await
    }
}
