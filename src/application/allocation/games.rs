use serde::{Deserialize, Serialize};

use super::{ensure_owner, load_game, Actor, AllocationService};
use crate::application::error::AllocationError;
use crate::application::locks::LockKey;
use crate::application::retry::with_retry;
use crate::domain::entities::{slugify, EntryState, Game, Player, Slot};
use crate::domain::repositories::{AllocationRepository, AllocationTx, RepositoryError};
use crate::domain::value_objects::{is_allowed_content_warning, GameFilter, PlayerBounds};

pub const GAMES_PER_PAGE: u32 = 10;

const MAX_NAME_LEN: usize = 200;

/// Create game input
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateGameInput {
    pub name: String,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub content_warnings: Vec<String>,
    pub min_players: Option<u32>,
    pub max_players: Option<u32>,
}

impl CreateGameInput {
    fn validate(&self) -> Result<(String, PlayerBounds), AllocationError> {
        let name = self.name.trim();
        if name.is_empty() {
            return Err(AllocationError::Validation("Game name is required".into()));
        }
        if name.len() > MAX_NAME_LEN {
            return Err(AllocationError::Validation(format!(
                "Game name is limited to {} characters",
                MAX_NAME_LEN
            )));
        }
        let slug = slugify(name).ok_or_else(|| {
            AllocationError::Validation(format!("\"{}\" cannot be used as a game name", name))
        })?;

        if let Some(cw) = self
            .content_warnings
            .iter()
            .find(|cw| !is_allowed_content_warning(cw))
        {
            return Err(AllocationError::Validation(format!(
                "Unknown content warning: {}",
                cw
            )));
        }

        let bounds = PlayerBounds::new(self.min_players, self.max_players);
        bounds
            .validate()
            .map_err(|e| AllocationError::Validation(e.into()))?;

        Ok((slug, bounds))
    }
}

/// One page of the game listing
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GameListing {
    pub games: Vec<Game>,
    pub page: u32,
    pub last_page: u32,
    pub total: u64,
}

/// Per-slot counts shown on a game's page
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SlotSummary {
    #[serde(flatten)]
    pub slot: Slot,
    pub entries: u32,
    pub accepted: u32,
    pub below_minimum: bool,
    /// Viewer state; absent for anonymous viewers
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entered: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub viewer_accepted: Option<bool>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GameDetails {
    pub game: Game,
    pub slots: Vec<SlotSummary>,
}

impl<R: AllocationRepository> AllocationService<R> {
    pub async fn create_game(
        &self,
        actor: &Actor,
        input: CreateGameInput,
    ) -> Result<Game, AllocationError> {
        if !actor.may_create_games() {
            return Err(AllocationError::Forbidden(
                "Only organizers can create games".into(),
            ));
        }
        let (slug, bounds) = input.validate()?;
        let (slug, input) = (slug.as_str(), &input);

        let game = with_retry(&self.retry, "create_game", || async move {
            let mut tx = self.repo.begin().await?;
            if tx.find_game_by_slug(slug).await?.is_some() {
                return Err(duplicate_slug(slug));
            }
            tx.upsert_player(&Player::new(&actor.player_id, &actor.username))
                .await?;

            let game = Game::new(
                uuid::Uuid::new_v4().to_string(),
                slug.to_string(),
                input.name.trim().to_string(),
                input.summary.trim().to_string(),
                actor.player_id.clone(),
                input.content_warnings.clone(),
                bounds,
            );
            tx.insert_game(&game).await.map_err(|e| match e {
                RepositoryError::AlreadyExists(_) => duplicate_slug(slug),
                other => other.into(),
            })?;
            tx.commit().await?;
            Ok(game)
        })
        .await?;

        tracing::info!("Game {} created by {}", game.slug, actor.player_id);
        Ok(game)
    }

    /// Change a game's bounds. The new maximum may not drop below the accepted
    /// count of any of its slots.
    pub async fn set_player_bounds(
        &self,
        actor: &Actor,
        slug: &str,
        bounds: PlayerBounds,
    ) -> Result<Game, AllocationError> {
        bounds
            .validate()
            .map_err(|e| AllocationError::Validation(e.into()))?;

        let game = with_retry(&self.retry, "set_player_bounds", || async move {
            let slot_ids = self.game_slot_ids(actor, slug).await?;
            let _locks = self
                .locks
                .acquire(slot_ids.into_iter().map(LockKey::Slot))
                .await?;

            let mut tx = self.repo.begin().await?;
            let mut game = load_game(&mut tx, slug).await?;
            ensure_owner(actor, &game)?;

            if let Some(max) = bounds.max_players {
                for slot in tx.slots_for_game(&game.id).await? {
                    let accepted = tx.count_accepted(&slot.id).await?;
                    if accepted > max {
                        return Err(AllocationError::CapacityExceeded { accepted, max });
                    }
                }
            }

            tx.update_game_bounds(&game.id, &bounds).await?;
            tx.commit().await?;
            game.bounds = bounds;
            Ok(game)
        })
        .await?;

        tracing::info!(
            "Game {} bounds set to {:?}..{:?}",
            game.slug,
            bounds.min_players,
            bounds.max_players
        );
        Ok(game)
    }

    /// Delete a game with all of its slots and entries
    pub async fn delete_game(&self, actor: &Actor, slug: &str) -> Result<Game, AllocationError> {
        let game = with_retry(&self.retry, "delete_game", || async move {
            let slot_ids = self.game_slot_ids(actor, slug).await?;
            let _locks = self
                .locks
                .acquire(slot_ids.into_iter().map(LockKey::Slot))
                .await?;

            let mut tx = self.repo.begin().await?;
            let game = load_game(&mut tx, slug).await?;
            ensure_owner(actor, &game)?;
            tx.delete_game(&game.id).await?;
            tx.commit().await?;
            Ok(game)
        })
        .await?;

        tracing::info!("Game {} deleted by {}", game.slug, actor.player_id);
        Ok(game)
    }

    /// Filtered, paginated listing, newest first. `page` is 1-based.
    pub async fn list_games(
        &self,
        viewer: Option<&str>,
        filter: &GameFilter,
        page: u32,
    ) -> Result<GameListing, AllocationError> {
        filter.validate().map_err(AllocationError::Validation)?;
        let page = page.max(1);
        let predicate = filter.to_predicate(viewer);
        let predicate = predicate.as_ref();

        with_retry(&self.retry, "list_games", || async move {
            let mut tx = self.repo.begin_read().await?;
            let total = tx.count_games(predicate).await?;
            let games = tx
                .list_games(
                    predicate,
                    GAMES_PER_PAGE,
                    (page - 1).saturating_mul(GAMES_PER_PAGE),
                )
                .await?;

            let last_page = total.div_ceil(GAMES_PER_PAGE as u64).max(1) as u32;
            Ok(GameListing {
                games,
                page,
                last_page,
                total,
            })
        })
        .await
    }

    /// A game with per-slot counts and, for a signed-in viewer, their own status
    pub async fn get_game(
        &self,
        slug: &str,
        viewer: Option<&str>,
    ) -> Result<GameDetails, AllocationError> {
        with_retry(&self.retry, "get_game", || async move {
            let mut tx = self.repo.begin_read().await?;
            let game = load_game(&mut tx, slug).await?;

            let mut slots = Vec::new();
            for slot in tx.slots_for_game(&game.id).await? {
                let entries = tx.entries_for_slot(&slot.id).await?;
                let accepted = entries.iter().filter(|e| e.is_accepted()).count() as u32;
                let own = viewer.map(|v| entries.iter().find(|e| e.player_id == v));

                slots.push(SlotSummary {
                    entries: entries.len() as u32,
                    accepted,
                    below_minimum: game.bounds.is_below_minimum(accepted),
                    entered: own.map(|e| e.is_some()),
                    viewer_accepted: own.map(|e| e.map_or(false, |e| e.state == EntryState::Accepted)),
                    slot,
                });
            }

            Ok(GameDetails { game, slots })
        })
        .await
    }

    /// Ids of a game's slots, checking ownership first so a stranger learns
    /// nothing and takes no locks
    async fn game_slot_ids(&self, actor: &Actor, slug: &str) -> Result<Vec<String>, AllocationError> {
        let mut tx = self.repo.begin_read().await?;
        let game = load_game(&mut tx, slug).await?;
        ensure_owner(actor, &game)?;
        Ok(tx
            .slots_for_game(&game.id)
            .await?
            .into_iter()
            .map(|s| s.id)
            .collect())
    }
}

fn duplicate_slug(slug: &str) -> AllocationError {
    AllocationError::Validation(format!("A game with the slug {} already exists", slug))
}
