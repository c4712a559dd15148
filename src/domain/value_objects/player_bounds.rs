use serde::{Deserialize, Serialize};

/// Minimum / maximum player counts for every slot of a game.
///
/// `None` means unbounded. Only the maximum is ever enforced; the minimum is
/// shown to organizers as scheduling advice.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerBounds {
    pub min_players: Option<u32>,
    pub max_players: Option<u32>,
}

impl PlayerBounds {
    pub fn new(min_players: Option<u32>, max_players: Option<u32>) -> Self {
        Self {
            min_players,
            max_players,
        }
    }

    pub fn unbounded() -> Self {
        Self::default()
    }

    pub fn validate(&self) -> Result<(), &'static str> {
        if let (Some(min), Some(max)) = (self.min_players, self.max_players) {
            if min > max {
                return Err("Minimum players cannot exceed maximum players");
            }
        }
        Ok(())
    }

    /// Whether one more player fits next to `accepted` already accepted ones
    pub fn has_room(&self, accepted: u32) -> bool {
        match self.max_players {
            Some(max) => accepted < max,
            None => true,
        }
    }

    /// Advisory only
    pub fn is_below_minimum(&self, accepted: u32) -> bool {
        self.min_players.map_or(false, |min| accepted < min)
    }
}
