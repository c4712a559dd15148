use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A scheduled occurrence of a game
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Slot {
    pub id: String,
    pub game_id: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl Slot {
    pub fn new(id: String, game_id: String, start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self {
            id,
            game_id,
            start,
            end,
        }
    }

    /// Half-open interval overlap: `[a.start, a.end)` against `[b.start, b.end)`
    pub fn overlaps(&self, other: &Slot) -> bool {
        self.start < other.end && other.start < self.end
    }
}
