use crate::domain::value_objects::PlayerBounds;

/// Whether a slot with `accepted` accepted entries can take one more player.
///
/// Callers must read `accepted` inside the same transaction that writes the
/// acceptance.
pub fn can_accept(bounds: &PlayerBounds, accepted: u32) -> bool {
    bounds.has_room(accepted)
}

/// Capacity as shown to organizers next to a slot's entries
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CapacityReport {
    pub accepted: u32,
    pub max_players: Option<u32>,
    pub min_players: Option<u32>,
    pub is_full: bool,
    pub below_minimum: bool,
}

pub fn report(bounds: &PlayerBounds, accepted: u32) -> CapacityReport {
    CapacityReport {
        accepted,
        max_players: bounds.max_players,
        min_players: bounds.min_players,
        is_full: !can_accept(bounds, accepted),
        below_minimum: bounds.is_below_minimum(accepted),
    }
}
