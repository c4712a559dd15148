//! Scheduling conflicts between a player's accepted entries.
//!
//! Only accepted entries count. Pending entries may overlap freely; the check
//! runs when an organizer moves an entry to `Accepted`, and when a slot with
//! accepted players is moved.

use crate::domain::entities::Slot;

/// First slot in `accepted` (other than the candidate itself) whose time range
/// overlaps `candidate`.
pub fn find_conflict<'a>(candidate: &Slot, accepted: &'a [Slot]) -> Option<&'a Slot> {
    accepted
        .iter()
        .find(|slot| slot.id != candidate.id && slot.overlaps(candidate))
}

/// Whether accepting a player into `candidate` would clash with the slots
/// they are already accepted into.
pub fn would_conflict(candidate: &Slot, accepted: &[Slot]) -> bool {
    find_conflict(candidate, accepted).is_some()
}

/// Check that a set of slots is pairwise non-overlapping
pub fn is_conflict_free(slots: &[Slot]) -> bool {
    let mut sorted: Vec<&Slot> = slots.iter().collect();
    sorted.sort_by_key(|s| s.start);
    sorted.windows(2).all(|pair| !pair[0].overlaps(pair[1]))
}
