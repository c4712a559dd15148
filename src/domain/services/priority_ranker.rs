//! Organizer-facing order of a slot's entries.

use std::cmp::{Ordering, Reverse};

use crate::domain::entities::{Entry, EntryState};

fn state_rank(state: EntryState) -> u8 {
    match state {
        EntryState::Accepted => 0,
        EntryState::Pending => 1,
        EntryState::Rejected => 2,
    }
}

/// Accepted first, then pending, then rejected; within a state higher priority
/// first; ties go to the earlier submission.
pub fn compare(a: &Entry, b: &Entry) -> Ordering {
    (state_rank(a.state), Reverse(a.priority), a.created_at).cmp(&(
        state_rank(b.state),
        Reverse(b.priority),
        b.created_at,
    ))
}

/// Stable sort: entries with equal keys keep their input order.
pub fn rank(mut entries: Vec<Entry>) -> Vec<Entry> {
    entries.sort_by(compare);
    entries
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::value_objects::Priority;

    fn entry(id: &str, state: EntryState, priority: i64, created_at: i64) -> Entry {
        Entry {
            id: id.to_string(),
            player_id: format!("player-{}", id),
            slot_id: "slot".to_string(),
            priority: Priority::new(priority).unwrap(),
            state,
            created_at,
        }
    }

    fn ids(entries: &[Entry]) -> Vec<&str> {
        entries.iter().map(|e| e.id.as_str()).collect()
    }

    #[test]
    fn test_accepted_first_then_priority() {
        let ranked = rank(vec![
            entry("p3", EntryState::Pending, 3, 2),
            entry("a1", EntryState::Accepted, 1, 1),
            entry("p5", EntryState::Pending, 5, 3),
        ]);
        assert_eq!(ids(&ranked), vec!["a1", "p5", "p3"]);
    }

    #[test]
    fn test_rejected_last() {
        let ranked = rank(vec![
            entry("r5", EntryState::Rejected, 5, 1),
            entry("p1", EntryState::Pending, 1, 2),
            entry("a2", EntryState::Accepted, 2, 3),
        ]);
        assert_eq!(ids(&ranked), vec!["a2", "p1", "r5"]);
    }

    #[test]
    fn test_earlier_submission_wins_ties() {
        let ranked = rank(vec![
            entry("late", EntryState::Pending, 4, 20),
            entry("early", EntryState::Pending, 4, 10),
        ]);
        assert_eq!(ids(&ranked), vec!["early", "late"]);
    }

    #[test]
    fn test_stable_for_equal_keys() {
        let ranked = rank(vec![
            entry("first", EntryState::Pending, 2, 5),
            entry("second", EntryState::Pending, 2, 5),
        ]);
        assert_eq!(ids(&ranked), vec!["first", "second"]);
    }
}
