//! Side-by-side layout for the personal schedule calendar.
//!
//! Slots that overlap (directly or through a chain of overlaps) form a
//! cluster. Each slot gets a column inside its cluster; the cluster's column
//! count tells the front end how wide each slot may be drawn.

use crate::domain::entities::Slot;

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Placement {
    /// Number of columns in this slot's cluster
    pub concurrent_with: usize,
    /// Column assigned to this slot, 0-based
    pub concurrent_index: usize,
}

/// Compute a placement for each slot, returned in the same order as `slots`.
pub fn layout(slots: &[Slot]) -> Vec<Placement> {
    let mut order: Vec<usize> = (0..slots.len()).collect();
    order.sort_by(|&a, &b| {
        slots[a]
            .start
            .cmp(&slots[b].start)
            .then(slots[a].end.cmp(&slots[b].end))
    });

    let mut placements = vec![
        Placement {
            concurrent_with: 1,
            concurrent_index: 0,
        };
        slots.len()
    ];

    let mut cluster: Vec<usize> = Vec::new();
    // end of the last slot in each column of the open cluster
    let mut column_ends = Vec::new();
    let mut cluster_end = None;

    for idx in order {
        let slot = &slots[idx];

        if cluster_end.map_or(false, |end| slot.start >= end) {
            close_cluster(&cluster, column_ends.len(), &mut placements);
            cluster.clear();
            column_ends.clear();
            cluster_end = None;
        }

        let column = match column_ends.iter().position(|end| *end <= slot.start) {
            Some(free) => {
                column_ends[free] = slot.end;
                free
            }
            None => {
                column_ends.push(slot.end);
                column_ends.len() - 1
            }
        };

        placements[idx].concurrent_index = column;
        cluster.push(idx);
        cluster_end = Some(cluster_end.map_or(slot.end, |end| end.max(slot.end)));
    }

    close_cluster(&cluster, column_ends.len(), &mut placements);
    placements
}

fn close_cluster(cluster: &[usize], columns: usize, placements: &mut [Placement]) {
    for &idx in cluster {
        placements[idx].concurrent_with = columns.max(1);
    }
}
