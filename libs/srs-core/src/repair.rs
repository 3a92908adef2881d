//! Review-log chain maintenance.
//!
//! Entries for a card, ordered by id, form a chain in which each entry's
//! `last_interval` equals the previous entry's `interval`. These functions
//! restore that chain on in-memory entries; the store applies the result.

use crate::types::ReviewLogEntry;
use std::collections::HashMap;

/// Sort by id and bump any id that does not exceed its predecessor.
///
/// Returns the number of entries whose id changed. The sort is stable, so
/// duplicates keep their original relative order.
pub fn renumber_ids(entries: &mut [ReviewLogEntry]) -> usize {
    entries.sort_by_key(|e| e.id);
    let mut changed = 0;
    let mut previous: Option<i64> = None;
    for entry in entries.iter_mut() {
        if let Some(prev) = previous {
            if entry.id <= prev {
                entry.id = prev + 1;
                changed += 1;
            }
        }
        previous = Some(entry.id);
    }
    changed
}

/// Recompute `last_interval` from the preceding entry of the same card.
///
/// Entries must already be in id order. The first entry of each card is left
/// as recorded. Returns the number of entries changed.
pub fn relink_chain(entries: &mut [ReviewLogEntry]) -> usize {
    let mut last_by_card: HashMap<i64, i64> = HashMap::new();
    let mut changed = 0;
    for entry in entries.iter_mut() {
        if let Some(&previous) = last_by_card.get(&entry.card_id) {
            if entry.last_interval != previous {
                entry.last_interval = previous;
                changed += 1;
            }
        }
        last_by_card.insert(entry.card_id, entry.interval);
    }
    changed
}

/// Interval of the newest entry per card. Entries must be in id order.
pub fn latest_intervals(entries: &[ReviewLogEntry]) -> HashMap<i64, i64> {
    entries
        .iter()
        .map(|entry| (entry.card_id, entry.interval))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Ease;

    fn entry(id: i64, card_id: i64, last_interval: i64, interval: i64) -> ReviewLogEntry {
        ReviewLogEntry {
            id,
            card_id,
            ease: Ease::Good,
            interval,
            last_interval,
            factor: 1.0,
            view_time: 2.0,
            study_time: 4.0,
            lapses: 0,
        }
    }

    #[test]
    fn duplicate_ids_become_strictly_increasing() {
        let mut entries = vec![entry(5, 1, 0, 60), entry(5, 2, 0, 60), entry(6, 1, 60, 120)];
        let changed = renumber_ids(&mut entries);
        let ids: Vec<i64> = entries.iter().map(|e| e.id).collect();
        assert_eq!(ids, vec![5, 6, 7]);
        assert_eq!(changed, 2);
        assert_eq!(entries[1].card_id, 2);
    }

    #[test]
    fn renumbering_sorted_unique_ids_is_a_no_op() {
        let mut entries = vec![entry(1, 1, 0, 60), entry(9, 1, 60, 120)];
        assert_eq!(renumber_ids(&mut entries), 0);
    }

    #[test]
    fn broken_links_are_repaired_per_card() {
        let mut entries = vec![
            entry(1, 1, 0, 60),
            entry(2, 2, 0, 20),
            entry(3, 1, 999, 300),
            entry(4, 2, 20, 90),
            entry(5, 1, 60, 900),
        ];
        let changed = relink_chain(&mut entries);
        assert_eq!(changed, 2);
        assert_eq!(entries[2].last_interval, 60);
        assert_eq!(entries[4].last_interval, 300);
        assert_eq!(relink_chain(&mut entries), 0);
    }

    #[test]
    fn latest_interval_is_from_newest_entry() {
        let entries = vec![entry(1, 1, 0, 60), entry(2, 1, 60, 300), entry(3, 2, 0, 20)];
        let latest = latest_intervals(&entries);
        assert_eq!(latest[&1], 300);
        assert_eq!(latest[&2], 20);
    }
}
