//! Offline review-log repair.
//!
//! Restores id ordering and the `last_interval` chain, then brings each
//! card's `interval` in line with its newest log entry. Running it twice is a
//! no-op the second time.

use crate::db::{ReviewLogRepository, SqliteStore, StoreError};
use rusqlite::params;
use serde::Serialize;
use srs_core::repair::{latest_intervals, relink_chain, renumber_ids};

type Result<T> = std::result::Result<T, StoreError>;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RepairReport {
    /// Log entries given a new id.
    pub renumbered: usize,
    /// Log entries whose `last_interval` was rewritten.
    pub relinked: usize,
    /// Cards whose `interval` was reset from the log.
    pub cards_reconciled: usize,
}

impl RepairReport {
    pub fn is_clean(&self) -> bool {
        *self == Self::default()
    }
}

pub fn repair_review_log(store: &SqliteStore) -> Result<RepairReport> {
    let tx = store.begin()?;

    let mut entries = store.all_log_entries()?;
    let renumbered = renumber_ids(&mut entries);
    let relinked = relink_chain(&mut entries);

    if renumbered > 0 || relinked > 0 {
        store.conn().execute("DELETE FROM revlog", [])?;
        for entry in &entries {
            store.insert_log_entry(entry)?;
        }
    }

    let mut cards_reconciled = 0;
    for (card_id, interval) in latest_intervals(&entries) {
        cards_reconciled += store.conn().execute(
            "UPDATE cards SET interval = ?1 WHERE id = ?2 AND interval != ?1",
            params![interval, card_id],
        )?;
    }

    tx.commit()?;

    let report = RepairReport {
        renumbered,
        relinked,
        cards_reconciled,
    };
    if report.is_clean() {
        tracing::info!(entries = entries.len(), "review log is consistent");
    } else {
        tracing::warn!(?report, "repaired review log");
    }
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::CardRepository;
    use pretty_assertions::assert_eq;
    use srs_core::{Card, Ease, ReviewLogEntry};

    fn entry(id: i64, card_id: i64, last_interval: i64, interval: i64) -> ReviewLogEntry {
        ReviewLogEntry {
            id,
            card_id,
            ease: Ease::Good,
            interval,
            last_interval,
            factor: 2.0,
            view_time: 3.0,
            study_time: 4.0,
            lapses: 0,
        }
    }

    fn card(id: i64, interval: i64) -> Card {
        Card {
            interval,
            due: 1_700_000_000,
            ..Card::new(id, id, 1, 0)
        }
    }

    #[test]
    fn clean_log_is_left_alone() {
        let store = SqliteStore::open_in_memory().unwrap();
        store.insert_card(&card(1, 600)).unwrap();
        store
            .import_log_entries(&[entry(1_000, 1, 0, 60), entry(2_000, 1, 60, 600)])
            .unwrap();

        let report = repair_review_log(&store).unwrap();
        assert!(report.is_clean());
    }

    #[test]
    fn broken_chain_and_stale_card_are_fixed() {
        let store = SqliteStore::open_in_memory().unwrap();
        store.insert_card(&card(1, 42)).unwrap();
        store.insert_card(&card(2, 300)).unwrap();
        store
            .import_log_entries(&[
                entry(1_000, 1, 0, 60),
                entry(1_500, 2, 0, 300),
                entry(2_000, 1, 999, 600),
            ])
            .unwrap();

        let report = repair_review_log(&store).unwrap();
        assert_eq!(
            report,
            RepairReport {
                renumbered: 0,
                relinked: 1,
                cards_reconciled: 1,
            }
        );

        let log = store.log_entries_for_card(1).unwrap();
        assert_eq!(log[1].last_interval, 60);
        assert_eq!(store.get_card(1).unwrap().unwrap().interval, 600);
        assert_eq!(store.get_card(2).unwrap().unwrap().interval, 300);
    }

    #[test]
    fn repair_is_idempotent() {
        let store = SqliteStore::open_in_memory().unwrap();
        store.insert_card(&card(1, 0)).unwrap();
        store
            .import_log_entries(&[entry(1_000, 1, 5, 60), entry(2_000, 1, 7, 600)])
            .unwrap();

        assert!(!repair_review_log(&store).unwrap().is_clean());
        assert!(repair_review_log(&store).unwrap().is_clean());
    }
}
