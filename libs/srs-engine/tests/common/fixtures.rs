//! Factory functions for cards and log entries.

use srs_engine::srs_core::{Card, Ease, ReviewLogEntry, DAY};

use super::T0;

/// One new card per fieldset, ordered by id.
pub fn new_cards(count: i64) -> Vec<Card> {
    (1..=count).map(|id| Card::new(id, id, 1, id)).collect()
}

/// `templates` new cards sharing one fieldset.
pub fn note(fieldset_id: i64, first_id: i64, templates: i64) -> Vec<Card> {
    (0..templates)
        .map(|t| Card::new(first_id + t, fieldset_id, t + 1, first_id + t))
        .collect()
}

/// A card 30 days into review, due at `T0`.
pub fn mature_card(id: i64, fieldset_id: i64) -> Card {
    Card {
        interval: 30 * DAY,
        due: T0,
        factor: 2.0,
        views: 8,
        ..Card::new(id, fieldset_id, 1, id)
    }
}

/// A log entry for a mature review `secs_before` seconds before `T0`.
pub fn mature_review(card_id: i64, secs_before: i64, ease: Ease) -> ReviewLogEntry {
    ReviewLogEntry {
        id: (T0 - secs_before) * 1000,
        card_id,
        ease,
        interval: 30 * DAY,
        last_interval: 30 * DAY,
        factor: 2.0,
        view_time: 4.0,
        study_time: 6.0,
        lapses: 0,
    }
}

pub fn log_entry(id: i64, card_id: i64, last_interval: i64, interval: i64) -> ReviewLogEntry {
    ReviewLogEntry {
        id,
        card_id,
        ease: Ease::Good,
        interval,
        last_interval,
        factor: 2.0,
        view_time: 3.0,
        study_time: 5.0,
        lapses: 0,
    }
}
