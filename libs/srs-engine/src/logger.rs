//! Review logger: commits one scored review and buries its siblings.

use crate::db::{CardRepository, SqliteStore, StoreError};
use crate::scheduler::Scheduler;
use serde::Serialize;
use srs_core::{Ease, ReviewLogEntry, ReviewOutcome};

type Result<T> = std::result::Result<T, StoreError>;

/// Ceiling for recorded view and study time once a view is over the limit.
pub const MAX_RECORDED_VIEW_TIME: f64 = 120.0;

/// A scored review as reported by the presentation layer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReviewRequest {
    pub card_id: i64,
    /// Seconds the answer side was hidden.
    pub view_time: f64,
    /// Total seconds spent on the card.
    pub study_time: f64,
    pub ease: Ease,
}

/// What a committed review wrote.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CommittedReview {
    pub log_id: i64,
    pub card_id: i64,
    pub outcome: ReviewOutcome,
    pub view_time: f64,
    pub study_time: f64,
    /// Siblings pushed back by burial.
    pub deferred: usize,
}

/// A view longer than `max_view_time` counts as forgotten; both times are
/// capped so one idle session does not skew the study-time statistics.
pub fn apply_view_time_limit(request: ReviewRequest, max_view_time: i64) -> ReviewRequest {
    if request.view_time <= max_view_time as f64 {
        return request;
    }
    tracing::warn!(
        card_id = request.card_id,
        view_time = request.view_time,
        max_view_time,
        "view time over limit, recording as again"
    );
    ReviewRequest {
        ease: Ease::Again,
        view_time: request.view_time.min(MAX_RECORDED_VIEW_TIME),
        study_time: request.study_time.min(MAX_RECORDED_VIEW_TIME),
        ..request
    }
}

fn expect_one_row(operation: &'static str, rows: usize) -> Result<()> {
    if rows == 1 {
        return Ok(());
    }
    tracing::error!(operation, rows, "review commit touched an unexpected number of rows");
    Err(StoreError::Consistency { operation, rows })
}

/// Score a card, append its log entry and bury related cards, all in one
/// transaction. `now` and `now_ms` must describe the same instant.
pub fn commit_review(
    store: &SqliteStore,
    scheduler: &mut dyn Scheduler,
    request: ReviewRequest,
    now: i64,
    now_ms: i64,
) -> Result<CommittedReview> {
    let request = apply_view_time_limit(request, scheduler.config().max_view_time);
    let bury_window = scheduler.config().min_time_between_related_cards;

    let tx = store.begin()?;

    let mut card = store
        .get_card(request.card_id)?
        .ok_or(StoreError::CardNotFound(request.card_id))?;
    let outcome = scheduler.compute_interval(store, &card, request.ease, now)?;

    card.interval = outcome.interval;
    card.due = outcome.due;
    card.factor = outcome.factor;
    card.lapses = outcome.lapses;
    card.views += 1;
    expect_one_row("update card", store.update_card_schedule(&card)?)?;

    let log_id = store.allocate_log_id(now_ms)?;
    let entry = ReviewLogEntry {
        id: log_id,
        card_id: card.id,
        ease: outcome.ease,
        interval: outcome.interval,
        last_interval: outcome.last_interval,
        factor: outcome.factor,
        view_time: request.view_time,
        study_time: request.study_time,
        lapses: outcome.lapses,
    };
    expect_one_row("insert review log", store.insert_log_entry(&entry)?)?;

    let deferred = store.defer_related(card.fieldset_id, card.id, now + bury_window)?;

    tx.commit()?;

    tracing::debug!(
        card_id = card.id,
        log_id,
        ease = outcome.ease.as_str(),
        interval = outcome.interval,
        due = outcome.due,
        lapsed = outcome.lapsed,
        deferred,
        "committed review"
    );

    Ok(CommittedReview {
        log_id,
        card_id: card.id,
        outcome,
        view_time: request.view_time,
        study_time: request.study_time,
        deferred,
    })
}
