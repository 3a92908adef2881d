//! The adaptive scheduler: adaptive intervals plus a study-time throttle on
//! new cards.

use super::{CorrectFactor, NewCardGate, Result, Scheduler, SelectOptions, Selection};
use crate::db::{CardRepository, ReviewLogRepository, SqliteStore, StatsRepository};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use srs_core::{
    AdaptiveIntervals, Card, Ease, IntervalAlgorithm, IntervalPreview, ReviewContext,
    ReviewOutcome, SchedulerConfig, DAY,
};

/// Minimum gap between two new cards while reviews are waiting.
pub const NEW_CARD_SPACING: i64 = 300;

/// Slack allowed on multi-day study-time averages.
const STUDY_TIME_SLACK: f64 = 1.1;

enum NewCardCheck {
    Offer(Card),
    Gated(NewCardGate),
}

pub struct AdaptiveScheduler {
    intervals: AdaptiveIntervals,
    correct_factor: CorrectFactor,
    last_new_card_at: Option<i64>,
    rng: StdRng,
}

impl AdaptiveScheduler {
    pub fn new(config: SchedulerConfig) -> Self {
        Self::with_rng(config, StdRng::from_entropy())
    }

    /// Deterministic jitter, for tests and replays.
    pub fn with_seed(config: SchedulerConfig, seed: u64) -> Self {
        Self::with_rng(config, StdRng::seed_from_u64(seed))
    }

    fn with_rng(config: SchedulerConfig, rng: StdRng) -> Self {
        Self {
            intervals: AdaptiveIntervals::new(config),
            correct_factor: CorrectFactor::default(),
            last_new_card_at: None,
            rng,
        }
    }

    pub fn correct_factor(&self) -> i64 {
        self.correct_factor.value()
    }

    pub fn last_new_card_at(&self) -> Option<i64> {
        self.last_new_card_at
    }

    fn check_new_card(
        &self,
        store: &SqliteStore,
        opts: &SelectOptions,
        due: Option<&Card>,
        now: i64,
    ) -> Result<NewCardCheck> {
        let config = &self.intervals.config;
        let limit = config.study_time_limit as f64;

        if !opts.allow_new {
            return Ok(NewCardCheck::Gated(NewCardGate::DisabledByCaller));
        }
        if store.count_overdue(now)? > 0 {
            return Ok(NewCardCheck::Gated(NewCardGate::OverdueBacklog));
        }
        if store.average_study_time(now, 1)? >= limit {
            return Ok(NewCardCheck::Gated(NewCardGate::DailyStudyTime));
        }
        if store.average_study_time(now, 14)? >= limit * STUDY_TIME_SLACK {
            return Ok(NewCardCheck::Gated(NewCardGate::FortnightStudyTime));
        }
        if store.count_new_cards_shown(now, DAY)? >= config.max_new_cards as usize {
            return Ok(NewCardCheck::Gated(NewCardGate::NewCardLimit));
        }
        if store.estimated_study_time(now, 1)? >= limit {
            return Ok(NewCardCheck::Gated(NewCardGate::ProjectedDayLoad));
        }
        if store.estimated_study_time(now, 5)? >= limit * STUDY_TIME_SLACK {
            return Ok(NewCardCheck::Gated(NewCardGate::ProjectedFiveDayLoad));
        }
        if due.is_some() {
            if let Some(last) = self.last_new_card_at {
                if now - last < NEW_CARD_SPACING {
                    return Ok(NewCardCheck::Gated(NewCardGate::NewCardSpacing));
                }
            }
        }

        match store.next_new_card(now - config.min_time_between_related_cards)? {
            Some(card) => Ok(NewCardCheck::Offer(card)),
            None => Ok(NewCardCheck::Gated(NewCardGate::NoNewCards)),
        }
    }

    fn preview_card(&self, store: &SqliteStore, opts: &SelectOptions) -> Result<Option<Card>> {
        let window = self.intervals.config.preview_window;
        if !opts.allow_preview || window <= 0 {
            return Ok(None);
        }
        match store.last_review_time()? {
            Some(last_review) => store.next_preview_card(last_review + window),
            None => Ok(None),
        }
    }
}

impl Scheduler for AdaptiveScheduler {
    fn name(&self) -> &'static str {
        self.intervals.name()
    }

    fn config(&self) -> &SchedulerConfig {
        &self.intervals.config
    }

    fn load(&mut self, store: &SqliteStore, now: i64) -> Result<()> {
        self.correct_factor = CorrectFactor::load(store)?;
        self.last_new_card_at = store.last_new_card_time()?;
        tracing::info!(
            now,
            correct_factor = self.correct_factor.value(),
            last_new_card_at = ?self.last_new_card_at,
            "loaded adaptive scheduler"
        );
        Ok(())
    }

    fn unload(&mut self, store: &SqliteStore) -> Result<()> {
        self.correct_factor.persist(store)?;
        tracing::info!(
            correct_factor = self.correct_factor.value(),
            "unloaded adaptive scheduler"
        );
        Ok(())
    }

    fn compute_interval(
        &mut self,
        store: &SqliteStore,
        card: &Card,
        ease: Ease,
        now: i64,
    ) -> Result<ReviewOutcome> {
        let correct_factor = self
            .correct_factor
            .current(store, &self.intervals.config, now)?;
        let ctx = ReviewContext {
            now,
            last_seen: store.last_seen(card.id)?,
            correct_factor,
        };
        let jitter: f64 = self.rng.gen_range(-1.0..=1.0);
        Ok(self.intervals.schedule(card, ease, &ctx, jitter))
    }

    fn preview_intervals(
        &self,
        store: &SqliteStore,
        card: &Card,
        now: i64,
    ) -> Result<IntervalPreview> {
        let ctx = ReviewContext {
            now,
            last_seen: store.last_seen(card.id)?,
            correct_factor: self
                .correct_factor
                .peek(store, &self.intervals.config, now)?,
        };
        Ok(self.intervals.preview(card, &ctx))
    }

    fn select_next(
        &mut self,
        store: &SqliteStore,
        opts: &SelectOptions,
        now: i64,
    ) -> Result<Selection> {
        let due = store.next_due_card(now)?;

        let gate = match self.check_new_card(store, opts, due.as_ref(), now)? {
            NewCardCheck::Offer(card) => {
                tracing::debug!(card_id = card.id, "selected new card");
                self.last_new_card_at = Some(now);
                return Ok(Selection::New(card));
            }
            NewCardCheck::Gated(gate) => gate,
        };
        tracing::debug!(?gate, "new cards gated");

        if let Some(card) = due {
            return Ok(Selection::Due(card, gate));
        }
        if let Some(card) = self.preview_card(store, opts)? {
            tracing::debug!(card_id = card.id, "selected preview card");
            return Ok(Selection::Preview(card, gate));
        }
        Ok(Selection::Empty(gate))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::ConfigRepository;
    use srs_core::config::CORRECT_FACTOR_KEY;
    use srs_core::ReviewLogEntry;

    const NOW: i64 = 1_700_000_000;

    fn scheduled(id: i64, fieldset_id: i64, interval: i64, due: i64) -> Card {
        Card {
            interval,
            due,
            factor: 2.0,
            views: 1,
            ..Card::new(id, fieldset_id, 1, id)
        }
    }

    fn first_view(card_id: i64, at: i64, interval: i64) -> ReviewLogEntry {
        ReviewLogEntry {
            id: at * 1000,
            card_id,
            ease: Ease::Good,
            interval,
            last_interval: 0,
            factor: 2.0,
            view_time: 5.0,
            study_time: 5.0,
            lapses: 0,
        }
    }

    fn loaded(store: &SqliteStore, config: SchedulerConfig) -> AdaptiveScheduler {
        let mut scheduler = AdaptiveScheduler::with_seed(config, 42);
        scheduler.load(store, NOW).unwrap();
        scheduler
    }

    #[test]
    fn empty_store_selects_nothing() {
        let store = SqliteStore::open_in_memory().unwrap();
        let mut scheduler = loaded(&store, SchedulerConfig::default());
        let selection = scheduler
            .select_next(&store, &SelectOptions::default(), NOW)
            .unwrap();
        assert_eq!(selection, Selection::Empty(NewCardGate::NoNewCards));
    }

    #[test]
    fn new_card_is_offered_and_recorded() {
        let store = SqliteStore::open_in_memory().unwrap();
        store.insert_card(&Card::new(1, 1, 1, 5)).unwrap();
        store.insert_card(&Card::new(2, 2, 1, 3)).unwrap();
        let mut scheduler = loaded(&store, SchedulerConfig::default());

        let selection = scheduler
            .select_next(&store, &SelectOptions::default(), NOW)
            .unwrap();
        assert_eq!(selection.card().map(|c| c.id), Some(2));
        assert!(matches!(selection, Selection::New(_)));
        assert_eq!(scheduler.last_new_card_at(), Some(NOW));
    }

    #[test]
    fn caller_can_suppress_new_cards() {
        let store = SqliteStore::open_in_memory().unwrap();
        store.insert_card(&Card::new(1, 1, 1, 0)).unwrap();
        let mut scheduler = loaded(&store, SchedulerConfig::default());
        let opts = SelectOptions {
            allow_new: false,
            ..Default::default()
        };
        let selection = scheduler.select_next(&store, &opts, NOW).unwrap();
        assert_eq!(selection, Selection::Empty(NewCardGate::DisabledByCaller));
    }

    #[test]
    fn overdue_backlog_blocks_new_cards() {
        let store = SqliteStore::open_in_memory().unwrap();
        let overdue = scheduled(1, 1, DAY, NOW - 2 * DAY);
        store.insert_card(&overdue).unwrap();
        store.insert_card(&Card::new(2, 2, 1, 0)).unwrap();
        let mut scheduler = loaded(&store, SchedulerConfig::default());

        let selection = scheduler
            .select_next(&store, &SelectOptions::default(), NOW)
            .unwrap();
        assert_eq!(selection, Selection::Due(overdue, NewCardGate::OverdueBacklog));
    }

    #[test]
    fn daily_new_card_limit_is_enforced() {
        let store = SqliteStore::open_in_memory().unwrap();
        store
            .insert_card(&scheduled(1, 1, 60, NOW + 1000))
            .unwrap();
        store.insert_card(&Card::new(2, 2, 1, 0)).unwrap();
        store
            .import_log_entries(&[first_view(1, NOW - 4000, 60)])
            .unwrap();
        let config = SchedulerConfig {
            max_new_cards: 1,
            ..Default::default()
        };
        let mut scheduler = loaded(&store, config);

        let selection = scheduler
            .select_next(&store, &SelectOptions::default(), NOW)
            .unwrap();
        assert_eq!(selection, Selection::Empty(NewCardGate::NewCardLimit));
    }

    #[test]
    fn study_time_budget_blocks_new_cards() {
        let store = SqliteStore::open_in_memory().unwrap();
        store
            .insert_card(&scheduled(1, 1, 60, NOW + 1000))
            .unwrap();
        store.insert_card(&Card::new(2, 2, 1, 0)).unwrap();
        let mut heavy = first_view(1, NOW - 4000, 60);
        heavy.study_time = 4000.0;
        store.import_log_entries(&[heavy]).unwrap();
        let mut scheduler = loaded(&store, SchedulerConfig::default());

        let selection = scheduler
            .select_next(&store, &SelectOptions::default(), NOW)
            .unwrap();
        assert_eq!(selection, Selection::Empty(NewCardGate::DailyStudyTime));
    }

    #[test]
    fn new_cards_are_spaced_while_reviews_wait() {
        let store = SqliteStore::open_in_memory().unwrap();
        let due = scheduled(1, 1, 60, NOW - 10);
        store.insert_card(&due).unwrap();
        store.insert_card(&Card::new(2, 2, 1, 0)).unwrap();
        store
            .import_log_entries(&[first_view(1, NOW - 100, 60)])
            .unwrap();
        let mut scheduler = loaded(&store, SchedulerConfig::default());

        let selection = scheduler
            .select_next(&store, &SelectOptions::default(), NOW)
            .unwrap();
        assert_eq!(selection, Selection::Due(due, NewCardGate::NewCardSpacing));

        let later = scheduler
            .select_next(&store, &SelectOptions::default(), NOW + 200)
            .unwrap();
        assert!(matches!(later, Selection::New(ref card) if card.id == 2));
    }

    #[test]
    fn new_siblings_of_recent_reviews_are_held_back() {
        let store = SqliteStore::open_in_memory().unwrap();
        store
            .insert_card(&scheduled(1, 1, 60, NOW + 5000))
            .unwrap();
        store.insert_card(&Card::new(2, 1, 2, 0)).unwrap();
        store
            .import_log_entries(&[first_view(1, NOW - 100, 60)])
            .unwrap();
        let mut scheduler = loaded(&store, SchedulerConfig::default());

        let selection = scheduler
            .select_next(&store, &SelectOptions::default(), NOW)
            .unwrap();
        assert_eq!(selection, Selection::Empty(NewCardGate::NoNewCards));
    }

    #[test]
    fn preview_window_looks_past_last_review() {
        let store = SqliteStore::open_in_memory().unwrap();
        let upcoming = scheduled(1, 1, 60, NOW + 1000);
        store.insert_card(&upcoming).unwrap();
        store
            .import_log_entries(&[first_view(1, NOW - 50, 60)])
            .unwrap();
        let config = SchedulerConfig {
            preview_window: 3600,
            ..Default::default()
        };
        let mut scheduler = loaded(&store, config);

        let selection = scheduler
            .select_next(&store, &SelectOptions::default(), NOW)
            .unwrap();
        assert_eq!(selection, Selection::Preview(upcoming, NewCardGate::NoNewCards));

        let opts = SelectOptions {
            allow_preview: false,
            ..Default::default()
        };
        let selection = scheduler.select_next(&store, &opts, NOW).unwrap();
        assert_eq!(selection, Selection::Empty(NewCardGate::NoNewCards));
    }

    #[test]
    fn new_card_good_lands_in_jitter_band() {
        let store = SqliteStore::open_in_memory().unwrap();
        let card = Card::new(1, 1, 1, 0);
        store.insert_card(&card).unwrap();
        let mut scheduler = loaded(&store, SchedulerConfig::default());

        let outcome = scheduler
            .compute_interval(&store, &card, Ease::Good, NOW)
            .unwrap();
        assert_eq!(outcome.interval, 60);
        assert!((NOW + 56..=NOW + 63).contains(&outcome.due));
        assert_eq!(outcome.last_interval, 0);
    }

    #[test]
    fn preview_does_not_write() {
        let store = SqliteStore::open_in_memory().unwrap();
        store.set_config_value(CORRECT_FACTOR_KEY, "1500").unwrap();
        let card = scheduled(1, 1, DAY, NOW);
        store.insert_card(&card).unwrap();
        let scheduler = loaded(&store, SchedulerConfig::default());

        let preview = scheduler.preview_intervals(&store, &card, NOW).unwrap();
        assert_eq!(scheduler.correct_factor(), 1500);
        assert!(preview.good > DAY);
        assert!(preview.again <= preview.hard);
        assert_eq!(
            store
                .get_config_value(srs_core::config::CORRECT_FACTOR_UPDATED_KEY)
                .unwrap(),
            None
        );
    }
}
