//! The engine facade consumed by a presentation layer.

use crate::db::{
    CardRepository, ConfigRepository, SqliteStore, StatsRepository, StoreError, StudySummary,
};
use crate::logger::{commit_review, CommittedReview, ReviewRequest};
use crate::repair::{repair_review_log, RepairReport};
use crate::scheduler::{Scheduler, SchedulerRegistry, SelectOptions, Selection};
use chrono::{DateTime, Utc};
use srs_core::{Card, Ease, IntervalPreview, SchedulerConfig};

type Result<T> = std::result::Result<T, StoreError>;

/// One open collection: a store plus the scheduler resolved from its config.
///
/// Mutating calls take `&mut self`, so requests against one engine are
/// serialized. Wrap it in a `Mutex` to share it.
///
/// After a fatal consistency error the engine refuses every further write
/// and selection, returning the same error, until it is closed.
pub struct Engine {
    store: SqliteStore,
    scheduler: Box<dyn Scheduler>,
    fault: Option<(&'static str, usize)>,
}

impl Engine {
    /// Open with the built-in schedulers.
    pub fn open(store: SqliteStore) -> Result<Self> {
        Self::open_with(store, &SchedulerRegistry::with_defaults())
    }

    /// Resolve the configured scheduler from `registry`. An unknown name or a
    /// malformed config row fails here, before any card is served.
    pub fn open_with(store: SqliteStore, registry: &SchedulerRegistry) -> Result<Self> {
        let config = store.load_scheduler_config()?;
        let scheduler = registry.create(config)?;
        Self::with_scheduler(store, scheduler)
    }

    pub fn with_scheduler(store: SqliteStore, mut scheduler: Box<dyn Scheduler>) -> Result<Self> {
        scheduler.load(&store, Utc::now().timestamp())?;
        tracing::info!(scheduler = scheduler.name(), "engine ready");
        Ok(Self {
            store,
            scheduler,
            fault: None,
        })
    }

    pub fn store(&self) -> &SqliteStore {
        &self.store
    }

    pub fn config(&self) -> &SchedulerConfig {
        self.scheduler.config()
    }

    pub fn scheduler_name(&self) -> &'static str {
        self.scheduler.name()
    }

    /// Whether a fatal error has stopped this engine.
    pub fn is_poisoned(&self) -> bool {
        self.fault.is_some()
    }

    fn ensure_healthy(&self) -> Result<()> {
        match self.fault {
            Some((operation, rows)) => Err(StoreError::Consistency { operation, rows }),
            None => Ok(()),
        }
    }

    fn check_fatal<T>(&mut self, result: Result<T>) -> Result<T> {
        if let Err(err) = &result {
            if err.is_fatal() {
                tracing::error!(error = %err, "fatal store error, stop serving this collection");
                if let StoreError::Consistency { operation, rows } = err {
                    self.fault = Some((*operation, *rows));
                }
            }
        }
        result
    }

    pub fn get_card(&self, id: i64) -> Result<Option<Card>> {
        self.store.get_card(id)
    }

    pub fn select_next(&mut self, opts: &SelectOptions) -> Result<Option<Card>> {
        Ok(self.select_next_at(opts, Utc::now())?.into_card())
    }

    pub fn select_next_at(&mut self, opts: &SelectOptions, at: DateTime<Utc>) -> Result<Selection> {
        self.ensure_healthy()?;
        let result = self.scheduler.select_next(&self.store, opts, at.timestamp());
        self.check_fatal(result)
    }

    /// Intervals each ease would earn now. Writes nothing.
    pub fn preview_intervals(&self, card: &Card) -> Result<IntervalPreview> {
        self.preview_intervals_at(card, Utc::now())
    }

    pub fn preview_intervals_at(&self, card: &Card, at: DateTime<Utc>) -> Result<IntervalPreview> {
        self.scheduler
            .preview_intervals(&self.store, card, at.timestamp())
    }

    /// Commit a review of `card`. Only the card's id is used; its current
    /// state is re-read inside the transaction.
    pub fn commit_review(
        &mut self,
        card: &Card,
        view_time: f64,
        study_time: f64,
        ease: Ease,
    ) -> Result<CommittedReview> {
        self.commit_review_at(card, view_time, study_time, ease, Utc::now())
    }

    pub fn commit_review_at(
        &mut self,
        card: &Card,
        view_time: f64,
        study_time: f64,
        ease: Ease,
        at: DateTime<Utc>,
    ) -> Result<CommittedReview> {
        self.ensure_healthy()?;
        let request = ReviewRequest {
            card_id: card.id,
            view_time,
            study_time,
            ease,
        };
        let result = commit_review(
            &self.store,
            self.scheduler.as_mut(),
            request,
            at.timestamp(),
            at.timestamp_millis(),
        );
        self.check_fatal(result)
    }

    pub fn summary(&self) -> Result<StudySummary> {
        self.summary_at(Utc::now())
    }

    pub fn summary_at(&self, at: DateTime<Utc>) -> Result<StudySummary> {
        self.store.study_summary(at.timestamp())
    }

    pub fn repair(&self) -> Result<RepairReport> {
        self.ensure_healthy()?;
        repair_review_log(&self.store)
    }

    /// Persist scheduler state and hand the store back.
    pub fn close(mut self) -> Result<SqliteStore> {
        self.scheduler.unload(&self.store)?;
        Ok(self.store)
    }
}
