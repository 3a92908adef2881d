//! Pluggable schedulers.
//!
//! A scheduler owns the per-session state (last new-card time, cached
//! correct factor, random source) and answers two questions: what interval a
//! review earns, and which card to show next. Implementations are resolved by
//! name through [`SchedulerRegistry`] when the engine opens.

pub mod adaptive;
pub mod correct_factor;

use crate::db::{SqliteStore, StoreError};
use serde::Serialize;
use srs_core::{Card, Ease, IntervalPreview, ReviewOutcome, SchedulerConfig};
use std::collections::BTreeMap;

pub use adaptive::AdaptiveScheduler;
pub use correct_factor::CorrectFactor;

type Result<T> = std::result::Result<T, StoreError>;

/// Per-request selection switches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SelectOptions {
    /// Consider introducing a new card.
    pub allow_new: bool,
    /// Fall back to the look-ahead window when nothing is due.
    pub allow_preview: bool,
}

impl Default for SelectOptions {
    fn default() -> Self {
        Self {
            allow_new: true,
            allow_preview: true,
        }
    }
}

/// Why a new card was not offered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NewCardGate {
    DisabledByCaller,
    OverdueBacklog,
    DailyStudyTime,
    FortnightStudyTime,
    NewCardLimit,
    ProjectedDayLoad,
    ProjectedFiveDayLoad,
    NewCardSpacing,
    NoNewCards,
}

/// Result of a selection. Every variant other than `New` records the first
/// rule that kept a new card from being offered.
#[derive(Debug, Clone, PartialEq)]
pub enum Selection {
    New(Card),
    Due(Card, NewCardGate),
    /// Not yet due, inside the preview window.
    Preview(Card, NewCardGate),
    /// Nothing to study; show a summary instead.
    Empty(NewCardGate),
}

impl Selection {
    pub fn card(&self) -> Option<&Card> {
        match self {
            Self::New(card) | Self::Due(card, _) | Self::Preview(card, _) => Some(card),
            Self::Empty(_) => None,
        }
    }

    pub fn into_card(self) -> Option<Card> {
        match self {
            Self::New(card) | Self::Due(card, _) | Self::Preview(card, _) => Some(card),
            Self::Empty(_) => None,
        }
    }

    /// Rule that gated new cards, `None` when a new card was chosen.
    pub fn gate(&self) -> Option<NewCardGate> {
        match self {
            Self::New(_) => None,
            Self::Due(_, gate) | Self::Preview(_, gate) | Self::Empty(gate) => Some(*gate),
        }
    }
}

/// Scheduler capability set.
pub trait Scheduler: Send {
    /// Registry name.
    fn name(&self) -> &'static str;

    fn config(&self) -> &SchedulerConfig;

    /// Restore session state from the store.
    fn load(&mut self, store: &SqliteStore, now: i64) -> Result<()>;

    /// Persist session state before the store is closed.
    fn unload(&mut self, store: &SqliteStore) -> Result<()>;

    /// Outcome of reviewing `card` with `ease` at `now`, jitter included.
    fn compute_interval(
        &mut self,
        store: &SqliteStore,
        card: &Card,
        ease: Ease,
        now: i64,
    ) -> Result<ReviewOutcome>;

    /// Intervals for every ease. Writes nothing.
    fn preview_intervals(
        &self,
        store: &SqliteStore,
        card: &Card,
        now: i64,
    ) -> Result<IntervalPreview>;

    /// Choose the next card to present.
    fn select_next(
        &mut self,
        store: &SqliteStore,
        opts: &SelectOptions,
        now: i64,
    ) -> Result<Selection>;
}

/// Builds a scheduler from the resolved config.
pub type SchedulerFactory = fn(SchedulerConfig) -> Box<dyn Scheduler>;

/// Maps scheduler names to factories; consulted at startup.
pub struct SchedulerRegistry {
    factories: BTreeMap<&'static str, SchedulerFactory>,
}

impl SchedulerRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self {
            factories: BTreeMap::new(),
        }
    }

    /// Registry with the built-in schedulers.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register("adaptive", |config| Box::new(AdaptiveScheduler::new(config)));
        registry
    }

    pub fn register(&mut self, name: &'static str, factory: SchedulerFactory) {
        self.factories.insert(name, factory);
    }

    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.factories.keys().copied()
    }

    /// Instantiate the scheduler named by `config.scheduler`.
    pub fn create(&self, config: SchedulerConfig) -> Result<Box<dyn Scheduler>> {
        match self.factories.get(config.scheduler.as_str()) {
            Some(factory) => Ok(factory(config)),
            None => Err(StoreError::UnknownScheduler(config.scheduler)),
        }
    }
}

impl Default for SchedulerRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

/// Get scheduler by config using the built-in registry.
pub fn get_scheduler(config: SchedulerConfig) -> Result<Box<dyn Scheduler>> {
    SchedulerRegistry::with_defaults().create(config)
}
