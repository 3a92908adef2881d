//! Spaced-repetition engine over a SQLite collection.
//!
//! Provides:
//! - The card store, review log and config table
//! - Statistics queries feeding the new-card throttle
//! - Pluggable schedulers with an adaptive correct factor
//! - Atomic review commits with sibling burial
//! - Offline review-log repair

pub mod db;
pub mod engine;
pub mod logger;
pub mod repair;
pub mod scheduler;

pub use db::{
    default_db_path, CardRepository, ConfigRepository, HistogramBucket, MaturityBucket,
    ReviewLogRepository, SqliteStore, StatsRepository, StoreError, StudySummary,
};
pub use engine::Engine;
pub use logger::{CommittedReview, ReviewRequest};
pub use repair::RepairReport;
pub use scheduler::{
    get_scheduler, AdaptiveScheduler, NewCardGate, Scheduler, SchedulerRegistry, SelectOptions,
    Selection,
};
pub use srs_core;
