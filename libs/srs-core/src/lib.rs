//! Core scheduling library shared by the engine and its collaborators.
//!
//! Provides:
//! - Card and review-log record types
//! - Typed scheduler configuration with unit-string resolution
//! - The adaptive interval algorithm
//! - Review-log chain repair math

pub mod algorithm;
pub mod config;
pub mod error;
pub mod repair;
pub mod types;

pub use algorithm::{
    AdaptiveIntervals, IntervalAlgorithm, ReviewContext, ReviewOutcome, ScheduledInterval,
};
pub use config::{parse_duration, EaseWeights, SchedulerConfig};
pub use error::{CoreError, Result};
pub use types::{Card, Ease, IntervalPreview, ReviewLogEntry, DAY};
