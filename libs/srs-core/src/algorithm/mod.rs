//! Interval algorithm: turns a review outcome into a new interval, due time
//! and card factor.

pub mod adaptive;

use crate::types::{Card, Ease, IntervalPreview};
use serde::{Deserialize, Serialize};

pub use adaptive::AdaptiveIntervals;

/// Inputs that come from outside the card row.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReviewContext {
    /// Epoch seconds, read once per review.
    pub now: i64,
    /// Epoch seconds of the card's most recent review, if any.
    pub last_seen: Option<i64>,
    /// Global correct factor, 1000 = neutral.
    pub correct_factor: i64,
}

/// Interval and factor produced for one ease.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScheduledInterval {
    pub interval: i64,
    pub factor: f64,
}

/// Everything a committed review changes on the card.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewOutcome {
    /// Ease actually applied, after any view-time override.
    pub ease: Ease,
    pub interval: i64,
    pub last_interval: i64,
    pub due: i64,
    pub factor: f64,
    pub lapsed: bool,
    pub lapses: u32,
}

/// A pluggable interval formula.
pub trait IntervalAlgorithm: Send + Sync {
    /// Algorithm identifier.
    fn name(&self) -> &'static str;

    /// Interval and factor for `ease`, before jitter.
    fn compute(&self, card: &Card, ease: Ease, ctx: &ReviewContext) -> ScheduledInterval;

    /// Due time for `interval`, with `jitter` in `[-1, 1]`.
    fn due(&self, now: i64, interval: i64, jitter: f64) -> i64;

    /// Whether moving from `old_interval` to `new_interval` is a lapse.
    fn is_lapse(&self, old_interval: i64, new_interval: i64) -> bool;

    /// Intervals for every ease, without side effects.
    fn preview(&self, card: &Card, ctx: &ReviewContext) -> IntervalPreview {
        IntervalPreview {
            again: self.compute(card, Ease::Again, ctx).interval,
            hard: self.compute(card, Ease::Hard, ctx).interval,
            good: self.compute(card, Ease::Good, ctx).interval,
            easy: self.compute(card, Ease::Easy, ctx).interval,
        }
    }

    /// Full outcome of reviewing `card` with `ease`.
    fn schedule(&self, card: &Card, ease: Ease, ctx: &ReviewContext, jitter: f64) -> ReviewOutcome {
        let scheduled = self.compute(card, ease, ctx);
        let lapsed = self.is_lapse(card.interval, scheduled.interval);
        ReviewOutcome {
            ease,
            interval: scheduled.interval,
            last_interval: card.interval,
            due: self.due(ctx.now, scheduled.interval, jitter),
            factor: scheduled.factor,
            lapsed,
            lapses: if lapsed { card.lapses + 1 } else { card.lapses },
        }
    }
}
