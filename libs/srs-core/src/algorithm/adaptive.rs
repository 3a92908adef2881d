//! Adaptive interval formula.
//!
//! The base for hard/good/easy is the longer of the stored interval and the
//! time actually elapsed since the card was last seen, so a card reviewed
//! late is credited for the extra time it was retained. Good intervals scale
//! with a per-card factor (an exponential moving average of past eases) and
//! with the global correct factor.

use super::{IntervalAlgorithm, ReviewContext, ScheduledInterval};
use crate::config::{SchedulerConfig, DEFAULT_CORRECT_FACTOR};
use crate::types::{Card, Ease};

/// Adaptive algorithm over a resolved config.
#[derive(Debug, Clone)]
pub struct AdaptiveIntervals {
    pub config: SchedulerConfig,
}

impl AdaptiveIntervals {
    pub fn new(config: SchedulerConfig) -> Self {
        Self { config }
    }

    /// `max(card.interval, now - last_seen)`; a card never seen counts zero
    /// elapsed time.
    pub fn last_interval(card: &Card, ctx: &ReviewContext) -> i64 {
        let elapsed = ctx
            .last_seen
            .map(|seen| (ctx.now - seen).max(0))
            .unwrap_or(0);
        card.interval.max(elapsed)
    }

    /// Moving average of the card factor toward the weight for `ease`.
    pub fn next_factor(&self, old_factor: f64, ease: Ease) -> f64 {
        let decay = self.config.decay_factor;
        decay * old_factor + (1.0 - decay) * self.config.weights.get(ease)
    }

    fn good_interval(&self, last_interval: i64, factor: f64, correct_factor: i64) -> f64 {
        let grown = last_interval as f64
            * self.config.good_factor
            * factor
            * (correct_factor as f64 / DEFAULT_CORRECT_FACTOR as f64);
        grown
            .max(self.config.good_min_interval as f64)
            .min(self.config.good_ceiling() as f64)
    }
}

impl Default for AdaptiveIntervals {
    fn default() -> Self {
        Self::new(SchedulerConfig::default())
    }
}

impl IntervalAlgorithm for AdaptiveIntervals {
    fn name(&self) -> &'static str {
        "adaptive"
    }

    fn compute(&self, card: &Card, ease: Ease, ctx: &ReviewContext) -> ScheduledInterval {
        let config = &self.config;
        let factor = self.next_factor(card.factor, ease);
        let last_interval = Self::last_interval(card, ctx);

        let interval = match ease {
            Ease::Again => {
                (card.interval as f64 * config.again_factor).max(config.again_min_interval as f64)
            }
            Ease::Hard => {
                (last_interval as f64 * config.hard_factor).max(config.hard_min_interval as f64)
            }
            Ease::Good => self.good_interval(last_interval, factor, ctx.correct_factor),
            Ease::Easy => {
                let good = self
                    .good_interval(last_interval, factor, ctx.correct_factor)
                    .floor();
                (good * config.easy_factor)
                    .max(config.easy_min_interval as f64)
                    .min(config.easy_ceiling() as f64)
            }
        };

        ScheduledInterval {
            interval: interval.floor() as i64,
            factor,
        }
    }

    fn due(&self, now: i64, interval: i64, jitter: f64) -> i64 {
        let jitter = jitter.clamp(-1.0, 1.0);
        let spread = 1.0 + self.config.dispersion_factor * jitter / 100.0;
        now + (interval as f64 * spread).floor() as i64
    }

    fn is_lapse(&self, old_interval: i64, new_interval: i64) -> bool {
        old_interval >= self.config.mature_threshold && new_interval < self.config.mature_threshold
    }
}
