//! Adaptive correct factor.
//!
//! A slow integral controller: at most once per adjustment interval the
//! factor moves by `trunc(percent_correct - 90)`, where `percent_correct` is
//! the share of non-again outcomes among mature-card reviews in the trailing
//! window. Good intervals scale by `factor / 1000`.

use crate::db::{ConfigRepository, SqliteStore, StatsRepository, StoreError};
use srs_core::config::{CORRECT_FACTOR_KEY, CORRECT_FACTOR_UPDATED_KEY, DEFAULT_CORRECT_FACTOR};
use srs_core::{CoreError, SchedulerConfig};

type Result<T> = std::result::Result<T, StoreError>;

/// Target accuracy, in percent.
pub const TARGET_PERCENT_CORRECT: f64 = 90.0;

/// Cached correct factor and when it was last adjusted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CorrectFactor {
    value: i64,
    updated_at: Option<i64>,
}

impl Default for CorrectFactor {
    fn default() -> Self {
        Self {
            value: DEFAULT_CORRECT_FACTOR,
            updated_at: None,
        }
    }
}

fn parse_stored(key: &str, value: Option<String>) -> Result<Option<i64>> {
    match value {
        None => Ok(None),
        Some(raw) => raw.trim().parse::<i64>().map(Some).map_err(|_| {
            StoreError::Config(CoreError::InvalidNumber {
                key: key.to_string(),
                value: raw,
            })
        }),
    }
}

impl CorrectFactor {
    /// Read the persisted value, defaulting when absent.
    pub fn load(store: &SqliteStore) -> Result<Self> {
        let value = parse_stored(
            CORRECT_FACTOR_KEY,
            store.get_config_value(CORRECT_FACTOR_KEY)?,
        )?;
        let updated_at = parse_stored(
            CORRECT_FACTOR_UPDATED_KEY,
            store.get_config_value(CORRECT_FACTOR_UPDATED_KEY)?,
        )?;
        Ok(Self {
            value: value.unwrap_or(DEFAULT_CORRECT_FACTOR),
            updated_at,
        })
    }

    /// Cached value without refreshing.
    pub fn value(&self) -> i64 {
        self.value
    }

    pub fn updated_at(&self) -> Option<i64> {
        self.updated_at
    }

    fn is_stale(&self, config: &SchedulerConfig, now: i64) -> bool {
        match self.updated_at {
            Some(updated) => now - updated >= config.correct_factor_adjustment_interval,
            None => true,
        }
    }

    /// Adjusted value if the last adjustment is stale, `None` otherwise.
    /// With no mature reviews in the window the value is unchanged.
    fn adjusted(
        &self,
        store: &SqliteStore,
        config: &SchedulerConfig,
        now: i64,
    ) -> Result<Option<i64>> {
        if !self.is_stale(config, now) {
            return Ok(None);
        }
        let percent = store.percent_correct(
            now,
            config.percent_correct_window,
            config.mature_threshold,
        )?;
        let Some(percent) = percent else {
            return Ok(Some(self.value));
        };
        let adjusted = self.value + (percent - TARGET_PERCENT_CORRECT).trunc() as i64;
        Ok(Some(adjusted.clamp(
            config.correct_factor_min,
            config.correct_factor_max,
        )))
    }

    /// Value a review at `now` would use. Writes nothing.
    pub fn peek(&self, store: &SqliteStore, config: &SchedulerConfig, now: i64) -> Result<i64> {
        Ok(self.adjusted(store, config, now)?.unwrap_or(self.value))
    }

    /// Current value, adjusting and persisting it first if the last
    /// adjustment is older than the configured interval.
    pub fn current(
        &mut self,
        store: &SqliteStore,
        config: &SchedulerConfig,
        now: i64,
    ) -> Result<i64> {
        let Some(next) = self.adjusted(store, config, now)? else {
            return Ok(self.value);
        };
        if next == config.correct_factor_min || next == config.correct_factor_max {
            tracing::warn!(value = next, "correct factor at configured bound");
        }
        if next != self.value {
            tracing::info!(from = self.value, to = next, "adjusted correct factor");
        }
        self.value = next;
        self.updated_at = Some(now);
        self.persist(store)?;
        Ok(self.value)
    }

    pub fn persist(&self, store: &SqliteStore) -> Result<()> {
        store.set_config_value(CORRECT_FACTOR_KEY, &self.value.to_string())?;
        if let Some(updated) = self.updated_at {
            store.set_config_value(CORRECT_FACTOR_UPDATED_KEY, &updated.to_string())?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{CardRepository, ReviewLogRepository};
    use srs_core::{Card, Ease, ReviewLogEntry, DAY};

    const NOW: i64 = 1_700_000_000;

    fn mature_review(at: i64, ease: Ease) -> ReviewLogEntry {
        ReviewLogEntry {
            id: at * 1000,
            card_id: 1,
            ease,
            interval: 40 * DAY,
            last_interval: 30 * DAY,
            factor: 2.0,
            view_time: 3.0,
            study_time: 3.0,
            lapses: 0,
        }
    }

    /// Store with `correct` good and `wrong` again outcomes on a mature card.
    fn store_with_accuracy(correct: usize, wrong: usize) -> SqliteStore {
        let store = SqliteStore::open_in_memory().unwrap();
        store.insert_card(&Card::new(1, 1, 1, 0)).unwrap();
        let mut entries = Vec::new();
        for i in 0..correct {
            entries.push(mature_review(NOW - 1000 + i as i64, Ease::Good));
        }
        for i in 0..wrong {
            entries.push(mature_review(NOW - 500 + i as i64, Ease::Again));
        }
        store.import_log_entries(&entries).unwrap();
        store
    }

    #[test]
    fn first_read_adjusts_toward_target() {
        // 100% correct -> +10
        let store = store_with_accuracy(10, 0);
        let config = SchedulerConfig::default();
        let mut factor = CorrectFactor::load(&store).unwrap();
        assert_eq!(factor.current(&store, &config, NOW).unwrap(), 1010);
        assert_eq!(
            store.get_config_value(CORRECT_FACTOR_KEY).unwrap(),
            Some("1010".to_string())
        );
        assert_eq!(
            store.get_config_value(CORRECT_FACTOR_UPDATED_KEY).unwrap(),
            Some(NOW.to_string())
        );
    }

    #[test]
    fn low_accuracy_truncates_toward_zero() {
        // 7 of 10 correct -> 70 - 90 = -20
        let store = store_with_accuracy(7, 3);
        let mut factor = CorrectFactor::default();
        let value = factor
            .current(&store, &SchedulerConfig::default(), NOW)
            .unwrap();
        assert_eq!(value, 980);
    }

    #[test]
    fn adjusts_at_most_once_per_interval() {
        let store = store_with_accuracy(10, 0);
        let config = SchedulerConfig::default();
        let mut factor = CorrectFactor::default();
        assert_eq!(factor.current(&store, &config, NOW).unwrap(), 1010);
        assert_eq!(factor.current(&store, &config, NOW + 3600).unwrap(), 1010);
        assert_eq!(factor.current(&store, &config, NOW + DAY).unwrap(), 1020);
    }

    #[test]
    fn no_mature_reviews_keeps_value_but_advances_timestamp() {
        let store = SqliteStore::open_in_memory().unwrap();
        let mut factor = CorrectFactor::default();
        let value = factor
            .current(&store, &SchedulerConfig::default(), NOW)
            .unwrap();
        assert_eq!(value, DEFAULT_CORRECT_FACTOR);
        assert_eq!(factor.updated_at(), Some(NOW));
    }

    #[test]
    fn value_is_clamped_to_configured_range() {
        let store = store_with_accuracy(10, 0);
        let config = SchedulerConfig {
            correct_factor_max: 1005,
            ..Default::default()
        };
        let mut factor = CorrectFactor::default();
        assert_eq!(factor.current(&store, &config, NOW).unwrap(), 1005);
    }

    #[test]
    fn reload_restores_persisted_state() {
        let store = store_with_accuracy(10, 0);
        let mut factor = CorrectFactor::default();
        factor
            .current(&store, &SchedulerConfig::default(), NOW)
            .unwrap();
        let reloaded = CorrectFactor::load(&store).unwrap();
        assert_eq!(reloaded, factor);
    }

    #[test]
    fn peek_matches_current_without_writing() {
        let store = store_with_accuracy(10, 0);
        let config = SchedulerConfig::default();
        let mut factor = CorrectFactor::default();
        assert_eq!(factor.peek(&store, &config, NOW).unwrap(), 1010);
        assert_eq!(
            store.get_config_value(CORRECT_FACTOR_UPDATED_KEY).unwrap(),
            None
        );
        assert_eq!(factor.value(), DEFAULT_CORRECT_FACTOR);

        assert_eq!(factor.current(&store, &config, NOW).unwrap(), 1010);
        assert_eq!(factor.peek(&store, &config, NOW + 60).unwrap(), 1010);
    }

    #[test]
    fn malformed_stored_value_is_a_config_error() {
        let store = SqliteStore::open_in_memory().unwrap();
        store.set_config_value(CORRECT_FACTOR_KEY, "lots").unwrap();
        assert!(matches!(
            CorrectFactor::load(&store),
            Err(StoreError::Config(CoreError::InvalidNumber { .. }))
        ));
    }
}
