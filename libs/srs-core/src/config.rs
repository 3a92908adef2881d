//! Scheduler tunables and the unit-string resolver.
//!
//! Tunables are persisted as `(name, value)` strings such as
//! `("matureThreshold", "21 days")`. [`SchedulerConfig::from_pairs`] resolves
//! them once at startup into a typed struct; durations become seconds.

use crate::error::{CoreError, Result};
use crate::types::{Ease, DAY};
use serde::{Deserialize, Serialize};

/// Config key holding the schema version (owned by migrations).
pub const SCHEMA_VERSION_KEY: &str = "schemaVersion";
/// Config key holding the adaptive correct factor.
pub const CORRECT_FACTOR_KEY: &str = "correctFactor";
/// Config key holding when the correct factor was last adjusted.
pub const CORRECT_FACTOR_UPDATED_KEY: &str = "correctFactorUpdated";

/// Neutral value of the correct factor.
pub const DEFAULT_CORRECT_FACTOR: i64 = 1000;

const RESERVED_KEYS: [&str; 3] = [
    SCHEMA_VERSION_KEY,
    CORRECT_FACTOR_KEY,
    CORRECT_FACTOR_UPDATED_KEY,
];

/// Per-ease targets the card factor decays toward.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EaseWeights {
    pub again: f64,
    pub hard: f64,
    pub good: f64,
    pub easy: f64,
}

impl EaseWeights {
    pub fn get(&self, ease: Ease) -> f64 {
        match ease {
            Ease::Again => self.again,
            Ease::Hard => self.hard,
            Ease::Good => self.good,
            Ease::Easy => self.easy,
        }
    }
}

impl Default for EaseWeights {
    fn default() -> Self {
        Self {
            again: 0.0,
            hard: 1.0,
            good: 2.0,
            easy: 4.0,
        }
    }
}

/// Fully resolved scheduler parameters. All durations are in seconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Registry name of the scheduler implementation.
    pub scheduler: String,
    pub again_min_interval: i64,
    pub again_factor: f64,
    pub hard_min_interval: i64,
    pub hard_factor: f64,
    pub good_min_interval: i64,
    pub good_factor: f64,
    pub easy_min_interval: i64,
    pub easy_factor: f64,
    pub max_interval: i64,
    pub max_good_interval: i64,
    pub max_easy_interval: i64,
    pub mature_threshold: i64,
    pub max_view_time: i64,
    pub max_new_cards: u32,
    pub study_time_limit: i64,
    pub min_time_between_related_cards: i64,
    /// Percent of the interval used as the jitter amplitude.
    pub dispersion_factor: f64,
    pub decay_factor: f64,
    pub weights: EaseWeights,
    pub correct_factor_adjustment_interval: i64,
    pub percent_correct_window: i64,
    pub correct_factor_min: i64,
    pub correct_factor_max: i64,
    /// Look-ahead beyond the last review when nothing is due. Zero disables it.
    pub preview_window: i64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            scheduler: "adaptive".to_string(),
            again_min_interval: 20,
            again_factor: 0.1,
            hard_min_interval: 30,
            hard_factor: 0.5,
            good_min_interval: 60,
            good_factor: 1.0,
            easy_min_interval: DAY,
            easy_factor: 1.5,
            max_interval: 365 * DAY,
            max_good_interval: 365 * DAY,
            max_easy_interval: 365 * DAY,
            mature_threshold: 21 * DAY,
            max_view_time: 120,
            max_new_cards: 20,
            study_time_limit: 3600,
            min_time_between_related_cards: 3600,
            dispersion_factor: 5.0,
            decay_factor: 0.95,
            weights: EaseWeights::default(),
            correct_factor_adjustment_interval: DAY,
            percent_correct_window: 30 * DAY,
            correct_factor_min: 500,
            correct_factor_max: 2000,
            preview_window: 0,
        }
    }
}

impl SchedulerConfig {
    /// Default rows written to a fresh config table.
    pub fn default_pairs() -> Vec<(&'static str, &'static str)> {
        vec![
            ("scheduler", "adaptive"),
            ("againMinInterval", "20 seconds"),
            ("againFactor", "0.1"),
            ("hardMinInterval", "30 seconds"),
            ("hardFactor", "0.5"),
            ("goodMinInterval", "60 seconds"),
            ("goodFactor", "1.0"),
            ("easyMinInterval", "1 day"),
            ("easyFactor", "1.5"),
            ("maxInterval", "1 year"),
            ("maxGoodInterval", "1 year"),
            ("maxEasyInterval", "1 year"),
            ("matureThreshold", "21 days"),
            ("maxViewTime", "2 minutes"),
            ("maxNewCards", "20"),
            ("studyTimeLimit", "1 hour"),
            ("minTimeBetweenRelatedCards", "1 hour"),
            ("dispersionFactor", "5"),
            ("decayFactor", "0.95"),
            ("weightAgain", "0"),
            ("weightHard", "1"),
            ("weightGood", "2"),
            ("weightEasy", "4"),
            ("correctFactorAdjustmentInterval", "1 day"),
            ("percentCorrectWindow", "1 month"),
            ("correctFactorMin", "500"),
            ("correctFactorMax", "2000"),
            ("previewWindow", "0 seconds"),
        ]
    }

    /// Resolve persisted rows on top of the defaults.
    ///
    /// Reserved keys are skipped; any other unknown key is an error so a typo
    /// in a settings row fails at startup instead of silently using a default.
    pub fn from_pairs<I, K, V>(pairs: I) -> Result<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut config = Self::default();
        for (key, value) in pairs {
            config.apply(key.as_ref(), value.as_ref())?;
        }
        config.validate()?;
        Ok(config)
    }

    fn apply(&mut self, key: &str, value: &str) -> Result<()> {
        match key {
            "scheduler" => self.scheduler = value.trim().to_string(),
            "againMinInterval" => self.again_min_interval = parse_duration(key, value)?,
            "againFactor" => self.again_factor = parse_number(key, value)?,
            "hardMinInterval" => self.hard_min_interval = parse_duration(key, value)?,
            "hardFactor" => self.hard_factor = parse_number(key, value)?,
            "goodMinInterval" => self.good_min_interval = parse_duration(key, value)?,
            "goodFactor" => self.good_factor = parse_number(key, value)?,
            "easyMinInterval" => self.easy_min_interval = parse_duration(key, value)?,
            "easyFactor" => self.easy_factor = parse_number(key, value)?,
            "maxInterval" => self.max_interval = parse_duration(key, value)?,
            "maxGoodInterval" => self.max_good_interval = parse_duration(key, value)?,
            "maxEasyInterval" => self.max_easy_interval = parse_duration(key, value)?,
            "matureThreshold" => self.mature_threshold = parse_duration(key, value)?,
            "maxViewTime" => self.max_view_time = parse_duration(key, value)?,
            "maxNewCards" => self.max_new_cards = parse_count(key, value)?,
            "studyTimeLimit" => self.study_time_limit = parse_duration(key, value)?,
            "minTimeBetweenRelatedCards" => {
                self.min_time_between_related_cards = parse_duration(key, value)?
            }
            "dispersionFactor" => self.dispersion_factor = parse_number(key, value)?,
            "decayFactor" => self.decay_factor = parse_number(key, value)?,
            "weightAgain" => self.weights.again = parse_number(key, value)?,
            "weightHard" => self.weights.hard = parse_number(key, value)?,
            "weightGood" => self.weights.good = parse_number(key, value)?,
            "weightEasy" => self.weights.easy = parse_number(key, value)?,
            "correctFactorAdjustmentInterval" => {
                self.correct_factor_adjustment_interval = parse_duration(key, value)?
            }
            "percentCorrectWindow" => self.percent_correct_window = parse_duration(key, value)?,
            "correctFactorMin" => self.correct_factor_min = parse_number(key, value)? as i64,
            "correctFactorMax" => self.correct_factor_max = parse_number(key, value)? as i64,
            "previewWindow" => self.preview_window = parse_duration(key, value)?,
            _ if RESERVED_KEYS.contains(&key) => {}
            _ => return Err(CoreError::UnknownKey(key.to_string())),
        }
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        if self.scheduler.is_empty()
            || !self
                .scheduler
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
        {
            return Err(invalid("scheduler", "expected a registry name"));
        }
        if !(0.0..=1.0).contains(&self.decay_factor) {
            return Err(invalid("decayFactor", "must be between 0 and 1"));
        }
        if !(0.0..=100.0).contains(&self.dispersion_factor) {
            return Err(invalid("dispersionFactor", "must be between 0 and 100"));
        }
        let factors = [
            ("againFactor", self.again_factor),
            ("hardFactor", self.hard_factor),
            ("goodFactor", self.good_factor),
            ("easyFactor", self.easy_factor),
        ];
        for (key, factor) in factors {
            if factor < 0.0 {
                return Err(invalid(key, "must not be negative"));
            }
        }
        if self.max_interval <= 0 {
            return Err(invalid("maxInterval", "must be positive"));
        }
        let minimums = [
            ("againMinInterval", self.again_min_interval),
            ("hardMinInterval", self.hard_min_interval),
            ("goodMinInterval", self.good_min_interval),
            ("easyMinInterval", self.easy_min_interval),
        ];
        for (key, minimum) in minimums {
            if minimum > self.max_interval {
                return Err(invalid(key, "must not exceed maxInterval"));
            }
        }
        if self.correct_factor_min > self.correct_factor_max {
            return Err(invalid(
                "correctFactorMin",
                "must not exceed correctFactorMax",
            ));
        }
        Ok(())
    }

    /// Clamp applied to the good interval.
    pub fn good_ceiling(&self) -> i64 {
        self.max_interval.min(self.max_good_interval)
    }

    /// Clamp applied to the easy interval.
    pub fn easy_ceiling(&self) -> i64 {
        self.max_interval.min(self.max_easy_interval)
    }
}

fn invalid(key: &str, reason: &str) -> CoreError {
    CoreError::InvalidValue {
        key: key.to_string(),
        reason: reason.to_string(),
    }
}

fn parse_number(key: &str, value: &str) -> Result<f64> {
    let trimmed = value.trim();
    trimmed
        .parse::<f64>()
        .ok()
        .filter(|n| n.is_finite())
        .ok_or_else(|| CoreError::InvalidNumber {
            key: key.to_string(),
            value: trimmed.to_string(),
        })
}

fn parse_count(key: &str, value: &str) -> Result<u32> {
    let trimmed = value.trim();
    trimmed.parse::<u32>().map_err(|_| CoreError::InvalidNumber {
        key: key.to_string(),
        value: trimmed.to_string(),
    })
}

/// Seconds per unit, or `None` for an unrecognized unit.
fn unit_seconds(unit: &str) -> Option<i64> {
    let seconds = match unit.to_ascii_lowercase().as_str() {
        "" | "s" | "sec" | "secs" | "second" | "seconds" => 1,
        "m" | "min" | "mins" | "minute" | "minutes" => 60,
        "h" | "hr" | "hrs" | "hour" | "hours" => 3600,
        "d" | "day" | "days" => DAY,
        "w" | "week" | "weeks" => 7 * DAY,
        "month" | "months" => 30 * DAY,
        "y" | "year" | "years" => 365 * DAY,
        _ => return None,
    };
    Some(seconds)
}

/// Parse a duration like `"21 days"`, `"1.5h"` or `"90"` into whole seconds.
pub fn parse_duration(key: &str, value: &str) -> Result<i64> {
    let trimmed = value.trim();
    let split = trimmed
        .find(|c: char| !(c.is_ascii_digit() || c == '.' || c == '-' || c == '+'))
        .unwrap_or(trimmed.len());
    let (number, unit) = trimmed.split_at(split);

    let amount = number
        .parse::<f64>()
        .ok()
        .filter(|n| n.is_finite() && *n >= 0.0)
        .ok_or_else(|| CoreError::InvalidNumber {
            key: key.to_string(),
            value: trimmed.to_string(),
        })?;

    let unit = unit.trim();
    let per_unit = unit_seconds(unit).ok_or_else(|| CoreError::UnknownUnit {
        key: key.to_string(),
        unit: unit.to_string(),
    })?;

    let seconds = (amount * per_unit as f64).floor();
    if seconds >= i64::MAX as f64 {
        return Err(CoreError::InvalidValue {
            key: key.to_string(),
            reason: format!("{trimmed} is out of range"),
        });
    }
    Ok(seconds as i64)
}
