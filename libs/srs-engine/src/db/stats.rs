//! Read-only statistics over cards and the review log.
//!
//! Every query takes `now` in epoch seconds so results are reproducible.

use crate::db::date_utils::{day_offset, end_of_local_day, local_date, start_of_local_day};
use crate::db::repository::{Result, SqliteStore};
use chrono::{Duration, NaiveDate};
use rusqlite::params;
use serde::Serialize;
use srs_core::DAY;
use std::collections::{BTreeMap, HashSet};

/// Trailing window used for the per-card study time average.
pub const STUDY_TIME_PER_CARD_WINDOW_DAYS: i64 = 14;

/// One histogram bucket. `offset` counts days (or hours) from now.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistogramBucket {
    pub offset: i64,
    pub value: f64,
}

/// Cards crossing the maturity threshold on one day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MaturityBucket {
    pub offset: i64,
    pub matured: usize,
    pub lapsed: usize,
}

/// Counters for a landing/summary view.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StudySummary {
    pub due_now: usize,
    pub due_today: usize,
    pub overdue: usize,
    pub new_available: usize,
    pub new_shown_last_day: usize,
    pub study_time_last_day: f64,
    pub study_time_per_card: f64,
}

/// Repository for statistics operations.
pub trait StatsRepository {
    fn count_due_now(&self, now: i64) -> Result<usize>;
    fn count_due_today(&self, now: i64) -> Result<usize>;
    /// Scheduled cards more than a day past due.
    fn count_overdue(&self, now: i64) -> Result<usize>;
    /// Scheduled cards due before `now + days`.
    fn count_due_within(&self, now: i64, days: i64) -> Result<usize>;
    fn count_new_cards(&self) -> Result<usize>;
    /// Distinct cards first shown within `period` seconds before `now`.
    fn count_new_cards_shown(&self, now: i64, period: i64) -> Result<usize>;
    /// Total study seconds over the trailing `days`, divided by `days`.
    fn average_study_time(&self, now: i64, days: i64) -> Result<f64>;
    /// Study seconds per distinct card per day, averaged over days with reviews.
    fn average_study_time_per_card(&self, now: i64, days: i64) -> Result<f64>;
    /// Projected daily study seconds for the cards due in the next `days`.
    fn estimated_study_time(&self, now: i64, days: i64) -> Result<f64>;
    /// Percentage of non-again outcomes among mature-card reviews in `window`.
    fn percent_correct(&self, now: i64, window: i64, mature_threshold: i64) -> Result<Option<f64>>;
    fn last_review_time(&self) -> Result<Option<i64>>;
    fn last_new_card_time(&self) -> Result<Option<i64>>;
    fn cards_due_per_day(&self, now: i64, days: i64) -> Result<Vec<HistogramBucket>>;
    fn cards_due_per_hour(&self, now: i64, hours: i64) -> Result<Vec<HistogramBucket>>;
    fn reviews_per_day(&self, now: i64, days: i64) -> Result<Vec<HistogramBucket>>;
    fn minutes_studied_per_day(&self, now: i64, days: i64) -> Result<Vec<HistogramBucket>>;
    fn matured_lapsed_per_day(
        &self,
        now: i64,
        days: i64,
        mature_threshold: i64,
    ) -> Result<Vec<MaturityBucket>>;
    fn study_summary(&self, now: i64) -> Result<StudySummary>;
}

impl SqliteStore {
    fn count(&self, sql: &str, param: i64) -> Result<usize> {
        let count: i64 = self.conn().query_row(sql, params![param], |row| row.get(0))?;
        Ok(count.max(0) as usize)
    }

    /// First local midnight of a trailing window of `days` calendar days ending today.
    fn window_start(now: i64, days: i64) -> i64 {
        let today = local_date(now);
        let first = today
            .checked_sub_signed(Duration::days(days.max(1) - 1))
            .unwrap_or(NaiveDate::MIN);
        start_of_local_day(first)
    }

    /// `(id, card_id, study_time, last_interval, interval)` for entries at or after `since`.
    fn log_rows_since(&self, since: i64) -> Result<Vec<(i64, i64, f64, i64, i64)>> {
        let mut stmt = self.conn().prepare(
            "SELECT id, card_id, study_time, last_interval, interval
             FROM revlog WHERE id >= ?1 ORDER BY id",
        )?;
        let rows = stmt
            .query_map(params![since.saturating_mul(1000)], |row| {
                Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?, row.get(4)?))
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    fn day_buckets(days: i64) -> BTreeMap<i64, f64> {
        (-(days.max(1) - 1)..=0).map(|offset| (offset, 0.0)).collect()
    }

    fn into_histogram(buckets: BTreeMap<i64, f64>) -> Vec<HistogramBucket> {
        buckets
            .into_iter()
            .map(|(offset, value)| HistogramBucket { offset, value })
            .collect()
    }
}

impl StatsRepository for SqliteStore {
    fn count_due_now(&self, now: i64) -> Result<usize> {
        self.count(
            "SELECT COUNT(*) FROM cards WHERE interval != 0 AND due <= ?1",
            now,
        )
    }

    fn count_due_today(&self, now: i64) -> Result<usize> {
        self.count(
            "SELECT COUNT(*) FROM cards WHERE interval != 0 AND due < ?1",
            end_of_local_day(now),
        )
    }

    fn count_overdue(&self, now: i64) -> Result<usize> {
        self.count(
            "SELECT COUNT(*) FROM cards WHERE interval != 0 AND due < ?1",
            now - DAY,
        )
    }

    fn count_due_within(&self, now: i64, days: i64) -> Result<usize> {
        self.count(
            "SELECT COUNT(*) FROM cards WHERE interval != 0 AND due < ?1",
            now + days * DAY,
        )
    }

    fn count_new_cards(&self) -> Result<usize> {
        self.count("SELECT COUNT(*) FROM cards WHERE interval = ?1", 0)
    }

    fn count_new_cards_shown(&self, now: i64, period: i64) -> Result<usize> {
        self.count(
            "SELECT COUNT(DISTINCT card_id) FROM revlog WHERE last_interval = 0 AND id >= ?1",
            (now - period) * 1000,
        )
    }

    fn average_study_time(&self, now: i64, days: i64) -> Result<f64> {
        if days <= 0 {
            return Ok(0.0);
        }
        let total: f64 = self.conn().query_row(
            "SELECT COALESCE(SUM(study_time), 0.0) FROM revlog WHERE id >= ?1",
            params![(now - days * DAY) * 1000],
            |row| row.get(0),
        )?;
        Ok(total / days as f64)
    }

    fn average_study_time_per_card(&self, now: i64, days: i64) -> Result<f64> {
        let mut per_day: BTreeMap<NaiveDate, (f64, HashSet<i64>)> = BTreeMap::new();
        for (id, card_id, study_time, _, _) in self.log_rows_since(now - days * DAY)? {
            let day = per_day
                .entry(local_date(id.div_euclid(1000)))
                .or_insert_with(|| (0.0, HashSet::new()));
            day.0 += study_time;
            day.1.insert(card_id);
        }
        if per_day.is_empty() {
            return Ok(0.0);
        }
        let total: f64 = per_day
            .values()
            .map(|(time, cards)| time / cards.len() as f64)
            .sum();
        Ok(total / per_day.len() as f64)
    }

    fn estimated_study_time(&self, now: i64, days: i64) -> Result<f64> {
        if days <= 0 {
            return Ok(0.0);
        }
        let due = self.count_due_within(now, days)?;
        let per_card = self.average_study_time_per_card(now, STUDY_TIME_PER_CARD_WINDOW_DAYS)?;
        Ok(due as f64 * per_card / days as f64)
    }

    fn percent_correct(&self, now: i64, window: i64, mature_threshold: i64) -> Result<Option<f64>> {
        let (total, correct): (i64, i64) = self.conn().query_row(
            "SELECT COUNT(*), COALESCE(SUM(CASE WHEN ease != 1 THEN 1 ELSE 0 END), 0)
             FROM revlog WHERE last_interval >= ?1 AND id >= ?2",
            params![mature_threshold, (now - window) * 1000],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;
        if total == 0 {
            return Ok(None);
        }
        Ok(Some(correct as f64 * 100.0 / total as f64))
    }

    fn last_review_time(&self) -> Result<Option<i64>> {
        let max_id: Option<i64> =
            self.conn()
                .query_row("SELECT MAX(id) FROM revlog", [], |row| row.get(0))?;
        Ok(max_id.map(|id| id.div_euclid(1000)))
    }

    fn last_new_card_time(&self) -> Result<Option<i64>> {
        let max_id: Option<i64> = self.conn().query_row(
            "SELECT MAX(id) FROM revlog WHERE last_interval = 0",
            [],
            |row| row.get(0),
        )?;
        Ok(max_id.map(|id| id.div_euclid(1000)))
    }

    fn cards_due_per_day(&self, now: i64, days: i64) -> Result<Vec<HistogramBucket>> {
        let days = days.max(1);
        let horizon = local_date(now)
            .checked_add_signed(Duration::days(days))
            .map(start_of_local_day)
            .unwrap_or(i64::MAX);
        let mut stmt = self
            .conn()
            .prepare("SELECT due FROM cards WHERE interval != 0 AND due < ?1")?;
        let dues = stmt
            .query_map(params![horizon], |row| row.get::<_, i64>(0))?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let mut buckets: BTreeMap<i64, f64> = (0..days).map(|offset| (offset, 0.0)).collect();
        for due in dues {
            let offset = day_offset(due, now).clamp(0, days - 1);
            *buckets.entry(offset).or_insert(0.0) += 1.0;
        }
        Ok(Self::into_histogram(buckets))
    }

    fn cards_due_per_hour(&self, now: i64, hours: i64) -> Result<Vec<HistogramBucket>> {
        let hours = hours.max(1);
        let mut stmt = self
            .conn()
            .prepare("SELECT due FROM cards WHERE interval != 0 AND due < ?1")?;
        let dues = stmt
            .query_map(params![now + hours * 3600], |row| row.get::<_, i64>(0))?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let mut buckets: BTreeMap<i64, f64> = (0..hours).map(|offset| (offset, 0.0)).collect();
        for due in dues {
            let offset = (due - now).div_euclid(3600).clamp(0, hours - 1);
            *buckets.entry(offset).or_insert(0.0) += 1.0;
        }
        Ok(Self::into_histogram(buckets))
    }

    fn reviews_per_day(&self, now: i64, days: i64) -> Result<Vec<HistogramBucket>> {
        let mut buckets = Self::day_buckets(days);
        for (id, ..) in self.log_rows_since(Self::window_start(now, days))? {
            if let Some(count) = buckets.get_mut(&day_offset(id.div_euclid(1000), now)) {
                *count += 1.0;
            }
        }
        Ok(Self::into_histogram(buckets))
    }

    fn minutes_studied_per_day(&self, now: i64, days: i64) -> Result<Vec<HistogramBucket>> {
        let mut buckets = Self::day_buckets(days);
        for (id, _, study_time, ..) in self.log_rows_since(Self::window_start(now, days))? {
            if let Some(minutes) = buckets.get_mut(&day_offset(id.div_euclid(1000), now)) {
                *minutes += study_time / 60.0;
            }
        }
        Ok(Self::into_histogram(buckets))
    }

    fn matured_lapsed_per_day(
        &self,
        now: i64,
        days: i64,
        mature_threshold: i64,
    ) -> Result<Vec<MaturityBucket>> {
        let mut buckets: BTreeMap<i64, (usize, usize)> = Self::day_buckets(days)
            .into_keys()
            .map(|offset| (offset, (0, 0)))
            .collect();
        for (id, _, _, last_interval, interval) in
            self.log_rows_since(Self::window_start(now, days))?
        {
            let Some(bucket) = buckets.get_mut(&day_offset(id.div_euclid(1000), now)) else {
                continue;
            };
            let was_mature = last_interval >= mature_threshold;
            let is_mature = interval >= mature_threshold;
            match (was_mature, is_mature) {
                (false, true) => bucket.0 += 1,
                (true, false) => bucket.1 += 1,
                _ => {}
            }
        }
        Ok(buckets
            .into_iter()
            .map(|(offset, (matured, lapsed))| MaturityBucket {
                offset,
                matured,
                lapsed,
            })
            .collect())
    }

    fn study_summary(&self, now: i64) -> Result<StudySummary> {
        Ok(StudySummary {
            due_now: self.count_due_now(now)?,
            due_today: self.count_due_today(now)?,
            overdue: self.count_overdue(now)?,
            new_available: self.count_new_cards()?,
            new_shown_last_day: self.count_new_cards_shown(now, DAY)?,
            study_time_last_day: self.average_study_time(now, 1)?,
            study_time_per_card: self
                .average_study_time_per_card(now, STUDY_TIME_PER_CARD_WINDOW_DAYS)?,
        })
    }
}
