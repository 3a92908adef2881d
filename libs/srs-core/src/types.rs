//! Core types shared by the scheduler and the card store.

use crate::error::CoreError;
use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Seconds in one day.
pub const DAY: i64 = 86_400;

/// Outcome chosen by the user for a review.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Ease {
    Again,
    Hard,
    Good,
    Easy,
}

impl Ease {
    /// All eases in button order.
    pub const ALL: [Ease; 4] = [Ease::Again, Ease::Hard, Ease::Good, Ease::Easy];

    /// Convert to the persisted numeric value (1-4).
    pub fn to_value(self) -> i64 {
        match self {
            Self::Again => 1,
            Self::Hard => 2,
            Self::Good => 3,
            Self::Easy => 4,
        }
    }

    /// Create from the persisted numeric value.
    pub fn from_value(value: i64) -> Option<Self> {
        match value {
            1 => Some(Self::Again),
            2 => Some(Self::Hard),
            3 => Some(Self::Good),
            4 => Some(Self::Easy),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Again => "again",
            Self::Hard => "hard",
            Self::Good => "good",
            Self::Easy => "easy",
        }
    }
}

impl TryFrom<i64> for Ease {
    type Error = CoreError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        Self::from_value(value).ok_or_else(|| CoreError::InvalidEase(value.to_string()))
    }
}

impl FromStr for Ease {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "again" | "1" => Ok(Self::Again),
            "hard" | "2" => Ok(Self::Hard),
            "good" | "3" => Ok(Self::Good),
            "easy" | "4" => Ok(Self::Easy),
            _ => Err(CoreError::InvalidEase(s.to_string())),
        }
    }
}

impl fmt::Display for Ease {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A schedulable pairing of a fieldset and a template.
///
/// `interval == 0` marks a card that has never been reviewed. For such cards
/// `due` is an ordering ordinal rather than a timestamp.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Card {
    pub id: i64,
    pub fieldset_id: i64,
    pub template_id: i64,
    /// Seconds until the card is due again after its last review.
    pub interval: i64,
    /// Epoch seconds, or an ordinal while the card is new.
    pub due: i64,
    pub factor: f64,
    pub views: u32,
    pub lapses: u32,
    pub ord: i64,
}

impl Card {
    /// A never-reviewed card.
    pub fn new(id: i64, fieldset_id: i64, template_id: i64, ord: i64) -> Self {
        Self {
            id,
            fieldset_id,
            template_id,
            interval: 0,
            due: ord,
            factor: 0.0,
            views: 0,
            lapses: 0,
            ord,
        }
    }

    pub fn is_new(&self) -> bool {
        self.interval == 0
    }

    pub fn is_mature(&self, mature_threshold: i64) -> bool {
        self.interval >= mature_threshold
    }

    /// Due time as a timestamp. `None` while the card is new.
    pub fn due_at(&self) -> Option<DateTime<Utc>> {
        if self.is_new() {
            return None;
        }
        Utc.timestamp_opt(self.due, 0).single()
    }
}

/// One row of the append-only review log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewLogEntry {
    /// Millisecond timestamp of the review, strictly increasing.
    pub id: i64,
    pub card_id: i64,
    pub ease: Ease,
    /// Interval assigned by this review.
    pub interval: i64,
    /// Interval the card had before this review.
    pub last_interval: i64,
    pub factor: f64,
    /// Seconds the card was on screen.
    pub view_time: f64,
    /// Seconds attributed to studying the card.
    pub study_time: f64,
    /// Cumulative lapse count after this review.
    pub lapses: u32,
}

impl ReviewLogEntry {
    pub fn reviewed_at(&self) -> Option<DateTime<Utc>> {
        Utc.timestamp_millis_opt(self.id).single()
    }

    /// Review time in whole epoch seconds.
    pub fn reviewed_at_secs(&self) -> i64 {
        self.id.div_euclid(1000)
    }

    /// Whether this review introduced the card for the first time.
    pub fn is_first_view(&self) -> bool {
        self.last_interval == 0
    }
}

/// Intervals each ease would produce, without committing anything.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntervalPreview {
    pub again: i64,
    pub hard: i64,
    pub good: i64,
    pub easy: i64,
}

impl IntervalPreview {
    pub fn get(&self, ease: Ease) -> i64 {
        match ease {
            Ease::Again => self.again,
            Ease::Hard => self.hard,
            Ease::Good => self.good,
            Ease::Easy => self.easy,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ease_round_trips_through_value() {
        for ease in Ease::ALL {
            assert_eq!(Ease::from_value(ease.to_value()), Some(ease));
        }
    }

    #[test]
    fn unknown_ease_value_is_rejected() {
        assert_eq!(Ease::from_value(0), None);
        assert_eq!(
            Ease::try_from(7),
            Err(CoreError::InvalidEase("7".to_string()))
        );
        assert!("meh".parse::<Ease>().is_err());
    }

    #[test]
    fn ease_parses_names_case_insensitively() {
        assert_eq!("Good".parse::<Ease>(), Ok(Ease::Good));
        assert_eq!(" again ".parse::<Ease>(), Ok(Ease::Again));
    }

    #[test]
    fn ease_serializes_as_snake_case() {
        assert_eq!(serde_json::to_string(&Ease::Easy).unwrap(), "\"easy\"");
    }

    #[test]
    fn new_card_has_no_due_time() {
        let card = Card::new(1, 10, 100, 3);
        assert!(card.is_new());
        assert_eq!(card.due, 3);
        assert_eq!(card.due_at(), None);
    }

    #[test]
    fn review_entry_converts_millis() {
        let entry = ReviewLogEntry {
            id: 1_700_000_000_123,
            card_id: 1,
            ease: Ease::Good,
            interval: 60,
            last_interval: 0,
            factor: 0.1,
            view_time: 3.0,
            study_time: 5.0,
            lapses: 0,
        };
        assert_eq!(entry.reviewed_at_secs(), 1_700_000_000);
        assert!(entry.is_first_view());
    }
}
