//! Repository pattern for database access.

use crate::db::error::StoreError;
use crate::db::schema::{INIT_CONFIG_VALUE, SCHEMA, SCHEMA_VERSION};
use rusqlite::{params, Connection, OptionalExtension, Transaction};
use srs_core::config::SCHEMA_VERSION_KEY;
use srs_core::repair::renumber_ids;
use srs_core::{Card, Ease, ReviewLogEntry, SchedulerConfig};
use std::path::{Path, PathBuf};

pub(crate) type Result<T> = std::result::Result<T, StoreError>;

const CARD_COLUMNS: &str = "id, fieldset_id, template_id, interval, due, factor, views, lapses, ord";
const REVLOG_COLUMNS: &str =
    "id, card_id, ease, interval, last_interval, factor, view_time, study_time, lapses";

/// Repository for card operations.
pub trait CardRepository {
    fn get_card(&self, id: i64) -> Result<Option<Card>>;
    fn insert_card(&self, card: &Card) -> Result<()>;
    fn insert_cards(&self, cards: &[Card]) -> Result<usize>;
    fn cards_for_fieldset(&self, fieldset_id: i64) -> Result<Vec<Card>>;
    /// Shortest-interval card due at or before `now`.
    fn next_due_card(&self, now: i64) -> Result<Option<Card>>;
    /// Shortest-interval scheduled card due before `horizon`.
    fn next_preview_card(&self, horizon: i64) -> Result<Option<Card>>;
    /// Lowest-ord new card whose fieldset has not been reviewed since `related_since`.
    fn next_new_card(&self, related_since: i64) -> Result<Option<Card>>;
}

/// Repository for the append-only review log.
pub trait ReviewLogRepository {
    fn log_entries_for_card(&self, card_id: i64) -> Result<Vec<ReviewLogEntry>>;
    fn all_log_entries(&self) -> Result<Vec<ReviewLogEntry>>;
    /// Epoch seconds of the card's newest log entry.
    fn last_seen(&self, card_id: i64) -> Result<Option<i64>>;
    fn max_log_id(&self) -> Result<Option<i64>>;
    /// Insert externally produced entries, renumbering collisions in the batch.
    fn import_log_entries(&self, entries: &[ReviewLogEntry]) -> Result<usize>;
}

/// Repository for config rows.
pub trait ConfigRepository {
    fn get_config_value(&self, name: &str) -> Result<Option<String>>;
    fn set_config_value(&self, name: &str, value: &str) -> Result<()>;
    fn config_pairs(&self) -> Result<Vec<(String, String)>>;
    /// Resolve all rows into a typed config.
    fn load_scheduler_config(&self) -> Result<SchedulerConfig>;
}

/// SQLite implementation of the card store.
pub struct SqliteStore {
    conn: Connection,
}

/// Default database location under the platform data directory.
pub fn default_db_path() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("srs")
        .join("cards.db")
}

impl SqliteStore {
    /// Open database at path, creating if necessary.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let conn = Connection::open(path.as_ref())?;
        let store = Self { conn };
        store.initialize()?;
        tracing::info!("opened card store at {}", path.as_ref().display());
        Ok(store)
    }

    /// Open in-memory database (for testing).
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let store = Self { conn };
        store.initialize()?;
        Ok(store)
    }

    fn initialize(&self) -> Result<()> {
        self.conn.execute_batch(SCHEMA)?;
        let version = SCHEMA_VERSION.to_string();
        self.conn
            .execute(INIT_CONFIG_VALUE, params![SCHEMA_VERSION_KEY, version])?;
        for (name, value) in SchedulerConfig::default_pairs() {
            self.conn.execute(INIT_CONFIG_VALUE, params![name, value])?;
        }
        Ok(())
    }

    /// Begin a transaction on the shared connection.
    ///
    /// Store methods called while it is open run inside it; dropping it
    /// without `commit` rolls everything back.
    pub(crate) fn begin(&self) -> Result<Transaction<'_>> {
        self.conn.unchecked_transaction().map_err(Into::into)
    }

    pub(crate) fn conn(&self) -> &Connection {
        &self.conn
    }

    pub(crate) fn row_to_card(row: &rusqlite::Row) -> rusqlite::Result<Card> {
        Ok(Card {
            id: row.get(0)?,
            fieldset_id: row.get(1)?,
            template_id: row.get(2)?,
            interval: row.get(3)?,
            due: row.get(4)?,
            factor: row.get(5)?,
            views: row.get(6)?,
            lapses: row.get(7)?,
            ord: row.get(8)?,
        })
    }

    pub(crate) fn row_to_entry(row: &rusqlite::Row) -> rusqlite::Result<ReviewLogEntry> {
        let ease_value: i64 = row.get(2)?;
        let ease = Ease::from_value(ease_value).ok_or_else(|| {
            rusqlite::Error::FromSqlConversionFailure(
                2,
                rusqlite::types::Type::Integer,
                format!("invalid ease {ease_value}").into(),
            )
        })?;
        Ok(ReviewLogEntry {
            id: row.get(0)?,
            card_id: row.get(1)?,
            ease,
            interval: row.get(3)?,
            last_interval: row.get(4)?,
            factor: row.get(5)?,
            view_time: row.get(6)?,
            study_time: row.get(7)?,
            lapses: row.get(8)?,
        })
    }

    fn query_card(&self, sql: &str, param: i64) -> Result<Option<Card>> {
        self.conn
            .query_row(sql, params![param], Self::row_to_card)
            .optional()
            .map_err(Into::into)
    }

    /// Write the scheduling fields of a reviewed card. Returns rows affected.
    pub(crate) fn update_card_schedule(&self, card: &Card) -> Result<usize> {
        let rows = self.conn.execute(
            "UPDATE cards SET interval = ?1, due = ?2, factor = ?3, views = ?4, lapses = ?5 WHERE id = ?6",
            params![card.interval, card.due, card.factor, card.views, card.lapses, card.id],
        )?;
        Ok(rows)
    }

    /// Append one log row. Returns rows affected.
    pub(crate) fn insert_log_entry(&self, entry: &ReviewLogEntry) -> Result<usize> {
        self.conn
            .execute(
                &format!("INSERT INTO revlog ({REVLOG_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)"),
                params![
                    entry.id,
                    entry.card_id,
                    entry.ease.to_value(),
                    entry.interval,
                    entry.last_interval,
                    entry.factor,
                    entry.view_time,
                    entry.study_time,
                    entry.lapses,
                ],
            )
            .map_err(|err| StoreError::from_insert(err, "revlog", entry.id))
    }

    /// Next log id: the review time in milliseconds, bumped past the newest
    /// existing id so ids stay strictly increasing even within one millisecond.
    pub(crate) fn allocate_log_id(&self, now_ms: i64) -> Result<i64> {
        Ok(match self.max_log_id()? {
            Some(max) => now_ms.max(max + 1),
            None => now_ms,
        })
    }

    /// Push siblings in `fieldset_id` that come due before `until` out to `until`.
    pub(crate) fn defer_related(
        &self,
        fieldset_id: i64,
        except_card: i64,
        until: i64,
    ) -> Result<usize> {
        let rows = self.conn.execute(
            "UPDATE cards SET due = ?1
             WHERE fieldset_id = ?2 AND id != ?3 AND interval != 0 AND due < ?1",
            params![until, fieldset_id, except_card],
        )?;
        Ok(rows)
    }
}

impl CardRepository for SqliteStore {
    fn get_card(&self, id: i64) -> Result<Option<Card>> {
        self.query_card(&format!("SELECT {CARD_COLUMNS} FROM cards WHERE id = ?1"), id)
    }

    fn insert_card(&self, card: &Card) -> Result<()> {
        self.conn
            .execute(
                &format!("INSERT INTO cards ({CARD_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)"),
                params![
                    card.id,
                    card.fieldset_id,
                    card.template_id,
                    card.interval,
                    card.due,
                    card.factor,
                    card.views,
                    card.lapses,
                    card.ord,
                ],
            )
            .map_err(|err| StoreError::from_insert(err, "cards", card.id))?;
        Ok(())
    }

    fn insert_cards(&self, cards: &[Card]) -> Result<usize> {
        let tx = self.begin()?;
        for card in cards {
            self.insert_card(card)?;
        }
        tx.commit()?;
        Ok(cards.len())
    }

    fn cards_for_fieldset(&self, fieldset_id: i64) -> Result<Vec<Card>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {CARD_COLUMNS} FROM cards WHERE fieldset_id = ?1 ORDER BY ord, id"
        ))?;
        let cards = stmt
            .query_map(params![fieldset_id], Self::row_to_card)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(cards)
    }

    fn next_due_card(&self, now: i64) -> Result<Option<Card>> {
        self.query_card(
            &format!(
                "SELECT {CARD_COLUMNS} FROM cards
                 WHERE interval != 0 AND due <= ?1
                 ORDER BY interval, due, id
                 LIMIT 1"
            ),
            now,
        )
    }

    fn next_preview_card(&self, horizon: i64) -> Result<Option<Card>> {
        self.query_card(
            &format!(
                "SELECT {CARD_COLUMNS} FROM cards
                 WHERE interval != 0 AND due < ?1
                 ORDER BY interval, due, id
                 LIMIT 1"
            ),
            horizon,
        )
    }

    fn next_new_card(&self, related_since: i64) -> Result<Option<Card>> {
        self.query_card(
            &format!(
                "SELECT {CARD_COLUMNS} FROM cards c
                 WHERE c.interval = 0
                   AND NOT EXISTS (
                       SELECT 1 FROM revlog r
                       JOIN cards s ON s.id = r.card_id
                       WHERE s.fieldset_id = c.fieldset_id AND r.id >= ?1 * 1000
                   )
                 ORDER BY c.ord, c.id
                 LIMIT 1"
            ),
            related_since,
        )
    }
}

impl ReviewLogRepository for SqliteStore {
    fn log_entries_for_card(&self, card_id: i64) -> Result<Vec<ReviewLogEntry>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {REVLOG_COLUMNS} FROM revlog WHERE card_id = ?1 ORDER BY id"
        ))?;
        let entries = stmt
            .query_map(params![card_id], Self::row_to_entry)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(entries)
    }

    fn all_log_entries(&self) -> Result<Vec<ReviewLogEntry>> {
        let mut stmt = self
            .conn
            .prepare(&format!("SELECT {REVLOG_COLUMNS} FROM revlog ORDER BY id"))?;
        let entries = stmt
            .query_map([], Self::row_to_entry)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(entries)
    }

    fn last_seen(&self, card_id: i64) -> Result<Option<i64>> {
        let max_id: Option<i64> = self.conn.query_row(
            "SELECT MAX(id) FROM revlog WHERE card_id = ?1",
            params![card_id],
            |row| row.get(0),
        )?;
        Ok(max_id.map(|id| id.div_euclid(1000)))
    }

    fn max_log_id(&self) -> Result<Option<i64>> {
        self.conn
            .query_row("SELECT MAX(id) FROM revlog", [], |row| row.get(0))
            .map_err(Into::into)
    }

    fn import_log_entries(&self, entries: &[ReviewLogEntry]) -> Result<usize> {
        let mut batch = entries.to_vec();
        let renumbered = renumber_ids(&mut batch);
        if renumbered > 0 {
            tracing::warn!(renumbered, "renumbered colliding review log ids in import batch");
        }

        let tx = self.begin()?;
        for entry in &batch {
            self.insert_log_entry(entry)?;
        }
        tx.commit()?;
        Ok(batch.len())
    }
}

impl ConfigRepository for SqliteStore {
    fn get_config_value(&self, name: &str) -> Result<Option<String>> {
        self.conn
            .query_row(
                "SELECT value FROM config WHERE name = ?1",
                params![name],
                |row| row.get(0),
            )
            .optional()
            .map_err(Into::into)
    }

    fn set_config_value(&self, name: &str, value: &str) -> Result<()> {
        self.conn.execute(
            "INSERT INTO config (name, value) VALUES (?1, ?2)
             ON CONFLICT(name) DO UPDATE SET value = excluded.value",
            params![name, value],
        )?;
        Ok(())
    }

    fn config_pairs(&self) -> Result<Vec<(String, String)>> {
        let mut stmt = self.conn.prepare("SELECT name, value FROM config ORDER BY name")?;
        let pairs = stmt
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(pairs)
    }

    fn load_scheduler_config(&self) -> Result<SchedulerConfig> {
        let pairs = self.config_pairs()?;
        SchedulerConfig::from_pairs(pairs).map_err(Into::into)
    }
}
