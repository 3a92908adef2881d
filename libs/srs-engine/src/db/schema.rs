//! SQLite schema definitions.

/// Current schema version, recorded under the `schemaVersion` config key.
pub const SCHEMA_VERSION: i32 = 1;

/// Complete schema for the card store.
pub const SCHEMA: &str = r#"
-- Cards (created by fieldset/template management, scheduled here)
CREATE TABLE IF NOT EXISTS cards (
    id INTEGER PRIMARY KEY,
    fieldset_id INTEGER NOT NULL,
    template_id INTEGER NOT NULL,
    interval INTEGER NOT NULL DEFAULT 0,
    due INTEGER NOT NULL DEFAULT 0,
    factor REAL NOT NULL DEFAULT 0,
    views INTEGER NOT NULL DEFAULT 0,
    lapses INTEGER NOT NULL DEFAULT 0,
    ord INTEGER NOT NULL DEFAULT 0
);

-- Append-only review log, keyed by millisecond timestamp
CREATE TABLE IF NOT EXISTS revlog (
    id INTEGER PRIMARY KEY,
    card_id INTEGER NOT NULL REFERENCES cards(id),
    ease INTEGER NOT NULL,
    interval INTEGER NOT NULL,
    last_interval INTEGER NOT NULL,
    factor REAL NOT NULL,
    view_time REAL NOT NULL,
    study_time REAL NOT NULL,
    lapses INTEGER NOT NULL
);

-- Tunables and scheduler-owned values
CREATE TABLE IF NOT EXISTS config (
    name TEXT PRIMARY KEY,
    value TEXT NOT NULL
);

-- Indexes
CREATE INDEX IF NOT EXISTS idx_cards_interval_due ON cards(interval, due);
CREATE INDEX IF NOT EXISTS idx_cards_fieldset ON cards(fieldset_id);
CREATE INDEX IF NOT EXISTS idx_cards_ord ON cards(ord);
CREATE INDEX IF NOT EXISTS idx_revlog_card ON revlog(card_id);
"#;

/// Insert a config row only if it does not exist yet.
pub const INIT_CONFIG_VALUE: &str = "INSERT OR IGNORE INTO config (name, value) VALUES (?1, ?2)";
