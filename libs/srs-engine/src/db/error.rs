//! Store error types.

use srs_core::CoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("sqlite error: {0}")]
    Sqlite(rusqlite::Error),

    #[error("duplicate key in {table}: {id}")]
    DuplicateKey { table: &'static str, id: i64 },

    #[error("card not found: {0}")]
    CardNotFound(i64),

    #[error("consistency violation: {operation} affected {rows} rows, expected 1")]
    Consistency {
        operation: &'static str,
        rows: usize,
    },

    #[error("config error: {0}")]
    Config(#[from] CoreError),

    #[error("unknown scheduler: {0}")]
    UnknownScheduler(String),

    #[error("invalid data: {0}")]
    InvalidData(String),
}

impl StoreError {
    /// Errors after which the store must not be used for further reviews.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Consistency { .. })
    }

    /// Map a uniqueness violation to `DuplicateKey`, leaving other errors as-is.
    pub(crate) fn from_insert(err: rusqlite::Error, table: &'static str, id: i64) -> Self {
        match err.sqlite_error_code() {
            Some(rusqlite::ErrorCode::ConstraintViolation) => Self::DuplicateKey { table, id },
            _ => Self::Sqlite(err),
        }
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        Self::Sqlite(err)
    }
}
