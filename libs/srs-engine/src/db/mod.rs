//! SQLite card store.

pub mod date_utils;
pub mod error;
pub mod repository;
pub mod schema;
pub mod stats;

pub use error::StoreError;
pub use repository::{
    default_db_path, CardRepository, ConfigRepository, ReviewLogRepository, SqliteStore,
};
pub use stats::{HistogramBucket, MaturityBucket, StatsRepository, StudySummary};
