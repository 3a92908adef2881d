//! Common test utilities for engine integration tests.
//!
//! Every context runs against an in-memory store with a seeded scheduler and
//! a fixed clock, so due times and log ids are reproducible.

#![allow(dead_code)]

pub mod fixtures;

use chrono::{DateTime, TimeZone, Utc};
use srs_engine::{AdaptiveScheduler, ConfigRepository, Engine, SqliteStore};

/// Mid-morning UTC, clear of any local midnight.
pub const T0: i64 = 1_700_050_050;

pub const SEED: u64 = 11;

pub struct TestContext {
    pub engine: Engine,
}

impl TestContext {
    /// Engine over a fresh store with default config.
    pub fn new() -> Self {
        Self::with_config(&[])
    }

    /// Engine over a fresh store with `overrides` written to the config
    /// table first.
    pub fn with_config(overrides: &[(&str, &str)]) -> Self {
        let store = SqliteStore::open_in_memory().expect("open in-memory store");
        for (name, value) in overrides {
            store
                .set_config_value(name, value)
                .expect("write config override");
        }
        Self::from_store(store)
    }

    pub fn from_store(store: SqliteStore) -> Self {
        let config = store.load_scheduler_config().expect("resolve config");
        let scheduler = AdaptiveScheduler::with_seed(config, SEED);
        let engine = Engine::with_scheduler(store, Box::new(scheduler)).expect("open engine");
        Self { engine }
    }

    pub fn store(&self) -> &SqliteStore {
        self.engine.store()
    }
}

/// `T0 + offset` seconds as a timestamp.
pub fn at(offset: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(T0 + offset, 0)
        .single()
        .expect("valid timestamp")
}
