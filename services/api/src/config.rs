//! Service configuration
//!
//! Read from environment variables layered over defaults:
//! - `BIND_ADDRESS` (default `0.0.0.0:3001`)
//! - `STORE_BACKEND`: `postgres` or `memory` (default `postgres`)
//! - `SCHEDULE_UTC_OFFSET_MINUTES`: calendar zone for same-date clash checks (default 0)
//! - `EVENT_BUS_CAPACITY` (default 256)

use chrono::FixedOffset;
use ::config::{Config, ConfigError, Environment};
use serde::Deserialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    Postgres,
    Memory,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    pub bind_address: String,
    pub store_backend: StoreBackend,
    pub schedule_utc_offset_minutes: i32,
    pub event_bus_capacity: usize,
}

impl ApiConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Config::builder()
            .set_default("bind_address", "0.0.0.0:3001")?
            .set_default("store_backend", "postgres")?
            .set_default("schedule_utc_offset_minutes", 0i64)?
            .set_default("event_bus_capacity", 256i64)?
            .add_source(Environment::default().try_parsing(true))
            .build()?
            .try_deserialize()
    }

    /// Fixed offset used as the calendar zone
    pub fn calendar_zone(&self) -> Result<FixedOffset, ConfigError> {
        FixedOffset::east_opt(self.schedule_utc_offset_minutes * 60).ok_or_else(|| {
            ConfigError::Message(format!(
                "SCHEDULE_UTC_OFFSET_MINUTES out of range: {}",
                self.schedule_utc_offset_minutes
            ))
        })
    }
}
