//! Scheduler configuration

use chrono::FixedOffset;
use std::env;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Scheduler configuration struct
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Cron expression (with seconds) for the roll-forward job
    pub schedule: String,
    /// Calendar zone offset in minutes east of UTC
    pub utc_offset_minutes: i32,
    /// Run one pass immediately at startup
    pub run_on_startup: bool,
    /// Attempts per scheduled run before giving up
    pub max_retries: u32,
}

impl SchedulerConfig {
    /// Create a new SchedulerConfig from environment variables
    ///
    /// # Environment Variables
    /// - `ROLL_FORWARD_SCHEDULE`: cron expression (default: every 12 hours)
    /// - `SCHEDULE_UTC_OFFSET_MINUTES`: calendar zone offset (default: 0)
    /// - `RUN_ON_STARTUP`: `true` to run once at startup (default: false)
    /// - `ROLL_FORWARD_MAX_RETRIES`: attempts per run (default: 3)
    pub fn from_env() -> Result<Self, ConfigError> {
        let schedule =
            env::var("ROLL_FORWARD_SCHEDULE").unwrap_or_else(|_| "0 0 */12 * * *".to_string());
        if schedule.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "ROLL_FORWARD_SCHEDULE must not be empty".to_string(),
            ));
        }

        let utc_offset_minutes = match env::var("SCHEDULE_UTC_OFFSET_MINUTES") {
            Ok(raw) => raw.trim().parse().map_err(|_| {
                ConfigError::Invalid(format!("SCHEDULE_UTC_OFFSET_MINUTES is not a number: {}", raw))
            })?,
            Err(_) => 0,
        };

        let run_on_startup = env::var("RUN_ON_STARTUP")
            .map(|v| matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
            .unwrap_or(false);

        let max_retries = env::var("ROLL_FORWARD_MAX_RETRIES")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(3);

        if max_retries == 0 {
            return Err(ConfigError::Invalid(
                "ROLL_FORWARD_MAX_RETRIES must be positive".to_string(),
            ));
        }

        let config = Self {
            schedule,
            utc_offset_minutes,
            run_on_startup,
            max_retries,
        };
        config.calendar_zone()?;
        Ok(config)
    }

    pub fn calendar_zone(&self) -> Result<FixedOffset, ConfigError> {
        FixedOffset::east_opt(self.utc_offset_minutes * 60).ok_or_else(|| {
            ConfigError::Invalid(format!(
                "SCHEDULE_UTC_OFFSET_MINUTES out of range: {}",
                self.utc_offset_minutes
            ))
        })
    }
}
