//! Scheduled maintenance jobs for the tutoring marketplace

pub mod config;
pub mod job;

pub use config::SchedulerConfig;
pub use job::RollForwardJob;
