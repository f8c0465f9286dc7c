use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use classroom::{Classroom, EventBus, PgStore, events::spawn_event_logger};
use common::database::{DatabaseConfig, init_pool};
use scheduler::{RollForwardJob, SchedulerConfig};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("Starting roll-forward scheduler");

    let config = SchedulerConfig::from_env()?;

    let db_config = DatabaseConfig::from_env()?;
    let pool = init_pool(&db_config).await?;
    let store = PgStore::new(pool);
    store.run_migrations().await?;

    let events = EventBus::default();
    let _event_logger = spawn_event_logger(&events);

    let classroom = Classroom::new(Arc::new(store), events).with_zone(config.calendar_zone()?);
    let job = RollForwardJob::new(classroom).with_retry(config.max_retries, Duration::from_secs(1));

    if config.run_on_startup {
        match job.run_with_retry().await {
            Ok(report) => info!(created = report.created, "Startup roll-forward finished"),
            Err(e) => error!("Startup roll-forward failed: {}", e),
        }
    }

    let mut scheduler = job.start(&config.schedule).await?;

    info!("Roll-forward scheduler started successfully");

    // Keep the service running
    tokio::signal::ctrl_c().await?;
    info!("Shutting down roll-forward scheduler");
    scheduler.shutdown().await?;

    Ok(())
}
