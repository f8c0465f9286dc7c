use anyhow::Result;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use api::{
    AppState,
    config::{ApiConfig, StoreBackend},
    create_router,
    middleware::JwtConfig,
};
use classroom::{Classroom, EventBus, MemoryStore, PgStore, Store, events::spawn_event_logger};
use common::database::{DatabaseConfig, init_pool};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    info!("Starting API service");

    let config = ApiConfig::from_env()?;
    let jwt = JwtConfig::from_env()?;

    let store: Arc<dyn Store> = match config.store_backend {
        StoreBackend::Postgres => {
            // Initialize database connection pool
            let db_config = DatabaseConfig::from_env()?;
            let pool = init_pool(&db_config).await?;

            // Check database connectivity
            if common::database::health_check(&pool).await? {
                info!("Database connection successful");
            } else {
                anyhow::bail!("Failed to connect to database");
            }

            let store = PgStore::new(pool);
            store.run_migrations().await?;
            Arc::new(store)
        }
        StoreBackend::Memory => {
            warn!("Using in-memory store; state is lost on restart");
            Arc::new(MemoryStore::new())
        }
    };

    let events = EventBus::new(config.event_bus_capacity);
    let _event_logger = spawn_event_logger(&events);

    let classroom = Classroom::new(store, events).with_zone(config.calendar_zone()?);

    info!("API service initialized successfully");

    // Start the web server
    let app = create_router(AppState::new(classroom, jwt));

    let listener = TcpListener::bind(&config.bind_address).await?;
    info!("API service listening on {}", config.bind_address);

    axum::serve(listener, app).await?;

    Ok(())
}
