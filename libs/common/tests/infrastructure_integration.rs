//! Integration tests for the infrastructure components
//!
//! These tests verify that the PostgreSQL database is properly configured
//! and accessible from the application.

use common::database::{DatabaseConfig, health_check, init_pool};
use sqlx::Row;

/// Test that verifies PostgreSQL is accessible and can perform basic operations
#[tokio::test]
#[ignore = "requires a running PostgreSQL instance (DATABASE_URL)"]
async fn test_infrastructure_integration() -> Result<(), Box<dyn std::error::Error>> {
    let db_config = DatabaseConfig::from_env()?;
    let pool = init_pool(&db_config).await?;

    assert!(health_check(&pool).await?, "Database health check failed");

    let row = sqlx::query("SELECT 1 as result").fetch_one(&pool).await?;

    let result: i32 = row.get("result");
    assert_eq!(result, 1, "PostgreSQL simple query test failed");

    let row = sqlx::query("SELECT NOW() + INTERVAL '7 days' > NOW() as ahead")
        .fetch_one(&pool)
        .await?;
    let ahead: bool = row.get("ahead");
    assert!(ahead, "PostgreSQL interval arithmetic test failed");

    Ok(())
}
