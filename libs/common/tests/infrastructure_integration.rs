//! Integration tests for the infrastructure components
//!
//! These tests verify that PostgreSQL accepts the schema migrations and that
//! Redis is reachable. They need live services and are ignored by default:
//! `DATABASE_URL=... REDIS_URL=... cargo test -- --ignored`.

use common::{
    cache::{RedisConfig, RedisPool},
    database::{DatabaseConfig, health_check, init_pool, run_migrations},
};
use sqlx::Row;

#[tokio::test]
#[ignore = "requires PostgreSQL and Redis"]
async fn test_infrastructure_integration() -> Result<(), Box<dyn std::error::Error>> {
    let db_config = DatabaseConfig::from_env()?;
    let pool = init_pool(&db_config).await?;

    assert!(health_check(&pool).await?, "Database health check failed");

    run_migrations(&pool).await?;

    // Every table the services rely on must exist after migrating
    for table in [
        "users",
        "skills",
        "skill_categories",
        "match_requests",
        "notifications",
        "conversations",
        "messages",
    ] {
        let row = sqlx::query("SELECT to_regclass($1) IS NOT NULL AS present")
            .bind(table)
            .fetch_one(&pool)
            .await?;
        let present: bool = row.get("present");
        assert!(present, "table {} is missing", table);
    }

    let redis_pool = RedisPool::new(&RedisConfig::from_env())?;
    assert!(
        redis_pool.health_check().await?,
        "Redis health check failed"
    );

    let test_key = "integration_test_key";
    redis_pool.set(test_key, "value", Some(10)).await?;
    assert_eq!(redis_pool.get(test_key).await?, Some("value".to_string()));
    redis_pool.delete(test_key).await?;
    assert_eq!(redis_pool.get(test_key).await?, None);

    Ok(())
}
