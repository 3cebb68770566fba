//! Database helper for Postgres-backed tests

use qrmark::database::{create_pool, run_migrations, DatabasePool, PoolConfig};

/// Test database wrapper. Only available when `TEST_DATABASE_URL` is set.
pub struct TestDatabase {
    pub pool: DatabasePool,
}

impl TestDatabase {
    /// Connect and migrate, or `None` when no test database is configured
    pub async fn from_env() -> Option<Self> {
        let url = std::env::var("TEST_DATABASE_URL").ok()?;
        let config = PoolConfig {
            url,
            max_connections: 5,
            ..PoolConfig::default()
        };
        let pool = create_pool(&config).await.expect("Failed to connect to test database");
        run_migrations(&pool).await.expect("Failed to run migrations");

        let db = Self { pool };
        db.cleanup().await;
        Some(db)
    }

    /// Clean up all test data
    pub async fn cleanup(&self) {
        sqlx::query("TRUNCATE attendances, invitations, distribution_list_members, distribution_lists, events, locations, users RESTART IDENTITY CASCADE")
            .execute(&self.pool)
            .await
            .expect("Failed to truncate tables");
    }
}
