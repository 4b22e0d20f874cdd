use sqlx::{postgres::PgPoolOptions, PgPool};
use std::time::Duration;

pub struct Database {
    pub pool: PgPool,
}

impl Database {
    /// Connects to the monitoring database.
    ///
    /// Queries are issued one at a time, so the pool stays small. A failed
    /// connection here is fatal to the run.
    pub async fn new(database_url: &str) -> anyhow::Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(2)
            .acquire_timeout(Duration::from_secs(15))
            .connect(database_url)
            .await?;

        // Fail fast if the server accepts the connection but cannot answer
        sqlx::query("SELECT 1").execute(&pool).await?;

        tracing::info!("✓ Connected to database");
        Ok(Self { pool })
    }

    pub async fn close(self) {
        self.pool.close().await;
        tracing::info!("✓ Database connection closed");
    }
}
