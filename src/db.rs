use anyhow::Context;
use sqlx::{postgres::PgPoolOptions, PgPool};
use tracing::{info, warn};

/// Postgres-backed store; implements both `AuthRepo` and `HuntRepo`.
#[derive(Clone)]
pub struct PgStore {
    pub db: PgPool,
}

impl PgStore {
    pub async fn connect(database_url: &str) -> anyhow::Result<Self> {
        let db = PgPoolOptions::new()
            .max_connections(10)
            .connect(database_url)
            .await
            .context("connect to database")?;
        Ok(Self { db })
    }

    /// Apply pending migrations; a failure is logged and startup continues.
    pub async fn migrate(&self) {
        match sqlx::migrate!("./migrations").run(&self.db).await {
            Ok(()) => info!("database migrations applied"),
            Err(e) => warn!(error = %e, "migration failed; continuing"),
        }
    }
}
