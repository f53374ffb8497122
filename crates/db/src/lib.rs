pub mod entity;
pub mod sync;

use pickmirror_common::error::{MirrorError, MirrorResult};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

/// Create a Postgres connection pool from a database URL.
pub async fn create_pool(database_url: &str) -> MirrorResult<PgPool> {
    tracing::info!("connecting to database");
    PgPoolOptions::new()
        .max_connections(10)
        .connect(database_url)
        .await
        .map_err(|e| MirrorError::Database(e.to_string()))
}

/// Apply the bundled migrations for the run/watermark progress tables.
///
/// Entity tables are not migrated here; they are reconciled at sync time.
pub async fn run_migrations(pool: &PgPool) -> MirrorResult<()> {
    sqlx::migrate!("../../migrations")
        .run(pool)
        .await
        .map_err(|e| MirrorError::Database(format!("migration failed: {e}")))?;
    tracing::info!("progress tables migrated");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn create_pool_fails_with_invalid_url() {
        let result = create_pool("postgres://invalid:5432/nonexistent").await;
        assert!(result.is_err());
    }
}
