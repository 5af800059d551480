use sqlx::migrate::Migrator;
use sqlx::postgres::{PgPool, PgPoolOptions};
use std::path::Path;

pub async fn create_pool(database_url: &str) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(5)
        .connect(database_url)
        .await
}

/// Applies the SQL files under `migrations_dir` that have not run yet.
pub async fn run_migrations(pool: &PgPool, migrations_dir: &Path) -> anyhow::Result<()> {
    let migrator = Migrator::new(migrations_dir).await?;
    migrator.run(pool).await?;
    Ok(())
}
