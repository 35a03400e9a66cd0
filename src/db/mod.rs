pub mod outcome_repo;

use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

/// Connect, verify connectivity and apply pending migrations.
pub async fn init_pool(database_url: &str) -> anyhow::Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(database_url)
        .await?;

    sqlx::query("SELECT 1").execute(&pool).await?;
    sqlx::migrate!("./migrations").run(&pool).await?;

    Ok(pool)
}
