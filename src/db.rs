use sqlx::PgPool;
use sqlx::migrate::Migrator;
use sqlx::postgres::PgPoolOptions;

use crate::errors::AppError;

pub static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

pub async fn init_pool(database_url: &str) -> Result<PgPool, AppError> {
    let pool = PgPoolOptions::new()
        .max_connections(8)
        .connect(database_url)
        .await?;
    Ok(pool)
}

pub async fn run_migrations(pool: &PgPool) -> Result<(), AppError> {
    MIGRATOR.run(pool).await?;
    log::info!("Database migrations complete");
    Ok(())
}

/// Create the initial administrator account if nobody is registered yet.
/// Returns true when the account was created.
pub async fn seed_admin(pool: &PgPool, password_hash: &str) -> Result<bool, AppError> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM person")
        .fetch_one(pool)
        .await?;
    if count > 0 {
        return Ok(false);
    }

    sqlx::query(
        "INSERT INTO person (username, password, name, email, admin) \
         VALUES ('admin', $1, 'Administrator', 'admin@localhost', TRUE)",
    )
    .bind(password_hash)
    .execute(pool)
    .await?;

    log::info!("Seeded administrator account 'admin'");
    Ok(true)
}
