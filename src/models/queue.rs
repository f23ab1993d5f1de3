use serde::Deserialize;
use sqlx::PgPool;

use crate::errors::AppError;

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Queue {
    pub id: i64,
    pub code: String,
    pub name: String,
    pub description: String,
}

#[derive(Debug, Deserialize)]
pub struct QueueForm {
    pub code: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub csrf_token: String,
}

pub async fn create(pool: &PgPool, code: &str, name: &str, description: &str) -> Result<i64, AppError> {
    let id: i64 = sqlx::query_scalar(
        "INSERT INTO queue (code, name, description) VALUES ($1, $2, $3) RETURNING id",
    )
    .bind(code.trim())
    .bind(name.trim())
    .bind(description.trim())
    .fetch_one(pool)
    .await?;
    Ok(id)
}

pub async fn find_all(pool: &PgPool) -> Result<Vec<Queue>, AppError> {
    let queues = sqlx::query_as::<_, Queue>("SELECT id, code, name, description FROM queue ORDER BY name")
        .fetch_all(pool)
        .await?;
    Ok(queues)
}

pub async fn find_by_id(pool: &PgPool, id: i64) -> Result<Option<Queue>, AppError> {
    let queue = sqlx::query_as::<_, Queue>("SELECT id, code, name, description FROM queue WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await?;
    Ok(queue)
}

pub async fn code_exists(pool: &PgPool, code: &str) -> Result<bool, AppError> {
    let exists: bool = sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM queue WHERE code = $1)")
        .bind(code.trim())
        .fetch_one(pool)
        .await?;
    Ok(exists)
}
