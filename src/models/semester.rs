use chrono::{DateTime, Utc};
use serde::Deserialize;
use sqlx::PgPool;

use crate::errors::AppError;

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Semester {
    pub id: i64,
    pub code: String,
    pub name: String,
    pub date_start: DateTime<Utc>,
    pub date_end: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct SemesterForm {
    pub code: String,
    pub name: String,
    pub date_start: String,
    pub date_end: String,
    pub csrf_token: String,
}

pub async fn create(
    pool: &PgPool,
    code: &str,
    name: &str,
    date_start: DateTime<Utc>,
    date_end: DateTime<Utc>,
) -> Result<i64, AppError> {
    let id: i64 = sqlx::query_scalar(
        "INSERT INTO semester (code, name, date_start, date_end) VALUES ($1, $2, $3, $4) RETURNING id",
    )
    .bind(code.trim())
    .bind(name.trim())
    .bind(date_start)
    .bind(date_end)
    .fetch_one(pool)
    .await?;
    Ok(id)
}

pub async fn find_all(pool: &PgPool) -> Result<Vec<Semester>, AppError> {
    let semesters = sqlx::query_as::<_, Semester>(
        "SELECT id, code, name, date_start, date_end FROM semester ORDER BY date_start DESC",
    )
    .fetch_all(pool)
    .await?;
    Ok(semesters)
}

pub async fn find_by_id(pool: &PgPool, id: i64) -> Result<Option<Semester>, AppError> {
    let semester = sqlx::query_as::<_, Semester>(
        "SELECT id, code, name, date_start, date_end FROM semester WHERE id = $1",
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;
    Ok(semester)
}
