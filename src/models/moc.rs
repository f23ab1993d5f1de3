use chrono::{DateTime, Utc};
use serde::Deserialize;
use sqlx::PgPool;

use crate::astro::Moc;
use crate::errors::AppError;

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct MocInfo {
    pub id: i64,
    pub name: String,
    pub description: String,
    pub public: bool,
    pub num_cells: i64,
    pub uploaded_at: DateTime<Utc>,
}

impl MocInfo {
    pub fn uploaded_display(&self) -> String {
        self.uploaded_at.format("%Y-%m-%d").to_string()
    }
}

#[derive(Debug, Deserialize)]
pub struct MocSearchForm {
    #[serde(default)]
    pub system: String,
    #[serde(default)]
    pub x: String,
    #[serde(default)]
    pub y: String,
}

/// Store a MOC, replacing the cells of an existing MOC with the same name.
pub async fn save(
    pool: &PgPool,
    name: &str,
    description: &str,
    public: bool,
    moc: &Moc,
) -> Result<i64, AppError> {
    let (starts, ends): (Vec<i64>, Vec<i64>) = moc.ranges().iter().map(|&(s, e)| (s as i64, e as i64)).unzip();

    let mut tx = pool.begin().await?;
    let id: i64 = sqlx::query_scalar(
        "INSERT INTO moc (name, description, public, num_cells) VALUES ($1, $2, $3, $4) \
         ON CONFLICT (name) DO UPDATE \
         SET description = EXCLUDED.description, public = EXCLUDED.public, \
             num_cells = EXCLUDED.num_cells, uploaded_at = now() \
         RETURNING id",
    )
    .bind(name.trim())
    .bind(description.trim())
    .bind(public)
    .bind(moc.num_cells() as i64)
    .fetch_one(&mut *tx)
    .await?;

    sqlx::query("DELETE FROM moc_range WHERE moc_id = $1")
        .bind(id)
        .execute(&mut *tx)
        .await?;
    sqlx::query(
        "INSERT INTO moc_range (moc_id, range_start, range_end) \
         SELECT $1, s, e FROM UNNEST($2::BIGINT[], $3::BIGINT[]) AS t(s, e)",
    )
    .bind(id)
    .bind(&starts)
    .bind(&ends)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(id)
}

pub async fn find_all(pool: &PgPool, include_private: bool) -> Result<Vec<MocInfo>, AppError> {
    let rows = sqlx::query_as::<_, MocInfo>(
        "SELECT id, name, description, public, num_cells, uploaded_at FROM moc \
         WHERE $1 OR public ORDER BY name",
    )
    .bind(include_private)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

pub async fn load(pool: &PgPool, id: i64) -> Result<Moc, AppError> {
    let rows: Vec<(i64, i64)> =
        sqlx::query_as("SELECT range_start, range_end FROM moc_range WHERE moc_id = $1 ORDER BY range_start")
            .bind(id)
            .fetch_all(pool)
            .await?;
    Ok(Moc::from_ranges(rows.into_iter().map(|(s, e)| (s as u64, e as u64)).collect()))
}

pub async fn delete(pool: &PgPool, id: i64) -> Result<(), AppError> {
    let result = sqlx::query("DELETE FROM moc WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;
    if result.rows_affected() == 0 {
        return Err(AppError::NotFound);
    }
    Ok(())
}
