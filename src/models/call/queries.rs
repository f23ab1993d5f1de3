use chrono::{DateTime, Utc};
use sqlx::PgPool;

use super::types::*;
use crate::errors::AppError;

const CALL_SELECT: &str = "SELECT c.id, c.semester_id, s.code AS semester_code, s.name AS semester_name, \
            c.queue_id, q.code AS queue_code, q.name AS queue_name, c.call_type, \
            c.date_open, c.date_close, c.abst_word_lim, c.sci_word_lim, c.sci_fig_lim, \
            c.sci_page_lim, c.tech_word_lim, c.tech_fig_lim, c.tech_page_lim, \
            c.capt_word_lim, c.hidden \
     FROM call c \
     JOIN semester s ON s.id = c.semester_id \
     JOIN queue q ON q.id = c.queue_id";

pub async fn create(pool: &PgPool, new: &NewCall) -> Result<i64, AppError> {
    let l = &new.limits;
    let id: i64 = sqlx::query_scalar(
        "INSERT INTO call (semester_id, queue_id, call_type, date_open, date_close, \
                           abst_word_lim, sci_word_lim, sci_fig_lim, sci_page_lim, \
                           tech_word_lim, tech_fig_lim, tech_page_lim, capt_word_lim, hidden) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14) RETURNING id",
    )
    .bind(new.semester_id)
    .bind(new.queue_id)
    .bind(new.call_type.code())
    .bind(new.date_open)
    .bind(new.date_close)
    .bind(l.abst_word_lim)
    .bind(l.sci_word_lim)
    .bind(l.sci_fig_lim)
    .bind(l.sci_page_lim)
    .bind(l.tech_word_lim)
    .bind(l.tech_fig_lim)
    .bind(l.tech_page_lim)
    .bind(l.capt_word_lim)
    .bind(new.hidden)
    .fetch_one(pool)
    .await?;
    Ok(id)
}

/// Semester, queue, and type are fixed once created; dates, limits, and visibility can change.
pub async fn update(pool: &PgPool, id: i64, new: &NewCall) -> Result<(), AppError> {
    let l = &new.limits;
    let result = sqlx::query(
        "UPDATE call SET date_open = $2, date_close = $3, abst_word_lim = $4, sci_word_lim = $5, \
                sci_fig_lim = $6, sci_page_lim = $7, tech_word_lim = $8, tech_fig_lim = $9, \
                tech_page_lim = $10, capt_word_lim = $11, hidden = $12 \
         WHERE id = $1",
    )
    .bind(id)
    .bind(new.date_open)
    .bind(new.date_close)
    .bind(l.abst_word_lim)
    .bind(l.sci_word_lim)
    .bind(l.sci_fig_lim)
    .bind(l.sci_page_lim)
    .bind(l.tech_word_lim)
    .bind(l.tech_fig_lim)
    .bind(l.tech_page_lim)
    .bind(l.capt_word_lim)
    .bind(new.hidden)
    .execute(pool)
    .await?;
    if result.rows_affected() == 0 {
        return Err(AppError::NotFound);
    }
    Ok(())
}

pub async fn find_by_id(pool: &PgPool, id: i64) -> Result<Option<Call>, AppError> {
    let call = sqlx::query_as::<_, Call>(&format!("{CALL_SELECT} WHERE c.id = $1"))
        .bind(id)
        .fetch_optional(pool)
        .await?;
    Ok(call)
}

pub async fn find_all(pool: &PgPool) -> Result<Vec<Call>, AppError> {
    let calls = sqlx::query_as::<_, Call>(&format!(
        "{CALL_SELECT} ORDER BY s.date_start DESC, q.name, c.call_type"
    ))
    .fetch_all(pool)
    .await?;
    Ok(calls)
}

/// Visible calls accepting proposals at `now`.
pub async fn find_open(pool: &PgPool, now: DateTime<Utc>) -> Result<Vec<Call>, AppError> {
    let calls = sqlx::query_as::<_, Call>(&format!(
        "{CALL_SELECT} WHERE NOT c.hidden AND c.date_open <= $1 AND c.date_close > $1 \
         ORDER BY c.date_close, q.name"
    ))
    .bind(now)
    .fetch_all(pool)
    .await?;
    Ok(calls)
}

/// Other open calls of the same queue, as copy destinations.
pub async fn find_open_for_queue(
    pool: &PgPool,
    queue_id: i64,
    exclude_call_id: i64,
    now: DateTime<Utc>,
) -> Result<Vec<Call>, AppError> {
    let calls = sqlx::query_as::<_, Call>(&format!(
        "{CALL_SELECT} WHERE c.queue_id = $1 AND c.id <> $2 \
           AND c.date_open <= $3 AND c.date_close > $3 \
         ORDER BY c.date_close"
    ))
    .bind(queue_id)
    .bind(exclude_call_id)
    .bind(now)
    .fetch_all(pool)
    .await?;
    Ok(calls)
}

pub async fn find_mid_closes(pool: &PgPool, call_id: i64) -> Result<Vec<CallMidClose>, AppError> {
    let rows = sqlx::query_as::<_, CallMidClose>(
        "SELECT id, call_id, date_close, closed FROM call_mid_close \
         WHERE call_id = $1 ORDER BY date_close",
    )
    .bind(call_id)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

pub async fn add_mid_close(pool: &PgPool, call_id: i64, date_close: DateTime<Utc>) -> Result<i64, AppError> {
    let id: i64 = sqlx::query_scalar(
        "INSERT INTO call_mid_close (call_id, date_close) VALUES ($1, $2) RETURNING id",
    )
    .bind(call_id)
    .bind(date_close)
    .fetch_one(pool)
    .await?;
    Ok(id)
}

pub async fn mark_mid_close_closed(pool: &PgPool, mid_close_id: i64) -> Result<(), AppError> {
    sqlx::query("UPDATE call_mid_close SET closed = TRUE WHERE id = $1")
        .bind(mid_close_id)
        .execute(pool)
        .await?;
    Ok(())
}
