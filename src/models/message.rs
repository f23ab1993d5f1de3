use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::errors::AppError;

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Message {
    pub id: i64,
    pub subject: String,
    pub body: String,
    pub created_at: DateTime<Utc>,
    pub sent_at: Option<DateTime<Utc>>,
    pub recipients: String,
}

impl Message {
    pub fn created_display(&self) -> String {
        self.created_at.format("%Y-%m-%d %H:%M").to_string()
    }

    pub fn sent_display(&self) -> String {
        self.sent_at.map(|t| t.format("%Y-%m-%d %H:%M").to_string()).unwrap_or_default()
    }

    pub fn is_sent(&self) -> bool {
        self.sent_at.is_some()
    }
}

/// Queue a message for the given people. Recipients are de-duplicated.
pub async fn queue(pool: &PgPool, subject: &str, body: &str, recipients: &[i64]) -> Result<i64, AppError> {
    let mut tx = pool.begin().await?;
    let id: i64 = sqlx::query_scalar("INSERT INTO message (subject, body) VALUES ($1, $2) RETURNING id")
        .bind(subject)
        .bind(body)
        .fetch_one(&mut *tx)
        .await?;
    sqlx::query(
        "INSERT INTO message_recipient (message_id, person_id) \
         SELECT $1, p FROM UNNEST($2::BIGINT[]) AS p ON CONFLICT DO NOTHING",
    )
    .bind(id)
    .bind(recipients)
    .execute(&mut *tx)
    .await?;
    tx.commit().await?;
    Ok(id)
}

pub async fn find_recent(pool: &PgPool, unsent_only: bool, limit: i64) -> Result<Vec<Message>, AppError> {
    let rows = sqlx::query_as::<_, Message>(
        "SELECT m.id, m.subject, m.body, m.created_at, m.sent_at, \
                COALESCE(string_agg(p.name, ', ' ORDER BY p.name), '') AS recipients \
         FROM message m \
         LEFT JOIN message_recipient r ON r.message_id = m.id \
         LEFT JOIN person p ON p.id = r.person_id \
         WHERE NOT $1 OR m.sent_at IS NULL \
         GROUP BY m.id \
         ORDER BY m.created_at DESC \
         LIMIT $2",
    )
    .bind(unsent_only)
    .bind(limit)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

pub async fn mark_sent(pool: &PgPool, id: i64) -> Result<(), AppError> {
    let result = sqlx::query("UPDATE message SET sent_at = now() WHERE id = $1 AND sent_at IS NULL")
        .bind(id)
        .execute(pool)
        .await?;
    if result.rows_affected() == 0 {
        return Err(AppError::NotFound);
    }
    Ok(())
}
