use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::PgPool;

use crate::errors::AppError;

/// Record a state-changing action. Callers ignore failures: the action itself
/// has already succeeded and must not be rolled back because auditing failed.
pub async fn log(
    pool: &PgPool,
    person_id: i64,
    action: &str,
    target_type: &str,
    target_id: i64,
    details: Value,
) -> Result<(), AppError> {
    sqlx::query(
        "INSERT INTO audit_log (person_id, action, target_type, target_id, details) \
         VALUES ($1, $2, $3, $4, $5)",
    )
    .bind(person_id)
    .bind(action)
    .bind(target_type)
    .bind(target_id)
    .bind(details)
    .execute(pool)
    .await
    .map_err(|e| {
        log::warn!("Audit log write failed for {action} on {target_type} {target_id}: {e}");
        AppError::Db(e)
    })?;
    Ok(())
}

/// Remove entries older than a year. Returns the number deleted.
pub async fn cleanup_old_entries(pool: &PgPool) -> Result<u64, AppError> {
    let result = sqlx::query("DELETE FROM audit_log WHERE created_at < now() - INTERVAL '365 days'")
        .execute(pool)
        .await?;
    Ok(result.rows_affected())
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct AuditEntry {
    pub id: i64,
    pub person_id: Option<i64>,
    pub username: String,
    pub action: String,
    pub target_type: String,
    pub target_id: i64,
    pub details: Value,
    pub created_at: DateTime<Utc>,
}

impl AuditEntry {
    pub fn created_display(&self) -> String {
        self.created_at.format("%Y-%m-%d %H:%M:%S").to_string()
    }

    /// Details as compact `key=value` pairs.
    pub fn summary(&self) -> String {
        match &self.details {
            Value::Object(map) => map
                .iter()
                .map(|(k, v)| match v {
                    Value::String(s) => format!("{k}={s}"),
                    other => format!("{k}={other}"),
                })
                .collect::<Vec<_>>()
                .join(", "),
            Value::Null => String::new(),
            other => other.to_string(),
        }
    }
}

pub struct AuditEntryPage {
    pub entries: Vec<AuditEntry>,
    pub page: i64,
    pub per_page: i64,
    pub total_count: i64,
    pub total_pages: i64,
}

impl AuditEntryPage {
    pub fn has_prev(&self) -> bool {
        self.page > 1
    }

    pub fn has_next(&self) -> bool {
        self.page < self.total_pages
    }

    pub fn prev_page(&self) -> i64 {
        self.page - 1
    }

    pub fn next_page(&self) -> i64 {
        self.page + 1
    }
}

/// Newest entries first, optionally filtered by action or target type.
pub async fn find_paginated(
    pool: &PgPool,
    page: i64,
    per_page: i64,
    action_filter: Option<&str>,
    target_type_filter: Option<&str>,
) -> Result<AuditEntryPage, AppError> {
    let page = page.max(1);
    let per_page = per_page.clamp(1, 100);
    let offset = (page - 1) * per_page;
    let action = action_filter.filter(|a| !a.is_empty() && *a != "all");
    let target_type = target_type_filter.filter(|t| !t.is_empty() && *t != "all");

    let total_count: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM audit_log \
         WHERE ($1::TEXT IS NULL OR action = $1) AND ($2::TEXT IS NULL OR target_type = $2)",
    )
    .bind(action)
    .bind(target_type)
    .fetch_one(pool)
    .await?;

    let entries = sqlx::query_as::<_, AuditEntry>(
        "SELECT a.id, a.person_id, COALESCE(p.username, 'system') AS username, a.action, \
                a.target_type, a.target_id, a.details, a.created_at \
         FROM audit_log a LEFT JOIN person p ON p.id = a.person_id \
         WHERE ($1::TEXT IS NULL OR a.action = $1) AND ($2::TEXT IS NULL OR a.target_type = $2) \
         ORDER BY a.created_at DESC, a.id DESC \
         LIMIT $3 OFFSET $4",
    )
    .bind(action)
    .bind(target_type)
    .bind(per_page)
    .bind(offset)
    .fetch_all(pool)
    .await?;

    let total_pages = (total_count + per_page - 1) / per_page;
    Ok(AuditEntryPage { entries, page, per_page, total_count, total_pages })
}
