//! Outgoing message queue and the audit log.

use actix_session::Session;
use actix_web::{HttpResponse, web};
use serde::Deserialize;
use sqlx::PgPool;

use crate::audit;
use crate::auth::csrf;
use crate::auth::session::{require_person_id, set_flash};
use crate::config::AppConfig;
use crate::errors::{AppError, redirect, render};
use crate::handlers::auth_handlers::CsrfOnly;
use crate::models::message;
use crate::templates_structs::{AuditListTemplate, MessagesTemplate, PageContext};

const MESSAGE_LIMIT: i64 = 200;

#[derive(Debug, Deserialize)]
pub struct MessagesQuery {
    #[serde(default)]
    pub unsent: Option<String>,
}

pub async fn list(
    pool: web::Data<PgPool>,
    config: web::Data<AppConfig>,
    session: Session,
    query: web::Query<MessagesQuery>,
) -> Result<HttpResponse, AppError> {
    let unsent_only = query.unsent.as_deref().is_some_and(|v| !v.is_empty() && v != "0");
    let messages = message::find_recent(&pool, unsent_only, MESSAGE_LIMIT).await?;
    let ctx = PageContext::build(&session, &config, "/admin/messages")?;
    render(MessagesTemplate { ctx, messages, unsent_only })
}

/// Record that a message was delivered by hand.
pub async fn mark_sent(
    pool: web::Data<PgPool>,
    session: Session,
    path: web::Path<i64>,
    form: web::Form<CsrfOnly>,
) -> Result<HttpResponse, AppError> {
    csrf::validate_csrf(&session, &form.csrf_token)?;
    let person_id = require_person_id(&session)?;
    let id = path.into_inner();
    message::mark_sent(&pool, id).await?;
    let _ = audit::log(&pool, person_id, "message.sent", "message", id, serde_json::json!({})).await;
    set_flash(&session, "Message marked as sent");
    Ok(redirect("/admin/messages?unsent=1"))
}

#[derive(Debug, Deserialize)]
pub struct AuditQuery {
    pub page: Option<i64>,
    pub per_page: Option<i64>,
    pub action: Option<String>,
    pub target_type: Option<String>,
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

pub async fn audit_list(
    pool: web::Data<PgPool>,
    config: web::Data<AppConfig>,
    session: Session,
    query: web::Query<AuditQuery>,
) -> Result<HttpResponse, AppError> {
    let action_filter = non_empty(&query.action);
    let target_type_filter = non_empty(&query.target_type);
    let audit_page = audit::find_paginated(
        &pool,
        query.page.unwrap_or(1),
        query.per_page.unwrap_or(25),
        action_filter,
        target_type_filter,
    )
    .await?;

    let ctx = PageContext::build(&session, &config, "/admin/audit")?;
    render(AuditListTemplate {
        ctx,
        audit_page,
        action_filter: action_filter.unwrap_or_default().to_string(),
        target_type_filter: target_type_filter.unwrap_or_default().to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_filters_are_ignored() {
        assert_eq!(non_empty(&None), None);
        assert_eq!(non_empty(&Some("  ".into())), None);
        assert_eq!(non_empty(&Some(" proposal ".into())), Some("proposal"));
    }
}
