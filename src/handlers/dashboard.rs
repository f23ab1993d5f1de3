use actix_session::Session;
use actix_web::{HttpResponse, web};
use chrono::{Local, Timelike, Utc};
use sqlx::PgPool;

use crate::auth::session::require_person_id;
use crate::config::AppConfig;
use crate::errors::{AppError, render};
use crate::models::{call, proposal, review};
use crate::templates_structs::{CallListTemplate, DashboardTemplate, PageContext};

fn time_greeting(name: &str) -> String {
    let period = match Local::now().hour() {
        5..=11 => "Good morning",
        12..=16 => "Good afternoon",
        _ => "Good evening",
    };
    format!("{period}, {name}")
}

pub async fn index(
    pool: web::Data<PgPool>,
    config: web::Data<AppConfig>,
    session: Session,
) -> Result<HttpResponse, AppError> {
    let person_id = require_person_id(&session)?;
    let ctx = PageContext::build(&session, &config, "/dashboard")?;

    let greeting = time_greeting(&ctx.username);
    let proposals = proposal::find_for_person(&pool, person_id).await?;
    let reviews = review::find_for_person(&pool, person_id).await?;
    let open_calls = call::find_open(&pool, Utc::now()).await?;

    render(DashboardTemplate { ctx, greeting, proposals, reviews, open_calls })
}

/// Calls currently accepting proposals.
pub async fn open_calls(
    pool: web::Data<PgPool>,
    config: web::Data<AppConfig>,
    session: Session,
) -> Result<HttpResponse, AppError> {
    let ctx = PageContext::build(&session, &config, "/calls")?;
    let calls = call::find_open(&pool, Utc::now()).await?;
    render(CallListTemplate { ctx, calls })
}
