//! Semesters, queues, affiliations, and people.

use actix_session::Session;
use actix_web::{HttpResponse, web};
use serde::Deserialize;
use sqlx::PgPool;

use crate::auth::csrf;
use crate::auth::session::{require_person_id, set_flash};
use crate::auth::validate::validate_required;
use crate::config::AppConfig;
use crate::errors::{AppError, redirect, render};
use crate::models::affiliation::{self, AffiliationForm, Assignment};
use crate::models::call::{self, parse_form_datetime};
use crate::models::{person, proposal, queue, semester};
use crate::models::queue::QueueForm;
use crate::models::semester::SemesterForm;
use crate::templates_structs::{
    AdminIndexTemplate, AffiliationRow, AffiliationsTemplate, PageContext, PeopleTemplate, QueuesTemplate,
    SelectOption, SemestersTemplate,
};

pub async fn index(
    pool: web::Data<PgPool>,
    config: web::Data<AppConfig>,
    session: Session,
) -> Result<HttpResponse, AppError> {
    let calls = call::find_all(&pool).await?;
    let state_counts = proposal::count_by_state(&pool).await?;
    let ctx = PageContext::build(&session, &config, "/admin")?;
    render(AdminIndexTemplate { ctx, calls, state_counts })
}

async fn render_semesters(
    pool: &PgPool,
    config: &AppConfig,
    session: &Session,
    errors: Vec<String>,
) -> Result<HttpResponse, AppError> {
    let semesters = semester::find_all(pool).await?;
    let ctx = PageContext::build(session, config, "/admin")?;
    render(SemestersTemplate { ctx, semesters, errors })
}

pub async fn semesters(
    pool: web::Data<PgPool>,
    config: web::Data<AppConfig>,
    session: Session,
) -> Result<HttpResponse, AppError> {
    render_semesters(&pool, &config, &session, vec![]).await
}

pub async fn semester_create(
    pool: web::Data<PgPool>,
    config: web::Data<AppConfig>,
    session: Session,
    form: web::Form<SemesterForm>,
) -> Result<HttpResponse, AppError> {
    csrf::validate_csrf(&session, &form.csrf_token)?;
    let person_id = require_person_id(&session)?;

    let mut errors = Vec::new();
    errors.extend(validate_required(&form.code, "Code", 16));
    errors.extend(validate_required(&form.name, "Name", 100));
    let start = parse_form_datetime(&form.date_start).map_err(|e| errors.push(format!("Start: {e}"))).ok();
    let end = parse_form_datetime(&form.date_end).map_err(|e| errors.push(format!("End: {e}"))).ok();
    let dates = match (start, end) {
        (Some(s), Some(e)) if e > s => Some((s, e)),
        (Some(_), Some(_)) => {
            errors.push("The semester must end after it starts".to_string());
            None
        }
        _ => None,
    };
    let Some((start, end)) = dates.filter(|_| errors.is_empty()) else {
        return render_semesters(&pool, &config, &session, errors).await;
    };

    let id = semester::create(&pool, &form.code, &form.name, start, end).await?;
    let _ = crate::audit::log(
        &pool,
        person_id,
        "semester.created",
        "semester",
        id,
        serde_json::json!({ "code": form.code.trim() }),
    )
    .await;
    set_flash(&session, format!("Semester {} created", form.code.trim()));
    Ok(redirect("/admin/semesters"))
}

async fn render_queues(
    pool: &PgPool,
    config: &AppConfig,
    session: &Session,
    errors: Vec<String>,
) -> Result<HttpResponse, AppError> {
    let queues = queue::find_all(pool).await?;
    let ctx = PageContext::build(session, config, "/admin")?;
    render(QueuesTemplate { ctx, queues, errors })
}

pub async fn queues(
    pool: web::Data<PgPool>,
    config: web::Data<AppConfig>,
    session: Session,
) -> Result<HttpResponse, AppError> {
    render_queues(&pool, &config, &session, vec![]).await
}

pub async fn queue_create(
    pool: web::Data<PgPool>,
    config: web::Data<AppConfig>,
    session: Session,
    form: web::Form<QueueForm>,
) -> Result<HttpResponse, AppError> {
    csrf::validate_csrf(&session, &form.csrf_token)?;
    let person_id = require_person_id(&session)?;

    let mut errors = Vec::new();
    errors.extend(validate_required(&form.code, "Code", 8));
    errors.extend(validate_required(&form.name, "Name", 100));
    if errors.is_empty() && queue::code_exists(&pool, &form.code).await? {
        errors.push(format!("A queue with code {} already exists", form.code.trim()));
    }
    if !errors.is_empty() {
        return render_queues(&pool, &config, &session, errors).await;
    }

    let id = queue::create(&pool, &form.code, &form.name, &form.description).await?;
    let _ = crate::audit::log(
        &pool,
        person_id,
        "queue.created",
        "queue",
        id,
        serde_json::json!({ "code": form.code.trim() }),
    )
    .await;
    set_flash(&session, format!("Queue {} created", form.name.trim()));
    Ok(redirect("/admin/queues"))
}

fn assignment_options(selected: Assignment) -> Vec<SelectOption> {
    Assignment::ALL
        .into_iter()
        .map(|a| SelectOption::new(a.code(), a.label(), a == selected))
        .collect()
}

async fn render_affiliations(
    pool: &PgPool,
    config: &AppConfig,
    session: &Session,
    queue_id: i64,
    errors: Vec<String>,
) -> Result<HttpResponse, AppError> {
    let queue = queue::find_by_id(pool, queue_id).await?.ok_or(AppError::NotFound)?;
    let rows = affiliation::find_for_queue(pool, queue_id, true)
        .await?
        .into_iter()
        .map(|a| AffiliationRow { assignments: assignment_options(a.kind()), affiliation: a })
        .collect();
    let ctx = PageContext::build(session, config, "/admin")?;
    render(AffiliationsTemplate { ctx, queue, rows, assignments: assignment_options(Assignment::Standard), errors })
}

pub async fn affiliations(
    pool: web::Data<PgPool>,
    config: web::Data<AppConfig>,
    session: Session,
    path: web::Path<i64>,
) -> Result<HttpResponse, AppError> {
    render_affiliations(&pool, &config, &session, path.into_inner(), vec![]).await
}

pub async fn affiliation_create(
    pool: web::Data<PgPool>,
    config: web::Data<AppConfig>,
    session: Session,
    path: web::Path<i64>,
    form: web::Form<AffiliationForm>,
) -> Result<HttpResponse, AppError> {
    csrf::validate_csrf(&session, &form.csrf_token)?;
    let person_id = require_person_id(&session)?;
    let queue_id = path.into_inner();

    let (name, assignment, weight, hidden) = match form.parse() {
        Ok(values) => values,
        Err(errors) => return render_affiliations(&pool, &config, &session, queue_id, errors).await,
    };
    let id = affiliation::create(&pool, queue_id, &name, assignment, weight, hidden).await?;
    let _ = crate::audit::log(
        &pool,
        person_id,
        "affiliation.created",
        "queue",
        queue_id,
        serde_json::json!({ "affiliation_id": id, "name": name }),
    )
    .await;
    set_flash(&session, format!("Affiliation {name} added"));
    Ok(redirect(format!("/admin/queues/{queue_id}/affiliations")))
}

pub async fn affiliation_update(
    pool: web::Data<PgPool>,
    config: web::Data<AppConfig>,
    session: Session,
    path: web::Path<i64>,
    form: web::Form<AffiliationForm>,
) -> Result<HttpResponse, AppError> {
    csrf::validate_csrf(&session, &form.csrf_token)?;
    let person_id = require_person_id(&session)?;
    let existing = affiliation::find_by_id(&pool, path.into_inner()).await?.ok_or(AppError::NotFound)?;

    let (name, assignment, weight, hidden) = match form.parse() {
        Ok(values) => values,
        Err(errors) => return render_affiliations(&pool, &config, &session, existing.queue_id, errors).await,
    };
    affiliation::update(&pool, existing.id, &name, assignment, weight, hidden).await?;
    let _ = crate::audit::log(
        &pool,
        person_id,
        "affiliation.updated",
        "queue",
        existing.queue_id,
        serde_json::json!({
            "affiliation_id": existing.id,
            "name": name,
            "assignment": assignment.code(),
            "weight": weight,
            "hidden": hidden,
        }),
    )
    .await;
    set_flash(&session, format!("Affiliation {name} updated"));
    Ok(redirect(format!("/admin/queues/{}/affiliations", existing.queue_id)))
}

#[derive(Debug, Deserialize)]
pub struct AdminFlagForm {
    #[serde(default)]
    pub admin: Option<String>,
    pub csrf_token: String,
}

pub async fn people(
    pool: web::Data<PgPool>,
    config: web::Data<AppConfig>,
    session: Session,
) -> Result<HttpResponse, AppError> {
    let people = person::find_all(&pool).await?;
    let ctx = PageContext::build(&session, &config, "/admin")?;
    render(PeopleTemplate { ctx, people })
}

pub async fn set_admin(
    pool: web::Data<PgPool>,
    session: Session,
    path: web::Path<i64>,
    form: web::Form<AdminFlagForm>,
) -> Result<HttpResponse, AppError> {
    csrf::validate_csrf(&session, &form.csrf_token)?;
    let person_id = require_person_id(&session)?;
    let target_id = path.into_inner();
    let admin = form.admin.is_some();
    if target_id == person_id && !admin {
        set_flash(&session, "You cannot remove your own administrator access");
        return Ok(redirect("/admin/people"));
    }

    person::set_admin(&pool, target_id, admin).await?;
    let _ = crate::audit::log(
        &pool,
        person_id,
        if admin { "person.admin_granted" } else { "person.admin_revoked" },
        "person",
        target_id,
        serde_json::json!({}),
    )
    .await;
    set_flash(&session, "Administrator access updated; it applies from the person's next login");
    Ok(redirect("/admin/people"))
}
