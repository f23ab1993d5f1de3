use actix_session::Session;
use actix_web::{HttpResponse, web};
use serde::Deserialize;
use sqlx::PgPool;

use super::access::{ProposalAccess, load_editable, load_viewable};
use crate::astro::CoordSystem;
use crate::auth::csrf;
use crate::auth::session::set_flash;
use crate::config::AppConfig;
use crate::errors::{AppError, redirect, render};
use crate::handlers::auth_handlers::CsrfOnly;
use crate::models::target::{self, Target, TargetForm, TargetListForm, format_hours, parse_target_list};
use crate::templates_structs::{PageContext, SelectOption, TargetEditTemplate, TargetsTemplate};

#[derive(Debug, Deserialize)]
pub struct MoveForm {
    pub direction: String,
    pub csrf_token: String,
}

fn system_options(selected: &str) -> Vec<SelectOption> {
    let selected = CoordSystem::from_code(selected).unwrap_or(CoordSystem::Icrs);
    CoordSystem::ALL
        .into_iter()
        .map(|s| SelectOption::new(s.code(), s.label(), s == selected))
        .collect()
}

async fn render_page(
    pool: &PgPool,
    config: &AppConfig,
    session: &Session,
    access: ProposalAccess,
    errors: Vec<String>,
    upload_text: String,
) -> Result<HttpResponse, AppError> {
    let targets = target::find_for_proposal(pool, access.proposal.id).await?;
    let total_time = format_hours(targets.iter().filter_map(|t| t.time).sum());
    let ctx = PageContext::build(session, config, "/proposals")?;
    render(TargetsTemplate {
        ctx,
        can_edit: access.can_edit(),
        proposal: access.proposal,
        targets,
        total_time,
        systems: system_options(""),
        errors,
        upload_text,
    })
}

fn edit_template(ctx: PageContext, access: ProposalAccess, target: &Target, errors: Vec<String>) -> TargetEditTemplate {
    TargetEditTemplate {
        ctx,
        proposal: access.proposal,
        target_id: target.id,
        name: target.name.clone(),
        systems: system_options(target.system.as_deref().unwrap_or("")),
        x: target.x_display(),
        y: target.y_display(),
        time: target.time.map(|t| t.to_string()).unwrap_or_default(),
        priority: target.priority_display(),
        note: target.note.clone(),
        errors,
    }
}

pub async fn page(
    pool: web::Data<PgPool>,
    config: web::Data<AppConfig>,
    session: Session,
    path: web::Path<i64>,
) -> Result<HttpResponse, AppError> {
    let access = load_viewable(&pool, &session, path.into_inner()).await?;
    render_page(&pool, &config, &session, access, vec![], String::new()).await
}

pub async fn add(
    pool: web::Data<PgPool>,
    config: web::Data<AppConfig>,
    session: Session,
    path: web::Path<i64>,
    form: web::Form<TargetForm>,
) -> Result<HttpResponse, AppError> {
    csrf::validate_csrf(&session, &form.csrf_token)?;
    let access = load_editable(&pool, &session, path.into_inner()).await?;
    let proposal_id = access.proposal.id;

    let new_target = match form.to_new_target() {
        Ok(t) => t,
        Err(errors) => return render_page(&pool, &config, &session, access, errors, String::new()).await,
    };
    let target_id = target::create(&pool, proposal_id, &new_target).await?;
    let _ = crate::audit::log(
        &pool,
        access.person_id,
        "target.added",
        "proposal",
        proposal_id,
        serde_json::json!({ "target_id": target_id, "name": new_target.name }),
    )
    .await;

    set_flash(&session, format!("Target {} added", new_target.name));
    Ok(redirect(format!("/proposals/{proposal_id}/targets")))
}

pub async fn edit_form(
    pool: web::Data<PgPool>,
    config: web::Data<AppConfig>,
    session: Session,
    path: web::Path<(i64, i64)>,
) -> Result<HttpResponse, AppError> {
    let (proposal_id, target_id) = path.into_inner();
    let access = load_editable(&pool, &session, proposal_id).await?;
    let target = target::find_by_id(&pool, proposal_id, target_id).await?.ok_or(AppError::NotFound)?;

    let ctx = PageContext::build(&session, &config, "/proposals")?;
    render(edit_template(ctx, access, &target, vec![]))
}

pub async fn update(
    pool: web::Data<PgPool>,
    config: web::Data<AppConfig>,
    session: Session,
    path: web::Path<(i64, i64)>,
    form: web::Form<TargetForm>,
) -> Result<HttpResponse, AppError> {
    csrf::validate_csrf(&session, &form.csrf_token)?;
    let (proposal_id, target_id) = path.into_inner();
    let access = load_editable(&pool, &session, proposal_id).await?;
    let existing = target::find_by_id(&pool, proposal_id, target_id).await?.ok_or(AppError::NotFound)?;

    let new_target = match form.to_new_target() {
        Ok(t) => t,
        Err(errors) => {
            let ctx = PageContext::build(&session, &config, "/proposals")?;
            let mut tmpl = edit_template(ctx, access, &existing, errors);
            tmpl.name = form.name.clone();
            tmpl.systems = system_options(&form.system);
            tmpl.x = form.x.clone();
            tmpl.y = form.y.clone();
            tmpl.time = form.time.clone();
            tmpl.priority = form.priority.clone();
            tmpl.note = form.note.clone();
            return render(tmpl);
        }
    };
    target::update(&pool, proposal_id, target_id, &new_target).await?;
    let _ = crate::audit::log(
        &pool,
        access.person_id,
        "target.updated",
        "proposal",
        proposal_id,
        serde_json::json!({ "target_id": target_id, "name": new_target.name }),
    )
    .await;

    set_flash(&session, format!("Target {} updated", new_target.name));
    Ok(redirect(format!("/proposals/{proposal_id}/targets")))
}

pub async fn delete(
    pool: web::Data<PgPool>,
    session: Session,
    path: web::Path<(i64, i64)>,
    form: web::Form<CsrfOnly>,
) -> Result<HttpResponse, AppError> {
    csrf::validate_csrf(&session, &form.csrf_token)?;
    let (proposal_id, target_id) = path.into_inner();
    let access = load_editable(&pool, &session, proposal_id).await?;

    target::delete(&pool, proposal_id, target_id).await?;
    let _ = crate::audit::log(
        &pool,
        access.person_id,
        "target.deleted",
        "proposal",
        proposal_id,
        serde_json::json!({ "target_id": target_id }),
    )
    .await;

    set_flash(&session, "Target deleted");
    Ok(redirect(format!("/proposals/{proposal_id}/targets")))
}

pub async fn move_target(
    pool: web::Data<PgPool>,
    session: Session,
    path: web::Path<(i64, i64)>,
    form: web::Form<MoveForm>,
) -> Result<HttpResponse, AppError> {
    csrf::validate_csrf(&session, &form.csrf_token)?;
    let (proposal_id, target_id) = path.into_inner();
    load_editable(&pool, &session, proposal_id).await?;

    let direction = match form.direction.as_str() {
        "up" => -1,
        "down" => 1,
        _ => return Err(AppError::Upload(format!("Unknown direction \"{}\"", form.direction))),
    };
    target::move_target(&pool, proposal_id, target_id, direction).await?;
    Ok(redirect(format!("/proposals/{proposal_id}/targets")))
}

/// Add (or replace the targets with) a pasted target list.
pub async fn upload(
    pool: web::Data<PgPool>,
    config: web::Data<AppConfig>,
    session: Session,
    path: web::Path<i64>,
    form: web::Form<TargetListForm>,
) -> Result<HttpResponse, AppError> {
    csrf::validate_csrf(&session, &form.csrf_token)?;
    let access = load_editable(&pool, &session, path.into_inner()).await?;
    let proposal_id = access.proposal.id;

    let targets = match parse_target_list(&form.targets) {
        Ok(t) if t.is_empty() => {
            let errors = vec!["The target list did not contain any targets".to_string()];
            return render_page(&pool, &config, &session, access, errors, form.targets.clone()).await;
        }
        Ok(t) => t,
        Err(errors) => return render_page(&pool, &config, &session, access, errors, form.targets.clone()).await,
    };
    let replace = form.replace.is_some();
    let count = target::create_many(&pool, proposal_id, &targets, replace).await?;
    let _ = crate::audit::log(
        &pool,
        access.person_id,
        "target.list_uploaded",
        "proposal",
        proposal_id,
        serde_json::json!({ "count": count, "replace": replace }),
    )
    .await;
    log::info!("Uploaded {count} targets for proposal {proposal_id}");

    set_flash(&session, format!("{count} targets added"));
    Ok(redirect(format!("/proposals/{proposal_id}/targets")))
}
