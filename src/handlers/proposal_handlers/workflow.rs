use actix_session::Session;
use actix_web::{HttpResponse, web};
use chrono::Utc;
use serde::Deserialize;
use sqlx::PgPool;

use super::access::{load_editable, load_viewable};
use crate::auth::csrf;
use crate::auth::session::set_flash;
use crate::config::AppConfig;
use crate::errors::{AppError, redirect, render};
use crate::handlers::auth_handlers::CsrfOnly;
use crate::jobs::JobsState;
use crate::jobs::copy::schedule_copy_job;
use crate::jobs::pdf::schedule_pdf_job;
use crate::models::call::{self, format_datetime};
use crate::models::proposal::{self, ProposalAction, ProposalState, validation};
use crate::models::{member, person};
use crate::notify::{self, ProposalSubmitted};
use crate::templates_structs::{CopyTemplate, PageContext, ValidationTemplate};

#[derive(Debug, Deserialize)]
pub struct CopyForm {
    pub call_id: i64,
    pub csrf_token: String,
}

/// The checks that decide whether a proposal can be submitted, with the
/// actions open to its editors.
pub async fn validate_page(
    pool: web::Data<PgPool>,
    config: web::Data<AppConfig>,
    session: Session,
    path: web::Path<i64>,
) -> Result<HttpResponse, AppError> {
    let access = load_viewable(&pool, &session, path.into_inner()).await?;
    let call = call::find_by_id(&pool, access.proposal.call_id).await?.ok_or(AppError::NotFound)?;
    let now = Utc::now();

    let snapshot = proposal::load_snapshot(&pool, &access.proposal, &call, now).await?;
    let messages = validation::validate(&snapshot);
    let has_errors = validation::has_errors(&messages);
    let mid_closes = call::find_mid_closes(&pool, call.id).await?;
    let deadline = call::next_close(&call, &mid_closes, now).map(format_datetime).unwrap_or_default();

    let can_edit = access.can_edit();
    let state = access.proposal.status();
    let ctx = PageContext::build(&session, &config, "/proposals")?;
    render(ValidationTemplate {
        ctx,
        proposal: access.proposal,
        messages,
        has_errors,
        can_submit: can_edit && !has_errors && state.transition(ProposalAction::Submit).is_ok(),
        can_withdraw: can_edit && state == ProposalState::Submitted,
        can_reopen: can_edit && state == ProposalState::Withdrawn,
        deadline,
    })
}

pub async fn submit(
    pool: web::Data<PgPool>,
    config: web::Data<AppConfig>,
    session: Session,
    path: web::Path<i64>,
    form: web::Form<CsrfOnly>,
) -> Result<HttpResponse, AppError> {
    csrf::validate_csrf(&session, &form.csrf_token)?;
    let access = load_editable(&pool, &session, path.into_inner()).await?;
    let proposal = &access.proposal;
    let call = call::find_by_id(&pool, proposal.call_id).await?.ok_or(AppError::NotFound)?;
    let now = Utc::now();

    let snapshot = proposal::load_snapshot(&pool, proposal, &call, now).await?;
    let messages = validation::validate(&snapshot);
    if validation::has_errors(&messages) {
        set_flash(&session, "The proposal cannot be submitted until the errors below are fixed");
        return Ok(redirect(format!("/proposals/{}/validate", proposal.id)));
    }

    let state = match proposal::apply_action(&pool, proposal, ProposalAction::Submit).await {
        Ok(state) => state,
        Err(AppError::InvalidTransition(msg)) => {
            set_flash(&session, format!("Could not submit: {msg}"));
            return Ok(redirect(format!("/proposals/{}/validate", proposal.id)));
        }
        Err(e) => return Err(e),
    };
    let code = proposal.code();
    let _ = crate::audit::log(
        &pool,
        access.person_id,
        "proposal.submitted",
        "proposal",
        proposal.id,
        serde_json::json!({ "code": code, "state": state.code() }),
    )
    .await;
    log::info!("Proposal {code} submitted");

    let submitter = person::find_by_id(&pool, access.person_id).await?.map(|p| p.name).unwrap_or_default();
    let mid_closes = call::find_mid_closes(&pool, call.id).await?;
    let close_date = call::next_close(&call, &mid_closes, now).map(format_datetime).unwrap_or_default();
    let recipients = member::person_ids(&pool, proposal.id).await?;
    let body = ProposalSubmitted {
        app_name: &config.app_name,
        code: &code,
        title: &proposal.title,
        submitter: &submitter,
        call_title: &call.title(),
        close_date: &close_date,
    };
    if let Err(e) = notify::send(&pool, &format!("Proposal {code} submitted"), &body, &recipients).await {
        log::error!("Could not queue submission message for {code}: {e}");
    }

    set_flash(&session, format!("Proposal {code} has been submitted"));
    Ok(redirect(format!("/proposals/{}", proposal.id)))
}

async fn simple_action(
    pool: &PgPool,
    session: &Session,
    proposal_id: i64,
    action: ProposalAction,
    audit_action: &str,
    done: &str,
) -> Result<HttpResponse, AppError> {
    let access = load_editable(pool, session, proposal_id).await?;
    match proposal::apply_action(pool, &access.proposal, action).await {
        Ok(state) => {
            let _ = crate::audit::log(
                pool,
                access.person_id,
                audit_action,
                "proposal",
                proposal_id,
                serde_json::json!({ "state": state.code() }),
            )
            .await;
            set_flash(session, done);
        }
        Err(AppError::InvalidTransition(msg)) => set_flash(session, format!("Not possible: {msg}")),
        Err(e) => return Err(e),
    }
    Ok(redirect(format!("/proposals/{proposal_id}")))
}

pub async fn withdraw(
    pool: web::Data<PgPool>,
    session: Session,
    path: web::Path<i64>,
    form: web::Form<CsrfOnly>,
) -> Result<HttpResponse, AppError> {
    csrf::validate_csrf(&session, &form.csrf_token)?;
    simple_action(
        &pool,
        &session,
        path.into_inner(),
        ProposalAction::Withdraw,
        "proposal.withdrawn",
        "The proposal has been withdrawn. It can be reopened while the call is open.",
    )
    .await
}

pub async fn reopen(
    pool: web::Data<PgPool>,
    session: Session,
    path: web::Path<i64>,
    form: web::Form<CsrfOnly>,
) -> Result<HttpResponse, AppError> {
    csrf::validate_csrf(&session, &form.csrf_token)?;
    simple_action(
        &pool,
        &session,
        path.into_inner(),
        ProposalAction::Reopen,
        "proposal.reopened",
        "The proposal is back in preparation and must be submitted again",
    )
    .await
}

pub async fn pdf(
    pool: web::Data<PgPool>,
    config: web::Data<AppConfig>,
    jobs: web::Data<JobsState>,
    session: Session,
    path: web::Path<i64>,
    form: web::Form<CsrfOnly>,
) -> Result<HttpResponse, AppError> {
    csrf::validate_csrf(&session, &form.csrf_token)?;
    let access = load_viewable(&pool, &session, path.into_inner()).await?;

    let job_id = schedule_pdf_job(
        jobs.get_ref().clone(),
        pool.get_ref().clone(),
        config.pdf_dir.clone(),
        config.font_dir.clone(),
        access.proposal,
        access.person_id,
    )
    .await;
    Ok(redirect(format!("/jobs/{job_id}")))
}

pub async fn copy_form(
    pool: web::Data<PgPool>,
    config: web::Data<AppConfig>,
    session: Session,
    path: web::Path<i64>,
) -> Result<HttpResponse, AppError> {
    let access = load_viewable(&pool, &session, path.into_inner()).await?;
    if !access.is_editor() {
        return Err(AppError::PermissionDenied("proposal.edit".to_string()));
    }
    let calls = call::find_open_for_queue(&pool, access.proposal.queue_id, access.proposal.call_id, Utc::now())
        .await?
        .into_iter()
        .filter(|c| !c.hidden)
        .collect();

    let ctx = PageContext::build(&session, &config, "/proposals")?;
    render(CopyTemplate { ctx, proposal: access.proposal, calls })
}

pub async fn copy(
    pool: web::Data<PgPool>,
    jobs: web::Data<JobsState>,
    session: Session,
    path: web::Path<i64>,
    form: web::Form<CopyForm>,
) -> Result<HttpResponse, AppError> {
    csrf::validate_csrf(&session, &form.csrf_token)?;
    let access = load_viewable(&pool, &session, path.into_inner()).await?;
    if !access.is_editor() {
        return Err(AppError::PermissionDenied("proposal.edit".to_string()));
    }
    let source_id = access.proposal.id;

    let job_id = schedule_copy_job(
        jobs.get_ref().clone(),
        pool.get_ref().clone(),
        access.proposal,
        form.call_id,
        access.person_id,
    )
    .await;
    let _ = crate::audit::log(
        &pool,
        access.person_id,
        "proposal.copy_requested",
        "proposal",
        source_id,
        serde_json::json!({ "call_id": form.call_id, "job_id": job_id }),
    )
    .await;
    Ok(redirect(format!("/jobs/{job_id}")))
}
