//! Reviewer assignment for a call and reminders for outstanding reviews.

use std::collections::{BTreeMap, HashMap, HashSet};

use actix_session::Session;
use actix_web::{HttpResponse, web};
use serde::Deserialize;
use sqlx::PgPool;

use crate::auth::csrf;
use crate::auth::session::{require_person_id, set_flash};
use crate::config::AppConfig;
use crate::errors::{AppError, redirect, render};
use crate::handlers::auth_handlers::CsrfOnly;
use crate::handlers::form::{get_field, parse_form_body};
use crate::models::call::{self, Call};
use crate::models::person::PersonDisplay;
use crate::models::proposal::{self, ProposalListItem, ProposalState};
use crate::models::review::{self, ReviewerInfo, ReviewerRole, grid_field, parse_grid, validate_grid};
use crate::models::{member, person};
use crate::notify::{self, ReminderItem, ReviewReminder, ReviewerInvitation};
use crate::templates_structs::{GridCellView, GridRow, PageContext, ReviewGridTemplate, SelectOption};

#[derive(Debug, Deserialize)]
pub struct AssignForm {
    pub proposal_id: i64,
    pub person_id: i64,
    pub role: String,
    pub csrf_token: String,
}

/// Proposals that can have reviewers: submitted (awaiting a close) or under review.
fn assignable(p: &ProposalListItem) -> bool {
    matches!(
        ProposalState::from_code(&p.state),
        Some(ProposalState::Submitted | ProposalState::Review | ProposalState::FinalReview)
    )
}

fn person_options(people: &[PersonDisplay], selected: Option<i64>) -> Vec<SelectOption> {
    let mut options = vec![SelectOption::new("", "(none)", selected.is_none())];
    options.extend(people.iter().map(|p| SelectOption::new(p.id, p.name.clone(), selected == Some(p.id))));
    options
}

fn build_rows(proposals: &[ProposalListItem], reviewers: &[ReviewerInfo], people: &[PersonDisplay]) -> Vec<GridRow> {
    proposals
        .iter()
        .map(|p| {
            let of_proposal: Vec<&ReviewerInfo> = reviewers.iter().filter(|r| r.proposal_id == p.id).collect();
            let cells = ReviewerRole::UNIQUE
                .into_iter()
                .map(|role| {
                    let current = of_proposal.iter().find(|r| r.role == role.code()).map(|r| r.person_id);
                    GridCellView { field: grid_field(p.id, role), options: person_options(people, current) }
                })
                .collect();
            let others = of_proposal
                .iter()
                .filter(|r| !r.reviewer_role().is_some_and(|role| role.is_unique()))
                .map(|r| (*r).clone())
                .collect();
            GridRow { proposal_id: p.id, code: p.code(), title: p.title.clone(), cells, others }
        })
        .collect()
}

async fn render_grid(
    pool: &PgPool,
    config: &AppConfig,
    session: &Session,
    call: Call,
    errors: Vec<String>,
) -> Result<HttpResponse, AppError> {
    let proposals: Vec<ProposalListItem> =
        proposal::find_for_call(pool, call.id).await?.into_iter().filter(assignable).collect();
    let reviewers = review::find_for_call(pool, call.id).await?;
    let people = person::find_all(pool).await?;

    let rows = build_rows(&proposals, &reviewers, &people);
    let extra_roles = ReviewerRole::ALL
        .into_iter()
        .filter(|r| !r.is_unique())
        .map(|r| SelectOption::new(r.code(), r.label(), false))
        .collect();
    let ctx = PageContext::build(session, config, "/admin")?;
    render(ReviewGridTemplate {
        ctx,
        call,
        role_labels: ReviewerRole::UNIQUE.iter().map(|r| r.label()).collect(),
        rows,
        extra_roles,
        people: person_options(&people, None),
        errors,
    })
}

pub async fn grid(
    pool: web::Data<PgPool>,
    config: web::Data<AppConfig>,
    session: Session,
    path: web::Path<i64>,
) -> Result<HttpResponse, AppError> {
    let call = call::find_by_id(&pool, path.into_inner()).await?.ok_or(AppError::NotFound)?;
    render_grid(&pool, &config, &session, call, vec![]).await
}

async fn invite(pool: &PgPool, config: &AppConfig, reviewer_id: i64) -> Result<(), AppError> {
    let Some(reviewer) = review::find_by_id(pool, reviewer_id).await? else {
        return Ok(());
    };
    let role = reviewer.reviewer_role();
    let code = reviewer.proposal_code();
    let body = ReviewerInvitation {
        app_name: &config.app_name,
        reviewer: &reviewer.person_name,
        role: reviewer.role_label(),
        code: &code,
        title: &reviewer.proposal_title,
        needs_acceptance: role.is_some_and(|r| r.needs_acceptance()),
    };
    notify::send(pool, &format!("Review request for proposal {code}"), &body, &[reviewer.person_id]).await?;
    Ok(())
}

/// Save the whole grid of unique roles.
pub async fn grid_save(
    pool: web::Data<PgPool>,
    config: web::Data<AppConfig>,
    session: Session,
    path: web::Path<i64>,
    body: web::Bytes,
) -> Result<HttpResponse, AppError> {
    let params = parse_form_body(&body)?;
    csrf::validate_csrf(&session, get_field(&params, "csrf_token"))?;
    let person_id = require_person_id(&session)?;
    let call = call::find_by_id(&pool, path.into_inner()).await?.ok_or(AppError::NotFound)?;

    let proposals: Vec<ProposalListItem> =
        proposal::find_for_call(&pool, call.id).await?.into_iter().filter(assignable).collect();
    let proposal_ids: Vec<i64> = proposals.iter().map(|p| p.id).collect();
    let cells = match parse_grid(&proposal_ids, &params) {
        Ok(cells) => cells,
        Err(errors) => return render_grid(&pool, &config, &session, call, errors).await,
    };

    let mut members: HashMap<i64, HashSet<i64>> = HashMap::new();
    for &id in &proposal_ids {
        members.insert(id, member::person_ids(&pool, id).await?.into_iter().collect());
    }
    let codes: HashMap<i64, String> = proposals.iter().map(|p| (p.id, p.code())).collect();
    if let Err(errors) = validate_grid(&cells, &members, &codes) {
        return render_grid(&pool, &config, &session, call, errors).await;
    }

    let added = review::set_grid(&pool, &cells).await?;
    for (reviewer_id, _) in &added {
        if let Err(e) = invite(&pool, &config, *reviewer_id).await {
            log::error!("Could not queue invitation for reviewer {reviewer_id}: {e}");
        }
    }
    let _ = crate::audit::log(
        &pool,
        person_id,
        "review.grid_saved",
        "call",
        call.id,
        serde_json::json!({ "new_assignments": added.len() }),
    )
    .await;
    set_flash(&session, format!("Reviewers saved; {} new invitation(s) queued", added.len()));
    Ok(redirect(format!("/admin/calls/{}/reviewers", call.id)))
}

/// Add a reviewer in a role outside the grid (external, other committee, peer).
pub async fn assign(
    pool: web::Data<PgPool>,
    config: web::Data<AppConfig>,
    session: Session,
    path: web::Path<i64>,
    form: web::Form<AssignForm>,
) -> Result<HttpResponse, AppError> {
    csrf::validate_csrf(&session, &form.csrf_token)?;
    let admin_id = require_person_id(&session)?;
    let call = call::find_by_id(&pool, path.into_inner()).await?.ok_or(AppError::NotFound)?;
    let back = format!("/admin/calls/{}/reviewers", call.id);

    let role = ReviewerRole::from_code(&form.role)
        .filter(|r| !r.is_unique())
        .ok_or_else(|| AppError::Upload(format!("Unknown reviewer role \"{}\"", form.role)))?;
    let proposal = proposal::find_by_id(&pool, form.proposal_id).await?.ok_or(AppError::NotFound)?;
    if proposal.call_id != call.id {
        return Err(AppError::NotFound);
    }
    if member::person_ids(&pool, proposal.id).await?.contains(&form.person_id) {
        set_flash(&session, "A proposal member cannot review it");
        return Ok(redirect(back));
    }
    if review::is_assigned(&pool, proposal.id, form.person_id, role).await? {
        set_flash(&session, "That person is already a reviewer in this role");
        return Ok(redirect(back));
    }

    let reviewer_id = review::assign(&pool, proposal.id, form.person_id, role).await?;
    if let Err(e) = invite(&pool, &config, reviewer_id).await {
        log::error!("Could not queue invitation for reviewer {reviewer_id}: {e}");
    }
    let _ = crate::audit::log(
        &pool,
        admin_id,
        "review.assigned",
        "proposal",
        proposal.id,
        serde_json::json!({ "reviewer_id": reviewer_id, "person_id": form.person_id, "role": role.code() }),
    )
    .await;
    set_flash(&session, format!("{} reviewer added to {}", role.label(), proposal.code()));
    Ok(redirect(back))
}

pub async fn remove(
    pool: web::Data<PgPool>,
    session: Session,
    path: web::Path<(i64, i64)>,
    form: web::Form<CsrfOnly>,
) -> Result<HttpResponse, AppError> {
    csrf::validate_csrf(&session, &form.csrf_token)?;
    let admin_id = require_person_id(&session)?;
    let (call_id, reviewer_id) = path.into_inner();
    let reviewer = review::find_by_id(&pool, reviewer_id).await?.ok_or(AppError::NotFound)?;

    review::remove(&pool, reviewer_id).await?;
    let _ = crate::audit::log(
        &pool,
        admin_id,
        "review.removed",
        "proposal",
        reviewer.proposal_id,
        serde_json::json!({ "reviewer_id": reviewer_id, "person_id": reviewer.person_id, "role": reviewer.role }),
    )
    .await;
    set_flash(&session, format!("{} removed as {} reviewer", reviewer.person_name, reviewer.role_label()));
    Ok(redirect(format!("/admin/calls/{call_id}/reviewers")))
}

/// Group outstanding reviews by reviewer, in name order.
fn group_outstanding(outstanding: Vec<ReviewerInfo>) -> BTreeMap<(String, i64), Vec<ReminderItem>> {
    let mut by_person: BTreeMap<(String, i64), Vec<ReminderItem>> = BTreeMap::new();
    for r in outstanding {
        by_person.entry((r.person_name.clone(), r.person_id)).or_default().push(ReminderItem {
            code: r.proposal_code(),
            title: r.proposal_title.clone(),
            role: r.role_label().to_string(),
        });
    }
    by_person
}

/// Queue one reminder per reviewer listing all of their unfinished reviews in the call.
pub async fn remind(
    pool: web::Data<PgPool>,
    config: web::Data<AppConfig>,
    session: Session,
    path: web::Path<i64>,
    form: web::Form<CsrfOnly>,
) -> Result<HttpResponse, AppError> {
    csrf::validate_csrf(&session, &form.csrf_token)?;
    let admin_id = require_person_id(&session)?;
    let call = call::find_by_id(&pool, path.into_inner()).await?.ok_or(AppError::NotFound)?;

    let outstanding: Vec<ReviewerInfo> = review::find_outstanding_for_call(&pool, call.id)
        .await?
        .into_iter()
        .filter(|r| {
            r.reviewer_role().is_some_and(|role| Some(role.review_state()) == ProposalState::from_code(&r.proposal_state))
        })
        .collect();
    let grouped = group_outstanding(outstanding);
    for ((name, person_id), items) in &grouped {
        let body = ReviewReminder { app_name: &config.app_name, reviewer: name, items };
        notify::send(&pool, "Review reminder", &body, &[*person_id]).await?;
    }

    let _ = crate::audit::log(
        &pool,
        admin_id,
        "review.reminders_sent",
        "call",
        call.id,
        serde_json::json!({ "reviewers": grouped.len() }),
    )
    .await;
    set_flash(&session, format!("Reminders queued for {} reviewer(s)", grouped.len()));
    Ok(redirect(format!("/admin/calls/{}", call.id)))
}
