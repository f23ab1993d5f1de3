use actix_session::Session;
use actix_web::{HttpResponse, web};
use chrono::Utc;
use sqlx::PgPool;

use super::access::{load_editable, load_viewable};
use super::text::build_sections;
use crate::auth::csrf;
use crate::auth::session::{require_permission, require_person_id, set_flash};
use crate::config::AppConfig;
use crate::errors::{AppError, redirect, render};
use crate::models::proposal::validation;
use crate::models::proposal::{self, NewProposalForm, TitleForm, validate_title};
use crate::models::target::format_hours;
use crate::models::{affiliation, attachment, calculation, call, decision, member, prev_proposal, review, target, text};
use crate::templates_structs::{NewProposalTemplate, PageContext, ProposalViewTemplate, SelectOption};

pub(super) async fn affiliation_options(pool: &PgPool, queue_id: i64, selected: Option<i64>) -> Result<Vec<SelectOption>, AppError> {
    let mut options = vec![SelectOption::new("", "Unknown", selected.is_none())];
    for a in affiliation::find_for_queue(pool, queue_id, false).await? {
        options.push(SelectOption::new(a.id, a.name, selected == Some(a.id)));
    }
    Ok(options)
}

/// Blank means no affiliation; anything else must be a visible affiliation of the queue.
pub async fn parse_affiliation(pool: &PgPool, value: Option<&str>, queue_id: i64) -> Result<Result<Option<i64>, String>, AppError> {
    let value = value.map(str::trim).unwrap_or("");
    if value.is_empty() {
        return Ok(Ok(None));
    }
    let Ok(id) = value.parse::<i64>() else {
        return Ok(Err("Invalid affiliation".to_string()));
    };
    if !affiliation::is_selectable(pool, id, queue_id).await? {
        return Ok(Err("That affiliation is not available for this call".to_string()));
    }
    Ok(Ok(Some(id)))
}

pub async fn new_form(
    pool: web::Data<PgPool>,
    config: web::Data<AppConfig>,
    session: Session,
    path: web::Path<i64>,
) -> Result<HttpResponse, AppError> {
    require_permission(&session, "proposal.create")?;
    let call = call::find_by_id(&pool, path.into_inner()).await?.ok_or(AppError::NotFound)?;
    if !call.is_open() || call.hidden {
        set_flash(&session, "That call is not currently accepting proposals");
        return Ok(redirect("/calls"));
    }

    let ctx = PageContext::build(&session, &config, "/calls")?;
    let affiliations = affiliation_options(&pool, call.queue_id, None).await?;
    render(NewProposalTemplate { ctx, call, affiliations, title: String::new(), errors: vec![] })
}

pub async fn create(
    pool: web::Data<PgPool>,
    config: web::Data<AppConfig>,
    session: Session,
    path: web::Path<i64>,
    form: web::Form<NewProposalForm>,
) -> Result<HttpResponse, AppError> {
    require_permission(&session, "proposal.create")?;
    csrf::validate_csrf(&session, &form.csrf_token)?;
    let person_id = require_person_id(&session)?;
    let call = call::find_by_id(&pool, path.into_inner()).await?.ok_or(AppError::NotFound)?;

    let mut errors = Vec::new();
    if !call.is_open() || call.hidden {
        errors.push("That call is not currently accepting proposals".to_string());
    }
    let title = validate_title(&form.title).map_err(|e| errors.push(e)).ok();
    let affiliation_id = parse_affiliation(&pool, form.affiliation_id.as_deref(), call.queue_id)
        .await?
        .map_err(|e| errors.push(e))
        .ok()
        .flatten();

    let Some(title) = title.filter(|_| errors.is_empty()) else {
        let ctx = PageContext::build(&session, &config, "/calls")?;
        let affiliations = affiliation_options(&pool, call.queue_id, affiliation_id).await?;
        return render(NewProposalTemplate { ctx, call, affiliations, title: form.title.clone(), errors });
    };

    let proposal_id = proposal::create(&pool, call.id, &title, person_id, affiliation_id).await?;
    let _ = crate::audit::log(
        &pool,
        person_id,
        "proposal.created",
        "proposal",
        proposal_id,
        serde_json::json!({ "call_id": call.id, "title": title }),
    )
    .await;
    log::info!("Proposal {proposal_id} created in call {}", call.id);

    set_flash(&session, "Your proposal has been created. Add members, targets, and the proposal text, then submit it.");
    Ok(redirect(format!("/proposals/{proposal_id}")))
}

pub async fn view(
    pool: web::Data<PgPool>,
    config: web::Data<AppConfig>,
    session: Session,
    path: web::Path<i64>,
) -> Result<HttpResponse, AppError> {
    let access = load_viewable(&pool, &session, path.into_inner()).await?;
    let proposal_id = access.proposal.id;
    let call = call::find_by_id(&pool, access.proposal.call_id).await?.ok_or(AppError::NotFound)?;

    let members = member::find_for_proposal(&pool, proposal_id).await?;
    let texts = text::find_for_proposal(&pool, proposal_id).await?;
    let attachments = attachment::find_for_proposal(&pool, proposal_id).await?;
    let sections = build_sections(&texts, &attachments, &call.limits());
    let targets = target::find_for_proposal(&pool, proposal_id).await?;
    let total_time = format_hours(targets.iter().filter_map(|t| t.time).sum());
    let calculations = calculation::find_for_proposal(&pool, proposal_id).await?;
    let previous = prev_proposal::find_for_proposal(&pool, proposal_id).await?;

    let (reviewers, decision) = if access.is_admin {
        (
            review::find_for_proposal(&pool, proposal_id).await?,
            Some(decision::find(&pool, proposal_id).await?),
        )
    } else {
        (vec![], None)
    };

    let can_edit = access.can_edit();
    let (error_count, warning_count) = if can_edit {
        let snapshot = proposal::load_snapshot(&pool, &access.proposal, &call, Utc::now()).await?;
        let messages = validation::validate(&snapshot);
        let errors = messages.iter().filter(|m| m.is_error).count();
        (errors, messages.len() - errors)
    } else {
        (0, 0)
    };

    let ctx = PageContext::build(&session, &config, "/proposals")?;
    render(ProposalViewTemplate {
        ctx,
        can_edit,
        is_editor: access.is_editor(),
        is_admin: access.is_admin,
        proposal: access.proposal,
        members,
        sections,
        targets,
        total_time,
        calculations,
        previous,
        reviewers,
        decision,
        error_count,
        warning_count,
    })
}

pub async fn update_title(
    pool: web::Data<PgPool>,
    session: Session,
    path: web::Path<i64>,
    form: web::Form<TitleForm>,
) -> Result<HttpResponse, AppError> {
    csrf::validate_csrf(&session, &form.csrf_token)?;
    let access = load_editable(&pool, &session, path.into_inner()).await?;
    let proposal_id = access.proposal.id;

    match validate_title(&form.title) {
        Ok(title) => {
            proposal::update_title(&pool, proposal_id, &title).await?;
            let _ = crate::audit::log(
                &pool,
                access.person_id,
                "proposal.title_changed",
                "proposal",
                proposal_id,
                serde_json::json!({ "from": access.proposal.title, "to": title }),
            )
            .await;
            set_flash(&session, "Title updated");
        }
        Err(e) => set_flash(&session, e),
    }
    Ok(redirect(format!("/proposals/{proposal_id}")))
}
