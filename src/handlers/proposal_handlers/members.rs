use actix_session::Session;
use actix_web::{HttpResponse, web};
use serde::Deserialize;
use sqlx::PgPool;

use super::access::{ProposalAccess, load_editable, load_viewable};
use super::crud::{affiliation_options, parse_affiliation};
use crate::auth::csrf;
use crate::auth::session::set_flash;
use crate::config::AppConfig;
use crate::errors::{AppError, redirect, render};
use crate::handlers::auth_handlers::CsrfOnly;
use crate::handlers::form::{get_field, parse_form_body};
use crate::models::affiliation;
use crate::models::member::{self, AddMemberForm, Member, parse_member_edits};
use crate::models::person;
use crate::templates_structs::{MemberRow, MembersTemplate, PageContext, SelectOption};

const MIN_SEARCH_LEN: usize = 2;
const MAX_CANDIDATES: i64 = 20;

#[derive(Debug, Default, Deserialize)]
pub struct MemberSearch {
    #[serde(default)]
    pub q: String,
}

async fn render_page(
    pool: &PgPool,
    config: &AppConfig,
    session: &Session,
    access: ProposalAccess,
    errors: Vec<String>,
) -> Result<HttpResponse, AppError> {
    render_with_search(pool, config, session, access, errors, "").await
}

async fn render_with_search(
    pool: &PgPool,
    config: &AppConfig,
    session: &Session,
    access: ProposalAccess,
    errors: Vec<String>,
    query: &str,
) -> Result<HttpResponse, AppError> {
    let members = member::find_for_proposal(pool, access.proposal.id).await?;
    let visible = affiliation::find_for_queue(pool, access.proposal.queue_id, false).await?;
    let rows: Vec<MemberRow> = members
        .into_iter()
        .map(|member| {
            let mut affiliations = vec![SelectOption::new("", "Unknown", member.affiliation_id.is_none())];
            affiliations.extend(
                visible.iter().map(|a| SelectOption::new(a.id, a.name.clone(), member.affiliation_id == Some(a.id))),
            );
            // A member may keep an affiliation that has since been hidden.
            if let (Some(id), Some(name)) = (member.affiliation_id, member.affiliation_name.as_ref())
                && !visible.iter().any(|a| a.id == id)
            {
                affiliations.push(SelectOption::new(id, format!("{name} (hidden)"), true));
            }
            MemberRow { member, affiliations }
        })
        .collect();

    let query = query.trim();
    let candidates = if access.can_edit() && query.chars().count() >= MIN_SEARCH_LEN {
        person::search(pool, query, MAX_CANDIDATES)
            .await?
            .into_iter()
            .filter(|p| !rows_have(&rows, p.id))
            .map(|p| {
                let label = if p.institution.is_empty() {
                    format!("{} ({})", p.name, p.username)
                } else {
                    format!("{} ({}, {})", p.name, p.username, p.institution)
                };
                SelectOption::new(p.id, label, false)
            })
            .collect()
    } else {
        Vec::new()
    };

    let ctx = PageContext::build(session, config, "/proposals")?;
    render(MembersTemplate {
        ctx,
        can_edit: access.can_edit(),
        affiliations: affiliation_options(pool, access.proposal.queue_id, None).await?,
        proposal: access.proposal,
        rows,
        query: query.to_string(),
        candidates,
        errors,
    })
}

fn rows_have(rows: &[MemberRow], person_id: i64) -> bool {
    rows.iter().any(|r| r.member.person_id == person_id)
}

pub async fn page(
    pool: web::Data<PgPool>,
    config: web::Data<AppConfig>,
    session: Session,
    path: web::Path<i64>,
    search: web::Query<MemberSearch>,
) -> Result<HttpResponse, AppError> {
    let access = load_viewable(&pool, &session, path.into_inner()).await?;
    render_with_search(&pool, &config, &session, access, vec![], &search.q).await
}

/// Save the whole member table at once: PI, editor and observer flags,
/// affiliations, and ordering.
pub async fn update(
    pool: web::Data<PgPool>,
    config: web::Data<AppConfig>,
    session: Session,
    path: web::Path<i64>,
    body: web::Bytes,
) -> Result<HttpResponse, AppError> {
    let params = parse_form_body(&body)?;
    csrf::validate_csrf(&session, get_field(&params, "csrf_token"))?;
    let access = load_editable(&pool, &session, path.into_inner()).await?;
    let proposal_id = access.proposal.id;

    let current = member::find_for_proposal(&pool, proposal_id).await?;
    let member_ids: Vec<i64> = current.iter().map(|m| m.id).collect();
    let edits = match parse_member_edits(&member_ids, &params) {
        Ok(edits) => edits,
        Err(errors) => return render_page(&pool, &config, &session, access, errors).await,
    };

    let mut errors = Vec::new();
    for edit in &edits {
        let Some(affiliation_id) = edit.affiliation_id else { continue };
        let unchanged = current.iter().any(|m: &Member| m.id == edit.member_id && m.affiliation_id == Some(affiliation_id));
        if !unchanged && !affiliation::is_selectable(&pool, affiliation_id, access.proposal.queue_id).await? {
            errors.push("One of the chosen affiliations is not available for this call".to_string());
            break;
        }
    }
    if errors.is_empty()
        && let Err(errs) = member::update_all(&pool, proposal_id, &edits).await?
    {
        errors = errs;
    }
    if !errors.is_empty() {
        return render_page(&pool, &config, &session, access, errors).await;
    }

    let _ = crate::audit::log(
        &pool,
        access.person_id,
        "member.updated",
        "proposal",
        proposal_id,
        serde_json::json!({ "members": edits.len() }),
    )
    .await;
    set_flash(&session, "Members updated");
    Ok(redirect(format!("/proposals/{proposal_id}/members")))
}

pub async fn add(
    pool: web::Data<PgPool>,
    config: web::Data<AppConfig>,
    session: Session,
    path: web::Path<i64>,
    form: web::Form<AddMemberForm>,
) -> Result<HttpResponse, AppError> {
    csrf::validate_csrf(&session, &form.csrf_token)?;
    let access = load_editable(&pool, &session, path.into_inner()).await?;
    let proposal_id = access.proposal.id;

    let Some(person) = person::find_by_id(&pool, form.person_id).await? else {
        return render_page(&pool, &config, &session, access, vec!["No such person".to_string()]).await;
    };
    let affiliation_id = match parse_affiliation(&pool, form.affiliation_id.as_deref(), access.proposal.queue_id).await? {
        Ok(id) => id,
        Err(e) => return render_page(&pool, &config, &session, access, vec![e]).await,
    };

    match member::add(&pool, proposal_id, person.id, affiliation_id, form.editor.is_some(), form.observer.is_some()).await? {
        Ok(member_id) => {
            let _ = crate::audit::log(
                &pool,
                access.person_id,
                "member.added",
                "proposal",
                proposal_id,
                serde_json::json!({ "member_id": member_id, "person_id": person.id }),
            )
            .await;
            set_flash(&session, format!("{} added to the proposal", person.name));
            Ok(redirect(format!("/proposals/{proposal_id}/members")))
        }
        Err(errors) => render_page(&pool, &config, &session, access, errors).await,
    }
}

pub async fn remove(
    pool: web::Data<PgPool>,
    config: web::Data<AppConfig>,
    session: Session,
    path: web::Path<(i64, i64)>,
    form: web::Form<CsrfOnly>,
) -> Result<HttpResponse, AppError> {
    csrf::validate_csrf(&session, &form.csrf_token)?;
    let (proposal_id, member_id) = path.into_inner();
    let access = load_editable(&pool, &session, proposal_id).await?;

    match member::remove(&pool, proposal_id, member_id).await? {
        Ok(()) => {
            let _ = crate::audit::log(
                &pool,
                access.person_id,
                "member.removed",
                "proposal",
                proposal_id,
                serde_json::json!({ "member_id": member_id }),
            )
            .await;
            set_flash(&session, "Member removed");
            Ok(redirect(format!("/proposals/{proposal_id}/members")))
        }
        Err(errors) => render_page(&pool, &config, &session, access, errors).await,
    }
}
