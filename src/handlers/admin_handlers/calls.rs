//! Call administration: creating and editing calls, intermediate closes,
//! affiliation weights, and moving a call's proposals through review.

use actix_session::Session;
use actix_web::{HttpResponse, web};
use chrono::Utc;
use serde::Deserialize;
use sqlx::PgPool;

use crate::auth::csrf;
use crate::auth::session::{require_person_id, set_flash};
use crate::config::AppConfig;
use crate::errors::{AppError, redirect, render};
use crate::handlers::auth_handlers::CsrfOnly;
use crate::handlers::form::{get_field, parse_form_body};
use crate::models::call::{self, Call, CallForm, CallType, MidCloseForm, TextLimits, format_datetime, parse_form_datetime};
use crate::models::proposal::{self, ProposalAction, ProposalState};
use crate::models::{affiliation, queue, review, semester};
use crate::templates_structs::{CallDetailTemplate, CallFormTemplate, CallFormValues, PageContext, SelectOption, WeightsTemplate};

#[derive(Debug, Deserialize)]
pub struct CloseForm {
    #[serde(default)]
    pub mid_close_id: Option<String>,
    pub csrf_token: String,
}

const DEFAULT_LIMITS: TextLimits = TextLimits {
    abst_word_lim: 200,
    sci_word_lim: 1000,
    sci_fig_lim: 4,
    sci_page_lim: 2,
    tech_word_lim: 500,
    tech_fig_lim: 2,
    tech_page_lim: 1,
    capt_word_lim: 100,
};

fn form_datetime(dt: chrono::DateTime<Utc>) -> String {
    dt.format("%Y-%m-%d %H:%M").to_string()
}

impl CallFormValues {
    fn from_limits(date_open: String, date_close: String, l: TextLimits, hidden: bool) -> Self {
        CallFormValues {
            date_open,
            date_close,
            abst_word_lim: l.abst_word_lim.to_string(),
            sci_word_lim: l.sci_word_lim.to_string(),
            sci_fig_lim: l.sci_fig_lim.to_string(),
            sci_page_lim: l.sci_page_lim.to_string(),
            tech_word_lim: l.tech_word_lim.to_string(),
            tech_fig_lim: l.tech_fig_lim.to_string(),
            tech_page_lim: l.tech_page_lim.to_string(),
            capt_word_lim: l.capt_word_lim.to_string(),
            hidden,
        }
    }

    fn from_form(f: &CallForm) -> Self {
        CallFormValues {
            date_open: f.date_open.clone(),
            date_close: f.date_close.clone(),
            abst_word_lim: f.abst_word_lim.clone(),
            sci_word_lim: f.sci_word_lim.clone(),
            sci_fig_lim: f.sci_fig_lim.clone(),
            sci_page_lim: f.sci_page_lim.clone(),
            tech_word_lim: f.tech_word_lim.clone(),
            tech_fig_lim: f.tech_fig_lim.clone(),
            tech_page_lim: f.tech_page_lim.clone(),
            capt_word_lim: f.capt_word_lim.clone(),
            hidden: f.hidden.is_some(),
        }
    }
}

struct Selected {
    semester_id: i64,
    queue_id: i64,
    call_type: String,
}

async fn call_form(
    pool: &PgPool,
    config: &AppConfig,
    session: &Session,
    existing: Option<&Call>,
    selected: Selected,
    values: CallFormValues,
    errors: Vec<String>,
) -> Result<HttpResponse, AppError> {
    let semesters = semester::find_all(pool)
        .await?
        .into_iter()
        .map(|s| SelectOption::new(s.id, format!("{} ({})", s.name, s.code), s.id == selected.semester_id))
        .collect();
    let queues = queue::find_all(pool)
        .await?
        .into_iter()
        .map(|q| SelectOption::new(q.id, q.name, q.id == selected.queue_id))
        .collect();
    let call_types = CallType::ALL
        .into_iter()
        .map(|t| SelectOption::new(t.code(), t.label(), t.code() == selected.call_type))
        .collect();

    let (form_action, form_title) = match existing {
        Some(c) => (format!("/admin/calls/{}", c.id), format!("Edit call: {}", c.title())),
        None => ("/admin/calls".to_string(), "New call".to_string()),
    };
    let ctx = PageContext::build(session, config, "/admin")?;
    render(CallFormTemplate {
        ctx,
        form_action,
        form_title,
        editing: existing.is_some(),
        semesters,
        queues,
        call_types,
        values,
        errors,
    })
}

pub async fn new_form(
    pool: web::Data<PgPool>,
    config: web::Data<AppConfig>,
    session: Session,
) -> Result<HttpResponse, AppError> {
    let values = CallFormValues::from_limits(String::new(), String::new(), DEFAULT_LIMITS, false);
    let selected = Selected { semester_id: 0, queue_id: 0, call_type: CallType::Standard.code().to_string() };
    call_form(&pool, &config, &session, None, selected, values, vec![]).await
}

pub async fn create(
    pool: web::Data<PgPool>,
    config: web::Data<AppConfig>,
    session: Session,
    form: web::Form<CallForm>,
) -> Result<HttpResponse, AppError> {
    csrf::validate_csrf(&session, &form.csrf_token)?;
    let person_id = require_person_id(&session)?;

    let new_call = match form.to_new_call() {
        Ok(c) => c,
        Err(errors) => {
            let selected =
                Selected { semester_id: form.semester_id, queue_id: form.queue_id, call_type: form.call_type.clone() };
            return call_form(&pool, &config, &session, None, selected, CallFormValues::from_form(&form), errors).await;
        }
    };
    let id = call::create(&pool, &new_call).await?;
    let _ = crate::audit::log(
        &pool,
        person_id,
        "call.created",
        "call",
        id,
        serde_json::json!({
            "semester_id": new_call.semester_id,
            "queue_id": new_call.queue_id,
            "type": new_call.call_type.code(),
        }),
    )
    .await;
    log::info!("Call {id} created");
    set_flash(&session, "Call created");
    Ok(redirect(format!("/admin/calls/{id}")))
}

pub async fn edit_form(
    pool: web::Data<PgPool>,
    config: web::Data<AppConfig>,
    session: Session,
    path: web::Path<i64>,
) -> Result<HttpResponse, AppError> {
    let call = call::find_by_id(&pool, path.into_inner()).await?.ok_or(AppError::NotFound)?;
    let values =
        CallFormValues::from_limits(form_datetime(call.date_open), form_datetime(call.date_close), call.limits(), call.hidden);
    let selected = Selected { semester_id: call.semester_id, queue_id: call.queue_id, call_type: call.call_type.clone() };
    call_form(&pool, &config, &session, Some(&call), selected, values, vec![]).await
}

pub async fn update(
    pool: web::Data<PgPool>,
    config: web::Data<AppConfig>,
    session: Session,
    path: web::Path<i64>,
    form: web::Form<CallForm>,
) -> Result<HttpResponse, AppError> {
    csrf::validate_csrf(&session, &form.csrf_token)?;
    let person_id = require_person_id(&session)?;
    let call = call::find_by_id(&pool, path.into_inner()).await?.ok_or(AppError::NotFound)?;

    let mut errors = Vec::new();
    let new_call = form.to_new_call().map_err(|e| errors.extend(e)).ok();
    // Proposals are numbered within their semester and queue, so those stay fixed.
    if form.semester_id != call.semester_id || form.queue_id != call.queue_id {
        errors.push("The semester and queue of an existing call cannot be changed".to_string());
    }
    let Some(new_call) = new_call.filter(|_| errors.is_empty()) else {
        let selected =
            Selected { semester_id: call.semester_id, queue_id: call.queue_id, call_type: form.call_type.clone() };
        return call_form(&pool, &config, &session, Some(&call), selected, CallFormValues::from_form(&form), errors).await;
    };

    call::update(&pool, call.id, &new_call).await?;
    let _ = crate::audit::log(
        &pool,
        person_id,
        "call.updated",
        "call",
        call.id,
        serde_json::json!({
            "date_open": format_datetime(new_call.date_open),
            "date_close": format_datetime(new_call.date_close),
            "hidden": new_call.hidden,
        }),
    )
    .await;
    set_flash(&session, "Call updated");
    Ok(redirect(format!("/admin/calls/{}", call.id)))
}

pub async fn detail(
    pool: web::Data<PgPool>,
    config: web::Data<AppConfig>,
    session: Session,
    path: web::Path<i64>,
) -> Result<HttpResponse, AppError> {
    let call = call::find_by_id(&pool, path.into_inner()).await?.ok_or(AppError::NotFound)?;
    let now = Utc::now();
    let proposals = proposal::find_for_call(&pool, call.id).await?;
    let mid_closes = call::find_mid_closes(&pool, call.id).await?;
    let next_close = call::next_close(&call, &mid_closes, now).map(format_datetime).unwrap_or_default();
    let outstanding_reviews = review::find_outstanding_for_call(&pool, call.id).await?.len();

    let ctx = PageContext::build(&session, &config, "/admin")?;
    render(CallDetailTemplate {
        ctx,
        is_open: call.is_open_at(now),
        call,
        next_close,
        proposals,
        mid_closes,
        outstanding_reviews,
    })
}

pub async fn add_mid_close(
    pool: web::Data<PgPool>,
    session: Session,
    path: web::Path<i64>,
    form: web::Form<MidCloseForm>,
) -> Result<HttpResponse, AppError> {
    csrf::validate_csrf(&session, &form.csrf_token)?;
    let person_id = require_person_id(&session)?;
    let call = call::find_by_id(&pool, path.into_inner()).await?.ok_or(AppError::NotFound)?;

    if call.kind() != CallType::Multiple {
        set_flash(&session, "Only calls with multiple close dates have intermediate closes");
        return Ok(redirect(format!("/admin/calls/{}", call.id)));
    }
    let date = match parse_form_datetime(&form.date_close) {
        Ok(d) if d > call.date_open && d < call.date_close => d,
        Ok(_) => {
            set_flash(&session, "An intermediate close must fall between the call's opening and closing dates");
            return Ok(redirect(format!("/admin/calls/{}", call.id)));
        }
        Err(e) => {
            set_flash(&session, e);
            return Ok(redirect(format!("/admin/calls/{}", call.id)));
        }
    };

    let id = call::add_mid_close(&pool, call.id, date).await?;
    let _ = crate::audit::log(
        &pool,
        person_id,
        "call.mid_close_added",
        "call",
        call.id,
        serde_json::json!({ "mid_close_id": id, "date_close": format_datetime(date) }),
    )
    .await;
    set_flash(&session, format!("Intermediate close on {} added", format_datetime(date)));
    Ok(redirect(format!("/admin/calls/{}", call.id)))
}

pub async fn weights(
    pool: web::Data<PgPool>,
    config: web::Data<AppConfig>,
    session: Session,
    path: web::Path<i64>,
) -> Result<HttpResponse, AppError> {
    let call = call::find_by_id(&pool, path.into_inner()).await?.ok_or(AppError::NotFound)?;
    let affiliations = affiliation::find_effective_for_call(&pool, call.id).await?;
    let ctx = PageContext::build(&session, &config, "/admin")?;
    render(WeightsTemplate { ctx, call, affiliations })
}

/// Per-call weight overrides, one `weight_<affiliation id>` field each; blank
/// falls back to the affiliation's default weight.
pub async fn weights_save(
    pool: web::Data<PgPool>,
    session: Session,
    path: web::Path<i64>,
    body: web::Bytes,
) -> Result<HttpResponse, AppError> {
    let params = parse_form_body(&body)?;
    csrf::validate_csrf(&session, get_field(&params, "csrf_token"))?;
    let person_id = require_person_id(&session)?;
    let call = call::find_by_id(&pool, path.into_inner()).await?.ok_or(AppError::NotFound)?;
    let affiliations = affiliation::find_effective_for_call(&pool, call.id).await?;

    let mut parsed = Vec::with_capacity(affiliations.len());
    let mut errors = Vec::new();
    for a in &affiliations {
        let value = get_field(&params, &format!("weight_{}", a.id)).trim();
        let weight = match value {
            "" => None,
            v => match v.parse::<f64>() {
                Ok(w) if w.is_finite() && w >= 0.0 => Some(w),
                _ => {
                    errors.push(format!("Weight for {} must be a non-negative number", a.name));
                    continue;
                }
            },
        };
        parsed.push((a.id, weight));
    }
    if !errors.is_empty() {
        set_flash(&session, errors.join("; "));
        return Ok(redirect(format!("/admin/calls/{}/weights", call.id)));
    }

    for (affiliation_id, weight) in &parsed {
        affiliation::set_call_weight(&pool, call.id, *affiliation_id, *weight).await?;
    }
    let _ = crate::audit::log(
        &pool,
        person_id,
        "call.weights_updated",
        "call",
        call.id,
        serde_json::json!({
            "overrides": parsed.iter().filter(|(_, w)| w.is_some()).count(),
        }),
    )
    .await;
    set_flash(&session, "Affiliation weights saved");
    Ok(redirect(format!("/admin/calls/{}/weights", call.id)))
}

fn describe_moves(moves: &[(ProposalState, ProposalState, u64)]) -> String {
    if moves.is_empty() {
        return "No proposals were affected".to_string();
    }
    moves
        .iter()
        .map(|(from, to, n)| format!("{n} {} \u{2192} {}", from.label().to_lowercase(), to.label().to_lowercase()))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Close the call, or one of its intermediate closes. An intermediate close
/// sends only submitted proposals to review; the rest stay editable.
pub async fn close(
    pool: web::Data<PgPool>,
    session: Session,
    path: web::Path<i64>,
    form: web::Form<CloseForm>,
) -> Result<HttpResponse, AppError> {
    csrf::validate_csrf(&session, &form.csrf_token)?;
    let person_id = require_person_id(&session)?;
    let call = call::find_by_id(&pool, path.into_inner()).await?.ok_or(AppError::NotFound)?;
    let now = Utc::now();
    let back = format!("/admin/calls/{}", call.id);

    let mid_close_id = form.mid_close_id.as_deref().map(str::trim).filter(|v| !v.is_empty());
    let moves = match mid_close_id {
        Some(value) => {
            let mid_id: i64 = value.parse().map_err(|_| AppError::Upload("Invalid intermediate close".to_string()))?;
            let mid_closes = call::find_mid_closes(&pool, call.id).await?;
            let mid = mid_closes.iter().find(|m| m.id == mid_id).ok_or(AppError::NotFound)?;
            if mid.closed {
                set_flash(&session, "That intermediate close has already been processed");
                return Ok(redirect(back));
            }
            if now < mid.date_close {
                set_flash(&session, format!("The intermediate close is not until {}", mid.close_display()));
                return Ok(redirect(back));
            }
            let moves =
                proposal::apply_action_to_call(&pool, call.id, ProposalAction::CloseCall, Some(&[ProposalState::Submitted][..]))
                    .await?;
            call::mark_mid_close_closed(&pool, mid.id).await?;
            moves
        }
        None => {
            if now < call.date_close {
                set_flash(&session, format!("The call does not close until {}", call.close_display()));
                return Ok(redirect(back));
            }
            proposal::apply_action_to_call(&pool, call.id, ProposalAction::CloseCall, None).await?
        }
    };

    let summary = describe_moves(&moves);
    let _ = crate::audit::log(
        &pool,
        person_id,
        "call.closed",
        "call",
        call.id,
        serde_json::json!({ "mid_close_id": mid_close_id, "summary": summary }),
    )
    .await;
    log::info!("Closed call {}: {summary}", call.id);
    set_flash(&session, format!("Call closed: {summary}"));
    Ok(redirect(back))
}

/// Move every proposal of the call from review to final review.
pub async fn advance(
    pool: web::Data<PgPool>,
    session: Session,
    path: web::Path<i64>,
    form: web::Form<CsrfOnly>,
) -> Result<HttpResponse, AppError> {
    csrf::validate_csrf(&session, &form.csrf_token)?;
    let person_id = require_person_id(&session)?;
    let call = call::find_by_id(&pool, path.into_inner()).await?.ok_or(AppError::NotFound)?;

    let moves = proposal::apply_action_to_call(&pool, call.id, ProposalAction::AdvanceToFinal, None).await?;
    let summary = describe_moves(&moves);
    let _ = crate::audit::log(
        &pool,
        person_id,
        "call.advanced",
        "call",
        call.id,
        serde_json::json!({ "summary": summary }),
    )
    .await;
    set_flash(&session, format!("Advanced to final review: {summary}"));
    Ok(redirect(format!("/admin/calls/{}", call.id)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn moves_are_summarized() {
        assert_eq!(describe_moves(&[]), "No proposals were affected");
        let text = describe_moves(&[
            (ProposalState::Submitted, ProposalState::Review, 3),
            (ProposalState::Preparation, ProposalState::Abandoned, 1),
        ]);
        assert!(text.starts_with("3 submitted"));
        assert!(text.contains("1 in preparation"));
    }

    #[test]
    fn default_limits_fill_the_form() {
        let values = CallFormValues::from_limits(String::new(), String::new(), DEFAULT_LIMITS, true);
        assert_eq!(values.abst_word_lim, "200");
        assert_eq!(values.capt_word_lim, "100");
        assert!(values.hidden);
    }
}
