//! Calculator results and previous-proposal references attached to a proposal.

use actix_session::Session;
use actix_web::{HttpRequest, HttpResponse, web};
use sqlx::PgPool;

use super::access::{ProposalAccess, load_editable, load_viewable};
use crate::auth::csrf;
use crate::auth::session::set_flash;
use crate::config::AppConfig;
use crate::errors::{AppError, json_error, redirect, render};
use crate::handlers::auth_handlers::CsrfOnly;
use crate::models::calculation::{self, CalculationTitleForm, NewCalculation};
use crate::models::prev_proposal::{self, PrevProposalForm, PubType, PublicationForm, validate_code};
use crate::templates_structs::{CalculationsTemplate, PageContext, PreviousTemplate, SelectOption};

pub async fn calculations_page(
    pool: web::Data<PgPool>,
    config: web::Data<AppConfig>,
    session: Session,
    path: web::Path<i64>,
) -> Result<HttpResponse, AppError> {
    let access = load_viewable(&pool, &session, path.into_inner()).await?;
    let calculations = calculation::find_for_proposal(&pool, access.proposal.id).await?;
    let ctx = PageContext::build(&session, &config, "/proposals")?;
    render(CalculationsTemplate { ctx, can_edit: access.can_edit(), proposal: access.proposal, calculations })
}

/// JSON endpoint used by the calculators. The CSRF token travels in the
/// `X-CSRF-Token` header.
pub async fn calculation_create(
    pool: web::Data<PgPool>,
    session: Session,
    req: HttpRequest,
    path: web::Path<i64>,
    body: web::Json<NewCalculation>,
) -> HttpResponse {
    match store_calculation(&pool, &session, &req, path.into_inner(), &body).await {
        Ok(resp) => resp,
        Err(e) => json_error(e),
    }
}

async fn store_calculation(
    pool: &PgPool,
    session: &Session,
    req: &HttpRequest,
    proposal_id: i64,
    calc: &NewCalculation,
) -> Result<HttpResponse, AppError> {
    let token = req.headers().get("X-CSRF-Token").and_then(|v| v.to_str().ok()).unwrap_or("");
    csrf::validate_csrf(session, token)?;
    let access = load_editable(pool, session, proposal_id).await?;
    calc.validate().map_err(AppError::Upload)?;

    let id = calculation::create(pool, proposal_id, calc).await?;
    let _ = crate::audit::log(
        pool,
        access.person_id,
        "calculation.added",
        "proposal",
        proposal_id,
        serde_json::json!({ "calculation_id": id, "calculator": calc.calculator, "mode": calc.mode }),
    )
    .await;
    Ok(HttpResponse::Created().json(serde_json::json!({ "id": id })))
}

pub async fn calculation_title(
    pool: web::Data<PgPool>,
    session: Session,
    path: web::Path<(i64, i64)>,
    form: web::Form<CalculationTitleForm>,
) -> Result<HttpResponse, AppError> {
    csrf::validate_csrf(&session, &form.csrf_token)?;
    let (proposal_id, calculation_id) = path.into_inner();
    load_editable(&pool, &session, proposal_id).await?;

    calculation::update_title(&pool, proposal_id, calculation_id, &form.title).await?;
    set_flash(&session, "Calculation title saved");
    Ok(redirect(format!("/proposals/{proposal_id}/calculations")))
}

pub async fn calculation_delete(
    pool: web::Data<PgPool>,
    session: Session,
    path: web::Path<(i64, i64)>,
    form: web::Form<CsrfOnly>,
) -> Result<HttpResponse, AppError> {
    csrf::validate_csrf(&session, &form.csrf_token)?;
    let (proposal_id, calculation_id) = path.into_inner();
    let access = load_editable(&pool, &session, proposal_id).await?;

    calculation::delete(&pool, proposal_id, calculation_id).await?;
    let _ = crate::audit::log(
        &pool,
        access.person_id,
        "calculation.deleted",
        "proposal",
        proposal_id,
        serde_json::json!({ "calculation_id": calculation_id }),
    )
    .await;
    set_flash(&session, "Calculation deleted");
    Ok(redirect(format!("/proposals/{proposal_id}/calculations")))
}

fn pub_type_options(selected: &str) -> Vec<SelectOption> {
    PubType::ALL
        .into_iter()
        .map(|t| SelectOption::new(t.code(), t.label(), t.code() == selected))
        .collect()
}

async fn render_previous(
    pool: &PgPool,
    config: &AppConfig,
    session: &Session,
    access: ProposalAccess,
    errors: Vec<String>,
) -> Result<HttpResponse, AppError> {
    let previous = prev_proposal::find_for_proposal(pool, access.proposal.id).await?;
    let ctx = PageContext::build(session, config, "/proposals")?;
    render(PreviousTemplate {
        ctx,
        can_edit: access.can_edit(),
        proposal: access.proposal,
        previous,
        pub_types: pub_type_options(PubType::Doi.code()),
        errors,
    })
}

pub async fn previous_page(
    pool: web::Data<PgPool>,
    config: web::Data<AppConfig>,
    session: Session,
    path: web::Path<i64>,
) -> Result<HttpResponse, AppError> {
    let access = load_viewable(&pool, &session, path.into_inner()).await?;
    render_previous(&pool, &config, &session, access, vec![]).await
}

fn parse_publication(pub_type: &str, description: &str) -> Result<(PubType, String), String> {
    let pub_type = PubType::from_code(pub_type).ok_or_else(|| "Unknown publication type".to_string())?;
    Ok((pub_type, pub_type.validate(description)?))
}

/// Add a previous proposal, optionally with its first publication.
pub async fn previous_add(
    pool: web::Data<PgPool>,
    config: web::Data<AppConfig>,
    session: Session,
    path: web::Path<i64>,
    form: web::Form<PrevProposalForm>,
) -> Result<HttpResponse, AppError> {
    csrf::validate_csrf(&session, &form.csrf_token)?;
    let access = load_editable(&pool, &session, path.into_inner()).await?;
    let proposal_id = access.proposal.id;

    let mut errors = Vec::new();
    let code = validate_code(&form.proposal_code).map_err(|e| errors.push(e)).ok();
    let publication = if form.publication.trim().is_empty() {
        None
    } else {
        parse_publication(&form.pub_type, &form.publication).map_err(|e| errors.push(e)).ok()
    };
    if code.as_deref() == Some(access.proposal.code().as_str()) {
        errors.push("A proposal cannot list itself as a previous proposal".to_string());
    }
    let Some(code) = code.filter(|_| errors.is_empty()) else {
        return render_previous(&pool, &config, &session, access, errors).await;
    };

    let prev_id = prev_proposal::create(&pool, proposal_id, &code, form.continuation.is_some()).await?;
    if let Some((pub_type, description)) = publication {
        prev_proposal::add_publication(&pool, proposal_id, prev_id, pub_type, &description).await?;
    }
    let _ = crate::audit::log(
        &pool,
        access.person_id,
        "prev_proposal.added",
        "proposal",
        proposal_id,
        serde_json::json!({ "code": code, "continuation": form.continuation.is_some() }),
    )
    .await;

    set_flash(&session, format!("Previous proposal {code} added"));
    Ok(redirect(format!("/proposals/{proposal_id}/previous")))
}

pub async fn publication_add(
    pool: web::Data<PgPool>,
    config: web::Data<AppConfig>,
    session: Session,
    path: web::Path<(i64, i64)>,
    form: web::Form<PublicationForm>,
) -> Result<HttpResponse, AppError> {
    csrf::validate_csrf(&session, &form.csrf_token)?;
    let (proposal_id, prev_id) = path.into_inner();
    let access = load_editable(&pool, &session, proposal_id).await?;

    let (pub_type, description) = match parse_publication(&form.pub_type, &form.description) {
        Ok(p) => p,
        Err(e) => return render_previous(&pool, &config, &session, access, vec![e]).await,
    };
    prev_proposal::add_publication(&pool, proposal_id, prev_id, pub_type, &description).await?;

    set_flash(&session, "Publication added");
    Ok(redirect(format!("/proposals/{proposal_id}/previous")))
}

pub async fn previous_delete(
    pool: web::Data<PgPool>,
    session: Session,
    path: web::Path<(i64, i64)>,
    form: web::Form<CsrfOnly>,
) -> Result<HttpResponse, AppError> {
    csrf::validate_csrf(&session, &form.csrf_token)?;
    let (proposal_id, prev_id) = path.into_inner();
    let access = load_editable(&pool, &session, proposal_id).await?;

    prev_proposal::delete(&pool, proposal_id, prev_id).await?;
    let _ = crate::audit::log(
        &pool,
        access.person_id,
        "prev_proposal.deleted",
        "proposal",
        proposal_id,
        serde_json::json!({ "prev_proposal_id": prev_id }),
    )
    .await;
    set_flash(&session, "Previous proposal removed");
    Ok(redirect(format!("/proposals/{proposal_id}/previous")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn publication_needs_known_type_and_valid_reference() {
        assert_eq!(
            parse_publication("arxiv", "arXiv:1607.04377"),
            Ok((PubType::Arxiv, "1607.04377".to_string()))
        );
        assert!(parse_publication("isbn", "123").is_err());
        assert!(parse_publication("doi", "not a doi").is_err());
    }

    #[test]
    fn options_mark_selected_type() {
        let options = pub_type_options("ads");
        assert_eq!(options.iter().filter(|o| o.selected).count(), 1);
        assert!(options.iter().any(|o| o.selected && o.value == "ads"));
    }
}
