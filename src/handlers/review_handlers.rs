use actix_session::Session;
use actix_web::{HttpResponse, web};
use sqlx::PgPool;

use crate::auth::csrf;
use crate::auth::session::{require_person_id, set_flash};
use crate::config::AppConfig;
use crate::errors::{AppError, redirect, render};
use crate::models::review::{self, AcceptanceForm, Assessment, ReviewForm, ReviewerInfo, validate_review};
use crate::templates_structs::{MyReviewsTemplate, PageContext, ReviewEditTemplate, SelectOption};

pub async fn my_reviews(
    pool: web::Data<PgPool>,
    config: web::Data<AppConfig>,
    session: Session,
) -> Result<HttpResponse, AppError> {
    let person_id = require_person_id(&session)?;
    let reviews = review::find_for_person(&pool, person_id).await?;
    let ctx = PageContext::build(&session, &config, "/reviews")?;
    render(MyReviewsTemplate { ctx, reviews })
}

/// A reviewer assignment belonging to the logged-in person.
async fn load_own(pool: &PgPool, session: &Session, reviewer_id: i64) -> Result<(i64, ReviewerInfo), AppError> {
    let person_id = require_person_id(session)?;
    let reviewer = review::find_by_id(pool, reviewer_id).await?.ok_or(AppError::NotFound)?;
    if reviewer.person_id != person_id {
        return Err(AppError::PermissionDenied("review.edit".to_string()));
    }
    Ok((person_id, reviewer))
}

fn assessment_options(selected: &str) -> Vec<SelectOption> {
    let mut options = vec![SelectOption::new("", "Not yet assessed", selected.is_empty())];
    options.extend(Assessment::ALL.into_iter().map(|a| SelectOption::new(a.code(), a.label(), a.code() == selected)));
    options
}

fn edit_template(ctx: PageContext, reviewer: ReviewerInfo, errors: Vec<String>) -> ReviewEditTemplate {
    let role = reviewer.reviewer_role();
    let awaiting_response = role.is_some_and(|r| r.needs_acceptance()) && reviewer.accepted.is_none();
    let locked_reason = if awaiting_response { None } else { reviewer.check_editable().err() };
    ReviewEditTemplate {
        ctx,
        locked_reason,
        awaiting_response,
        has_rating: role.is_some_and(|r| r.has_rating()),
        has_weight: role.is_some_and(|r| r.has_weight()),
        has_assessment: role.is_some_and(|r| r.has_assessment()),
        assessments: assessment_options(reviewer.assessment.as_deref().unwrap_or("")),
        text: reviewer.text_display().to_string(),
        rating: reviewer.rating_display(),
        weight: reviewer.weight_display(),
        done: reviewer.is_done(),
        reviewer,
        errors,
    }
}

pub async fn edit_page(
    pool: web::Data<PgPool>,
    config: web::Data<AppConfig>,
    session: Session,
    path: web::Path<i64>,
) -> Result<HttpResponse, AppError> {
    let (_, reviewer) = load_own(&pool, &session, path.into_inner()).await?;
    let ctx = PageContext::build(&session, &config, "/reviews")?;
    render(edit_template(ctx, reviewer, vec![]))
}

/// Accept an invitation to review, or decline it by declaring a conflict of interest.
pub async fn respond(
    pool: web::Data<PgPool>,
    session: Session,
    path: web::Path<i64>,
    form: web::Form<AcceptanceForm>,
) -> Result<HttpResponse, AppError> {
    csrf::validate_csrf(&session, &form.csrf_token)?;
    let (person_id, reviewer) = load_own(&pool, &session, path.into_inner()).await?;
    let accepted = match form.response.as_str() {
        "accept" => true,
        "conflict" => false,
        other => return Err(AppError::Upload(format!("Unknown response \"{other}\""))),
    };
    if !reviewer.reviewer_role().is_some_and(|r| r.needs_acceptance()) {
        return Err(AppError::InvalidTransition("this review does not need to be accepted".to_string()));
    }
    if reviewer.is_done() {
        return Err(AppError::InvalidTransition("the review has already been completed".to_string()));
    }

    review::set_acceptance(&pool, reviewer.id, person_id, accepted).await?;
    let _ = crate::audit::log(
        &pool,
        person_id,
        if accepted { "review.accepted" } else { "review.conflict" },
        "proposal",
        reviewer.proposal_id,
        serde_json::json!({ "reviewer_id": reviewer.id, "role": reviewer.role }),
    )
    .await;

    if accepted {
        set_flash(&session, "Thank you for accepting this review");
        Ok(redirect(format!("/reviews/{}", reviewer.id)))
    } else {
        set_flash(&session, format!("Conflict of interest recorded for {}", reviewer.proposal_code()));
        Ok(redirect("/reviews"))
    }
}

pub async fn save(
    pool: web::Data<PgPool>,
    config: web::Data<AppConfig>,
    session: Session,
    path: web::Path<i64>,
    form: web::Form<ReviewForm>,
) -> Result<HttpResponse, AppError> {
    csrf::validate_csrf(&session, &form.csrf_token)?;
    let (person_id, reviewer) = load_own(&pool, &session, path.into_inner()).await?;
    let role = reviewer.check_editable().map_err(AppError::InvalidTransition)?;

    let update = match validate_review(role, &form) {
        Ok(update) => update,
        Err(errors) => {
            let ctx = PageContext::build(&session, &config, "/reviews")?;
            let mut tmpl = edit_template(ctx, reviewer, errors);
            tmpl.text = form.text.clone();
            tmpl.rating = form.rating.clone();
            tmpl.weight = form.weight.clone();
            tmpl.assessments = assessment_options(&form.assessment);
            tmpl.done = form.done.is_some();
            return render(tmpl);
        }
    };

    review::save_review(&pool, reviewer.id, &update).await?;
    let _ = crate::audit::log(
        &pool,
        person_id,
        "review.saved",
        "proposal",
        reviewer.proposal_id,
        serde_json::json!({ "reviewer_id": reviewer.id, "role": role.code(), "done": update.done }),
    )
    .await;

    set_flash(&session, if update.done { "Review saved and marked complete" } else { "Review saved" });
    Ok(redirect(format!("/reviews/{}", reviewer.id)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn assessment_choices_start_blank() {
        let options = assessment_options("");
        assert_eq!(options.len(), Assessment::ALL.len() + 1);
        assert!(options[0].selected);

        let options = assessment_options("problem");
        assert!(options.iter().any(|o| o.selected && o.value == "problem"));
        assert!(!options[0].selected);
    }
}
