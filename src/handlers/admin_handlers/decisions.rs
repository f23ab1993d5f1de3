//! Final decisions for a call and notifying proposers of the outcome.

use std::collections::HashMap;

use actix_session::Session;
use actix_web::{HttpResponse, web};
use sqlx::PgPool;

use crate::auth::csrf;
use crate::auth::session::{require_person_id, set_flash};
use crate::config::AppConfig;
use crate::errors::{AppError, redirect, render};
use crate::handlers::auth_handlers::CsrfOnly;
use crate::models::call;
use crate::models::decision::{self, Decision, DecisionForm};
use crate::models::proposal::{self, ProposalListItem, ProposalState};
use crate::models::review::{self, ReviewerInfo, ReviewerRole};
use crate::models::member;
use crate::notify::{self, DecisionFeedback};
use crate::templates_structs::{DecisionRow, DecisionsTemplate, PageContext};

use super::tabulation::{rating_display, ratings_by_proposal, tabulated};

fn build_rows(
    proposals: &[ProposalListItem],
    decisions: &HashMap<i64, Decision>,
    ratings: &HashMap<i64, String>,
) -> Vec<DecisionRow> {
    proposals
        .iter()
        .filter(|p| tabulated(p) && ProposalState::from_code(&p.state) != Some(ProposalState::Submitted))
        .map(|p| DecisionRow {
            proposal_id: p.id,
            code: p.code(),
            title: p.title.clone(),
            state_label: p.state_label(),
            rating: ratings.get(&p.id).cloned().unwrap_or_default(),
            decision: decisions
                .get(&p.id)
                .cloned()
                .unwrap_or(Decision { proposal_id: p.id, ..Decision::default() }),
            editable: ProposalState::from_code(&p.state) == Some(ProposalState::FinalReview),
        })
        .collect()
}

pub async fn page(
    pool: web::Data<PgPool>,
    config: web::Data<AppConfig>,
    session: Session,
    path: web::Path<i64>,
) -> Result<HttpResponse, AppError> {
    let call = call::find_by_id(&pool, path.into_inner()).await?.ok_or(AppError::NotFound)?;
    let proposals = proposal::find_for_call(&pool, call.id).await?;
    let decisions: HashMap<i64, Decision> =
        decision::find_for_call(&pool, call.id).await?.into_iter().map(|d| (d.proposal_id, d)).collect();
    let ratings: HashMap<i64, String> = ratings_by_proposal(&review::find_ratings_for_call(&pool, call.id).await?)
        .iter()
        .map(|(id, s)| (*id, rating_display(Some(s))))
        .collect();

    let rows = build_rows(&proposals, &decisions, &ratings);
    let ready_count = rows.iter().filter(|r| r.editable && r.decision.finalizable().is_some()).count();
    let ctx = PageContext::build(&session, &config, "/admin")?;
    render(DecisionsTemplate { ctx, call, rows, ready_count })
}

/// Save the decision for one proposal in final review.
pub async fn save(
    pool: web::Data<PgPool>,
    session: Session,
    path: web::Path<i64>,
    form: web::Form<DecisionForm>,
) -> Result<HttpResponse, AppError> {
    csrf::validate_csrf(&session, &form.csrf_token)?;
    let person_id = require_person_id(&session)?;
    let proposal = proposal::find_by_id(&pool, path.into_inner()).await?.ok_or(AppError::NotFound)?;
    let back = format!("/admin/calls/{}/decisions", proposal.call_id);

    if proposal.status() != ProposalState::FinalReview {
        set_flash(&session, format!("Proposal {} is not in final review", proposal.code()));
        return Ok(redirect(back));
    }
    let decision = match form.to_decision(proposal.id) {
        Ok(d) => d,
        Err(msg) => {
            set_flash(&session, format!("{}: {msg}", proposal.code()));
            return Ok(redirect(back));
        }
    };
    decision::save(&pool, &decision).await?;

    let _ = crate::audit::log(
        &pool,
        person_id,
        "decision.saved",
        "proposal",
        proposal.id,
        serde_json::json!({ "accept": decision.accept, "ready": decision.ready, "exempt": decision.exempt }),
    )
    .await;
    set_flash(&session, format!("Decision saved for {}", proposal.code()));
    Ok(redirect(back))
}

/// Text of the completed feedback review, if any.
fn feedback_text(reviewers: &[ReviewerInfo]) -> &str {
    reviewers
        .iter()
        .find(|r| r.reviewer_role() == Some(ReviewerRole::Feedback) && r.is_done())
        .map(|r| r.text_display())
        .unwrap_or("")
}

async fn send_feedback(pool: &PgPool, config: &AppConfig, proposal_id: i64, accepted: bool) -> Result<(), AppError> {
    let Some(proposal) = proposal::find_by_id(pool, proposal_id).await? else {
        return Ok(());
    };
    let reviewers = review::find_for_proposal(pool, proposal_id).await?;
    let decision = decision::find(pool, proposal_id).await?;
    let code = proposal.code();
    let body = DecisionFeedback {
        app_name: &config.app_name,
        code: &code,
        title: &proposal.title,
        accepted,
        feedback: feedback_text(&reviewers),
        note: &decision.note,
    };
    let recipients = member::person_ids(pool, proposal_id).await?;
    notify::send(pool, &format!("Proposal {code} review outcome"), &body, &recipients).await?;
    Ok(())
}

/// Accept or reject every proposal with a ready decision, then tell the members.
pub async fn finalize(
    pool: web::Data<PgPool>,
    config: web::Data<AppConfig>,
    session: Session,
    path: web::Path<i64>,
    form: web::Form<CsrfOnly>,
) -> Result<HttpResponse, AppError> {
    csrf::validate_csrf(&session, &form.csrf_token)?;
    let person_id = require_person_id(&session)?;
    let call = call::find_by_id(&pool, path.into_inner()).await?.ok_or(AppError::NotFound)?;

    let summary = decision::finalize_call(&pool, call.id).await?;
    let outcomes = summary.accepted.iter().map(|id| (*id, true)).chain(summary.rejected.iter().map(|id| (*id, false)));
    for (proposal_id, accepted) in outcomes {
        if let Err(e) = send_feedback(&pool, &config, proposal_id, accepted).await {
            log::error!("Could not queue decision feedback for proposal {proposal_id}: {e}");
        }
    }

    let _ = crate::audit::log(
        &pool,
        person_id,
        "call.finalized",
        "call",
        call.id,
        serde_json::json!({
            "accepted": summary.accepted.len(),
            "rejected": summary.rejected.len(),
            "not_ready": summary.not_ready,
        }),
    )
    .await;
    set_flash(
        &session,
        format!(
            "{} accepted, {} rejected, {} not ready",
            summary.accepted.len(),
            summary.rejected.len(),
            summary.not_ready
        ),
    );
    Ok(redirect(format!("/admin/calls/{}/decisions", call.id)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(id: i64, state: ProposalState) -> ProposalListItem {
        ProposalListItem {
            id,
            number: id as i32,
            title: "T".into(),
            state: state.code().into(),
            semester_code: "26B".into(),
            semester_name: "2026B".into(),
            queue_code: "P".into(),
            queue_name: "PI".into(),
            pi_name: None,
            is_pi: false,
            is_editor: false,
        }
    }

    #[test]
    fn only_final_review_is_editable() {
        let proposals = vec![
            item(1, ProposalState::Submitted),
            item(2, ProposalState::Review),
            item(3, ProposalState::FinalReview),
            item(4, ProposalState::Accepted),
            item(5, ProposalState::Withdrawn),
        ];
        let decisions = HashMap::from([(
            3,
            Decision { proposal_id: 3, accept: Some(true), exempt: false, ready: true, note: String::new() },
        )]);
        let ratings = HashMap::from([(3, "72.5".to_string())]);
        let rows = build_rows(&proposals, &decisions, &ratings);

        let ids: Vec<i64> = rows.iter().map(|r| r.proposal_id).collect();
        assert_eq!(ids, vec![2, 3, 4]);
        assert!(!rows[0].editable && rows[1].editable && !rows[2].editable);
        assert_eq!(rows[1].rating, "72.5");
        assert_eq!(rows[1].decision.accept_label(), "Accept");
        assert_eq!(rows[0].decision.accept_label(), "Undecided");
    }
}
