//! Reviewer assignment, reviews and decisions through to finalizing a call.

mod common;

use sqlx::PgPool;

use common::*;
use hedwig::models::decision::{self, Decision};
use hedwig::models::message;
use hedwig::models::proposal::{self, ProposalAction, ProposalState};
use hedwig::models::review::{self, GridCell, ReviewUpdate, ReviewerRole};

/// A call with two proposals already advanced to final review.
async fn in_final_review(pool: &PgPool) -> (i64, i64, i64) {
    let facility = create_facility(pool).await;
    let call_id = create_call(pool, &facility, 5).await;
    let pi = create_person(pool, "alice").await;
    let mut ids = Vec::new();
    for title in ["Dust in M82", "Winds in NGC 253"] {
        let id = proposal::create(pool, call_id, title, pi, Some(facility.standard)).await.unwrap();
        let p = proposal::find_by_id(pool, id).await.unwrap().unwrap();
        proposal::apply_action(pool, &p, ProposalAction::Submit).await.unwrap();
        ids.push(id);
    }
    proposal::apply_action_to_call(pool, call_id, ProposalAction::CloseCall, None).await.unwrap();
    proposal::apply_action_to_call(pool, call_id, ProposalAction::AdvanceToFinal, None).await.unwrap();
    (call_id, ids[0], ids[1])
}

async fn state_of(pool: &PgPool, id: i64) -> ProposalState {
    proposal::find_by_id(pool, id).await.unwrap().unwrap().status()
}

fn done(rating: i32, weight: i32) -> ReviewUpdate {
    ReviewUpdate { text: "Well motivated.".to_string(), assessment: None, rating: Some(rating), weight: Some(weight), done: true }
}

#[sqlx::test]
async fn grid_keeps_unchanged_reviewers(pool: PgPool) {
    let (_call_id, first, _second) = in_final_review(&pool).await;
    let carol = create_person(&pool, "carol").await;
    let dave = create_person(&pool, "dave").await;

    let cells = [GridCell { proposal_id: first, role: ReviewerRole::CommitteePrimary, person_id: Some(carol) }];
    let added = review::set_grid(&pool, &cells).await.unwrap();
    assert_eq!(added.len(), 1);
    let (carol_reviewer, _) = added[0];

    // Saving the same grid again assigns nobody new.
    assert!(review::set_grid(&pool, &cells).await.unwrap().is_empty());

    let cells = [GridCell { proposal_id: first, role: ReviewerRole::CommitteePrimary, person_id: Some(dave) }];
    let added = review::set_grid(&pool, &cells).await.unwrap();
    assert_eq!(added.iter().map(|(_, p)| *p).collect::<Vec<_>>(), vec![dave]);
    assert!(review::find_by_id(&pool, carol_reviewer).await.unwrap().is_none());

    let cells = [GridCell { proposal_id: first, role: ReviewerRole::CommitteePrimary, person_id: None }];
    review::set_grid(&pool, &cells).await.unwrap();
    assert!(review::find_for_proposal(&pool, first).await.unwrap().is_empty());
}

#[sqlx::test]
async fn only_done_reviews_carry_ratings(pool: PgPool) {
    let (call_id, first, second) = in_final_review(&pool).await;
    let carol = create_person(&pool, "carol").await;
    let dave = create_person(&pool, "dave").await;

    let r1 = review::assign(&pool, first, carol, ReviewerRole::External).await.unwrap();
    let r2 = review::assign(&pool, second, dave, ReviewerRole::External).await.unwrap();
    assert!(review::is_assigned(&pool, first, carol, ReviewerRole::External).await.unwrap());

    // Only the assigned person can answer the invitation.
    assert!(review::set_acceptance(&pool, r1, dave, true).await.is_err());
    review::set_acceptance(&pool, r1, carol, true).await.unwrap();
    review::set_acceptance(&pool, r2, dave, false).await.unwrap();
    assert!(!review::is_reviewer(&pool, second, dave).await.unwrap());

    review::save_review(&pool, r1, &ReviewUpdate { done: false, ..done(80, 60) }).await.unwrap();
    assert!(review::find_ratings_for_call(&pool, call_id).await.unwrap().is_empty());
    assert_eq!(review::find_outstanding_for_call(&pool, call_id).await.unwrap().len(), 1);

    review::save_review(&pool, r1, &done(80, 60)).await.unwrap();
    let ratings = review::find_ratings_for_call(&pool, call_id).await.unwrap();
    assert_eq!(ratings.len(), 1);
    assert_eq!(ratings[0].proposal_id, first);
    assert_eq!(ratings[0].rating, Some(80));
    assert!(review::find_outstanding_for_call(&pool, call_id).await.unwrap().is_empty());

    let mine = review::find_for_person(&pool, carol).await.unwrap();
    assert_eq!(mine.len(), 1);
    assert!(mine[0].is_done());
}

#[sqlx::test]
async fn finalize_uses_ready_decisions_only(pool: PgPool) {
    let (call_id, first, second) = in_final_review(&pool).await;

    decision::save(&pool, &Decision { proposal_id: first, accept: Some(true), ready: true, ..Decision::default() })
        .await
        .unwrap();
    decision::save(&pool, &Decision { proposal_id: second, accept: Some(false), ready: false, ..Decision::default() })
        .await
        .unwrap();
    assert_eq!(decision::find_for_call(&pool, call_id).await.unwrap().len(), 2);

    let summary = decision::finalize_call(&pool, call_id).await.unwrap();
    assert_eq!(summary.accepted, vec![first]);
    assert!(summary.rejected.is_empty());
    assert_eq!(summary.not_ready, 1);

    assert_eq!(state_of(&pool, first).await, ProposalState::Accepted);
    assert_eq!(state_of(&pool, second).await, ProposalState::FinalReview);

    decision::save(&pool, &Decision { proposal_id: second, accept: Some(false), ready: true, ..Decision::default() })
        .await
        .unwrap();
    let summary = decision::finalize_call(&pool, call_id).await.unwrap();
    assert_eq!(summary.rejected, vec![second]);
    assert_eq!(state_of(&pool, second).await, ProposalState::Rejected);
}

#[sqlx::test]
async fn messages_queue_until_marked_sent(pool: PgPool) {
    let alice = create_person(&pool, "alice").await;
    let bob = create_person(&pool, "bob").await;

    let id = message::queue(&pool, "Proposal submitted", "Thank you.", &[alice, bob]).await.unwrap();
    let unsent = message::find_recent(&pool, true, 10).await.unwrap();
    assert_eq!(unsent.len(), 1);
    assert!(!unsent[0].is_sent());
    assert!(unsent[0].recipients.contains("alice"));

    message::mark_sent(&pool, id).await.unwrap();
    assert!(message::find_recent(&pool, true, 10).await.unwrap().is_empty());
    let all = message::find_recent(&pool, false, 10).await.unwrap();
    assert!(all[0].is_sent());
}
