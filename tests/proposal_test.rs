//! Proposal lifecycle against a real database: numbering, membership rules,
//! state transitions and copying into a later call.

mod common;

use chrono::Utc;
use sqlx::PgPool;

use common::*;
use hedwig::astro::CoordSystem;
use hedwig::errors::AppError;
use hedwig::models::call;
use hedwig::models::proposal::{self, ProposalAction, ProposalState, validation};
use hedwig::models::target::{self, NewTarget};
use hedwig::models::text::{self, TextRole};
use hedwig::models::{member, prev_proposal};

fn target(name: &str) -> NewTarget {
    NewTarget {
        name: name.to_string(),
        system: Some(CoordSystem::Icrs),
        x: Some(148.97),
        y: Some(69.68),
        time: Some(2.5),
        priority: Some(1),
        note: String::new(),
    }
}

async fn number(pool: &PgPool, id: i64) -> i32 {
    proposal::find_by_id(pool, id).await.unwrap().unwrap().number
}

#[sqlx::test]
async fn numbers_are_allocated_per_call(pool: PgPool) {
    let facility = create_facility(&pool).await;
    let first_call = create_call(&pool, &facility, 5).await;
    let second_call = create_call(&pool, &facility, 20).await;
    let pi = create_person(&pool, "alice").await;

    let a = proposal::create(&pool, first_call, "Dust in M82", pi, Some(facility.standard)).await.unwrap();
    let b = proposal::create(&pool, first_call, "Winds in M82", pi, None).await.unwrap();
    let c = proposal::create(&pool, second_call, "Cold gas in M81", pi, None).await.unwrap();

    assert_eq!(number(&pool, a).await, 1);
    assert_eq!(number(&pool, b).await, 2);
    assert_eq!(number(&pool, c).await, 1);

    let p = proposal::find_by_id(&pool, a).await.unwrap().unwrap();
    assert_eq!(p.code(), "26BP001");
    assert_eq!(p.status(), ProposalState::Preparation);
}

#[sqlx::test]
async fn membership_keeps_one_pi(pool: PgPool) {
    let facility = create_facility(&pool).await;
    let call_id = create_call(&pool, &facility, 5).await;
    let alice = create_person(&pool, "alice").await;
    let bob = create_person(&pool, "bob").await;
    let id = proposal::create(&pool, call_id, "Dust in M82", alice, None).await.unwrap();

    let added = member::add(&pool, id, bob, Some(facility.shared), false, false).await.unwrap();
    assert!(added.is_ok());
    let again = member::add(&pool, id, bob, None, false, false).await.unwrap();
    assert!(again.is_err(), "a person can only be a member once");

    let members = member::find_for_proposal(&pool, id).await.unwrap();
    assert_eq!(members.len(), 2);
    let pi = members.iter().find(|m| m.pi).unwrap();
    assert_eq!(pi.person_id, alice);
    assert!(pi.editor);

    let removed = member::remove(&pool, id, pi.id).await.unwrap();
    assert!(removed.is_err(), "the PI cannot be removed");

    let access = member::find_access(&pool, id, bob).await.unwrap().unwrap();
    assert!(!access.editor);
    assert!(member::find_access(&pool, id, 9999).await.unwrap().is_none());
}

fn edit(m: &member::Member, pi: bool, editor: bool) -> member::MemberEdit {
    member::MemberEdit {
        member_id: m.id,
        affiliation_id: m.affiliation_id,
        sort_order: m.sort_order,
        pi,
        editor,
        observer: m.observer,
    }
}

#[sqlx::test]
async fn member_edits_are_checked_against_the_current_list(pool: PgPool) {
    let facility = create_facility(&pool).await;
    let call_id = create_call(&pool, &facility, 5).await;
    let alice = create_person(&pool, "alice").await;
    let bob = create_person(&pool, "bob").await;
    let carol = create_person(&pool, "carol").await;
    let id = proposal::create(&pool, call_id, "Dust in M82", alice, None).await.unwrap();
    member::add(&pool, id, bob, None, false, false).await.unwrap().unwrap();

    let members = member::find_for_proposal(&pool, id).await.unwrap();
    let (a, b) = (&members[0], &members[1]);

    // Dropping the only editor flag is refused and nothing changes.
    let no_editor = member::update_all(&pool, id, &[edit(a, true, false), edit(b, false, false)]).await.unwrap();
    assert_eq!(no_editor.unwrap_err(), vec!["At least one member must be an editor"]);
    assert!(member::find_access(&pool, id, alice).await.unwrap().unwrap().editor);

    // A form built before another member was added is stale.
    let form = [edit(a, false, false), edit(b, true, true)];
    member::add(&pool, id, carol, None, false, false).await.unwrap().unwrap();
    let stale = member::update_all(&pool, id, &form).await.unwrap();
    assert!(stale.is_err());
    assert!(member::find_access(&pool, id, alice).await.unwrap().unwrap().pi);

    // The same change against the fresh list goes through.
    let members = member::find_for_proposal(&pool, id).await.unwrap();
    let fresh: Vec<_> = members.iter().map(|m| edit(m, m.person_id == bob, m.person_id == bob)).collect();
    assert!(member::update_all(&pool, id, &fresh).await.unwrap().is_ok());
    let bob_access = member::find_access(&pool, id, bob).await.unwrap().unwrap();
    assert!(bob_access.pi && bob_access.editor);

    // Alice is no longer needed as editor, so she can now leave.
    let alice_row = members.iter().find(|m| m.person_id == alice).unwrap();
    assert!(member::remove(&pool, id, alice_row.id).await.unwrap().is_ok());

    assert!(matches!(member::remove(&pool, 9999, alice_row.id).await, Err(AppError::NotFound)));
}

#[sqlx::test]
async fn submit_withdraw_and_stale_updates(pool: PgPool) {
    let facility = create_facility(&pool).await;
    let call_id = create_call(&pool, &facility, 5).await;
    let alice = create_person(&pool, "alice").await;
    let id = proposal::create(&pool, call_id, "Dust in M82", alice, None).await.unwrap();
    let call = call::find_by_id(&pool, call_id).await.unwrap().unwrap();

    let p = proposal::find_by_id(&pool, id).await.unwrap().unwrap();
    let snapshot = proposal::load_snapshot(&pool, &p, &call, Utc::now()).await.unwrap();
    let messages = validation::validate(&snapshot);
    assert!(validation::has_errors(&messages));
    assert!(messages.iter().any(|m| m.section == "Abstract" && m.is_error));

    text::save_plain(&pool, id, TextRole::Abstract, "We map dust in the starburst galaxy M82.", alice)
        .await
        .unwrap();
    target::create(&pool, id, &target("M82")).await.unwrap();
    let snapshot = proposal::load_snapshot(&pool, &p, &call, Utc::now()).await.unwrap();
    assert_eq!(snapshot.abstract_words, 8);
    assert_eq!(snapshot.targets.len(), 1);
    assert!(!validation::validate(&snapshot).iter().any(|m| m.section == "Abstract"));

    let state = proposal::apply_action(&pool, &p, ProposalAction::Submit).await.unwrap();
    assert_eq!(state, ProposalState::Submitted);
    let submitted = proposal::find_by_id(&pool, id).await.unwrap().unwrap();
    assert!(submitted.submitted_at.is_some());

    // `p` still says preparation, so a second submit based on it must not apply.
    let stale = proposal::apply_action(&pool, &p, ProposalAction::Submit).await;
    assert!(matches!(stale, Err(AppError::InvalidTransition(_))));

    let state = proposal::apply_action(&pool, &submitted, ProposalAction::Withdraw).await.unwrap();
    assert_eq!(state, ProposalState::Withdrawn);
}

#[sqlx::test]
async fn closing_a_call_moves_every_proposal(pool: PgPool) {
    let facility = create_facility(&pool).await;
    let call_id = create_call(&pool, &facility, 5).await;
    let alice = create_person(&pool, "alice").await;
    let ready = proposal::create(&pool, call_id, "Ready", alice, None).await.unwrap();
    let draft = proposal::create(&pool, call_id, "Draft", alice, None).await.unwrap();
    let p = proposal::find_by_id(&pool, ready).await.unwrap().unwrap();
    proposal::apply_action(&pool, &p, ProposalAction::Submit).await.unwrap();

    // An intermediate close only takes the submitted proposals.
    let moves = proposal::apply_action_to_call(&pool, call_id, ProposalAction::CloseCall, Some(&[ProposalState::Submitted][..]))
        .await
        .unwrap();
    assert_eq!(moves, vec![(ProposalState::Submitted, ProposalState::Review, 1)]);
    assert_eq!(proposal::ids_in_state(&pool, call_id, ProposalState::Preparation).await.unwrap(), vec![draft]);

    let moves = proposal::apply_action_to_call(&pool, call_id, ProposalAction::CloseCall, None).await.unwrap();
    assert_eq!(moves, vec![(ProposalState::Preparation, ProposalState::Abandoned, 1)]);

    proposal::apply_action_to_call(&pool, call_id, ProposalAction::AdvanceToFinal, None).await.unwrap();
    assert_eq!(proposal::ids_in_state(&pool, call_id, ProposalState::FinalReview).await.unwrap(), vec![ready]);
}

#[sqlx::test]
async fn copy_carries_content_into_the_new_call(pool: PgPool) {
    let facility = create_facility(&pool).await;
    let old_call = create_call(&pool, &facility, 5).await;
    let new_call = create_call(&pool, &facility, 40).await;
    let alice = create_person(&pool, "alice").await;
    let id = proposal::create(&pool, old_call, "Dust in M82", alice, Some(facility.standard)).await.unwrap();
    text::save_plain(&pool, id, TextRole::ScienceCase, "Dust traces the outflow.", alice).await.unwrap();
    target::create(&pool, id, &target("M82")).await.unwrap();
    target::create(&pool, id, &target("M82 wind")).await.unwrap();

    let source = proposal::find_by_id(&pool, id).await.unwrap().unwrap();
    let copy_id = proposal::copy_to_call(&pool, &source, new_call).await.unwrap();
    let copy = proposal::find_by_id(&pool, copy_id).await.unwrap().unwrap();

    assert_eq!(copy.call_id, new_call);
    assert_eq!(copy.title, "Dust in M82");
    assert_eq!(copy.status(), ProposalState::Preparation);

    let names: Vec<String> = target::find_for_proposal(&pool, copy_id).await.unwrap().into_iter().map(|t| t.name).collect();
    assert_eq!(names, vec!["M82", "M82 wind"]);

    let science = text::find(&pool, copy_id, TextRole::ScienceCase).await.unwrap().unwrap();
    assert_eq!(science.words, 4);

    let members = member::find_for_proposal(&pool, copy_id).await.unwrap();
    assert_eq!(members.len(), 1);
    assert_eq!(members[0].affiliation_id, Some(facility.standard));

    let previous = prev_proposal::find_for_proposal(&pool, copy_id).await.unwrap();
    assert_eq!(previous.len(), 1);
    assert_eq!(previous[0].prev.proposal_code, source.code());
    assert!(previous[0].prev.continuation);
}
