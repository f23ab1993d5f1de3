//! Coverage maps stored in the database and the targets checked against them.

mod common;

use sqlx::PgPool;

use common::*;
use hedwig::astro::{CoordSystem, Moc};
use hedwig::models::moc;
use hedwig::models::proposal::{self, ProposalAction};
use hedwig::models::target::{self, NewTarget};

#[sqlx::test]
async fn saving_by_name_replaces_the_cells(pool: PgPool) {
    let whole_sky = Moc::parse("0/0-11").unwrap();
    let id = moc::save(&pool, "Survey", "Whole sky", false, &whole_sky).await.unwrap();

    let loaded = moc::load(&pool, id).await.unwrap();
    assert_eq!(loaded.num_cells(), 12);
    assert!(loaded.contains(10.68, 41.27));

    let single = Moc::parse("1/0").unwrap();
    let again = moc::save(&pool, "Survey", "One cell", true, &single).await.unwrap();
    assert_eq!(again, id);

    let all = moc::find_all(&pool, true).await.unwrap();
    assert_eq!(all.len(), 1);
    assert_eq!(all[0].num_cells, 1);
    assert_eq!(all[0].description, "One cell");
    assert_eq!(moc::load(&pool, id).await.unwrap().num_cells(), 1);
}

#[sqlx::test]
async fn deep_ranges_are_stored_as_ranges(pool: PgPool) {
    let deep = Moc::parse("11/0-50331647 29/5-4000000000000").unwrap();
    let id = moc::save(&pool, "Deep", "", true, &deep).await.unwrap();

    let rows: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM moc_range WHERE moc_id = $1")
        .bind(id)
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(rows, 1);

    let loaded = moc::load(&pool, id).await.unwrap();
    assert_eq!(loaded, deep);
    assert!(loaded.contains(200.0, -60.0));
    assert_eq!(moc::find_all(&pool, false).await.unwrap()[0].num_cells, 12);
}

#[sqlx::test]
async fn private_maps_are_listed_only_on_request(pool: PgPool) {
    let whole_sky = Moc::parse("0/0-11").unwrap();
    moc::save(&pool, "Public", "", true, &whole_sky).await.unwrap();
    let private = moc::save(&pool, "Private", "", false, &whole_sky).await.unwrap();

    assert_eq!(moc::find_all(&pool, false).await.unwrap().len(), 1);
    assert_eq!(moc::find_all(&pool, true).await.unwrap().len(), 2);

    moc::delete(&pool, private).await.unwrap();
    assert!(moc::delete(&pool, private).await.is_err());
}

#[sqlx::test]
async fn call_targets_exclude_proposals_in_preparation(pool: PgPool) {
    let facility = create_facility(&pool).await;
    let call_id = create_call(&pool, &facility, 5).await;
    let alice = create_person(&pool, "alice").await;
    let submitted = proposal::create(&pool, call_id, "Submitted", alice, None).await.unwrap();
    let draft = proposal::create(&pool, call_id, "Draft", alice, None).await.unwrap();

    for id in [submitted, draft] {
        let t = NewTarget {
            name: "M31".to_string(),
            system: Some(CoordSystem::Icrs),
            x: Some(10.68),
            y: Some(41.27),
            time: Some(1.0),
            priority: None,
            note: String::new(),
        };
        target::create(&pool, id, &t).await.unwrap();
    }
    let p = proposal::find_by_id(&pool, submitted).await.unwrap().unwrap();
    proposal::apply_action(&pool, &p, ProposalAction::Submit).await.unwrap();

    let targets = target::find_for_call(&pool, call_id).await.unwrap();
    assert_eq!(targets.len(), 1);
    assert_eq!(targets[0].proposal_id, submitted);
}
