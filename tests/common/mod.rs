//! Shared fixtures for database tests.
//!
//! Tests run under `#[sqlx::test]`, which creates a fresh database per test
//! and applies `migrations/` before handing over the pool.

#![allow(dead_code)]

use chrono::{Duration, Utc};
use sqlx::PgPool;

use hedwig::auth::password;
use hedwig::models::affiliation::{self, Assignment};
use hedwig::models::call::{self, CallType, NewCall, TextLimits};
use hedwig::models::person::{self, NewPerson};
use hedwig::models::{queue, semester};

pub const TEST_PASSWORD: &str = "correct horse";

pub async fn create_person(pool: &PgPool, username: &str) -> i64 {
    person::create(
        pool,
        &NewPerson {
            username: username.to_string(),
            password: password::hash_password(TEST_PASSWORD).unwrap(),
            name: format!("{username} Observer"),
            email: format!("{username}@example.org"),
            institution: "Test Observatory".to_string(),
        },
    )
    .await
    .unwrap()
}

/// A queue with one standard, one shared and one excluded affiliation,
/// and a semester to hold calls.
pub struct Facility {
    pub semester_id: i64,
    pub queue_id: i64,
    pub standard: i64,
    pub shared: i64,
    pub excluded: i64,
}

pub async fn create_facility(pool: &PgPool) -> Facility {
    let now = Utc::now();
    let semester_id = semester::create(pool, "26B", "2026B", now - Duration::days(30), now + Duration::days(150))
        .await
        .unwrap();
    let queue_id = queue::create(pool, "P", "PI", "Principal investigator time").await.unwrap();
    let standard = affiliation::create(pool, queue_id, "Home", Assignment::Standard, 1.0, false).await.unwrap();
    let shared = affiliation::create(pool, queue_id, "Shared", Assignment::Shared, 1.0, false).await.unwrap();
    let excluded = affiliation::create(pool, queue_id, "Staff", Assignment::Excluded, 1.0, true).await.unwrap();
    Facility { semester_id, queue_id, standard, shared, excluded }
}

pub const LIMITS: TextLimits = TextLimits {
    abst_word_lim: 50,
    sci_word_lim: 200,
    sci_fig_lim: 2,
    sci_page_lim: 2,
    tech_word_lim: 100,
    tech_fig_lim: 1,
    tech_page_lim: 1,
    capt_word_lim: 20,
};

/// A call that opened ten days ago and closes in `closes_in_days`.
pub async fn create_call(pool: &PgPool, facility: &Facility, closes_in_days: i64) -> i64 {
    let now = Utc::now();
    call::create(
        pool,
        &NewCall {
            semester_id: facility.semester_id,
            queue_id: facility.queue_id,
            call_type: CallType::Standard,
            date_open: now - Duration::days(10),
            date_close: now + Duration::days(closes_in_days),
            limits: LIMITS,
            hidden: false,
        },
    )
    .await
    .unwrap()
}
