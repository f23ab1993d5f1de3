//! Request-level tests: the full route table behind the session middleware.

mod common;

use actix_session::{SessionMiddleware, storage::CookieSessionStore};
use actix_web::cookie::{Cookie, Key};
use actix_web::http::{StatusCode, header};
use actix_web::{App, test, web};
use regex::Regex;
use sqlx::PgPool;

use common::*;
use hedwig::auth::rate_limit::RateLimiter;
use hedwig::config::AppConfig;
use hedwig::jobs::JobsState;
use hedwig::routes;

fn config() -> AppConfig {
    AppConfig {
        database_url: String::new(),
        bind_addr: "127.0.0.1:0".to_string(),
        session_key: None,
        admin_password: "unused".to_string(),
        app_name: "Hedwig".to_string(),
        pdf_dir: std::env::temp_dir(),
        font_dir: "fonts".into(),
        max_upload_bytes: 1024 * 1024,
        process_interval_secs: 30,
        job_ttl_secs: 3600,
    }
}

macro_rules! test_app {
    ($pool:expr) => {{
        let (jobs, _updates) = JobsState::new(8);
        test::init_service(
            App::new()
                .wrap(
                    SessionMiddleware::builder(CookieSessionStore::default(), Key::generate())
                        .cookie_secure(false)
                        .build(),
                )
                .app_data(web::Data::new($pool.clone()))
                .app_data(web::Data::new(config()))
                .app_data(web::Data::new(jobs))
                .app_data(web::Data::new(RateLimiter::for_login()))
                .configure(routes::configure),
        )
        .await
    }};
}

fn csrf_token(body: &str) -> String {
    let re = Regex::new(r#"name="csrf_token" value="([^"]+)""#).unwrap();
    re.captures(body).expect("page carries a CSRF token")[1].to_string()
}

fn session_cookie<B>(resp: &actix_web::dev::ServiceResponse<B>) -> Cookie<'static> {
    resp.response().cookies().next().expect("session cookie").into_owned()
}

fn location<B>(resp: &actix_web::dev::ServiceResponse<B>) -> &str {
    resp.headers().get(header::LOCATION).and_then(|v| v.to_str().ok()).unwrap_or("")
}

#[sqlx::test]
async fn login_page_renders(pool: PgPool) {
    let app = test_app!(pool);
    let resp = test::call_service(&app, test::TestRequest::get().uri("/login").to_request()).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body = String::from_utf8(test::read_body(resp).await.to_vec()).unwrap();
    assert!(body.contains("Hedwig"));
    assert!(!csrf_token(&body).is_empty());
}

#[sqlx::test]
async fn protected_pages_redirect_to_login(pool: PgPool) {
    let app = test_app!(pool);
    for uri in ["/dashboard", "/proposals/1", "/admin", "/api/people?q=al"] {
        let resp = test::call_service(&app, test::TestRequest::get().uri(uri).to_request()).await;
        assert_eq!(resp.status(), StatusCode::SEE_OTHER, "{uri}");
        assert_eq!(location(&resp), "/login", "{uri}");
    }
}

#[sqlx::test]
async fn login_needs_the_csrf_token(pool: PgPool) {
    create_person(&pool, "alice").await;
    let app = test_app!(pool);
    let req = test::TestRequest::post()
        .uri("/login")
        .set_form([("username", "alice"), ("password", TEST_PASSWORD), ("csrf_token", "forged")])
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
}

/// Fetch the login form, then post the credentials with its token and cookie.
macro_rules! log_in {
    ($app:expr, $username:expr, $password:expr) => {{
        let resp = test::call_service(&$app, test::TestRequest::get().uri("/login").to_request()).await;
        let cookie = session_cookie(&resp);
        let body = String::from_utf8(test::read_body(resp).await.to_vec()).unwrap();
        let token = csrf_token(&body);
        let req = test::TestRequest::post()
            .uri("/login")
            .cookie(cookie)
            .set_form([("username", $username), ("password", $password), ("csrf_token", token.as_str())])
            .to_request();
        test::call_service(&$app, req).await
    }};
}

#[sqlx::test]
async fn people_log_in_but_only_admins_administer(pool: PgPool) {
    create_person(&pool, "alice").await;
    let app = test_app!(pool);

    let resp = log_in!(app, "alice", TEST_PASSWORD);
    assert_eq!(resp.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&resp), "/dashboard");
    let cookie = session_cookie(&resp);

    let req = test::TestRequest::get().uri("/dashboard").cookie(cookie.clone()).to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);

    let req = test::TestRequest::get().uri("/admin").cookie(cookie.clone()).to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);

    let req = test::TestRequest::get().uri("/no/such/page").cookie(cookie.clone()).to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    let req = test::TestRequest::get().uri("/api/people?q=a").cookie(cookie.clone()).to_request();
    let found: Vec<serde_json::Value> = test::call_and_read_body_json(&app, req).await;
    assert!(found.is_empty(), "single characters do not search");

    let req = test::TestRequest::get().uri("/api/people?q=ali").cookie(cookie).to_request();
    let found: Vec<serde_json::Value> = test::call_and_read_body_json(&app, req).await;
    assert_eq!(found.len(), 1);
    assert_eq!(found[0]["username"], "alice");
}

#[sqlx::test]
async fn wrong_password_shows_the_form_again(pool: PgPool) {
    create_person(&pool, "alice").await;
    let app = test_app!(pool);

    let resp = log_in!(app, "alice", "not the password");
    assert_eq!(resp.status(), StatusCode::OK);
    let body = String::from_utf8(test::read_body(resp).await.to_vec()).unwrap();
    assert!(body.contains("Invalid username or password"));
}

#[sqlx::test]
async fn member_search_offers_people_not_yet_on_the_proposal(pool: PgPool) {
    let facility = create_facility(&pool).await;
    let call_id = create_call(&pool, &facility, 5).await;
    let alice = create_person(&pool, "alice").await;
    create_person(&pool, "bob").await;
    let id = hedwig::models::proposal::create(&pool, call_id, "Dust in M82", alice, None).await.unwrap();
    let app = test_app!(pool);

    let resp = log_in!(app, "alice", TEST_PASSWORD);
    let cookie = session_cookie(&resp);

    let req = test::TestRequest::get().uri(&format!("/proposals/{id}/members?q=o")).cookie(cookie.clone()).to_request();
    let body = String::from_utf8(test::call_and_read_body(&app, req).await.to_vec()).unwrap();
    assert!(body.contains("at least two characters"));

    let req = test::TestRequest::get().uri(&format!("/proposals/{id}/members?q=observer")).cookie(cookie).to_request();
    let body = String::from_utf8(test::call_and_read_body(&app, req).await.to_vec()).unwrap();
    assert!(body.contains("bob Observer (bob, Test Observatory)"));
    assert!(!body.contains("alice Observer (alice"), "existing members are not offered");
}
