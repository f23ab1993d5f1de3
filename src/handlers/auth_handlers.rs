use actix_session::Session;
use actix_web::{HttpRequest, HttpResponse, web};
use serde::Deserialize;
use sqlx::PgPool;

use crate::auth::session::{self, get_person_id};
use crate::auth::validate::{validate_email, validate_password, validate_required, validate_username};
use crate::auth::{csrf, password, rate_limit::RateLimiter};
use crate::config::AppConfig;
use crate::errors::{AppError, redirect, render};
use crate::models::person::{self, NewPerson, RegisterForm};
use crate::models::permission;
use crate::templates_structs::{LoginTemplate, RegisterTemplate};

#[derive(Deserialize)]
pub struct LoginForm {
    pub username: String,
    pub password: String,
    pub csrf_token: String,
}

#[derive(Deserialize)]
pub struct CsrfOnly {
    pub csrf_token: String,
}

fn login_template(session: &Session, config: &AppConfig, error: Option<&str>) -> LoginTemplate {
    LoginTemplate {
        error: error.map(String::from),
        app_name: config.app_name.clone(),
        csrf_token: csrf::get_or_create_token(session),
    }
}

pub async fn login_page(
    config: web::Data<AppConfig>,
    session: Session,
) -> Result<HttpResponse, AppError> {
    if get_person_id(&session).is_some() {
        return Ok(redirect("/dashboard"));
    }
    render(login_template(&session, &config, None))
}

pub async fn login_submit(
    req: HttpRequest,
    pool: web::Data<PgPool>,
    config: web::Data<AppConfig>,
    session: Session,
    form: web::Form<LoginForm>,
    limiter: web::Data<RateLimiter>,
) -> Result<HttpResponse, AppError> {
    csrf::validate_csrf(&session, &form.csrf_token)?;

    // Rate-limit check before any database access
    let ip = req
        .peer_addr()
        .map(|addr| addr.ip())
        .unwrap_or(std::net::IpAddr::V4(std::net::Ipv4Addr::UNSPECIFIED));

    if limiter.is_blocked(ip) {
        log::warn!("Login blocked for {ip}: too many failures");
        return render(login_template(
            &session,
            &config,
            Some("Too many failed login attempts. Please try again later."),
        ));
    }

    let found = person::find_by_username(&pool, &form.username).await?;
    let verified = match &found {
        Some(p) => password::verify_password(&form.password, &p.password).unwrap_or(false),
        None => false,
    };

    match found {
        Some(p) if verified => {
            limiter.clear(ip);
            session::log_in(&session, p.id, &p.username, &permission::codes_for(p.admin));
            let _ = crate::audit::log(&pool, p.id, "person.login", "person", p.id, serde_json::json!({})).await;
            log::info!("{} logged in", p.username);
            Ok(redirect("/dashboard"))
        }
        _ => {
            limiter.record_failure(ip);
            render(login_template(&session, &config, Some("Invalid username or password")))
        }
    }
}

pub async fn register_page(
    config: web::Data<AppConfig>,
    session: Session,
) -> Result<HttpResponse, AppError> {
    if get_person_id(&session).is_some() {
        return Ok(redirect("/dashboard"));
    }
    render(RegisterTemplate {
        app_name: config.app_name.clone(),
        csrf_token: csrf::get_or_create_token(&session),
        errors: vec![],
        username: String::new(),
        name: String::new(),
        email: String::new(),
        institution: String::new(),
    })
}

pub async fn register_submit(
    pool: web::Data<PgPool>,
    config: web::Data<AppConfig>,
    session: Session,
    form: web::Form<RegisterForm>,
) -> Result<HttpResponse, AppError> {
    csrf::validate_csrf(&session, &form.csrf_token)?;

    let mut errors: Vec<String> = [
        validate_username(&form.username),
        validate_password(&form.password),
        validate_required(&form.name, "Name", 200),
        validate_email(&form.email),
    ]
    .into_iter()
    .flatten()
    .collect();
    if errors.is_empty() && person::username_exists(&pool, &form.username).await? {
        errors.push("That username is already taken".to_string());
    }

    if !errors.is_empty() {
        return render(RegisterTemplate {
            app_name: config.app_name.clone(),
            csrf_token: csrf::get_or_create_token(&session),
            errors,
            username: form.username.clone(),
            name: form.name.clone(),
            email: form.email.clone(),
            institution: form.institution.clone(),
        });
    }

    let new = NewPerson {
        username: form.username.trim().to_string(),
        password: password::hash_password(&form.password)?,
        name: form.name.trim().to_string(),
        email: form.email.trim().to_string(),
        institution: form.institution.trim().to_string(),
    };
    let person_id = person::create(&pool, &new).await?;
    let _ = crate::audit::log(
        &pool,
        person_id,
        "person.registered",
        "person",
        person_id,
        serde_json::json!({ "username": new.username }),
    )
    .await;

    session::log_in(&session, person_id, &new.username, &permission::codes_for(false));
    session::set_flash(&session, "Welcome! Your account has been created.");
    Ok(redirect("/dashboard"))
}

pub async fn logout(
    session: Session,
    form: web::Form<CsrfOnly>,
) -> Result<HttpResponse, AppError> {
    csrf::validate_csrf(&session, &form.csrf_token)?;
    session.purge();
    Ok(redirect("/login"))
}
