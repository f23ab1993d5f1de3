use actix_session::Session;
use actix_web::{HttpResponse, web};
use sqlx::PgPool;

use crate::auth::session::{require_person_id, set_flash};
use crate::auth::validate::{validate_email, validate_optional, validate_password, validate_required};
use crate::auth::{csrf, password};
use crate::config::AppConfig;
use crate::errors::{AppError, redirect, render};
use crate::models::person::{self, ProfileForm};
use crate::templates_structs::{AccountTemplate, PageContext};

pub async fn form(
    pool: web::Data<PgPool>,
    config: web::Data<AppConfig>,
    session: Session,
) -> Result<HttpResponse, AppError> {
    let person_id = require_person_id(&session)?;
    let person = person::find_by_id(&pool, person_id).await?.ok_or(AppError::NotFound)?;
    let ctx = PageContext::build(&session, &config, "/account")?;
    render(AccountTemplate { ctx, person, errors: vec![] })
}

pub async fn submit(
    pool: web::Data<PgPool>,
    config: web::Data<AppConfig>,
    session: Session,
    form: web::Form<ProfileForm>,
) -> Result<HttpResponse, AppError> {
    csrf::validate_csrf(&session, &form.csrf_token)?;
    let person_id = require_person_id(&session)?;

    let mut errors: Vec<String> = [
        validate_required(&form.name, "Name", 200),
        validate_email(&form.email),
        validate_optional(&form.institution, "Institution", 200),
    ]
    .into_iter()
    .flatten()
    .collect();

    let change_password = !form.new_password.is_empty();
    if change_password {
        if let Some(e) = validate_password(&form.new_password) {
            errors.push(e);
        }
        let hash = person::get_password_hash(&pool, person_id).await?.ok_or(AppError::NotFound)?;
        if !password::verify_password(&form.current_password, &hash)? {
            errors.push("Current password is incorrect".to_string());
        }
    }

    if !errors.is_empty() {
        let mut person = person::find_by_id(&pool, person_id).await?.ok_or(AppError::NotFound)?;
        person.name = form.name.clone();
        person.email = form.email.clone();
        person.institution = form.institution.clone();
        let ctx = PageContext::build(&session, &config, "/account")?;
        return render(AccountTemplate { ctx, person, errors });
    }

    person::update_profile(&pool, person_id, &form.name, &form.email, &form.institution).await?;
    if change_password {
        person::update_password(&pool, person_id, &password::hash_password(&form.new_password)?).await?;
    }
    let _ = crate::audit::log(
        &pool,
        person_id,
        "person.updated",
        "person",
        person_id,
        serde_json::json!({ "password_changed": change_password }),
    )
    .await;

    set_flash(&session, "Account updated");
    Ok(redirect("/account"))
}
