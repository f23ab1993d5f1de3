use sqlx::PgPool;

use super::types::*;
use crate::errors::AppError;

pub async fn create(pool: &PgPool, new: &NewPerson) -> Result<i64, AppError> {
    let id: i64 = sqlx::query_scalar(
        "INSERT INTO person (username, password, name, email, institution) \
         VALUES ($1, $2, $3, $4, $5) RETURNING id",
    )
    .bind(new.username.trim())
    .bind(&new.password)
    .bind(new.name.trim())
    .bind(new.email.trim())
    .bind(new.institution.trim())
    .fetch_one(pool)
    .await?;
    Ok(id)
}

pub async fn find_by_username(pool: &PgPool, username: &str) -> Result<Option<Person>, AppError> {
    let person = sqlx::query_as::<_, Person>(
        "SELECT id, username, password, name, email, institution, admin, created_at \
         FROM person WHERE username = $1",
    )
    .bind(username.trim())
    .fetch_optional(pool)
    .await?;
    Ok(person)
}

pub async fn username_exists(pool: &PgPool, username: &str) -> Result<bool, AppError> {
    let exists: bool = sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM person WHERE username = $1)")
        .bind(username.trim())
        .fetch_one(pool)
        .await?;
    Ok(exists)
}

pub async fn find_by_id(pool: &PgPool, id: i64) -> Result<Option<PersonDisplay>, AppError> {
    let person = sqlx::query_as::<_, PersonDisplay>(
        "SELECT id, username, name, email, institution, admin FROM person WHERE id = $1",
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;
    Ok(person)
}

pub async fn find_all(pool: &PgPool) -> Result<Vec<PersonDisplay>, AppError> {
    let people = sqlx::query_as::<_, PersonDisplay>(
        "SELECT id, username, name, email, institution, admin FROM person ORDER BY name, id",
    )
    .fetch_all(pool)
    .await?;
    Ok(people)
}

/// Case-insensitive substring match on name or username.
pub async fn search(pool: &PgPool, query: &str, limit: i64) -> Result<Vec<PersonOption>, AppError> {
    let pattern = format!("%{}%", query.trim().replace('%', "\\%").replace('_', "\\_"));
    let people = sqlx::query_as::<_, PersonOption>(
        "SELECT id, username, name, institution FROM person \
         WHERE name ILIKE $1 OR username ILIKE $1 \
         ORDER BY name, id LIMIT $2",
    )
    .bind(pattern)
    .bind(limit)
    .fetch_all(pool)
    .await?;
    Ok(people)
}

pub async fn update_profile(
    pool: &PgPool,
    id: i64,
    name: &str,
    email: &str,
    institution: &str,
) -> Result<(), AppError> {
    sqlx::query("UPDATE person SET name = $2, email = $3, institution = $4 WHERE id = $1")
        .bind(id)
        .bind(name.trim())
        .bind(email.trim())
        .bind(institution.trim())
        .execute(pool)
        .await?;
    Ok(())
}

pub async fn get_password_hash(pool: &PgPool, id: i64) -> Result<Option<String>, AppError> {
    let hash = sqlx::query_scalar("SELECT password FROM person WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await?;
    Ok(hash)
}

pub async fn update_password(pool: &PgPool, id: i64, password_hash: &str) -> Result<(), AppError> {
    sqlx::query("UPDATE person SET password = $2 WHERE id = $1")
        .bind(id)
        .bind(password_hash)
        .execute(pool)
        .await?;
    Ok(())
}

pub async fn set_admin(pool: &PgPool, id: i64, admin: bool) -> Result<(), AppError> {
    sqlx::query("UPDATE person SET admin = $2 WHERE id = $1")
        .bind(id)
        .bind(admin)
        .execute(pool)
        .await?;
    Ok(())
}
