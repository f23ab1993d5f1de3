use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Person row including the password hash, for authentication only.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Person {
    pub id: i64,
    pub username: String,
    pub password: String,
    pub name: String,
    pub email: String,
    pub institution: String,
    pub admin: bool,
    pub created_at: DateTime<Utc>,
}

/// Safe version for templates, without the hash.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct PersonDisplay {
    pub id: i64,
    pub username: String,
    pub name: String,
    pub email: String,
    pub institution: String,
    pub admin: bool,
}

/// Result of the person lookup used when adding members or reviewers.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct PersonOption {
    pub id: i64,
    pub username: String,
    pub name: String,
    pub institution: String,
}

pub struct NewPerson {
    pub username: String,
    pub password: String,
    pub name: String,
    pub email: String,
    pub institution: String,
}

#[derive(Debug, Deserialize)]
pub struct RegisterForm {
    pub username: String,
    pub password: String,
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub institution: String,
    pub csrf_token: String,
}

#[derive(Debug, Deserialize)]
pub struct ProfileForm {
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub institution: String,
    #[serde(default)]
    pub current_password: String,
    #[serde(default)]
    pub new_password: String,
    pub csrf_token: String,
}
