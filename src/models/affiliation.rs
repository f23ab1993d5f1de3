use serde::{Deserialize, Serialize};
use sqlx::PgPool;

use crate::errors::AppError;
pub use crate::tabulation::Assignment;

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Affiliation {
    pub id: i64,
    pub queue_id: i64,
    pub name: String,
    pub hidden: bool,
    pub assignment: String,
    pub weight: f64,
}

impl Affiliation {
    pub fn kind(&self) -> Assignment {
        Assignment::from_code(&self.assignment).unwrap_or(Assignment::Standard)
    }
}

/// An affiliation with the weight that applies in a particular call.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct EffectiveAffiliation {
    pub id: i64,
    pub name: String,
    pub hidden: bool,
    pub assignment: String,
    pub default_weight: f64,
    pub call_weight: Option<f64>,
}

impl EffectiveAffiliation {
    pub fn kind(&self) -> Assignment {
        Assignment::from_code(&self.assignment).unwrap_or(Assignment::Standard)
    }

    pub fn weight(&self) -> f64 {
        self.call_weight.unwrap_or(self.default_weight)
    }
}

#[derive(Debug, Deserialize)]
pub struct AffiliationForm {
    pub name: String,
    pub assignment: String,
    pub weight: String,
    #[serde(default)]
    pub hidden: Option<String>,
    pub csrf_token: String,
}

impl AffiliationForm {
    pub fn parse(&self) -> Result<(String, Assignment, f64, bool), Vec<String>> {
        let mut errors = Vec::new();
        let name = self.name.trim().to_string();
        if name.is_empty() {
            errors.push("Name is required".to_string());
        }
        let assignment = Assignment::from_code(&self.assignment);
        if assignment.is_none() {
            errors.push("Unknown assignment type".to_string());
        }
        let weight = match self.weight.trim().parse::<f64>() {
            Ok(w) if w.is_finite() && w >= 0.0 => Some(w),
            _ => {
                errors.push("Weight must be a non-negative number".to_string());
                None
            }
        };
        match (assignment, weight) {
            (Some(a), Some(w)) if errors.is_empty() => Ok((name, a, w, self.hidden.is_some())),
            _ => Err(errors),
        }
    }
}

pub async fn create(
    pool: &PgPool,
    queue_id: i64,
    name: &str,
    assignment: Assignment,
    weight: f64,
    hidden: bool,
) -> Result<i64, AppError> {
    let id: i64 = sqlx::query_scalar(
        "INSERT INTO affiliation (queue_id, name, assignment, weight, hidden) \
         VALUES ($1, $2, $3, $4, $5) RETURNING id",
    )
    .bind(queue_id)
    .bind(name)
    .bind(assignment.code())
    .bind(weight)
    .bind(hidden)
    .fetch_one(pool)
    .await?;
    Ok(id)
}

pub async fn update(
    pool: &PgPool,
    id: i64,
    name: &str,
    assignment: Assignment,
    weight: f64,
    hidden: bool,
) -> Result<(), AppError> {
    let result = sqlx::query(
        "UPDATE affiliation SET name = $2, assignment = $3, weight = $4, hidden = $5 WHERE id = $1",
    )
    .bind(id)
    .bind(name)
    .bind(assignment.code())
    .bind(weight)
    .bind(hidden)
    .execute(pool)
    .await?;
    if result.rows_affected() == 0 {
        return Err(AppError::NotFound);
    }
    Ok(())
}

pub async fn find_by_id(pool: &PgPool, id: i64) -> Result<Option<Affiliation>, AppError> {
    let row = sqlx::query_as::<_, Affiliation>(
        "SELECT id, queue_id, name, hidden, assignment, weight FROM affiliation WHERE id = $1",
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;
    Ok(row)
}

/// All affiliations of a queue; hidden ones only when `include_hidden`.
pub async fn find_for_queue(pool: &PgPool, queue_id: i64, include_hidden: bool) -> Result<Vec<Affiliation>, AppError> {
    let rows = sqlx::query_as::<_, Affiliation>(
        "SELECT id, queue_id, name, hidden, assignment, weight FROM affiliation \
         WHERE queue_id = $1 AND ($2 OR NOT hidden) ORDER BY name",
    )
    .bind(queue_id)
    .bind(include_hidden)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

/// Affiliations of the call's queue with any per-call weight override.
pub async fn find_effective_for_call(pool: &PgPool, call_id: i64) -> Result<Vec<EffectiveAffiliation>, AppError> {
    let rows = sqlx::query_as::<_, EffectiveAffiliation>(
        "SELECT a.id, a.name, a.hidden, a.assignment, a.weight AS default_weight, \
                w.weight AS call_weight \
         FROM call c \
         JOIN affiliation a ON a.queue_id = c.queue_id \
         LEFT JOIN affiliation_weight w ON w.call_id = c.id AND w.affiliation_id = a.id \
         WHERE c.id = $1 \
         ORDER BY a.name",
    )
    .bind(call_id)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

/// Set (`Some`) or clear (`None`) a call's weight override.
pub async fn set_call_weight(
    pool: &PgPool,
    call_id: i64,
    affiliation_id: i64,
    weight: Option<f64>,
) -> Result<(), AppError> {
    match weight {
        Some(w) => {
            sqlx::query(
                "INSERT INTO affiliation_weight (call_id, affiliation_id, weight) VALUES ($1, $2, $3) \
                 ON CONFLICT (call_id, affiliation_id) DO UPDATE SET weight = EXCLUDED.weight",
            )
            .bind(call_id)
            .bind(affiliation_id)
            .bind(w)
            .execute(pool)
            .await?;
        }
        None => {
            sqlx::query("DELETE FROM affiliation_weight WHERE call_id = $1 AND affiliation_id = $2")
                .bind(call_id)
                .bind(affiliation_id)
                .execute(pool)
                .await?;
        }
    }
    Ok(())
}

/// Whether the affiliation belongs to the queue and is selectable by proposers.
pub async fn is_selectable(pool: &PgPool, affiliation_id: i64, queue_id: i64) -> Result<bool, AppError> {
    let ok: bool = sqlx::query_scalar(
        "SELECT EXISTS (SELECT 1 FROM affiliation WHERE id = $1 AND queue_id = $2 AND NOT hidden)",
    )
    .bind(affiliation_id)
    .bind(queue_id)
    .fetch_one(pool)
    .await?;
    Ok(ok)
}
