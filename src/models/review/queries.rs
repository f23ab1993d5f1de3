use sqlx::PgPool;

use super::grid::GridCell;
use super::types::*;
use crate::errors::AppError;

const REVIEWER_SELECT: &str = "SELECT rv.id, rv.proposal_id, rv.person_id, pe.name AS person_name, rv.role, \
            rv.accepted, r.text, r.assessment, r.rating, r.weight, r.state AS review_state, r.edited_at, \
            p.number AS proposal_number, p.title AS proposal_title, p.state AS proposal_state, \
            s.code AS semester_code, q.code AS queue_code \
     FROM reviewer rv \
     JOIN person pe ON pe.id = rv.person_id \
     JOIN proposal p ON p.id = rv.proposal_id \
     JOIN call c ON c.id = p.call_id \
     JOIN semester s ON s.id = c.semester_id \
     JOIN queue q ON q.id = c.queue_id \
     LEFT JOIN review r ON r.reviewer_id = rv.id";

pub async fn find_by_id(pool: &PgPool, reviewer_id: i64) -> Result<Option<ReviewerInfo>, AppError> {
    let row = sqlx::query_as::<_, ReviewerInfo>(&format!("{REVIEWER_SELECT} WHERE rv.id = $1"))
        .bind(reviewer_id)
        .fetch_optional(pool)
        .await?;
    Ok(row)
}

pub async fn find_for_proposal(pool: &PgPool, proposal_id: i64) -> Result<Vec<ReviewerInfo>, AppError> {
    let rows = sqlx::query_as::<_, ReviewerInfo>(&format!(
        "{REVIEWER_SELECT} WHERE rv.proposal_id = $1 ORDER BY rv.role, pe.name"
    ))
    .bind(proposal_id)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

pub async fn find_for_person(pool: &PgPool, person_id: i64) -> Result<Vec<ReviewerInfo>, AppError> {
    let rows = sqlx::query_as::<_, ReviewerInfo>(&format!(
        "{REVIEWER_SELECT} WHERE rv.person_id = $1 ORDER BY s.code DESC, q.code, p.number, rv.role"
    ))
    .bind(person_id)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

pub async fn find_for_call(pool: &PgPool, call_id: i64) -> Result<Vec<ReviewerInfo>, AppError> {
    let rows = sqlx::query_as::<_, ReviewerInfo>(&format!(
        "{REVIEWER_SELECT} WHERE p.call_id = $1 ORDER BY p.number, rv.role, pe.name"
    ))
    .bind(call_id)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

/// Assign a person to a non-grid role. Membership and duplicate checks are the caller's.
pub async fn assign(pool: &PgPool, proposal_id: i64, person_id: i64, role: ReviewerRole) -> Result<i64, AppError> {
    let id: i64 = sqlx::query_scalar(
        "INSERT INTO reviewer (proposal_id, person_id, role) VALUES ($1, $2, $3) RETURNING id",
    )
    .bind(proposal_id)
    .bind(person_id)
    .bind(role.code())
    .fetch_one(pool)
    .await?;
    Ok(id)
}

pub async fn is_assigned(pool: &PgPool, proposal_id: i64, person_id: i64, role: ReviewerRole) -> Result<bool, AppError> {
    let exists: bool = sqlx::query_scalar(
        "SELECT EXISTS (SELECT 1 FROM reviewer WHERE proposal_id = $1 AND person_id = $2 AND role = $3)",
    )
    .bind(proposal_id)
    .bind(person_id)
    .bind(role.code())
    .fetch_one(pool)
    .await?;
    Ok(exists)
}

pub async fn remove(pool: &PgPool, reviewer_id: i64) -> Result<(), AppError> {
    let result = sqlx::query("DELETE FROM reviewer WHERE id = $1")
        .bind(reviewer_id)
        .execute(pool)
        .await?;
    if result.rows_affected() == 0 {
        return Err(AppError::NotFound);
    }
    Ok(())
}

/// Apply a validated grid. Unchanged cells keep their reviewer (and any review);
/// changed cells drop the previous reviewer. Returns the newly assigned
/// (reviewer id, person id) pairs for invitations.
pub async fn set_grid(pool: &PgPool, cells: &[GridCell]) -> Result<Vec<(i64, i64)>, AppError> {
    let mut tx = pool.begin().await?;
    let mut added = Vec::new();
    for cell in cells {
        let current: Option<(i64, i64)> = sqlx::query_as(
            "SELECT id, person_id FROM reviewer WHERE proposal_id = $1 AND role = $2",
        )
        .bind(cell.proposal_id)
        .bind(cell.role.code())
        .fetch_optional(&mut *tx)
        .await?;

        if current.map(|(_, person)| person) == cell.person_id {
            continue;
        }
        if let Some((id, _)) = current {
            sqlx::query("DELETE FROM reviewer WHERE id = $1")
                .bind(id)
                .execute(&mut *tx)
                .await?;
        }
        if let Some(person_id) = cell.person_id {
            let id: i64 = sqlx::query_scalar(
                "INSERT INTO reviewer (proposal_id, person_id, role) VALUES ($1, $2, $3) RETURNING id",
            )
            .bind(cell.proposal_id)
            .bind(person_id)
            .bind(cell.role.code())
            .fetch_one(&mut *tx)
            .await?;
            added.push((id, person_id));
        }
    }
    tx.commit().await?;
    Ok(added)
}

/// Whether the person reviews the proposal in any role and has not declared a conflict.
pub async fn is_reviewer(pool: &PgPool, proposal_id: i64, person_id: i64) -> Result<bool, AppError> {
    let exists: bool = sqlx::query_scalar(
        "SELECT EXISTS (SELECT 1 FROM reviewer \
         WHERE proposal_id = $1 AND person_id = $2 AND accepted IS DISTINCT FROM FALSE)",
    )
    .bind(proposal_id)
    .bind(person_id)
    .fetch_one(pool)
    .await?;
    Ok(exists)
}

/// Record the reviewer's answer to an invitation: accept, or declare a conflict.
pub async fn set_acceptance(pool: &PgPool, reviewer_id: i64, person_id: i64, accepted: bool) -> Result<(), AppError> {
    let result = sqlx::query("UPDATE reviewer SET accepted = $3 WHERE id = $1 AND person_id = $2")
        .bind(reviewer_id)
        .bind(person_id)
        .bind(accepted)
        .execute(pool)
        .await?;
    if result.rows_affected() == 0 {
        return Err(AppError::NotFound);
    }
    Ok(())
}

pub async fn save_review(pool: &PgPool, reviewer_id: i64, update: &ReviewUpdate) -> Result<(), AppError> {
    sqlx::query(
        "INSERT INTO review (reviewer_id, text, assessment, rating, weight, state, edited_at) \
         VALUES ($1, $2, $3, $4, $5, $6, now()) \
         ON CONFLICT (reviewer_id) DO UPDATE \
         SET text = EXCLUDED.text, assessment = EXCLUDED.assessment, rating = EXCLUDED.rating, \
             weight = EXCLUDED.weight, state = EXCLUDED.state, edited_at = now()",
    )
    .bind(reviewer_id)
    .bind(&update.text)
    .bind(update.assessment.map(|a| a.code()))
    .bind(update.rating)
    .bind(update.weight)
    .bind(if update.done { "done" } else { "not_done" })
    .execute(pool)
    .await?;
    Ok(())
}

/// A completed review's numbers, for rating aggregation.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct RatingRow {
    pub proposal_id: i64,
    pub role: String,
    pub rating: Option<i32>,
    pub weight: Option<i32>,
}

pub async fn find_ratings_for_call(pool: &PgPool, call_id: i64) -> Result<Vec<RatingRow>, AppError> {
    let rows = sqlx::query_as::<_, RatingRow>(
        "SELECT rv.proposal_id, rv.role, r.rating, r.weight \
         FROM review r \
         JOIN reviewer rv ON rv.id = r.reviewer_id \
         JOIN proposal p ON p.id = rv.proposal_id \
         WHERE p.call_id = $1 AND r.state = 'done'",
    )
    .bind(call_id)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

/// Assignments not declined whose review is not yet done.
pub async fn find_outstanding_for_call(pool: &PgPool, call_id: i64) -> Result<Vec<ReviewerInfo>, AppError> {
    let rows = sqlx::query_as::<_, ReviewerInfo>(&format!(
        "{REVIEWER_SELECT} WHERE p.call_id = $1 \
           AND (rv.accepted IS NULL OR rv.accepted) \
           AND (r.state IS NULL OR r.state <> 'done') \
         ORDER BY pe.name, p.number"
    ))
    .bind(call_id)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}
