use sqlx::{PgPool, Postgres, Transaction};

use super::types::*;
use crate::errors::AppError;

const TARGET_COLUMNS: &str = "id, proposal_id, sort_order, name, system, x, y, time, priority, note";

pub async fn find_for_proposal(pool: &PgPool, proposal_id: i64) -> Result<Vec<Target>, AppError> {
    let rows = sqlx::query_as::<_, Target>(&format!(
        "SELECT {TARGET_COLUMNS} FROM target WHERE proposal_id = $1 ORDER BY sort_order, id"
    ))
    .bind(proposal_id)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

pub async fn find_by_id(pool: &PgPool, proposal_id: i64, id: i64) -> Result<Option<Target>, AppError> {
    let row = sqlx::query_as::<_, Target>(&format!(
        "SELECT {TARGET_COLUMNS} FROM target WHERE id = $1 AND proposal_id = $2"
    ))
    .bind(id)
    .bind(proposal_id)
    .fetch_optional(pool)
    .await?;
    Ok(row)
}

async fn insert(tx: &mut Transaction<'_, Postgres>, proposal_id: i64, target: &NewTarget) -> Result<i64, AppError> {
    let id: i64 = sqlx::query_scalar(
        "INSERT INTO target (proposal_id, sort_order, name, system, x, y, time, priority, note) \
         VALUES ($1, (SELECT COALESCE(MAX(sort_order), 0) + 1 FROM target WHERE proposal_id = $1), \
                 $2, $3, $4, $5, $6, $7, $8) \
         RETURNING id",
    )
    .bind(proposal_id)
    .bind(&target.name)
    .bind(target.system.map(|s| s.code()))
    .bind(target.x)
    .bind(target.y)
    .bind(target.time)
    .bind(target.priority)
    .bind(&target.note)
    .fetch_one(&mut **tx)
    .await?;
    Ok(id)
}

pub async fn create(pool: &PgPool, proposal_id: i64, target: &NewTarget) -> Result<i64, AppError> {
    let mut tx = pool.begin().await?;
    let id = insert(&mut tx, proposal_id, target).await?;
    tx.commit().await?;
    Ok(id)
}

/// Add a parsed target list, optionally replacing the existing targets.
pub async fn create_many(
    pool: &PgPool,
    proposal_id: i64,
    targets: &[NewTarget],
    replace: bool,
) -> Result<usize, AppError> {
    let mut tx = pool.begin().await?;
    if replace {
        sqlx::query("DELETE FROM target WHERE proposal_id = $1")
            .bind(proposal_id)
            .execute(&mut *tx)
            .await?;
    }
    for target in targets {
        insert(&mut tx, proposal_id, target).await?;
    }
    tx.commit().await?;
    Ok(targets.len())
}

pub async fn update(pool: &PgPool, proposal_id: i64, id: i64, target: &NewTarget) -> Result<(), AppError> {
    let result = sqlx::query(
        "UPDATE target SET name = $3, system = $4, x = $5, y = $6, time = $7, priority = $8, note = $9 \
         WHERE id = $1 AND proposal_id = $2",
    )
    .bind(id)
    .bind(proposal_id)
    .bind(&target.name)
    .bind(target.system.map(|s| s.code()))
    .bind(target.x)
    .bind(target.y)
    .bind(target.time)
    .bind(target.priority)
    .bind(&target.note)
    .execute(pool)
    .await?;
    if result.rows_affected() == 0 {
        return Err(AppError::NotFound);
    }
    Ok(())
}

pub async fn delete(pool: &PgPool, proposal_id: i64, id: i64) -> Result<(), AppError> {
    let result = sqlx::query("DELETE FROM target WHERE id = $1 AND proposal_id = $2")
        .bind(id)
        .bind(proposal_id)
        .execute(pool)
        .await?;
    if result.rows_affected() == 0 {
        return Err(AppError::NotFound);
    }
    Ok(())
}

/// Move one target up (`-1`) or down (`+1`) by swapping it with its neighbour.
pub async fn move_target(pool: &PgPool, proposal_id: i64, id: i64, direction: i32) -> Result<(), AppError> {
    let targets = find_for_proposal(pool, proposal_id).await?;
    let Some(pos) = targets.iter().position(|t| t.id == id) else {
        return Err(AppError::NotFound);
    };
    let other = pos as i64 + direction.signum() as i64;
    if other < 0 || other >= targets.len() as i64 {
        return Ok(());
    }
    let mut ids: Vec<i64> = targets.iter().map(|t| t.id).collect();
    ids.swap(pos, other as usize);
    reorder(pool, proposal_id, &ids).await
}

/// Renumber targets in the given order; ids not belonging to the proposal are ignored.
pub async fn reorder(pool: &PgPool, proposal_id: i64, ids: &[i64]) -> Result<(), AppError> {
    let mut tx = pool.begin().await?;
    for (i, id) in ids.iter().enumerate() {
        sqlx::query("UPDATE target SET sort_order = $3 WHERE id = $1 AND proposal_id = $2")
            .bind(id)
            .bind(proposal_id)
            .bind(i as i32 + 1)
            .execute(&mut *tx)
            .await?;
    }
    tx.commit().await?;
    Ok(())
}

/// A target together with the proposal it belongs to.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct CallTarget {
    pub proposal_id: i64,
    pub proposal_number: i32,
    pub proposal_title: String,
    pub proposal_state: String,
    pub name: String,
    pub system: Option<String>,
    pub x: Option<f64>,
    pub y: Option<f64>,
    pub time: Option<f64>,
}

impl CallTarget {
    pub fn as_target(&self) -> Target {
        Target {
            id: 0,
            proposal_id: self.proposal_id,
            sort_order: 0,
            name: self.name.clone(),
            system: self.system.clone(),
            x: self.x,
            y: self.y,
            time: self.time,
            priority: None,
            note: String::new(),
        }
    }
}

/// Targets of every proposal in a call that has been submitted or gone further.
pub async fn find_for_call(pool: &PgPool, call_id: i64) -> Result<Vec<CallTarget>, AppError> {
    let rows = sqlx::query_as::<_, CallTarget>(
        "SELECT p.id AS proposal_id, p.number AS proposal_number, p.title AS proposal_title, \
                p.state AS proposal_state, t.name, t.system, t.x, t.y, t.time \
         FROM target t JOIN proposal p ON p.id = t.proposal_id \
         WHERE p.call_id = $1 AND p.state NOT IN ('preparation', 'withdrawn', 'abandoned') \
         ORDER BY p.number, t.sort_order, t.id",
    )
    .bind(call_id)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}
