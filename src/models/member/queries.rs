use sqlx::{PgConnection, PgPool};

use super::types::*;
use crate::errors::AppError;

const STALE_LIST: &str = "The member list changed; please reload the page";

const MEMBER_SELECT: &str = "SELECT m.id, m.proposal_id, m.person_id, p.name AS person_name, \
            p.institution, m.affiliation_id, a.name AS affiliation_name, m.sort_order, \
            m.pi, m.editor, m.observer, m.peer_reviewer \
     FROM member m \
     JOIN person p ON p.id = m.person_id \
     LEFT JOIN affiliation a ON a.id = m.affiliation_id";

pub async fn find_for_proposal(pool: &PgPool, proposal_id: i64) -> Result<Vec<Member>, AppError> {
    let rows = sqlx::query_as::<_, Member>(&format!(
        "{MEMBER_SELECT} WHERE m.proposal_id = $1 ORDER BY m.sort_order, m.id"
    ))
    .bind(proposal_id)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

pub async fn find_access(pool: &PgPool, proposal_id: i64, person_id: i64) -> Result<Option<MemberAccess>, AppError> {
    let row = sqlx::query_as::<_, MemberAccess>(
        "SELECT pi, editor, observer FROM member WHERE proposal_id = $1 AND person_id = $2",
    )
    .bind(proposal_id)
    .bind(person_id)
    .fetch_optional(pool)
    .await?;
    Ok(row)
}

pub async fn person_ids(pool: &PgPool, proposal_id: i64) -> Result<Vec<i64>, AppError> {
    let ids: Vec<i64> = sqlx::query_scalar("SELECT person_id FROM member WHERE proposal_id = $1 ORDER BY sort_order")
        .bind(proposal_id)
        .fetch_all(pool)
        .await?;
    Ok(ids)
}

/// Lock the proposal and its member rows for the rest of the transaction, so
/// concurrent membership changes are checked against the same list.
async fn lock_members(conn: &mut PgConnection, proposal_id: i64) -> Result<Vec<Member>, AppError> {
    sqlx::query("SELECT id FROM proposal WHERE id = $1 FOR UPDATE")
        .bind(proposal_id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or(AppError::NotFound)?;
    let rows = sqlx::query_as::<_, Member>(&format!(
        "{MEMBER_SELECT} WHERE m.proposal_id = $1 ORDER BY m.sort_order, m.id FOR UPDATE OF m"
    ))
    .bind(proposal_id)
    .fetch_all(&mut *conn)
    .await?;
    Ok(rows)
}

/// Add a person as an ordinary (non-PI) member at the end of the list.
pub async fn add(
    pool: &PgPool,
    proposal_id: i64,
    person_id: i64,
    affiliation_id: Option<i64>,
    editor: bool,
    observer: bool,
) -> Result<Result<i64, Vec<String>>, AppError> {
    let mut tx = pool.begin().await?;
    let current = lock_members(&mut tx, proposal_id).await?;
    let mut flags: Vec<MemberFlags> = current.iter().map(Member::flags).collect();
    flags.push(MemberFlags { person_id, pi: false, editor });
    if let Err(errors) = validate_members(&flags) {
        return Ok(Err(errors));
    }

    let id: i64 = sqlx::query_scalar(
        "INSERT INTO member (proposal_id, person_id, affiliation_id, sort_order, editor, observer) \
         VALUES ($1, $2, $3, \
                 (SELECT COALESCE(MAX(sort_order), 0) + 1 FROM member WHERE proposal_id = $1), \
                 $4, $5) \
         RETURNING id",
    )
    .bind(proposal_id)
    .bind(person_id)
    .bind(affiliation_id)
    .bind(editor)
    .bind(observer)
    .fetch_one(&mut *tx)
    .await?;
    tx.commit().await?;
    Ok(Ok(id))
}

/// Remove a member unless that would leave the proposal without a PI or editor.
pub async fn remove(pool: &PgPool, proposal_id: i64, member_id: i64) -> Result<Result<(), Vec<String>>, AppError> {
    let mut tx = pool.begin().await?;
    let current = lock_members(&mut tx, proposal_id).await?;
    if !current.iter().any(|m| m.id == member_id) {
        return Err(AppError::NotFound);
    }
    let remaining: Vec<MemberFlags> = current.iter().filter(|m| m.id != member_id).map(Member::flags).collect();
    if let Err(errors) = validate_members(&remaining) {
        return Ok(Err(errors));
    }

    sqlx::query("DELETE FROM member WHERE id = $1 AND proposal_id = $2")
        .bind(member_id)
        .bind(proposal_id)
        .execute(&mut *tx)
        .await?;
    tx.commit().await?;
    Ok(Ok(()))
}

/// Apply the members form in one transaction. Every existing member must be present in `edits`.
pub async fn update_all(
    pool: &PgPool,
    proposal_id: i64,
    edits: &[MemberEdit],
) -> Result<Result<(), Vec<String>>, AppError> {
    let mut tx = pool.begin().await?;
    let current = lock_members(&mut tx, proposal_id).await?;
    if edits.len() != current.len() {
        return Ok(Err(vec![STALE_LIST.to_string()]));
    }
    let mut flags = Vec::with_capacity(current.len());
    for member in &current {
        let Some(edit) = edits.iter().find(|e| e.member_id == member.id) else {
            return Ok(Err(vec![STALE_LIST.to_string()]));
        };
        flags.push(MemberFlags { person_id: member.person_id, pi: edit.pi, editor: edit.editor });
    }
    if let Err(errors) = validate_members(&flags) {
        return Ok(Err(errors));
    }

    // The single-PI index is checked per statement, so clear the flag first.
    sqlx::query("UPDATE member SET pi = FALSE WHERE proposal_id = $1")
        .bind(proposal_id)
        .execute(&mut *tx)
        .await?;
    for edit in edits {
        sqlx::query(
            "UPDATE member SET affiliation_id = $3, sort_order = $4, pi = $5, editor = $6, observer = $7 \
             WHERE id = $1 AND proposal_id = $2",
        )
        .bind(edit.member_id)
        .bind(proposal_id)
        .bind(edit.affiliation_id)
        .bind(edit.sort_order)
        .bind(edit.pi)
        .bind(edit.editor)
        .bind(edit.observer)
        .execute(&mut *tx)
        .await?;
    }
    tx.commit().await?;
    Ok(Ok(()))
}

/// Members and their affiliation assignments for every proposal of a call, for tabulation.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct CallMemberAffiliation {
    pub proposal_id: i64,
    pub affiliation_id: Option<i64>,
    pub assignment: Option<String>,
    pub weight: Option<f64>,
}

pub async fn find_affiliations_for_call(pool: &PgPool, call_id: i64) -> Result<Vec<CallMemberAffiliation>, AppError> {
    let rows = sqlx::query_as::<_, CallMemberAffiliation>(
        "SELECT m.proposal_id, m.affiliation_id, a.assignment, \
                COALESCE(w.weight, a.weight) AS weight \
         FROM member m \
         JOIN proposal pr ON pr.id = m.proposal_id \
         LEFT JOIN affiliation a ON a.id = m.affiliation_id \
         LEFT JOIN affiliation_weight w ON w.call_id = pr.call_id AND w.affiliation_id = a.id \
         WHERE pr.call_id = $1 \
         ORDER BY m.proposal_id, m.sort_order",
    )
    .bind(call_id)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}
