use chrono::{DateTime, Utc};
use sqlx::PgPool;

use super::state::{ProposalAction, ProposalState};
use super::types::*;
use super::validation::{
    FigureSnapshot, MemberSnapshot, ProposalSnapshot, SectionSnapshot, TargetSnapshot,
};
use crate::errors::AppError;
use crate::models::attachment::{self, AttachmentKind};
use crate::models::call::Call;
use crate::models::text::{self, TextFormat, TextRole};
use crate::models::{calculation, member, target};

const PROPOSAL_SELECT: &str = "SELECT p.id, p.call_id, p.number, p.title, p.state, p.created_at, p.submitted_at, \
            c.semester_id, s.code AS semester_code, s.name AS semester_name, \
            c.queue_id, q.code AS queue_code, q.name AS queue_name, \
            c.call_type, c.date_open, c.date_close \
     FROM proposal p \
     JOIN call c ON c.id = p.call_id \
     JOIN semester s ON s.id = c.semester_id \
     JOIN queue q ON q.id = c.queue_id";

const LIST_SELECT: &str = "SELECT p.id, p.number, p.title, p.state, \
            s.code AS semester_code, s.name AS semester_name, q.code AS queue_code, q.name AS queue_name, \
            (SELECT pe.name FROM member pm JOIN person pe ON pe.id = pm.person_id \
             WHERE pm.proposal_id = p.id AND pm.pi) AS pi_name";

/// Create a proposal in `preparation` with its creator as PI and editor.
/// Numbers are allocated per call under a lock on the call row.
pub async fn create(
    pool: &PgPool,
    call_id: i64,
    title: &str,
    person_id: i64,
    affiliation_id: Option<i64>,
) -> Result<i64, AppError> {
    let mut tx = pool.begin().await?;

    sqlx::query("SELECT id FROM call WHERE id = $1 FOR UPDATE")
        .bind(call_id)
        .fetch_one(&mut *tx)
        .await?;
    let number: i32 = sqlx::query_scalar("SELECT COALESCE(MAX(number), 0) + 1 FROM proposal WHERE call_id = $1")
        .bind(call_id)
        .fetch_one(&mut *tx)
        .await?;

    let id: i64 = sqlx::query_scalar(
        "INSERT INTO proposal (call_id, number, title, state) VALUES ($1, $2, $3, $4) RETURNING id",
    )
    .bind(call_id)
    .bind(number)
    .bind(title)
    .bind(ProposalState::Preparation.code())
    .fetch_one(&mut *tx)
    .await?;

    sqlx::query(
        "INSERT INTO member (proposal_id, person_id, affiliation_id, sort_order, pi, editor) \
         VALUES ($1, $2, $3, 1, TRUE, TRUE)",
    )
    .bind(id)
    .bind(person_id)
    .bind(affiliation_id)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(id)
}

pub async fn find_by_id(pool: &PgPool, id: i64) -> Result<Option<Proposal>, AppError> {
    let row = sqlx::query_as::<_, Proposal>(&format!("{PROPOSAL_SELECT} WHERE p.id = $1"))
        .bind(id)
        .fetch_optional(pool)
        .await?;
    Ok(row)
}

/// Proposals the person is a member of, newest semester first.
pub async fn find_for_person(pool: &PgPool, person_id: i64) -> Result<Vec<ProposalListItem>, AppError> {
    let rows = sqlx::query_as::<_, ProposalListItem>(&format!(
        "{LIST_SELECT}, m.pi AS is_pi, m.editor AS is_editor \
         FROM proposal p \
         JOIN member m ON m.proposal_id = p.id AND m.person_id = $1 \
         JOIN call c ON c.id = p.call_id \
         JOIN semester s ON s.id = c.semester_id \
         JOIN queue q ON q.id = c.queue_id \
         ORDER BY s.date_start DESC, q.code, p.number"
    ))
    .bind(person_id)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

pub async fn find_for_call(pool: &PgPool, call_id: i64) -> Result<Vec<ProposalListItem>, AppError> {
    let rows = sqlx::query_as::<_, ProposalListItem>(&format!(
        "{LIST_SELECT}, FALSE AS is_pi, FALSE AS is_editor \
         FROM proposal p \
         JOIN call c ON c.id = p.call_id \
         JOIN semester s ON s.id = c.semester_id \
         JOIN queue q ON q.id = c.queue_id \
         WHERE p.call_id = $1 \
         ORDER BY p.number"
    ))
    .bind(call_id)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

pub async fn update_title(pool: &PgPool, id: i64, title: &str) -> Result<(), AppError> {
    let result = sqlx::query("UPDATE proposal SET title = $2 WHERE id = $1")
        .bind(id)
        .bind(title)
        .execute(pool)
        .await?;
    if result.rows_affected() == 0 {
        return Err(AppError::NotFound);
    }
    Ok(())
}

/// Apply an action to one proposal. The update only succeeds if the state has not
/// changed since `proposal` was read.
pub async fn apply_action(pool: &PgPool, proposal: &Proposal, action: ProposalAction) -> Result<ProposalState, AppError> {
    let from = proposal.status();
    let to = from.transition(action)?;
    let result = sqlx::query(
        "UPDATE proposal SET state = $3, \
                submitted_at = CASE WHEN $3 = 'submitted' THEN now() ELSE submitted_at END \
         WHERE id = $1 AND state = $2",
    )
    .bind(proposal.id)
    .bind(from.code())
    .bind(to.code())
    .execute(pool)
    .await?;
    if result.rows_affected() == 0 {
        return Err(AppError::InvalidTransition(
            "the proposal was changed by someone else; please reload".to_string(),
        ));
    }
    Ok(to)
}

/// Apply an action to every proposal of a call in a state that allows it.
/// `only` restricts the source states considered. Returns (from, to, count) per move.
pub async fn apply_action_to_call(
    pool: &PgPool,
    call_id: i64,
    action: ProposalAction,
    only: Option<&[ProposalState]>,
) -> Result<Vec<(ProposalState, ProposalState, u64)>, AppError> {
    let mut moves = Vec::new();
    let mut tx = pool.begin().await?;
    for from in ProposalState::ALL {
        if only.is_some_and(|states| !states.contains(&from)) {
            continue;
        }
        let Ok(to) = from.transition(action) else { continue };
        let result = sqlx::query("UPDATE proposal SET state = $3 WHERE call_id = $1 AND state = $2")
            .bind(call_id)
            .bind(from.code())
            .bind(to.code())
            .execute(&mut *tx)
            .await?;
        if result.rows_affected() > 0 {
            moves.push((from, to, result.rows_affected()));
        }
    }
    tx.commit().await?;
    Ok(moves)
}

/// Ids of the call's proposals currently in `state`.
pub async fn ids_in_state(pool: &PgPool, call_id: i64, state: ProposalState) -> Result<Vec<i64>, AppError> {
    let ids: Vec<i64> = sqlx::query_scalar("SELECT id FROM proposal WHERE call_id = $1 AND state = $2 ORDER BY number")
        .bind(call_id)
        .bind(state.code())
        .fetch_all(pool)
        .await?;
    Ok(ids)
}

pub async fn count_by_state(pool: &PgPool) -> Result<Vec<(String, i64)>, AppError> {
    let rows: Vec<(String, i64)> = sqlx::query_as("SELECT state, COUNT(*) FROM proposal GROUP BY state ORDER BY state")
        .fetch_all(pool)
        .await?;
    Ok(rows)
}

/// Gather everything submission checks look at.
pub async fn load_snapshot(
    pool: &PgPool,
    proposal: &Proposal,
    call: &Call,
    now: DateTime<Utc>,
) -> Result<ProposalSnapshot, AppError> {
    let texts = text::find_for_proposal(pool, proposal.id).await?;
    let attachments = attachment::find_for_proposal(pool, proposal.id).await?;
    let members = member::find_for_proposal(pool, proposal.id).await?;
    let targets = target::find_for_proposal(pool, proposal.id).await?;
    let calculations = calculation::count_for_proposal(pool, proposal.id).await?;

    let find_text = |role: TextRole| texts.iter().find(|t| t.role == role.code());
    let section = |role: TextRole| {
        let text = find_text(role);
        let of_role = attachments.iter().filter(|a| a.role == role.code());
        SectionSnapshot {
            role,
            format: text.map(|t| t.text_format()).unwrap_or(TextFormat::Plain),
            words: text.filter(|t| !t.is_pdf()).map(|t| t.words).unwrap_or(0),
            figures: of_role
                .clone()
                .filter(|a| a.kind == AttachmentKind::Figure.code())
                .map(|a| FigureSnapshot {
                    filename: a.filename.clone(),
                    caption_words: a.caption_words(),
                    state: a.status(),
                })
                .collect(),
            pdf: of_role
                .filter(|a| a.kind == AttachmentKind::Pdf.code())
                .map(|a| (a.status(), a.pages))
                .next(),
        }
    };

    Ok(ProposalSnapshot {
        call_open: call.is_open_at(now),
        limits: call.limits(),
        abstract_words: find_text(TextRole::Abstract).map(|t| t.words).unwrap_or(0),
        science: section(TextRole::ScienceCase),
        technical: section(TextRole::TechnicalCase),
        members: members
            .iter()
            .map(|m| MemberSnapshot {
                name: m.person_name.clone(),
                pi: m.pi,
                editor: m.editor,
                has_affiliation: m.affiliation_id.is_some(),
            })
            .collect(),
        targets: targets
            .iter()
            .map(|t| TargetSnapshot {
                name: t.name.clone(),
                has_coordinates: t.x.is_some() && t.y.is_some(),
                has_time: t.time.is_some(),
            })
            .collect(),
        calculations: calculations as usize,
    })
}

/// Copy a proposal into another call as a new proposal in preparation.
///
/// Members keep their flags but lose affiliations from a different queue.
/// Text, figures, PDFs, targets, and calculations are copied, and the
/// original is recorded as a previous proposal. Returns the new id.
pub async fn copy_to_call(pool: &PgPool, source: &Proposal, call_id: i64) -> Result<i64, AppError> {
    let mut tx = pool.begin().await?;

    sqlx::query("SELECT id FROM call WHERE id = $1 FOR UPDATE")
        .bind(call_id)
        .fetch_one(&mut *tx)
        .await?;
    let number: i32 = sqlx::query_scalar("SELECT COALESCE(MAX(number), 0) + 1 FROM proposal WHERE call_id = $1")
        .bind(call_id)
        .fetch_one(&mut *tx)
        .await?;
    let id: i64 = sqlx::query_scalar(
        "INSERT INTO proposal (call_id, number, title, state) VALUES ($1, $2, $3, $4) RETURNING id",
    )
    .bind(call_id)
    .bind(number)
    .bind(&source.title)
    .bind(ProposalState::Preparation.code())
    .fetch_one(&mut *tx)
    .await?;

    sqlx::query(
        "INSERT INTO member (proposal_id, person_id, affiliation_id, sort_order, pi, editor, observer, peer_reviewer) \
         SELECT $1, m.person_id, \
                (SELECT a.id FROM affiliation a JOIN call c ON c.queue_id = a.queue_id \
                 WHERE a.id = m.affiliation_id AND c.id = $3), \
                m.sort_order, m.pi, m.editor, m.observer, m.peer_reviewer \
         FROM member m WHERE m.proposal_id = $2",
    )
    .bind(id)
    .bind(source.id)
    .bind(call_id)
    .execute(&mut *tx)
    .await?;

    sqlx::query(
        "INSERT INTO proposal_text (proposal_id, role, format, text, words, edited_at, editor_id) \
         SELECT $1, role, format, text, words, edited_at, editor_id FROM proposal_text WHERE proposal_id = $2",
    )
    .bind(id)
    .bind(source.id)
    .execute(&mut *tx)
    .await?;

    sqlx::query(
        "INSERT INTO attachment (proposal_id, role, kind, mime_type, filename, data, md5, caption, \
                                 sort_order, state, pages, uploaded_at, uploader_id) \
         SELECT $1, role, kind, mime_type, filename, data, md5, caption, sort_order, state, pages, \
                uploaded_at, uploader_id \
         FROM attachment WHERE proposal_id = $2",
    )
    .bind(id)
    .bind(source.id)
    .execute(&mut *tx)
    .await?;

    sqlx::query(
        "INSERT INTO target (proposal_id, sort_order, name, system, x, y, time, priority, note) \
         SELECT $1, sort_order, name, system, x, y, time, priority, note FROM target WHERE proposal_id = $2",
    )
    .bind(id)
    .bind(source.id)
    .execute(&mut *tx)
    .await?;

    sqlx::query(
        "INSERT INTO calculation (proposal_id, sort_order, calculator, mode, version, input, output, title, created_at) \
         SELECT $1, sort_order, calculator, mode, version, input, output, title, created_at \
         FROM calculation WHERE proposal_id = $2",
    )
    .bind(id)
    .bind(source.id)
    .execute(&mut *tx)
    .await?;

    sqlx::query("INSERT INTO prev_proposal (proposal_id, proposal_code, continuation) VALUES ($1, $2, TRUE)")
        .bind(id)
        .bind(source.code())
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;
    Ok(id)
}
