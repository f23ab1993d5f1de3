use sqlx::PgPool;

use super::types::*;
use crate::errors::AppError;
use crate::models::text::TextRole;

const INFO_COLUMNS: &str = "id, proposal_id, role, kind, mime_type, filename, md5, caption, \
                            sort_order, state, pages, uploaded_at";

pub struct NewAttachment<'a> {
    pub proposal_id: i64,
    pub role: TextRole,
    pub kind: AttachmentKind,
    pub mime_type: &'a str,
    pub filename: &'a str,
    pub data: &'a [u8],
    pub caption: &'a str,
    pub uploader_id: i64,
}

/// Store a new upload in the `new` state. A PDF replaces any earlier PDF of the
/// same section; figures are appended.
pub async fn create(pool: &PgPool, new: &NewAttachment<'_>) -> Result<i64, AppError> {
    let md5 = format!("{:x}", md5::compute(new.data));
    let mut tx = pool.begin().await?;

    if new.kind == AttachmentKind::Pdf {
        sqlx::query("DELETE FROM attachment WHERE proposal_id = $1 AND role = $2 AND kind = 'pdf'")
            .bind(new.proposal_id)
            .bind(new.role.code())
            .execute(&mut *tx)
            .await?;
    }

    let id: i64 = sqlx::query_scalar(
        "INSERT INTO attachment (proposal_id, role, kind, mime_type, filename, data, md5, caption, \
                                 sort_order, uploader_id) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, \
                 (SELECT COALESCE(MAX(sort_order), 0) + 1 FROM attachment WHERE proposal_id = $1 AND role = $2), \
                 $9) \
         RETURNING id",
    )
    .bind(new.proposal_id)
    .bind(new.role.code())
    .bind(new.kind.code())
    .bind(new.mime_type)
    .bind(new.filename)
    .bind(new.data)
    .bind(&md5)
    .bind(new.caption.trim())
    .bind(new.uploader_id)
    .fetch_one(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(id)
}

pub async fn find_for_proposal(pool: &PgPool, proposal_id: i64) -> Result<Vec<AttachmentInfo>, AppError> {
    let rows = sqlx::query_as::<_, AttachmentInfo>(&format!(
        "SELECT {INFO_COLUMNS} FROM attachment WHERE proposal_id = $1 ORDER BY role, kind, sort_order, id"
    ))
    .bind(proposal_id)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

pub async fn find_info(pool: &PgPool, id: i64) -> Result<Option<AttachmentInfo>, AppError> {
    let row = sqlx::query_as::<_, AttachmentInfo>(&format!("SELECT {INFO_COLUMNS} FROM attachment WHERE id = $1"))
        .bind(id)
        .fetch_optional(pool)
        .await?;
    Ok(row)
}

pub async fn find_data(pool: &PgPool, proposal_id: i64, id: i64) -> Result<Option<AttachmentData>, AppError> {
    let row = sqlx::query_as::<_, AttachmentData>(
        "SELECT mime_type, filename, data FROM attachment WHERE id = $1 AND proposal_id = $2",
    )
    .bind(id)
    .bind(proposal_id)
    .fetch_optional(pool)
    .await?;
    Ok(row)
}

pub async fn update_caption(pool: &PgPool, proposal_id: i64, id: i64, caption: &str) -> Result<(), AppError> {
    let result = sqlx::query("UPDATE attachment SET caption = $3 WHERE id = $1 AND proposal_id = $2")
        .bind(id)
        .bind(proposal_id)
        .bind(caption.trim())
        .execute(pool)
        .await?;
    if result.rows_affected() == 0 {
        return Err(AppError::NotFound);
    }
    Ok(())
}

pub async fn delete(pool: &PgPool, proposal_id: i64, id: i64) -> Result<(), AppError> {
    let result = sqlx::query("DELETE FROM attachment WHERE id = $1 AND proposal_id = $2")
        .bind(id)
        .bind(proposal_id)
        .execute(pool)
        .await?;
    if result.rows_affected() == 0 {
        return Err(AppError::NotFound);
    }
    Ok(())
}

/// Attachments waiting for the background processor, oldest first.
pub async fn find_pending(pool: &PgPool, limit: i64) -> Result<Vec<PendingAttachment>, AppError> {
    let rows = sqlx::query_as::<_, PendingAttachment>(
        "SELECT id, kind, mime_type, data FROM attachment WHERE state = 'new' ORDER BY id LIMIT $1",
    )
    .bind(limit)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

pub async fn set_state(
    pool: &PgPool,
    id: i64,
    state: AttachmentState,
    pages: Option<i32>,
) -> Result<(), AppError> {
    sqlx::query("UPDATE attachment SET state = $2, pages = $3 WHERE id = $1")
        .bind(id)
        .bind(state.code())
        .bind(pages)
        .execute(pool)
        .await?;
    Ok(())
}

/// Process up to `limit` pending attachments; returns how many were handled.
pub async fn process_pending(pool: &PgPool, limit: i64) -> Result<usize, AppError> {
    let pending = find_pending(pool, limit).await?;
    let count = pending.len();
    for item in pending {
        let Some(kind) = AttachmentKind::from_code(&item.kind) else {
            set_state(pool, item.id, AttachmentState::Error, None).await?;
            continue;
        };
        match process(kind, &item.mime_type, &item.data) {
            Ok(pages) => set_state(pool, item.id, AttachmentState::Ready, pages).await?,
            Err(e) => {
                log::warn!("Attachment {} failed processing: {e}", item.id);
                set_state(pool, item.id, AttachmentState::Error, None).await?;
            }
        }
    }
    Ok(count)
}
