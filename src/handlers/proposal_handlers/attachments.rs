use actix_multipart::Multipart;
use actix_session::Session;
use actix_web::{HttpResponse, web};
use sqlx::PgPool;

use super::access::{load_editable, load_viewable};
use crate::auth::csrf;
use crate::auth::session::set_flash;
use crate::config::AppConfig;
use crate::errors::{AppError, redirect};
use crate::handlers::auth_handlers::CsrfOnly;
use crate::handlers::upload::read_multipart;
use crate::models::attachment::{self, AttachmentKind, CaptionForm, NewAttachment, detect_mime};
use crate::models::text::TextRole;

pub async fn upload(
    pool: web::Data<PgPool>,
    config: web::Data<AppConfig>,
    session: Session,
    path: web::Path<(i64, String)>,
    payload: Multipart,
) -> Result<HttpResponse, AppError> {
    let (proposal_id, role) = path.into_inner();
    let role = TextRole::from_code(&role).filter(|r| r.allows_attachments()).ok_or(AppError::NotFound)?;
    let form = read_multipart(payload, config.max_upload_bytes).await?;
    csrf::validate_csrf(&session, form.field("csrf_token"))?;
    let access = load_editable(&pool, &session, proposal_id).await?;
    let back = format!("/proposals/{proposal_id}/text/{}", role.code());

    let kind = AttachmentKind::from_code(form.field("kind")).unwrap_or(AttachmentKind::Figure);
    let Some(file) = form.file.as_ref().filter(|f| !f.data.is_empty()) else {
        set_flash(&session, "Please choose a file to upload");
        return Ok(redirect(back));
    };
    let Some(mime_type) = detect_mime(&file.data).filter(|m| kind.accepts(m)) else {
        set_flash(&session, match kind {
            AttachmentKind::Pdf => "The file does not appear to be a PDF",
            AttachmentKind::Figure => "Figures must be PNG, JPEG, or GIF images (or a PDF)",
        });
        return Ok(redirect(back));
    };

    let attachment_id = attachment::create(
        &pool,
        &NewAttachment {
            proposal_id,
            role,
            kind,
            mime_type,
            filename: &file.filename,
            data: &file.data,
            caption: form.field("caption"),
            uploader_id: access.person_id,
        },
    )
    .await?;
    let _ = crate::audit::log(
        &pool,
        access.person_id,
        "attachment.uploaded",
        "proposal",
        proposal_id,
        serde_json::json!({
            "attachment_id": attachment_id,
            "role": role.code(),
            "kind": kind.code(),
            "filename": file.filename,
            "bytes": file.data.len(),
        }),
    )
    .await;
    log::info!("Attachment {attachment_id} ({} bytes) uploaded for proposal {proposal_id}", file.data.len());

    set_flash(&session, format!("{} uploaded; it will be checked shortly", file.filename));
    Ok(redirect(back))
}

pub async fn download(
    pool: web::Data<PgPool>,
    session: Session,
    path: web::Path<(i64, i64)>,
) -> Result<HttpResponse, AppError> {
    let (proposal_id, attachment_id) = path.into_inner();
    load_viewable(&pool, &session, proposal_id).await?;
    let data = attachment::find_data(&pool, proposal_id, attachment_id).await?.ok_or(AppError::NotFound)?;

    Ok(HttpResponse::Ok()
        .content_type(data.mime_type)
        .insert_header(("Content-Disposition", format!("inline; filename=\"{}\"", data.filename)))
        .body(data.data))
}

pub async fn update_caption(
    pool: web::Data<PgPool>,
    session: Session,
    path: web::Path<(i64, i64)>,
    form: web::Form<CaptionForm>,
) -> Result<HttpResponse, AppError> {
    csrf::validate_csrf(&session, &form.csrf_token)?;
    let (proposal_id, attachment_id) = path.into_inner();
    load_editable(&pool, &session, proposal_id).await?;
    let info = attachment::find_info(&pool, attachment_id).await?.ok_or(AppError::NotFound)?;

    attachment::update_caption(&pool, proposal_id, attachment_id, &form.caption).await?;
    set_flash(&session, "Caption saved");
    Ok(redirect(format!("/proposals/{proposal_id}/text/{}", info.role)))
}

pub async fn delete(
    pool: web::Data<PgPool>,
    session: Session,
    path: web::Path<(i64, i64)>,
    form: web::Form<CsrfOnly>,
) -> Result<HttpResponse, AppError> {
    csrf::validate_csrf(&session, &form.csrf_token)?;
    let (proposal_id, attachment_id) = path.into_inner();
    let access = load_editable(&pool, &session, proposal_id).await?;
    let info = attachment::find_info(&pool, attachment_id).await?.ok_or(AppError::NotFound)?;
    if info.proposal_id != proposal_id {
        return Err(AppError::NotFound);
    }

    attachment::delete(&pool, proposal_id, attachment_id).await?;
    let _ = crate::audit::log(
        &pool,
        access.person_id,
        "attachment.deleted",
        "proposal",
        proposal_id,
        serde_json::json!({ "attachment_id": attachment_id, "filename": info.filename }),
    )
    .await;

    set_flash(&session, format!("{} deleted", info.filename));
    Ok(redirect(format!("/proposals/{proposal_id}/text/{}", info.role)))
}
