use actix_session::Session;
use actix_web::{HttpResponse, web};
use sqlx::PgPool;

use super::access::load_editable;
use crate::auth::csrf;
use crate::auth::session::set_flash;
use crate::config::AppConfig;
use crate::errors::{AppError, redirect, render};
use crate::models::attachment::{self, AttachmentInfo, AttachmentKind};
use crate::models::call::{self, TextLimits, format_datetime};
use crate::models::text::{self, FormatForm, ProposalText, TextForm, TextFormat, TextRole};
use crate::templates_structs::{PageContext, SectionView, TextEditTemplate};

/// (word, figure, page) limits of a section.
fn section_limits(role: TextRole, limits: &TextLimits) -> (i32, i32, i32) {
    match role {
        TextRole::Abstract => (limits.abst_word_lim, 0, 0),
        TextRole::ScienceCase => (limits.sci_word_lim, limits.sci_fig_lim, limits.sci_page_lim),
        TextRole::TechnicalCase => (limits.tech_word_lim, limits.tech_fig_lim, limits.tech_page_lim),
    }
}

pub fn section_view(role: TextRole, texts: &[ProposalText], attachments: &[AttachmentInfo], limits: &TextLimits) -> SectionView {
    let stored = texts.iter().find(|t| t.role == role.code());
    let (word_limit, figure_limit, page_limit) = section_limits(role, limits);
    let of_role = move || attachments.iter().filter(move |a| a.role == role.code());
    SectionView {
        role: role.code(),
        label: role.label(),
        is_pdf: stored.is_some_and(|t| t.is_pdf()),
        text: stored.map(|t| t.text.clone()).unwrap_or_default(),
        words: stored.map(|t| t.words).unwrap_or(0),
        word_limit,
        figure_limit,
        page_limit,
        allows_attachments: role.allows_attachments(),
        figures: of_role().filter(|a| a.is_figure()).cloned().collect(),
        pdf: of_role().find(|a| a.kind == AttachmentKind::Pdf.code()).cloned(),
        edited: stored
            .map(|t| match &t.editor_name {
                Some(name) => format!("{} by {}", format_datetime(t.edited_at), name),
                None => format_datetime(t.edited_at),
            })
            .unwrap_or_default(),
    }
}

pub fn build_sections(texts: &[ProposalText], attachments: &[AttachmentInfo], limits: &TextLimits) -> Vec<SectionView> {
    TextRole::ALL
        .into_iter()
        .map(|role| section_view(role, texts, attachments, limits))
        .collect()
}

fn parse_role(code: &str) -> Result<TextRole, AppError> {
    TextRole::from_code(code).ok_or(AppError::NotFound)
}

pub async fn edit_page(
    pool: web::Data<PgPool>,
    config: web::Data<AppConfig>,
    session: Session,
    path: web::Path<(i64, String)>,
) -> Result<HttpResponse, AppError> {
    let (proposal_id, role) = path.into_inner();
    let role = parse_role(&role)?;
    let access = load_editable(&pool, &session, proposal_id).await?;
    let call = call::find_by_id(&pool, access.proposal.call_id).await?.ok_or(AppError::NotFound)?;

    let texts = text::find_for_proposal(&pool, proposal_id).await?;
    let attachments = attachment::find_for_proposal(&pool, proposal_id).await?;
    let section = section_view(role, &texts, &attachments, &call.limits());

    let ctx = PageContext::build(&session, &config, "/proposals")?;
    render(TextEditTemplate {
        ctx,
        proposal: access.proposal,
        section,
        caption_limit: call.capt_word_lim,
        errors: vec![],
    })
}

pub async fn save(
    pool: web::Data<PgPool>,
    session: Session,
    path: web::Path<(i64, String)>,
    form: web::Form<TextForm>,
) -> Result<HttpResponse, AppError> {
    csrf::validate_csrf(&session, &form.csrf_token)?;
    let (proposal_id, role) = path.into_inner();
    let role = parse_role(&role)?;
    let access = load_editable(&pool, &session, proposal_id).await?;
    let call = call::find_by_id(&pool, access.proposal.call_id).await?.ok_or(AppError::NotFound)?;

    let words = text::save_plain(&pool, proposal_id, role, &form.text, access.person_id).await?;
    let _ = crate::audit::log(
        &pool,
        access.person_id,
        "proposal.text_saved",
        "proposal",
        proposal_id,
        serde_json::json!({ "role": role.code(), "words": words }),
    )
    .await;

    let (limit, _, _) = section_limits(role, &call.limits());
    if limit > 0 && words > limit {
        set_flash(&session, format!("Saved, but the text has {words} words, over the limit of {limit}"));
    } else {
        set_flash(&session, format!("{} saved ({words} words)", role.label()));
    }
    Ok(redirect(format!("/proposals/{proposal_id}/text/{}", role.code())))
}

pub async fn set_format(
    pool: web::Data<PgPool>,
    session: Session,
    path: web::Path<(i64, String)>,
    form: web::Form<FormatForm>,
) -> Result<HttpResponse, AppError> {
    csrf::validate_csrf(&session, &form.csrf_token)?;
    let (proposal_id, role) = path.into_inner();
    let role = parse_role(&role)?;
    let access = load_editable(&pool, &session, proposal_id).await?;

    let format = TextFormat::from_code(&form.format)
        .ok_or_else(|| AppError::Upload("Unknown text format".to_string()))?;
    if format == TextFormat::Pdf && !role.allows_attachments() {
        return Err(AppError::Upload(format!("The {} cannot be uploaded as a PDF", role.label().to_lowercase())));
    }

    text::set_format(&pool, proposal_id, role, format, access.person_id).await?;
    set_flash(&session, match format {
        TextFormat::Pdf => "This section will now be taken from an uploaded PDF",
        TextFormat::Plain => "This section will now be entered as text",
    });
    Ok(redirect(format!("/proposals/{proposal_id}/text/{}", role.code())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn limits() -> TextLimits {
        TextLimits {
            abst_word_lim: 200,
            sci_word_lim: 1000,
            sci_fig_lim: 4,
            sci_page_lim: 2,
            tech_word_lim: 500,
            tech_fig_lim: 2,
            tech_page_lim: 1,
            capt_word_lim: 100,
        }
    }

    fn attachment(id: i64, role: &str, kind: &str) -> AttachmentInfo {
        AttachmentInfo {
            id,
            proposal_id: 1,
            role: role.into(),
            kind: kind.into(),
            mime_type: "image/png".into(),
            filename: format!("{id}.png"),
            md5: String::new(),
            caption: String::new(),
            sort_order: id as i32,
            state: "ready".into(),
            pages: None,
            uploaded_at: Utc::now(),
        }
    }

    #[test]
    fn sections_pick_their_own_text_and_uploads() {
        let texts = vec![ProposalText {
            role: "science_case".into(),
            format: "plain".into(),
            text: "Dust in the Milky Way".into(),
            words: 5,
            edited_at: Utc::now(),
            editor_name: Some("Ada".into()),
        }];
        let attachments = vec![
            attachment(1, "science_case", "figure"),
            attachment(2, "technical_case", "figure"),
            attachment(3, "technical_case", "pdf"),
        ];
        let sections = build_sections(&texts, &attachments, &limits());
        assert_eq!(sections.len(), 3);

        let abst = &sections[0];
        assert!(abst.is_empty());
        assert_eq!(abst.word_limit, 200);
        assert!(!abst.allows_attachments);

        let sci = &sections[1];
        assert_eq!(sci.words, 5);
        assert_eq!(sci.figures.len(), 1);
        assert!(sci.pdf.is_none());
        assert!(sci.edited.ends_with("by Ada"));

        let tech = &sections[2];
        assert_eq!(tech.figures.len(), 1);
        assert_eq!(tech.pdf.as_ref().map(|p| p.id), Some(3));
        assert_eq!((tech.figure_limit, tech.page_limit), (2, 1));
    }
}
