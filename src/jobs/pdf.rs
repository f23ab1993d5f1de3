use std::path::{Path, PathBuf};

use genpdf::elements::{Break, FrameCellDecorator, Paragraph, TableLayout};
use genpdf::style::{Style, StyledString};
use genpdf::{Document, SimplePageDecorator};
use sqlx::PgPool;

use super::state::{JobStatus, JobsState};
use crate::errors::AppError;
use crate::models::proposal::Proposal;
use crate::models::text::TextRole;
use crate::models::{attachment, member, target, text};

/// Everything printed in a proposal PDF, gathered before rendering so the
/// blocking render needs no database access.
#[derive(Debug, Clone, Default)]
pub struct PdfContent {
    pub code: String,
    pub title: String,
    pub call_title: String,
    pub state_label: String,
    /// (name, affiliation, roles)
    pub members: Vec<(String, String, String)>,
    /// (heading, body)
    pub sections: Vec<(String, String)>,
    /// (name, system, x, y, hours)
    pub targets: Vec<[String; 5]>,
    pub attachments: Vec<String>,
}

pub async fn load_content(pool: &PgPool, proposal: &Proposal) -> Result<PdfContent, AppError> {
    let members = member::find_for_proposal(pool, proposal.id).await?;
    let texts = text::find_for_proposal(pool, proposal.id).await?;
    let targets = target::find_for_proposal(pool, proposal.id).await?;
    let attachments = attachment::find_for_proposal(pool, proposal.id).await?;

    let sections = TextRole::ALL
        .into_iter()
        .map(|role| {
            let body = match texts.iter().find(|t| t.role == role.code()) {
                Some(t) if t.is_pdf() => "(Supplied as a separate PDF file.)".to_string(),
                Some(t) if !t.text.is_empty() => t.text.clone(),
                _ => "(Not written.)".to_string(),
            };
            (role.label().to_string(), body)
        })
        .collect();

    Ok(PdfContent {
        code: proposal.code(),
        title: proposal.title.clone(),
        call_title: proposal.call_title(),
        state_label: proposal.state_label().to_string(),
        members: members
            .iter()
            .map(|m| {
                let mut roles = Vec::new();
                if m.pi {
                    roles.push("PI");
                }
                if m.editor {
                    roles.push("Editor");
                }
                if m.observer {
                    roles.push("Observer");
                }
                (m.person_name.clone(), m.affiliation_display().to_string(), roles.join(", "))
            })
            .collect(),
        sections,
        targets: targets
            .iter()
            .map(|t| [t.name.clone(), t.system_display().to_string(), t.x_display(), t.y_display(), t.time_display()])
            .collect(),
        attachments: attachments
            .iter()
            .map(|a| {
                let role = TextRole::from_code(&a.role).map(|r| r.label()).unwrap_or("");
                if a.is_figure() {
                    format!("{role}: figure \"{}\" {}", a.filename, a.caption)
                } else {
                    format!("{role}: PDF \"{}\" ({} pages)", a.filename, a.pages_display())
                }
            })
            .collect(),
    })
}

fn heading(text: &str, size: u8) -> Paragraph {
    let mut p = Paragraph::new("");
    p.push(StyledString::new(text.to_string(), Style::new().bold().with_font_size(size)));
    p
}

fn table(widths: Vec<usize>, header: &[&str], rows: &[Vec<String>]) -> Result<TableLayout, genpdf::error::Error> {
    let mut table = TableLayout::new(widths);
    table.set_cell_decorator(FrameCellDecorator::new(true, true, false));
    let mut row = table.row();
    for h in header {
        let mut p = Paragraph::new("");
        p.push(StyledString::new(h.to_string(), Style::new().bold()));
        row = row.element(p);
    }
    row.push()?;
    for cells in rows {
        let mut row = table.row();
        for cell in cells {
            row = row.element(Paragraph::new(cell.clone()));
        }
        row.push()?;
    }
    Ok(table)
}

/// Lay out and write the PDF. Blocking; run it off the async runtime.
pub fn render(content: &PdfContent, font_dir: &Path, out: &Path) -> Result<(), String> {
    let fonts = genpdf::fonts::from_files(font_dir, "LiberationSans", None)
        .map_err(|e| format!("could not load fonts from {}: {e}", font_dir.display()))?;

    let mut doc = Document::new(fonts);
    doc.set_title(format!("{} {}", content.code, content.title));
    doc.set_font_size(10);
    let mut decorator = SimplePageDecorator::new();
    decorator.set_margins(15);
    doc.set_page_decorator(decorator);

    doc.push(heading(&format!("{}: {}", content.code, content.title), 16));
    doc.push(Paragraph::new(format!("{} | {}", content.call_title, content.state_label)));
    doc.push(Break::new(1));

    doc.push(heading("Members", 12));
    let member_rows: Vec<Vec<String>> =
        content.members.iter().map(|(n, a, r)| vec![n.clone(), a.clone(), r.clone()]).collect();
    doc.push(table(vec![3, 3, 2], &["Name", "Affiliation", "Role"], &member_rows).map_err(|e| e.to_string())?);
    doc.push(Break::new(1));

    for (title, body) in &content.sections {
        doc.push(heading(title, 12));
        for para in body.split("\n\n") {
            doc.push(Paragraph::new(para.replace('\n', " ")));
            doc.push(Break::new(0.5));
        }
        doc.push(Break::new(1));
    }

    doc.push(heading("Targets", 12));
    if content.targets.is_empty() {
        doc.push(Paragraph::new("(No targets.)"));
    } else {
        let rows: Vec<Vec<String>> = content.targets.iter().map(|t| t.to_vec()).collect();
        doc.push(
            table(vec![3, 2, 2, 2, 1], &["Name", "System", "x", "y", "Hours"], &rows).map_err(|e| e.to_string())?,
        );
    }

    if !content.attachments.is_empty() {
        doc.push(Break::new(1));
        doc.push(heading("Attachments", 12));
        for line in &content.attachments {
            doc.push(Paragraph::new(line.clone()));
        }
    }

    doc.render_to_file(out).map_err(|e| format!("could not write {}: {e}", out.display()))
}

pub fn output_path(pdf_dir: &Path, job_id: &str) -> PathBuf {
    pdf_dir.join(format!("{job_id}.pdf"))
}

/// Start a PDF job for a proposal and return its id.
pub async fn schedule_pdf_job(
    jobs: JobsState,
    pool: PgPool,
    pdf_dir: PathBuf,
    font_dir: PathBuf,
    proposal: Proposal,
    owner_id: i64,
) -> String {
    let job_id = jobs.register(super::JobKind::Pdf, owner_id, proposal.id).await;
    let id = job_id.clone();

    tokio::spawn(async move {
        jobs.report(&id, JobStatus::Running).await;

        let content = match load_content(&pool, &proposal).await {
            Ok(c) => c,
            Err(e) => {
                log::error!("PDF job {id}: {e}");
                jobs.report(&id, JobStatus::Failed("could not read the proposal".to_string())).await;
                return;
            }
        };
        if let Err(e) = tokio::fs::create_dir_all(&pdf_dir).await {
            log::error!("PDF job {id}: {e}");
            jobs.report(&id, JobStatus::Failed("could not create the output directory".to_string())).await;
            return;
        }

        let out = output_path(&pdf_dir, &id);
        let handle = tokio::task::spawn_blocking(move || render(&content, &font_dir, &out));
        let status = match handle.await {
            Ok(Ok(())) => JobStatus::Ready(format!("/jobs/{id}/download")),
            Ok(Err(e)) => {
                log::error!("PDF job {id}: {e}");
                JobStatus::Failed(e)
            }
            Err(join_err) => JobStatus::Failed(format!("join error: {join_err}")),
        };
        jobs.report(&id, status).await;
    });

    job_id
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn output_file_named_after_job() {
        let path = output_path(Path::new("/tmp/pdf"), "abc");
        assert_eq!(path, PathBuf::from("/tmp/pdf/abc.pdf"));
    }

    #[test]
    fn missing_fonts_reported() {
        let err = render(&PdfContent::default(), Path::new("/nonexistent-fonts"), Path::new("/tmp/x.pdf"))
            .unwrap_err();
        assert!(err.contains("could not load fonts"));
    }
}
