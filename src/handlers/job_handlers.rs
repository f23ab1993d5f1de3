use actix_session::Session;
use actix_web::{HttpResponse, web};
use serde::Deserialize;
use sqlx::PgPool;

use crate::auth::session::require_person_id;
use crate::config::AppConfig;
use crate::errors::{AppError, json_error, render};
use crate::jobs::pdf::output_path;
use crate::jobs::{JobKind, JobRecord, JobStatus, JobsState};
use crate::models::proposal;
use crate::templates_structs::{JobStatusTemplate, PageContext};

/// The status page stops refreshing itself after this many polls.
const MAX_POLLS: u32 = 60;

#[derive(Debug, Deserialize)]
pub struct PollQuery {
    #[serde(default)]
    pub poll: u32,
}

/// Jobs are only visible to the person who started them.
async fn load_own(jobs: &JobsState, session: &Session, job_id: &str) -> Result<JobRecord, AppError> {
    let person_id = require_person_id(session)?;
    match jobs.get(job_id).await {
        Some(record) if record.owner_id == person_id => Ok(record),
        _ => Err(AppError::NotFound),
    }
}

fn status_parts(status: &JobStatus) -> (&'static str, String, Option<String>) {
    match status {
        JobStatus::Pending => ("Waiting to start", String::new(), None),
        JobStatus::Running => ("Running", String::new(), None),
        JobStatus::Ready(link) => ("Finished", String::new(), Some(link.clone())),
        JobStatus::Failed(msg) => ("Failed", msg.clone(), None),
    }
}

pub async fn status_page(
    config: web::Data<AppConfig>,
    jobs: web::Data<JobsState>,
    session: Session,
    path: web::Path<String>,
    query: web::Query<PollQuery>,
) -> Result<HttpResponse, AppError> {
    let job_id = path.into_inner();
    let record = load_own(&jobs, &session, &job_id).await?;
    let (status_label, detail, link) = status_parts(&record.status);
    let finished = record.status.is_finished();
    let gave_up = !finished && query.poll >= MAX_POLLS;

    let ctx = PageContext::build(&session, &config, "/proposals")?;
    render(JobStatusTemplate {
        ctx,
        job_id,
        kind_label: record.kind.label(),
        proposal_id: record.proposal_id,
        status_label,
        detail,
        link,
        failed: matches!(record.status, JobStatus::Failed(_)),
        refresh: !finished && !gave_up,
        next_poll: query.poll + 1,
        gave_up,
    })
}

pub async fn status_json(jobs: web::Data<JobsState>, session: Session, path: web::Path<String>) -> HttpResponse {
    match load_own(&jobs, &session, &path).await {
        Ok(record) => HttpResponse::Ok().json(record.to_json()),
        Err(e) => json_error(e),
    }
}

/// Send a finished PDF.
pub async fn download(
    pool: web::Data<PgPool>,
    config: web::Data<AppConfig>,
    jobs: web::Data<JobsState>,
    session: Session,
    path: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    let job_id = path.into_inner();
    let record = load_own(&jobs, &session, &job_id).await?;
    if record.kind != JobKind::Pdf || !matches!(record.status, JobStatus::Ready(_)) {
        return Err(AppError::NotFound);
    }
    let proposal = proposal::find_by_id(&pool, record.proposal_id).await?.ok_or(AppError::NotFound)?;
    let code = proposal.code();

    let data = match tokio::fs::read(output_path(&config.pdf_dir, &job_id)).await {
        Ok(data) => data,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Err(AppError::NotFound),
        Err(e) => return Err(e.into()),
    };
    Ok(HttpResponse::Ok()
        .content_type("application/pdf")
        .insert_header(("Content-Disposition", format!("attachment; filename=\"{code}.pdf\"")))
        .body(data))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finished_jobs_carry_link_or_message() {
        let (label, _, link) = status_parts(&JobStatus::Ready("/jobs/x/download".into()));
        assert_eq!(label, "Finished");
        assert_eq!(link.as_deref(), Some("/jobs/x/download"));

        let (label, detail, link) = status_parts(&JobStatus::Failed("font missing".into()));
        assert_eq!(label, "Failed");
        assert_eq!(detail, "font missing");
        assert!(link.is_none());
    }

    #[actix_web::test]
    async fn registered_jobs_record_their_owner() {
        let (jobs, _rx) = JobsState::new(4);
        let id = jobs.register(JobKind::Copy, 7, 1).await;
        assert_eq!(jobs.get(&id).await.map(|r| r.owner_id), Some(7));
        assert!(jobs.get("missing").await.is_none());
    }
}
