use chrono::Utc;
use sqlx::PgPool;

use super::state::{JobKind, JobStatus, JobsState};
use crate::audit;
use crate::models::{call, proposal};

/// Start copying a proposal into another call and return the job id.
/// The destination must still be open when the job runs.
pub async fn schedule_copy_job(
    jobs: JobsState,
    pool: PgPool,
    source: proposal::Proposal,
    call_id: i64,
    owner_id: i64,
) -> String {
    let job_id = jobs.register(JobKind::Copy, owner_id, source.id).await;
    let id = job_id.clone();

    tokio::spawn(async move {
        jobs.report(&id, JobStatus::Running).await;
        let status = match run(&pool, &source, call_id, owner_id).await {
            Ok(new_id) => JobStatus::Ready(format!("/proposals/{new_id}")),
            Err(message) => JobStatus::Failed(message),
        };
        jobs.report(&id, status).await;
    });

    job_id
}

async fn run(pool: &PgPool, source: &proposal::Proposal, call_id: i64, owner_id: i64) -> Result<i64, String> {
    let destination = call::find_by_id(pool, call_id)
        .await
        .map_err(|e| {
            log::error!("Copy job: {e}");
            "could not read the destination call".to_string()
        })?
        .ok_or_else(|| "the destination call does not exist".to_string())?;
    if destination.queue_id != source.queue_id {
        return Err("proposals can only be copied within the same queue".to_string());
    }
    if !destination.is_open_at(Utc::now()) {
        return Err("the destination call is not open".to_string());
    }

    let new_id = proposal::copy_to_call(pool, source, call_id).await.map_err(|e| {
        log::error!("Copy of proposal {} failed: {e}", source.id);
        "the proposal could not be copied".to_string()
    })?;

    let _ = audit::log(
        pool,
        owner_id,
        "proposal.copied",
        "proposal",
        new_id,
        serde_json::json!({"from": source.code(), "call_id": call_id}),
    )
    .await;
    log::info!("Copied proposal {} to call {call_id} as {new_id}", source.code());
    Ok(new_id)
}
