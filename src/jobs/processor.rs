use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use sqlx::PgPool;

use super::pdf::output_path;
use super::{JobKind, JobsState};
use crate::models::attachment;

const BATCH: i64 = 20;
const SWEEP_INTERVAL: Duration = Duration::from_secs(300);

/// Periodically move uploaded attachments out of the `new` state.
pub async fn run_attachment_processor(pool: PgPool, interval_secs: u64) {
    let mut ticker = tokio::time::interval(Duration::from_secs(interval_secs.max(1)));
    loop {
        ticker.tick().await;
        loop {
            match attachment::process_pending(&pool, BATCH).await {
                Ok(n) if n as i64 == BATCH => continue,
                Ok(0) => break,
                Ok(n) => {
                    log::info!("Processed {n} attachment(s)");
                    break;
                }
                Err(e) => {
                    log::error!("Attachment processing failed: {e}");
                    break;
                }
            }
        }
    }
}

/// Periodically forget finished jobs and delete generated PDFs once they are
/// older than `ttl`.
pub async fn run_job_sweeper(jobs: JobsState, pdf_dir: PathBuf, ttl: Duration) {
    let mut ticker = tokio::time::interval(SWEEP_INTERVAL.min(ttl.max(Duration::from_secs(1))));
    loop {
        ticker.tick().await;
        let removed = sweep_jobs(&jobs, &pdf_dir, ttl, Instant::now()).await;
        if removed > 0 {
            log::info!("Removed {removed} expired job(s) and PDF file(s)");
        }
    }
}

/// One sweep: evict expired jobs with their PDFs, then delete PDFs left
/// behind by jobs no longer tracked, such as those of an earlier run.
pub async fn sweep_jobs(jobs: &JobsState, pdf_dir: &Path, ttl: Duration, now: Instant) -> usize {
    let evicted = jobs.evict_finished(ttl, now).await;
    let mut removed = evicted.len();
    for (id, record) in &evicted {
        if record.kind == JobKind::Pdf {
            remove_pdf(&output_path(pdf_dir, id)).await;
        }
    }

    let mut entries = match tokio::fs::read_dir(pdf_dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return removed,
        Err(e) => {
            log::error!("Could not list {}: {e}", pdf_dir.display());
            return removed;
        }
    };
    loop {
        let entry = match entries.next_entry().await {
            Ok(Some(entry)) => entry,
            Ok(None) => break,
            Err(e) => {
                log::error!("Could not list {}: {e}", pdf_dir.display());
                break;
            }
        };
        let path = entry.path();
        let Some(job_id) = path.file_stem().and_then(|s| s.to_str()) else { continue };
        if path.extension().and_then(|e| e.to_str()) != Some("pdf") || jobs.get(job_id).await.is_some() {
            continue;
        }
        let expired = entry
            .metadata()
            .await
            .and_then(|m| m.modified())
            .ok()
            .and_then(|t| t.elapsed().ok())
            .is_some_and(|age| age >= ttl);
        if expired {
            remove_pdf(&path).await;
            removed += 1;
        }
    }
    removed
}

async fn remove_pdf(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => log::error!("Could not delete {}: {e}", path.display()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jobs::JobStatus;

    #[tokio::test]
    async fn sweep_removes_expired_jobs_and_stray_files() {
        let dir = std::env::temp_dir().join(format!("hedwig-sweep-{}", uuid::Uuid::new_v4()));
        tokio::fs::create_dir_all(&dir).await.unwrap();
        let (jobs, _rx) = JobsState::new(8);

        let done = jobs.register(JobKind::Pdf, 1, 10).await;
        let running = jobs.register(JobKind::Pdf, 1, 11).await;
        {
            let mut map = jobs.jobs.write().await;
            if let Some(r) = map.get_mut(&done) {
                r.status = JobStatus::Ready(format!("/jobs/{done}/download"));
                r.finished_at = Some(Instant::now());
            }
        }
        for name in [format!("{done}.pdf"), format!("{running}.pdf"), "left-over.pdf".to_string(), "notes.txt".to_string()] {
            tokio::fs::write(dir.join(name), b"%PDF-1.4").await.unwrap();
        }

        let later = Instant::now() + Duration::from_secs(1);
        let removed = sweep_jobs(&jobs, &dir, Duration::ZERO, later).await;
        assert_eq!(removed, 2);
        assert!(jobs.get(&done).await.is_none());
        assert!(!dir.join(format!("{done}.pdf")).exists());
        assert!(!dir.join("left-over.pdf").exists());
        assert!(dir.join(format!("{running}.pdf")).exists(), "files of tracked jobs stay");
        assert!(dir.join("notes.txt").exists());

        tokio::fs::remove_dir_all(&dir).await.unwrap();
    }
}
