use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;
use tokio::sync::{RwLock, mpsc};

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "detail", rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Running,
    /// Finished; carries the link to the result.
    Ready(String),
    Failed(String),
}

impl JobStatus {
    pub fn is_finished(&self) -> bool {
        matches!(self, JobStatus::Ready(_) | JobStatus::Failed(_))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum JobKind {
    Pdf,
    Copy,
}

impl JobKind {
    pub fn label(self) -> &'static str {
        match self {
            JobKind::Pdf => "PDF generation",
            JobKind::Copy => "Proposal copy",
        }
    }
}

#[derive(Clone, Debug)]
pub struct JobRecord {
    pub kind: JobKind,
    /// Person who started the job; only they may see it.
    pub owner_id: i64,
    pub proposal_id: i64,
    pub status: JobStatus,
    /// Set when the status first becomes finished.
    pub finished_at: Option<Instant>,
}

impl JobRecord {
    /// Body of the JSON status endpoint.
    pub fn to_json(&self) -> serde_json::Value {
        let mut value = serde_json::json!({ "kind": self.kind, "proposal_id": self.proposal_id });
        if let (Some(map), Ok(serde_json::Value::Object(status))) =
            (value.as_object_mut(), serde_json::to_value(&self.status))
        {
            map.extend(status);
        }
        value
    }
}

#[derive(Debug)]
pub struct JobUpdate {
    pub(crate) job_id: String,
    pub(crate) status: JobStatus,
}

/// Shared job table. Workers report through `tx`; `start_job_updater` applies
/// the updates, so only it and `register` write the map.
#[derive(Clone)]
pub struct JobsState {
    pub jobs: Arc<RwLock<HashMap<String, JobRecord>>>,
    pub tx: mpsc::Sender<JobUpdate>,
}

impl JobsState {
    pub fn new(buffer: usize) -> (Self, mpsc::Receiver<JobUpdate>) {
        let (tx, rx) = mpsc::channel(buffer);
        let state = JobsState { jobs: Arc::new(RwLock::new(HashMap::new())), tx };
        (state, rx)
    }

    /// Add a pending job and return its id.
    pub async fn register(&self, kind: JobKind, owner_id: i64, proposal_id: i64) -> String {
        let job_id = uuid::Uuid::new_v4().to_string();
        self.jobs.write().await.insert(
            job_id.clone(),
            JobRecord { kind, owner_id, proposal_id, status: JobStatus::Pending, finished_at: None },
        );
        job_id
    }

    pub async fn get(&self, job_id: &str) -> Option<JobRecord> {
        self.jobs.read().await.get(job_id).cloned()
    }

    /// Drop jobs that finished more than `ttl` before `now`, returning their ids and records.
    pub async fn evict_finished(&self, ttl: Duration, now: Instant) -> Vec<(String, JobRecord)> {
        let mut jobs = self.jobs.write().await;
        let expired: Vec<String> = jobs
            .iter()
            .filter(|(_, r)| r.finished_at.is_some_and(|t| now.saturating_duration_since(t) > ttl))
            .map(|(id, _)| id.clone())
            .collect();
        expired
            .into_iter()
            .filter_map(|id| jobs.remove(&id).map(|r| (id, r)))
            .collect()
    }

    /// Queue a status change; a closed channel only means shutdown is under way.
    pub async fn report(&self, job_id: &str, status: JobStatus) {
        let update = JobUpdate { job_id: job_id.to_string(), status };
        if let Err(e) = self.tx.send(update).await {
            log::warn!("Job update for {job_id} dropped: {e}");
        }
    }
}

pub async fn start_job_updater(state: JobsState, mut rx: mpsc::Receiver<JobUpdate>) {
    while let Some(update) = rx.recv().await {
        let mut jobs = state.jobs.write().await;
        match jobs.get_mut(&update.job_id) {
            Some(record) => {
                if update.status.is_finished() && record.finished_at.is_none() {
                    record.finished_at = Some(Instant::now());
                }
                record.status = update.status;
            }
            None => log::warn!("Update for unknown job {}", update.job_id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn updates_flow_through_the_channel() {
        let (state, rx) = JobsState::new(8);
        let updater = tokio::spawn(start_job_updater(state.clone(), rx));

        let id = state.register(JobKind::Pdf, 7, 42).await;
        assert_eq!(state.get(&id).await.map(|r| r.status), Some(JobStatus::Pending));

        state.report(&id, JobStatus::Running).await;
        state.report(&id, JobStatus::Ready("/jobs/x/download".into())).await;

        for _ in 0..50 {
            if state.get(&id).await.is_some_and(|r| r.status.is_finished()) {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        let record = state.get(&id).await.unwrap();
        assert_eq!(record.status, JobStatus::Ready("/jobs/x/download".into()));
        assert_eq!(record.owner_id, 7);
        assert!(record.finished_at.is_some());

        drop(state);
        updater.abort();
    }

    #[tokio::test]
    async fn only_long_finished_jobs_are_evicted() {
        let (state, _rx) = JobsState::new(8);
        let ttl = Duration::from_secs(600);
        let done = state.register(JobKind::Pdf, 1, 10).await;
        let running = state.register(JobKind::Copy, 1, 11).await;
        let recent = state.register(JobKind::Pdf, 1, 12).await;

        let now = Instant::now();
        {
            let mut jobs = state.jobs.write().await;
            for (id, finished_at) in [(&done, now), (&recent, now + ttl)] {
                if let Some(r) = jobs.get_mut(id) {
                    r.status = JobStatus::Ready(format!("/jobs/{id}/download"));
                    r.finished_at = Some(finished_at);
                }
            }
        }

        let later = now + ttl + Duration::from_secs(1);
        let evicted = state.evict_finished(ttl, later).await;
        assert_eq!(evicted.len(), 1);
        assert_eq!(evicted[0].0, done);
        assert!(state.get(&done).await.is_none());
        assert!(state.get(&running).await.is_some());
        assert!(state.get(&recent).await.is_some());

        assert!(state.evict_finished(ttl, later).await.is_empty());
    }

    #[test]
    fn status_json_shape() {
        let record = JobRecord {
            kind: JobKind::Copy,
            owner_id: 1,
            proposal_id: 5,
            status: JobStatus::Failed("call closed".into()),
            finished_at: None,
        };
        let json = record.to_json();
        assert_eq!(
            json,
            serde_json::json!({"kind": "copy", "proposal_id": 5, "status": "failed", "detail": "call closed"})
        );
        let pending = serde_json::to_value(JobStatus::Pending).unwrap();
        assert_eq!(pending, serde_json::json!({"status": "pending"}));
    }
}
