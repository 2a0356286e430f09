//! Batch job lifecycle: accept, poll, fetch result, cancel.
//!
//! Job metadata, live progress, and the final result each live under their
//! own TTL-bound key, so a completed job's result is only retrievable for a
//! bounded window. The worker that owns a job is the only writer of its
//! progress and result keys; the one exception is `cancel_job`, which flips
//! the status once and is then only read by the worker.

use crate::config::{CacheConfig, LimitsConfig, WorkerConfig};
use crate::models::{BatchJob, BatchOptions, JobProgress, JobStatus};
use crate::services::profiles::CachedProfiles;
use crate::workers::JobPayload;
use serde::Serialize;
use serde_json::Value;
use settlement_core::error::AppError;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

use super::cache::TtlStore;

pub fn job_key(job_id: &str) -> String {
    format!("settle:job:{}", job_id)
}

pub fn progress_key(job_id: &str) -> String {
    format!("settle:progress:{}", job_id)
}

pub fn result_key(job_id: &str) -> String {
    format!("settle:result:{}", job_id)
}

/// Cancellation marker. Lives on its own key so the owning worker's
/// progress writes can never clobber a cancel that landed mid-row.
pub fn cancel_key(job_id: &str) -> String {
    format!("settle:cancel:{}", job_id)
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueInfo {
    pub enqueued_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobStatusView {
    pub job_id: String,
    pub status: JobStatus,
    pub progress: JobProgress,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub queue_info: Option<QueueInfo>,
    pub estimated_remaining_time_ms: u64,
}

pub enum JobResultView {
    Ready(Value),
    Pending(JobProgress),
}

pub struct JobService {
    store: Arc<dyn TtlStore>,
    profiles: Arc<CachedProfiles>,
    job_tx: mpsc::Sender<JobPayload>,
    job_ttl: Duration,
    max_rows: usize,
    per_row_ms: u64,
}

impl JobService {
    pub fn new(
        store: Arc<dyn TtlStore>,
        profiles: Arc<CachedProfiles>,
        job_tx: mpsc::Sender<JobPayload>,
        cache: &CacheConfig,
        limits: &LimitsConfig,
        worker: &WorkerConfig,
    ) -> Self {
        Self {
            store,
            profiles,
            job_tx,
            job_ttl: cache.job_ttl(),
            max_rows: limits.async_batch_max_rows,
            per_row_ms: worker.per_row_estimate_ms,
        }
    }

    /// Accept a batch, persist its identity, and enqueue it. Returns
    /// without waiting on any computation.
    pub async fn start_batch_job(
        &self,
        dealer_code: &str,
        rows: Vec<Value>,
        options: BatchOptions,
    ) -> Result<BatchJob, AppError> {
        if rows.is_empty() {
            return Err(AppError::BadRequest(anyhow::anyhow!(
                "Batch must contain at least one row"
            )));
        }
        if rows.len() > self.max_rows {
            return Err(AppError::BadRequest(anyhow::anyhow!(
                "Batch of {} rows exceeds the maximum of {}",
                rows.len(),
                self.max_rows
            )));
        }

        self.profiles
            .get_active(dealer_code)
            .await?
            .ok_or_else(|| AppError::ProfileNotFound(dealer_code.to_string()))?;

        let job = BatchJob::new(
            dealer_code.to_string(),
            rows.len(),
            options,
            self.per_row_ms,
        );

        self.put_json(&job_key(&job.job_id), &job).await?;
        self.put_json(&progress_key(&job.job_id), &JobProgress::queued(&job.job_id))
            .await?;

        self.job_tx
            .try_send(JobPayload {
                job: job.clone(),
                rows,
            })
            .map_err(|_| {
                tracing::error!(job_id = %job.job_id, "Failed to enqueue batch job");
                AppError::InternalError(anyhow::anyhow!("Worker queue is full"))
            })?;

        metrics::counter!("settlement_jobs_total").increment(1);
        tracing::info!(
            job_id = %job.job_id,
            dealer_code,
            row_count = job.row_count,
            "Batch job accepted"
        );

        Ok(job)
    }

    pub async fn job_status(&self, job_id: &str) -> Result<JobStatusView, AppError> {
        let job = self.load_job(job_id).await?;
        let progress = self
            .load_progress(job_id)
            .await?
            .unwrap_or_else(|| JobProgress::queued(job_id));

        let queue_info = (progress.status == JobStatus::Queued).then(|| QueueInfo {
            enqueued_at: job.created_at,
        });

        let estimated_remaining_time_ms =
            estimate_remaining_ms(&progress, job.performance_estimate.total_time_ms);

        Ok(JobStatusView {
            job_id: job_id.to_string(),
            status: progress.status,
            progress,
            queue_info,
            estimated_remaining_time_ms,
        })
    }

    /// The final result set, available only once the job completed.
    /// Cancelled jobs never expose the rows computed before the checkpoint.
    pub async fn job_result(&self, job_id: &str) -> Result<JobResultView, AppError> {
        let _job = self.load_job(job_id).await?;
        let progress = self
            .load_progress(job_id)
            .await?
            .unwrap_or_else(|| JobProgress::queued(job_id));

        if progress.status != JobStatus::Completed {
            return Ok(JobResultView::Pending(progress));
        }

        match self
            .store
            .get(&result_key(job_id))
            .await
            .map_err(AppError::InternalError)?
        {
            Some(raw) => Ok(JobResultView::Ready(serde_json::from_str(&raw)?)),
            // Result TTL can lapse independently of progress TTL.
            None => Err(AppError::NotFound(anyhow::anyhow!(
                "Result for job '{}' has expired",
                job_id
            ))),
        }
    }

    /// Cooperative cancellation: flips the stored status; the owning worker
    /// observes it at its next per-row checkpoint.
    pub async fn cancel_job(&self, job_id: &str) -> Result<JobProgress, AppError> {
        let _job = self.load_job(job_id).await?;
        let progress = self
            .load_progress(job_id)
            .await?
            .unwrap_or_else(|| JobProgress::queued(job_id));

        if !progress.status.can_transition_to(JobStatus::Cancelled) {
            return Err(AppError::JobAlreadyTerminal(job_id.to_string()));
        }

        self.store
            .put(&cancel_key(job_id), "1", self.job_ttl)
            .await
            .map_err(AppError::InternalError)?;
        let cancelled = progress.cancelled();
        self.put_json(&progress_key(job_id), &cancelled).await?;

        metrics::counter!("settlement_jobs_cancelled").increment(1);
        tracing::info!(job_id, "Batch job cancelled");

        Ok(cancelled)
    }

    pub async fn load_job(&self, job_id: &str) -> Result<BatchJob, AppError> {
        match self
            .store
            .get(&job_key(job_id))
            .await
            .map_err(AppError::InternalError)?
        {
            Some(raw) => Ok(serde_json::from_str(&raw)?),
            None => Err(AppError::JobNotFound(job_id.to_string())),
        }
    }

    pub async fn load_progress(&self, job_id: &str) -> Result<Option<JobProgress>, AppError> {
        match self
            .store
            .get(&progress_key(job_id))
            .await
            .map_err(AppError::InternalError)?
        {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    async fn put_json<T: Serialize>(&self, key: &str, value: &T) -> Result<(), AppError> {
        let serialized = serde_json::to_string(value)?;
        self.store
            .put(key, &serialized, self.job_ttl)
            .await
            .map_err(AppError::InternalError)
    }
}

/// `total * (100 - pct) / 100`, clamped to 0 once done; the unknown
/// sentinel reports the full estimate and terminal states report 0.
fn estimate_remaining_ms(progress: &JobProgress, total_time_ms: u64) -> u64 {
    use crate::models::job::PERCENT_UNKNOWN;

    if progress.status.is_terminal() {
        return 0;
    }
    match progress.percentage {
        PERCENT_UNKNOWN => total_time_ms,
        pct if pct >= 100 => 0,
        pct if pct <= 0 => total_time_ms,
        pct => total_time_ms * (100 - pct as u64) / 100,
    }
}
