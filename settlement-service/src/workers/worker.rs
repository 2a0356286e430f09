//! Per-job worker: runs one batch through the calculator row by row.
//!
//! The worker polls the job's cancellation marker before each row, so an
//! externally requested cancel takes effect within one row's processing
//! time. The marker lives on its own key; progress writes can never
//! clobber it.

use crate::models::{
    BatchOutput, BatchRowOutcome, BatchSummary, DealerProfile, JobProgress, JobStatus,
    SettlementInput,
};
use crate::services::cache::TtlStore;
use crate::services::calculator;
use crate::services::jobs::{cancel_key, progress_key, result_key};
use crate::services::profiles::CachedProfiles;
use crate::workers::orchestrator::JobPayload;
use serde::Serialize;
use settlement_core::error::AppError;
use std::sync::Arc;
use std::time::{Duration, Instant};

#[derive(Clone)]
pub struct Worker {
    id: usize,
    store: Arc<dyn TtlStore>,
    profiles: Arc<CachedProfiles>,
    job_ttl: Duration,
    row_throttle: Option<Duration>,
}

enum JobOutcome {
    Completed,
    Cancelled,
}

impl Worker {
    pub fn new(
        id: usize,
        store: Arc<dyn TtlStore>,
        profiles: Arc<CachedProfiles>,
        job_ttl: Duration,
        row_throttle: Option<Duration>,
    ) -> Self {
        Self {
            id,
            store,
            profiles,
            job_ttl,
            row_throttle,
        }
    }

    pub fn id(&self) -> usize {
        self.id
    }

    pub async fn run_job(&self, payload: JobPayload) {
        let job_id = payload.job.job_id.clone();
        let row_count = payload.rows.len();
        let start = Instant::now();

        tracing::info!(
            worker_id = self.id,
            job_id = %job_id,
            row_count,
            "Processing job started"
        );

        match self.execute(&payload).await {
            Ok(JobOutcome::Completed) => {
                metrics::counter!("settlement_jobs_completed").increment(1);
                metrics::counter!("settlement_rows_total").increment(row_count as u64);
                metrics::histogram!("settlement_job_duration_seconds")
                    .record(start.elapsed().as_secs_f64());

                tracing::info!(
                    worker_id = self.id,
                    job_id = %job_id,
                    duration_ms = start.elapsed().as_millis(),
                    "Processing succeeded"
                );
            }
            Ok(JobOutcome::Cancelled) => {
                self.ensure_cancelled_progress(&job_id).await;
                tracing::info!(
                    worker_id = self.id,
                    job_id = %job_id,
                    "Job cancelled at checkpoint, stopping"
                );
            }
            Err(e) => {
                self.mark_failed(&job_id, e.to_string()).await;
                metrics::counter!("settlement_jobs_failed").increment(1);

                tracing::error!(
                    worker_id = self.id,
                    job_id = %job_id,
                    error = %e,
                    "Processing failed"
                );
            }
        }
    }

    async fn execute(&self, payload: &JobPayload) -> Result<JobOutcome, AppError> {
        let job = &payload.job;

        // A cancel issued while the job sat in the queue wins outright.
        if self.is_cancelled(&job.job_id).await? {
            return Ok(JobOutcome::Cancelled);
        }
        let progress = self
            .load_progress(&job.job_id)
            .await?
            .unwrap_or_else(|| JobProgress::queued(&job.job_id));

        let profile = self
            .profiles
            .get_active(&job.dealer_code)
            .await?
            .ok_or_else(|| AppError::ProfileNotFound(job.dealer_code.clone()))?;

        let progress = progress.advanced(0, format!("Processing 0/{} rows", job.row_count));
        self.write_progress(&progress).await?;

        let mut results = Vec::with_capacity(payload.rows.len());
        let mut success = 0usize;
        let mut errors = 0usize;
        let mut progress = progress;

        for (index, row) in payload.rows.iter().enumerate() {
            // Cooperative cancellation checkpoint.
            if self.is_cancelled(&job.job_id).await? {
                return Ok(JobOutcome::Cancelled);
            }

            match compute_row(row, &profile) {
                Ok(result) => {
                    success += 1;
                    results.push(BatchRowOutcome {
                        index,
                        success: true,
                        result: Some(result),
                        error: None,
                    });
                }
                Err(err) => {
                    errors += 1;
                    results.push(BatchRowOutcome {
                        index,
                        success: false,
                        result: None,
                        error: Some(err.to_string()),
                    });
                }
            }

            let done = index + 1;
            let percentage = ((done as f64 / payload.rows.len() as f64) * 100.0).round() as i32;

            // Capped at 99: percentage 100 appears only with the completed
            // snapshot, once the result key exists.
            progress = progress.advanced(
                percentage.min(99),
                format!("Processing {}/{} rows", done, job.row_count),
            );
            self.write_progress(&progress).await?;

            if let Some(throttle) = self.row_throttle {
                tokio::time::sleep(throttle).await;
            }
        }

        // A cancel that landed during the last row still wins.
        if self.is_cancelled(&job.job_id).await? {
            return Ok(JobOutcome::Cancelled);
        }

        let output = BatchOutput {
            results,
            summary: BatchSummary {
                total: payload.rows.len(),
                success,
                errors,
            },
        };

        self.put_json(&result_key(&job.job_id), &output).await?;
        self.write_progress(&progress.completed()).await?;

        Ok(JobOutcome::Completed)
    }

    async fn is_cancelled(&self, job_id: &str) -> Result<bool, AppError> {
        Ok(self
            .store
            .get(&cancel_key(job_id))
            .await
            .map_err(AppError::InternalError)?
            .is_some())
    }

    /// A progress write racing the cancel request may have left the stored
    /// status at Processing; put the cancelled snapshot back.
    async fn ensure_cancelled_progress(&self, job_id: &str) {
        let current = match self.load_progress(job_id).await {
            Ok(Some(progress)) => progress,
            Ok(None) => JobProgress::queued(job_id),
            Err(e) => {
                tracing::error!(job_id, error = %e, "Failed to read progress after cancel");
                return;
            }
        };

        if current.status == JobStatus::Cancelled {
            return;
        }
        if let Err(e) = self.write_progress(&current.cancelled()).await {
            tracing::error!(job_id, error = %e, "Failed to restore cancelled progress");
        }
    }

    async fn mark_failed(&self, job_id: &str, message: String) {
        let progress = match self.load_progress(job_id).await {
            Ok(Some(progress)) => progress,
            _ => JobProgress::queued(job_id),
        };

        if progress.status.is_terminal() {
            return;
        }

        if let Err(e) = self.write_progress(&progress.failed(message)).await {
            tracing::error!(
                job_id,
                error = %e,
                "Failed to record job failure"
            );
        }
    }

    async fn load_progress(&self, job_id: &str) -> Result<Option<JobProgress>, AppError> {
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

    async fn write_progress(&self, progress: &JobProgress) -> Result<(), AppError> {
        self.put_json(&progress_key(&progress.job_id), progress).await
    }

    async fn put_json<T: Serialize>(&self, key: &str, value: &T) -> Result<(), AppError> {
        let serialized = serde_json::to_string(value)?;
        self.store
            .put(key, &serialized, self.job_ttl)
            .await
            .map_err(AppError::InternalError)
    }
}

fn compute_row(
    row: &serde_json::Value,
    profile: &DealerProfile,
) -> Result<crate::models::SettlementResult, AppError> {
    let input = SettlementInput::from_value(row).map_err(AppError::InvalidInput)?;
    calculator::compute_with_profile(&input, profile)
}
