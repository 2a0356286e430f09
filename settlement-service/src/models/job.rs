//! Batch job metadata and live progress.
//!
//! Progress percentages use two reserved sentinels below the 0-100 range:
//! `-1` means the job has not produced a progress sample yet and `-2` means
//! the job was cancelled.

use crate::models::settlement::BatchOptions;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const PERCENT_UNKNOWN: i32 = -1;
pub const PERCENT_CANCELLED: i32 = -2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Queued,
    Processing,
    Completed,
    Failed,
    Cancelled,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobStatus::Completed | JobStatus::Failed | JobStatus::Cancelled
        )
    }

    /// Legal transitions of the job state machine. Terminal states admit
    /// no successor.
    pub fn can_transition_to(&self, next: JobStatus) -> bool {
        match (self, next) {
            (JobStatus::Queued, JobStatus::Processing) => true,
            (JobStatus::Queued, JobStatus::Cancelled) => true,
            (JobStatus::Processing, JobStatus::Completed) => true,
            (JobStatus::Processing, JobStatus::Failed) => true,
            (JobStatus::Processing, JobStatus::Cancelled) => true,
            _ => false,
        }
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            JobStatus::Queued => "queued",
            JobStatus::Processing => "processing",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
            JobStatus::Cancelled => "cancelled",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PerformanceEstimate {
    pub total_time_ms: u64,
    pub per_row_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchJob {
    pub job_id: String,
    pub dealer_code: String,
    pub row_count: usize,
    pub options: BatchOptions,
    pub created_at: DateTime<Utc>,
    pub performance_estimate: PerformanceEstimate,
}

impl BatchJob {
    pub fn new(
        dealer_code: String,
        row_count: usize,
        options: BatchOptions,
        per_row_ms: u64,
    ) -> Self {
        BatchJob {
            job_id: Uuid::new_v4().to_string(),
            dealer_code,
            row_count,
            options,
            created_at: Utc::now(),
            performance_estimate: PerformanceEstimate {
                total_time_ms: per_row_ms * row_count as u64,
                per_row_ms,
            },
        }
    }

    pub fn estimated_completion_time(&self) -> DateTime<Utc> {
        self.created_at
            + chrono::Duration::milliseconds(self.performance_estimate.total_time_ms as i64)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobProgress {
    pub job_id: String,
    pub percentage: i32,
    pub status: JobStatus,
    pub message: String,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub finished_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub cancelled_at: Option<DateTime<Utc>>,
}

impl JobProgress {
    pub fn queued(job_id: &str) -> Self {
        JobProgress {
            job_id: job_id.to_string(),
            percentage: PERCENT_UNKNOWN,
            status: JobStatus::Queued,
            message: "Job queued".to_string(),
            updated_at: Utc::now(),
            started_at: None,
            finished_at: None,
            cancelled_at: None,
        }
    }

    pub fn advanced(mut self, percentage: i32, message: String) -> Self {
        self.percentage = percentage;
        self.status = JobStatus::Processing;
        self.message = message;
        self.updated_at = Utc::now();
        if self.started_at.is_none() {
            self.started_at = Some(self.updated_at);
        }
        self
    }

    pub fn completed(mut self) -> Self {
        self.percentage = 100;
        self.status = JobStatus::Completed;
        self.message = "Job completed".to_string();
        self.updated_at = Utc::now();
        self.finished_at = Some(self.updated_at);
        self
    }

    pub fn failed(mut self, message: String) -> Self {
        self.percentage = self.percentage.max(0);
        self.status = JobStatus::Failed;
        self.message = message;
        self.updated_at = Utc::now();
        self.finished_at = Some(self.updated_at);
        self
    }

    pub fn cancelled(mut self) -> Self {
        self.percentage = PERCENT_CANCELLED;
        self.status = JobStatus::Cancelled;
        self.message = "Job cancelled".to_string();
        self.updated_at = Utc::now();
        self.cancelled_at = Some(self.updated_at);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_states_admit_no_successor() {
        for terminal in [JobStatus::Completed, JobStatus::Failed, JobStatus::Cancelled] {
            assert!(terminal.is_terminal());
            for next in [
                JobStatus::Queued,
                JobStatus::Processing,
                JobStatus::Completed,
                JobStatus::Failed,
                JobStatus::Cancelled,
            ] {
                assert!(!terminal.can_transition_to(next));
            }
        }
    }

    #[test]
    fn queued_job_can_start_or_cancel_only() {
        assert!(JobStatus::Queued.can_transition_to(JobStatus::Processing));
        assert!(JobStatus::Queued.can_transition_to(JobStatus::Cancelled));
        assert!(!JobStatus::Queued.can_transition_to(JobStatus::Completed));
        assert!(!JobStatus::Queued.can_transition_to(JobStatus::Failed));
    }

    #[test]
    fn processing_job_can_finish_fail_or_cancel() {
        assert!(JobStatus::Processing.can_transition_to(JobStatus::Completed));
        assert!(JobStatus::Processing.can_transition_to(JobStatus::Failed));
        assert!(JobStatus::Processing.can_transition_to(JobStatus::Cancelled));
        assert!(!JobStatus::Processing.can_transition_to(JobStatus::Queued));
    }

    #[test]
    fn cancellation_sets_sentinel_percentage() {
        let progress = JobProgress::queued("j1").cancelled();
        assert_eq!(progress.percentage, PERCENT_CANCELLED);
        assert_eq!(progress.status, JobStatus::Cancelled);
        assert!(progress.cancelled_at.is_some());
    }

    #[test]
    fn first_advance_records_start_time() {
        let progress = JobProgress::queued("j1").advanced(0, "starting".to_string());
        assert!(progress.started_at.is_some());
        assert_eq!(progress.status, JobStatus::Processing);
    }

    #[test]
    fn estimate_scales_with_row_count() {
        let job = BatchJob::new("D-001".to_string(), 200, BatchOptions::default(), 5);
        assert_eq!(job.performance_estimate.total_time_ms, 1000);
        assert_eq!(job.row_count, 200);
    }
}
