pub mod job;
pub mod profile;
pub mod settlement;

pub use job::{BatchJob, JobProgress, JobStatus, PerformanceEstimate};
pub use profile::{DealerProfile, ProfileStatus};
pub use settlement::{
    BatchOptions, BatchOutput, BatchRowOutcome, BatchSummary, OutputFormat, SettlementInput,
    SettlementResult, DEFAULT_TAX_RATE,
};
