pub mod orchestrator;
pub mod worker;

pub use orchestrator::{JobOrchestrator, JobPayload};
pub use worker::Worker;
