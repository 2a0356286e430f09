//! Worker pool for asynchronous batch jobs.
//!
//! A bounded queue feeds a single distributor task that hands each job to a
//! worker clone and spawns one task per job. At most one worker ever owns a
//! given job id, so a job's progress and result keys have exactly one writer.

use crate::config::{CacheConfig, WorkerConfig};
use crate::models::BatchJob;
use crate::services::cache::TtlStore;
use crate::services::profiles::CachedProfiles;
use crate::workers::worker::Worker;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone)]
pub struct JobPayload {
    pub job: BatchJob,
    pub rows: Vec<Value>,
}

pub struct JobOrchestrator {
    config: WorkerConfig,
    store: Arc<dyn TtlStore>,
    profiles: Arc<CachedProfiles>,
    job_ttl: std::time::Duration,
    job_rx: Option<mpsc::Receiver<JobPayload>>,
    shutdown_token: CancellationToken,
}

impl JobOrchestrator {
    pub fn new(
        config: WorkerConfig,
        cache: &CacheConfig,
        store: Arc<dyn TtlStore>,
        profiles: Arc<CachedProfiles>,
    ) -> (Self, mpsc::Sender<JobPayload>) {
        let (job_tx, job_rx) = mpsc::channel(config.queue_size);
        let shutdown_token = CancellationToken::new();

        let orchestrator = Self {
            config,
            store,
            profiles,
            job_ttl: cache.job_ttl(),
            job_rx: Some(job_rx),
            shutdown_token,
        };

        (orchestrator, job_tx)
    }

    pub async fn start(mut self) {
        let mut job_rx = self.job_rx.take().expect("start() can only be called once");

        if !self.config.enabled {
            tracing::info!("Worker pool disabled by configuration");
            // Keep the queue open so producers still get backpressure
            // semantics instead of a closed-channel error.
            self.shutdown_token.cancelled().await;
            drop(job_rx);
            return;
        }

        tracing::info!(
            worker_count = self.config.worker_count,
            "Starting worker pool"
        );

        let mut workers = Vec::new();
        for worker_id in 0..self.config.worker_count.max(1) {
            workers.push(Worker::new(
                worker_id,
                self.store.clone(),
                self.profiles.clone(),
                self.job_ttl,
                self.config.row_throttle(),
            ));
        }

        let shutdown = self.shutdown_token.clone();

        tokio::spawn(async move {
            let mut next_worker = 0;

            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => {
                        tracing::info!("Job distributor shutting down");
                        break;
                    }
                    payload = job_rx.recv() => {
                        match payload {
                            Some(payload) => {
                                // Round-robin distribution
                                let worker = &workers[next_worker];
                                next_worker = (next_worker + 1) % workers.len();

                                tracing::info!(
                                    worker_id = worker.id(),
                                    job_id = %payload.job.job_id,
                                    "Dispatching job to worker"
                                );

                                let worker_clone = worker.clone();
                                tokio::spawn(async move {
                                    worker_clone.run_job(payload).await;
                                });
                            }
                            None => {
                                tracing::info!("Channel closed, job distributor exiting");
                                break;
                            }
                        }
                    }
                }
            }
        });
    }

    /// Token that stops the distributor (and, for a disabled pool, closes
    /// the queue). Grab it before `start()` consumes the orchestrator.
    pub fn shutdown_handle(&self) -> CancellationToken {
        self.shutdown_token.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{CacheConfig, WorkerConfig};
    use crate::services::cache::MemoryStore;
    use crate::services::profiles::{CachedProfiles, StaticProfileSource};
    use std::time::Duration;

    fn make_orchestrator(enabled: bool) -> (JobOrchestrator, mpsc::Sender<JobPayload>) {
        let worker = WorkerConfig {
            enabled,
            worker_count: 2,
            queue_size: 4,
            per_row_estimate_ms: 5,
            row_throttle_ms: 0,
        };
        let cache = CacheConfig {
            profile_ttl_seconds: 60,
            job_ttl_seconds: 60,
        };
        let store = Arc::new(MemoryStore::new());
        let profiles = Arc::new(CachedProfiles::new(
            Arc::new(StaticProfileSource::new()),
            store.clone(),
            Duration::from_secs(60),
        ));
        JobOrchestrator::new(worker, &cache, store, profiles)
    }

    #[tokio::test]
    async fn shutdown_closes_the_job_queue() {
        let (orchestrator, job_tx) = make_orchestrator(true);
        let shutdown = orchestrator.shutdown_handle();
        let started = tokio::spawn(orchestrator.start());
        tokio::task::yield_now().await;

        shutdown.cancel();
        started.await.unwrap();
        // The distributor drops the receiver at its next poll.
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(job_tx.is_closed());
    }

    #[tokio::test]
    async fn disabled_pool_keeps_the_queue_open_until_shutdown() {
        let (orchestrator, job_tx) = make_orchestrator(false);
        let shutdown = orchestrator.shutdown_handle();
        let started = tokio::spawn(orchestrator.start());
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!job_tx.is_closed());

        shutdown.cancel();
        started.await.unwrap();
        assert!(job_tx.is_closed());
    }
}
