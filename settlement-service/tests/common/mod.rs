//! Test helper module for settlement-service integration tests.
//!
//! Builds the full router against the in-process store and drives it with
//! `tower::util::ServiceExt::oneshot`; no external services required.

#![allow(dead_code)]

use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode},
};
use http_body_util::BodyExt;
use serde_json::Value;
use settlement_service::config::{
    CacheConfig, LimitsConfig, ProfilesConfig, RedisConfig, SettlementConfig, WorkerConfig,
};
use settlement_service::models::{DealerProfile, ProfileStatus};
use settlement_service::services::{
    CachedProfiles, JobService, MemoryStore, StaticProfileSource, init_metrics,
};
use settlement_service::startup::{AppState, build_router};
use settlement_service::workers::JobOrchestrator;
use std::sync::Arc;
use std::time::Duration;
use tower::util::ServiceExt;

pub const TEST_DEALER: &str = "D-100";
pub const INACTIVE_DEALER: &str = "D-900";

pub struct TestApp {
    pub router: Router,
}

impl TestApp {
    /// Spawn an app with unthrottled workers.
    pub async fn spawn() -> Self {
        Self::spawn_with_throttle(0).await
    }

    /// Spawn an app whose workers sleep `row_throttle_ms` per row, which
    /// keeps jobs observable mid-flight for progress/cancellation tests.
    pub async fn spawn_with_throttle(row_throttle_ms: u64) -> Self {
        Self::build(true, row_throttle_ms, 1_000_000).await
    }

    /// Spawn an app whose worker pool never picks jobs up, so queued-state
    /// views stay stable.
    pub async fn spawn_with_workers_disabled() -> Self {
        Self::build(false, 0, 1_000_000).await
    }

    /// Spawn an app with a small per-IP quota.
    pub async fn spawn_with_rate_limit(rate_limit_per_minute: u32) -> Self {
        Self::build(true, 0, rate_limit_per_minute).await
    }

    async fn build(
        workers_enabled: bool,
        row_throttle_ms: u64,
        rate_limit_per_minute: u32,
    ) -> Self {
        init_metrics();

        let config = SettlementConfig {
            common: settlement_core::config::Config {
                port: 0,
                environment: settlement_core::config::Environment::Dev,
            },
            redis: RedisConfig { url: None },
            cache: CacheConfig {
                profile_ttl_seconds: 300,
                job_ttl_seconds: 3600,
            },
            limits: LimitsConfig {
                sync_batch_max: 50,
                sync_batch_profile_max: 100,
                async_batch_max_rows: 10_000,
                rate_limit_per_minute,
            },
            worker: WorkerConfig {
                enabled: workers_enabled,
                worker_count: 2,
                queue_size: 32,
                per_row_estimate_ms: 5,
                row_throttle_ms,
            },
            profiles: ProfilesConfig { seed_path: None },
        };

        let store = Arc::new(MemoryStore::new());

        let source = StaticProfileSource::new();
        source
            .insert(DealerProfile {
                dealer_code: TEST_DEALER.to_string(),
                tax_rate: 0.133,
                default_sim_fee: 5500.0,
                default_mnp_discount: -800.0,
                status: ProfileStatus::Active,
            })
            .await;
        source
            .insert(DealerProfile {
                dealer_code: INACTIVE_DEALER.to_string(),
                tax_rate: 0.133,
                default_sim_fee: 5500.0,
                default_mnp_discount: -800.0,
                status: ProfileStatus::Inactive,
            })
            .await;

        let profiles = Arc::new(CachedProfiles::new(
            Arc::new(source),
            store.clone(),
            config.cache.profile_ttl(),
        ));

        let (orchestrator, job_tx) = JobOrchestrator::new(
            config.worker.clone(),
            &config.cache,
            store.clone(),
            profiles.clone(),
        );
        tokio::spawn(async move {
            orchestrator.start().await;
        });

        let jobs = Arc::new(JobService::new(
            store.clone(),
            profiles.clone(),
            job_tx,
            &config.cache,
            &config.limits,
            &config.worker,
        ));

        let state = AppState {
            config,
            store,
            profiles,
            jobs,
        };

        TestApp {
            router: build_router(state),
        }
    }

    pub async fn get(&self, path: &str) -> (StatusCode, Value) {
        let request = Request::builder()
            .method("GET")
            .uri(path)
            .body(Body::empty())
            .expect("Failed to build request");
        self.send(request).await
    }

    pub async fn post_json(&self, path: &str, body: &Value) -> (StatusCode, Value) {
        let request = Request::builder()
            .method("POST")
            .uri(path)
            .header("content-type", "application/json")
            .body(Body::from(serde_json::to_vec(body).expect("Failed to serialize body")))
            .expect("Failed to build request");
        self.send(request).await
    }

    /// POST as if proxied for `ip`, so the per-IP quota has a key.
    pub async fn post_json_from_ip(
        &self,
        path: &str,
        body: &Value,
        ip: &str,
    ) -> (StatusCode, Value) {
        let request = Request::builder()
            .method("POST")
            .uri(path)
            .header("content-type", "application/json")
            .header("x-forwarded-for", ip)
            .body(Body::from(serde_json::to_vec(body).expect("Failed to serialize body")))
            .expect("Failed to build request");
        self.send(request).await
    }

    async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("Request failed");

        let status = response.status();
        let bytes = response
            .into_body()
            .collect()
            .await
            .expect("Failed to read body")
            .to_bytes();

        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };

        (status, body)
    }

    /// Poll job status until it reaches `want` or the timeout lapses.
    pub async fn wait_for_status(&self, job_id: &str, want: &str, timeout: Duration) -> Value {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let (status, body) = self.get(&format!("/jobs/{}/status", job_id)).await;
            assert_eq!(status, StatusCode::OK, "status poll failed: {}", body);

            if body["status"] == want {
                return body;
            }
            if tokio::time::Instant::now() >= deadline {
                panic!(
                    "job {} never reached status '{}', last seen: {}",
                    job_id, want, body
                );
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }
}
