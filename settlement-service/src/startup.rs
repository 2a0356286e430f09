use crate::config::SettlementConfig;
use crate::handlers::{
    calculate::{
        calculate_batch, calculate_batch_with_profile, calculate_row, calculate_row_with_profile,
    },
    health::{health_check, metrics_endpoint, readiness_check},
    jobs::{cancel_job, job_result, job_status, start_batch_job},
};
use crate::services::{CachedProfiles, JobService, TtlStore};
use axum::{
    Router,
    middleware::{from_fn, from_fn_with_state},
    routing::{get, post},
};
use settlement_core::middleware::{
    metrics::metrics_middleware,
    rate_limit::{create_ip_rate_limiter, ip_rate_limit_middleware},
    tracing::request_id_middleware,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

#[derive(Clone)]
pub struct AppState {
    pub config: SettlementConfig,
    pub store: Arc<dyn TtlStore>,
    pub profiles: Arc<CachedProfiles>,
    pub jobs: Arc<JobService>,
}

pub fn build_router(state: AppState) -> Router {
    let rate_limiter = create_ip_rate_limiter(state.config.limits.rate_limit_per_minute, 60);

    Router::new()
        .route("/calculate/row", post(calculate_row))
        .route("/calculate/row/:dealer_code", post(calculate_row_with_profile))
        .route("/calculate/batch", post(calculate_batch))
        .route(
            "/calculate/batch/:dealer_code",
            post(calculate_batch_with_profile),
        )
        .route("/jobs", post(start_batch_job))
        .route("/jobs/:job_id/status", get(job_status))
        .route("/jobs/:job_id/result", get(job_result))
        .route("/jobs/:job_id/cancel", post(cancel_job))
        .layer(from_fn_with_state(rate_limiter, ip_rate_limit_middleware))
        .route("/health", get(health_check))
        .route("/ready", get(readiness_check))
        .route("/metrics", get(metrics_endpoint))
        .layer(from_fn(metrics_middleware))
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &axum::http::Request<_>| {
                let request_id = request
                    .headers()
                    .get("x-request-id")
                    .and_then(|value| value.to_str().ok())
                    .unwrap_or("-");

                tracing::info_span!(
                    "http_request",
                    request_id = %request_id,
                    method = %request.method(),
                    uri = %request.uri(),
                    version = ?request.version(),
                )
            }),
        )
        .layer(from_fn(request_id_middleware))
        .with_state(state)
}
