//! Asynchronous batch job endpoints.

use crate::models::BatchOptions;
use crate::services::JobResultView;
use crate::startup::AppState;
use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::Deserialize;
use serde_json::{Value, json};
use settlement_core::error::AppError;
use validator::Validate;

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct StartJobRequest {
    #[validate(length(min = 1, message = "dealerCode must not be empty"))]
    pub dealer_code: String,
    pub rows: Vec<Value>,
    #[serde(default)]
    pub options: BatchOptions,
}

pub async fn start_batch_job(
    State(state): State<AppState>,
    Json(request): Json<StartJobRequest>,
) -> Result<impl IntoResponse, AppError> {
    request.validate()?;

    let job = state
        .jobs
        .start_batch_job(&request.dealer_code, request.rows, request.options)
        .await?;

    Ok((
        StatusCode::ACCEPTED,
        Json(json!({
            "success": true,
            "jobId": job.job_id,
            "status": "queued",
            "rowCount": job.row_count,
            "performanceEstimate": job.performance_estimate,
            "estimatedCompletionTime": job.estimated_completion_time(),
            "progressUrl": format!("/jobs/{}/status", job.job_id),
            "resultUrl": format!("/jobs/{}/result", job.job_id),
        })),
    ))
}

pub async fn job_status(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let view = state.jobs.job_status(&job_id).await?;

    let mut body = serde_json::to_value(&view)?;
    body["success"] = json!(true);

    Ok(Json(body))
}

pub async fn job_result(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    match state.jobs.job_result(&job_id).await? {
        JobResultView::Ready(output) => {
            let mut body = json!({
                "success": true,
                "ready": true,
                "jobId": job_id,
            });
            body["results"] = output.get("results").cloned().unwrap_or(Value::Null);
            body["summary"] = output.get("summary").cloned().unwrap_or(Value::Null);
            Ok((StatusCode::OK, Json(body)))
        }
        JobResultView::Pending(progress) => Ok((
            StatusCode::ACCEPTED,
            Json(json!({
                "success": true,
                "ready": false,
                "jobId": job_id,
                "status": progress.status,
                "progress": progress,
                "message": "Job result not ready",
            })),
        )),
    }
}

pub async fn cancel_job(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let progress = state.jobs.cancel_job(&job_id).await?;

    Ok(Json(json!({
        "success": true,
        "jobId": job_id,
        "status": progress.status,
        "cancelledAt": progress.cancelled_at,
    })))
}
