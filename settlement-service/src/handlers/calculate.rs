//! Synchronous calculation endpoints.
//!
//! Profile-aware routes accept and answer in the external schema: the body
//! passes through the field mapper on the way in and the result is mapped
//! back on the way out, nested input echo included.

use crate::models::{BatchOptions, OutputFormat, SettlementInput};
use crate::services::{calculator, mapper};
use crate::startup::AppState;
use axum::{
    Json,
    extract::{Path, State},
    response::IntoResponse,
};
use serde::Deserialize;
use serde_json::{Value, json};
use settlement_core::error::AppError;
use std::time::Instant;

pub async fn calculate_row(Json(body): Json<Value>) -> Result<impl IntoResponse, AppError> {
    let input = SettlementInput::from_value(&body).map_err(AppError::InvalidInput)?;
    let result = calculator::compute(&input);

    Ok(Json(json!({
        "success": true,
        "result": result,
    })))
}

pub async fn calculate_row_with_profile(
    State(state): State<AppState>,
    Path(dealer_code): Path<String>,
    Json(body): Json<Value>,
) -> Result<impl IntoResponse, AppError> {
    let profile = state
        .profiles
        .get_active(&dealer_code)
        .await?
        .ok_or_else(|| AppError::ProfileNotFound(dealer_code.clone()))?;

    let internal = mapper::to_internal(&body);
    let input = SettlementInput::from_value(&internal).map_err(AppError::InvalidInput)?;
    let result = calculator::compute_with_profile(&input, &profile)?;

    let mapped = result_to_external(serde_json::to_value(&result)?);

    Ok(Json(json!({
        "success": true,
        "result": mapped,
    })))
}

#[derive(Debug, Deserialize)]
pub struct BatchRequest {
    pub rows: Vec<Value>,
}

pub async fn calculate_batch(
    State(state): State<AppState>,
    Json(request): Json<BatchRequest>,
) -> Result<impl IntoResponse, AppError> {
    validate_row_count(request.rows.len(), state.config.limits.sync_batch_max)?;

    let output = calculator::compute_batch(&request.rows, None);

    Ok(Json(json!({
        "success": true,
        "results": output.results,
        "summary": output.summary,
    })))
}

#[derive(Debug, Deserialize)]
pub struct BatchWithProfileRequest {
    pub rows: Vec<Value>,
    #[serde(default)]
    pub options: BatchOptions,
}

pub async fn calculate_batch_with_profile(
    State(state): State<AppState>,
    Path(dealer_code): Path<String>,
    Json(request): Json<BatchWithProfileRequest>,
) -> Result<impl IntoResponse, AppError> {
    validate_row_count(
        request.rows.len(),
        state.config.limits.sync_batch_profile_max,
    )?;

    let profile = state
        .profiles
        .get_active(&dealer_code)
        .await?
        .ok_or_else(|| AppError::ProfileNotFound(dealer_code.clone()))?;

    let rows = match request.options.format {
        OutputFormat::External => mapper::to_internal_array(&request.rows),
        OutputFormat::Internal => request.rows,
    };

    let start = Instant::now();
    let output = calculator::compute_batch(&rows, Some(&profile));
    let duration_ms = start.elapsed().as_secs_f64() * 1000.0;

    let mut results = serde_json::to_value(&output.results)?;
    if request.options.format == OutputFormat::External {
        map_results_external(&mut results);
    }

    let mut response = json!({
        "success": true,
        "results": results,
        "summary": output.summary,
    });

    if request.options.include_performance {
        let rows_per_second = if duration_ms > 0.0 {
            output.summary.total as f64 / (duration_ms / 1000.0)
        } else {
            output.summary.total as f64
        };
        response["performance"] = json!({
            "durationMs": duration_ms,
            "rowsPerSecond": rows_per_second,
        });
    }

    Ok(Json(response))
}

fn validate_row_count(count: usize, max: usize) -> Result<(), AppError> {
    if count == 0 {
        return Err(AppError::BadRequest(anyhow::anyhow!(
            "Batch must contain at least one row"
        )));
    }
    if count > max {
        return Err(AppError::BadRequest(anyhow::anyhow!(
            "Batch of {} rows exceeds the maximum of {}",
            count,
            max
        )));
    }
    Ok(())
}

/// Map a serialized `SettlementResult` to the external schema, nested
/// input echo included.
fn result_to_external(value: Value) -> Value {
    let mut mapped = mapper::to_external(&value);
    if let Some(echo) = mapped.get("input_echo") {
        let echo_mapped = mapper::to_external(echo);
        mapped["input_echo"] = echo_mapped;
    }
    mapped
}

/// Map each row outcome's result in place.
fn map_results_external(results: &mut Value) {
    if let Some(entries) = results.as_array_mut() {
        for entry in entries {
            if let Some(result) = entry.get("result") {
                let mapped = result_to_external(result.clone());
                entry["result"] = mapped;
            }
        }
    }
}
