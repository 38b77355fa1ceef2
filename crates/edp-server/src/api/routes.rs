//! Engine routes
//!
//! Every handler is a thin pass-through: trigger a run, read status, control
//! the scheduler, or stream a rendering of the current snapshot.

use axum::{
    extract::{Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;

use super::response::ApiResponse;
use crate::error::ApiResult;
use crate::etl::loader::{Export, Loader};
use crate::etl::scheduler::Scheduler;
use crate::etl::EtlError;

/// Shared handler state
#[derive(Clone)]
pub struct AppState {
    pub scheduler: Arc<Scheduler>,
    pub loader: Arc<Loader>,
}

/// Create the engine routes
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/etl/trigger", post(trigger_run))
        .route("/etl/status", get(etl_status))
        .route("/universities", get(list_universities))
        .route("/scheduler/status", get(scheduler_status))
        .route("/scheduler/start", post(start_scheduler))
        .route("/scheduler/stop", post(stop_scheduler))
        .route("/export/json", get(export_json))
        .route("/export/csv", get(export_csv))
        .with_state(state)
}

/// Trigger a manual run
///
/// POST /etl/trigger
///
/// A failed run still resolves to 200 with the recorded outcome as data;
/// only a concurrent run is rejected (409).
async fn trigger_run(State(state): State<AppState>) -> ApiResult<impl IntoResponse> {
    let outcome = state.scheduler.run_now().await?;
    Ok(ApiResponse::success(outcome))
}

/// Engine data status
///
/// GET /etl/status
async fn etl_status(State(state): State<AppState>) -> ApiResult<impl IntoResponse> {
    let body = match state.loader.read().await? {
        Some(snapshot) => json!({
            "has_data": true,
            "record_count": snapshot.records.len(),
            "last_updated": snapshot.metadata.saved_at,
        }),
        None => json!({
            "has_data": false,
            "record_count": 0,
            "last_updated": null,
        }),
    };
    Ok(ApiResponse::success(body))
}

#[derive(Debug, Deserialize)]
struct UniversityQuery {
    name: Option<String>,
    country: Option<String>,
}

/// Search the current snapshot
///
/// GET /universities?name=&country=
async fn list_universities(
    State(state): State<AppState>,
    Query(query): Query<UniversityQuery>,
) -> ApiResult<impl IntoResponse> {
    let snapshot = state.loader.read().await?.ok_or(EtlError::NoSnapshot)?;

    let mut records = snapshot.records;
    if let Some(name) = query.name.as_deref().map(str::to_lowercase) {
        records.retain(|record| record.name.to_lowercase().contains(&name));
    }
    if let Some(country) = query.country.as_deref().map(str::to_lowercase) {
        records.retain(|record| record.country.to_lowercase().contains(&country));
    }

    Ok(ApiResponse::success(json!({
        "total": records.len(),
        "universities": records,
    })))
}

/// Scheduler status
///
/// GET /scheduler/status
async fn scheduler_status(State(state): State<AppState>) -> impl IntoResponse {
    ApiResponse::success(state.scheduler.status())
}

/// Arm the daily trigger
///
/// POST /scheduler/start
async fn start_scheduler(State(state): State<AppState>) -> impl IntoResponse {
    state.scheduler.start();
    ApiResponse::success(json!({ "armed": state.scheduler.is_armed() }))
}

/// Disarm the daily trigger
///
/// POST /scheduler/stop
async fn stop_scheduler(State(state): State<AppState>) -> impl IntoResponse {
    state.scheduler.stop();
    ApiResponse::success(json!({ "armed": state.scheduler.is_armed() }))
}

/// Download the structured rendering
///
/// GET /export/json
async fn export_json(State(state): State<AppState>) -> ApiResult<Response> {
    let export = state.loader.export_json().await?;
    Ok(download_response(export))
}

/// Download the tabular rendering
///
/// GET /export/csv
async fn export_csv(State(state): State<AppState>) -> ApiResult<Response> {
    let export = state.loader.export_csv().await?;
    Ok(download_response(export))
}

/// Attachment response with the export's date-stamped filename.
fn download_response(export: Export) -> Response {
    (
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, export.content_type.to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", export.filename),
            ),
        ],
        export.body,
    )
        .into_response()
}

/// Health check handler
pub async fn health_check() -> impl IntoResponse {
    Json(json!({ "status": "healthy" }))
}
