//! 进程内计数指标。
//!
//! - GET /metrics

use api_contract::ApiResponse;
use axum::{
    Json,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use domain::permissions::{ACTION_READ, RESOURCE_METRICS};
use smsgw_telemetry::metrics;

use crate::{AppState, middleware::require_access};

pub async fn get_metrics(State(state): State<AppState>, headers: HeaderMap) -> Response {
    if let Err(response) = require_access(&state, &headers, RESOURCE_METRICS, ACTION_READ) {
        return response;
    }
    (
        StatusCode::OK,
        Json(ApiResponse::success(metrics().snapshot())),
    )
        .into_response()
}
