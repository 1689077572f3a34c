use axum::{Json, extract::State, response::IntoResponse};

use crate::AppState;

pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    Json(serde_json::json!({ "ok": true, "instanceId": state.instance_id }))
}
