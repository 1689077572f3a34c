//! 发送入队
//!
//! - POST /sms/send - 将发送请求写入应用队列，由接入消费者异步处理
//!
//! 回执仍经 `{system_id}_response` 队列返回，HTTP 只确认入队。

use crate::AppState;
use crate::middleware::require_access;
use crate::utils::response::{bad_request_error, queue_error};
use api_contract::{ApiResponse, SendSmsAccepted, SendSmsRequest};
use axum::{
    Json,
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use domain::permissions::{ACTION_SEND, RESOURCE_SMS};
use domain::{Priority, SendRequest, now_epoch_ms};
use smsgw_pipeline::encode_send_request;
use tracing::info;

fn required(field: &str, value: &str) -> Result<String, Response> {
    let value = value.trim();
    if value.is_empty() {
        return Err(bad_request_error(format!("{} required", field)));
    }
    Ok(value.to_string())
}

fn to_send_request(req: SendSmsRequest) -> Result<SendRequest, Response> {
    let message_id = req
        .message_id
        .map(|id| id.trim().to_string())
        .filter(|id| !id.is_empty())
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
    Ok(SendRequest {
        system_id: required("systemId", &req.system_id)?,
        device_id: required("deviceId", &req.device_id)?,
        phone_number: required("phoneNumber", &req.phone_number)?,
        message: req.message,
        sim_slot: req.sim_slot,
        priority: req
            .priority
            .as_deref()
            .map(Priority::parse)
            .unwrap_or_default(),
        message_id: Some(message_id),
        received_at_ms: now_epoch_ms(),
    })
}

pub async fn send_sms(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let role = match require_access(&state, &headers, RESOURCE_SMS, ACTION_SEND) {
        Ok(role) => role,
        Err(response) => return response,
    };
    // 先鉴权再解析请求体
    let req: SendSmsRequest = match serde_json::from_slice(&body) {
        Ok(req) => req,
        Err(err) => return bad_request_error(format!("invalid request body: {}", err)),
    };
    let request = match to_send_request(req) {
        Ok(request) => request,
        Err(response) => return response,
    };
    let payload = match encode_send_request(&request) {
        Ok(payload) => payload,
        Err(err) => return bad_request_error(err.to_string()),
    };
    if let Err(err) = state.queue.publish(&state.send_queue, &payload).await {
        return queue_error(err);
    }

    let message_id = request.message_id.unwrap_or_default();
    info!(
        target: "smsgw.api",
        role = %role,
        system_id = %request.system_id,
        device_id = %request.device_id,
        message_id = %message_id,
        "send_request_enqueued"
    );
    (
        StatusCode::ACCEPTED,
        Json(ApiResponse::success(SendSmsAccepted {
            message_id,
            queue: state.send_queue.clone(),
        })),
    )
        .into_response()
}
