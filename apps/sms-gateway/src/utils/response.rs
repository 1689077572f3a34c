//! HTTP 响应辅助函数和 DTO 转换
//!
//! 所有错误返回统一的 ApiResponse 格式，HTTP 状态码与错误码对应。

use api_contract::{ApiResponse, ConnectionDto};
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use domain::ConnectionRecord;
use smsgw_queue::QueueError;
use smsgw_storage::StorageError;

/// 认证错误响应
pub fn auth_error(status: StatusCode) -> Response {
    (
        status,
        Json(ApiResponse::<()>::error(
            "AUTH.UNAUTHORIZED",
            "unauthorized",
        )),
    )
        .into_response()
}

/// 禁止访问错误响应
pub fn forbidden_error() -> Response {
    (
        StatusCode::FORBIDDEN,
        Json(ApiResponse::<()>::error("AUTH.FORBIDDEN", "forbidden")),
    )
        .into_response()
}

pub fn bad_request_error(message: impl Into<String>) -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(ApiResponse::<()>::error("INVALID.REQUEST", message.into())),
    )
        .into_response()
}

pub fn not_found_error() -> Response {
    (
        StatusCode::NOT_FOUND,
        Json(ApiResponse::<()>::error("RESOURCE.NOT_FOUND", "not found")),
    )
        .into_response()
}

/// 存储错误响应
pub fn storage_error(err: StorageError) -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ApiResponse::<()>::error("STORAGE.ERROR", err.to_string())),
    )
        .into_response()
}

/// 队列不可用：通道/连接类错误归为 503
pub fn queue_error(err: QueueError) -> Response {
    let status = if err.is_retryable() {
        StatusCode::SERVICE_UNAVAILABLE
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    };
    (
        status,
        Json(ApiResponse::<()>::error("QUEUE.ERROR", err.to_string())),
    )
        .into_response()
}

pub fn connection_to_dto(record: ConnectionRecord) -> ConnectionDto {
    ConnectionDto {
        link_type: record.link_type.as_str().to_string(),
        device_id: record.device_id,
        device_group_id: record.device_group_id,
        site_id: record.site_id,
        handicapped: record.handicapped,
        connected_at_ms: record.connected_at_ms,
        last_heartbeat_ms: record.last_heartbeat_ms,
        instance_id: record.instance_id,
    }
}
