//! 链路注册表查询
//!
//! - GET /links/{device_id} - 设备当前链路记录
//! - GET /instances/{instance_id}/links - 实例持有的设备列表
//!
//! 只读视图，注册表写入只来自设备链路监听与清扫。

use crate::AppState;
use crate::middleware::require_access;
use crate::utils::response::{connection_to_dto, not_found_error, storage_error};
use api_contract::{ApiResponse, InstanceLinksDto};
use axum::{
    Json,
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use domain::permissions::{ACTION_READ, RESOURCE_LINKS};

#[derive(serde::Deserialize)]
pub struct DevicePath {
    device_id: String,
}

#[derive(serde::Deserialize)]
pub struct InstancePath {
    instance_id: String,
}

pub async fn get_link(
    State(state): State<AppState>,
    Path(path): Path<DevicePath>,
    headers: HeaderMap,
) -> Response {
    if let Err(response) = require_access(&state, &headers, RESOURCE_LINKS, ACTION_READ) {
        return response;
    }
    match state.registry.lookup(&path.device_id).await {
        Ok(Some(record)) => (
            StatusCode::OK,
            Json(ApiResponse::success(connection_to_dto(record))),
        )
            .into_response(),
        Ok(None) => not_found_error(),
        Err(err) => storage_error(err),
    }
}

pub async fn list_instance_links(
    State(state): State<AppState>,
    Path(path): Path<InstancePath>,
    headers: HeaderMap,
) -> Response {
    if let Err(response) = require_access(&state, &headers, RESOURCE_LINKS, ACTION_READ) {
        return response;
    }
    match state.registry.list_by_instance(&path.instance_id).await {
        Ok(device_ids) => (
            StatusCode::OK,
            Json(ApiResponse::success(InstanceLinksDto {
                instance_id: path.instance_id,
                device_ids,
            })),
        )
            .into_response(),
        Err(err) => storage_error(err),
    }
}
