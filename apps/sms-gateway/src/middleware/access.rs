//! 请求上下文与访问控制
//!
//! - request_context：注入 request_id/trace_id 并回写响应头
//! - api_key：从 `x-api-key` 头提取密钥
//! - require_access：密钥 → 角色 → `AccessPolicy::allowed(role, resource, action)`

use axum::{
    body::Body,
    extract::Request,
    http::{HeaderMap, HeaderValue, StatusCode},
    middleware::Next,
    response::Response,
};
use smsgw_telemetry::new_request_ids;
use tracing::{Instrument, info_span, warn};

use crate::AppState;
use crate::utils::response::{auth_error, forbidden_error};

pub const API_KEY_HEADER: &str = "x-api-key";

/// 请求上下文中间件：注入 request_id/trace_id
pub async fn request_context(mut req: Request<Body>, next: Next) -> Response {
    let ids = new_request_ids();
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    req.extensions_mut().insert(ids.clone());

    let span = info_span!(
        "request",
        request_id = %ids.request_id,
        trace_id = %ids.trace_id,
        method = %method,
        path = %path
    );

    let mut response = next.run(req).instrument(span).await;
    response.headers_mut().insert(
        "x-request-id",
        HeaderValue::from_str(&ids.request_id).unwrap_or_else(|_| HeaderValue::from_static("")),
    );
    response.headers_mut().insert(
        "x-trace-id",
        HeaderValue::from_str(&ids.trace_id).unwrap_or_else(|_| HeaderValue::from_static("")),
    );
    response
}

pub fn api_key(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(API_KEY_HEADER)?.to_str().ok()?.trim();
    if value.is_empty() { None } else { Some(value) }
}

/// 校验调用方对 `resource:action` 的授权，返回其角色。
pub fn require_access(
    state: &AppState,
    headers: &HeaderMap,
    resource: &str,
    action: &str,
) -> Result<String, Response> {
    let Some(key) = api_key(headers) else {
        return Err(auth_error(StatusCode::UNAUTHORIZED));
    };
    let Some(role) = state.api_keys.get(key) else {
        return Err(auth_error(StatusCode::UNAUTHORIZED));
    };
    if !state.policy.allowed(role, resource, action) {
        warn!(
            target: "smsgw.api",
            role = %role,
            resource = %resource,
            action = %action,
            "access_denied"
        );
        return Err(forbidden_error());
    }
    Ok(role.clone())
}

#[cfg(test)]
mod tests {
    use super::api_key;
    use axum::http::{HeaderMap, HeaderValue};

    #[test]
    fn api_key_extracts() {
        let mut headers = HeaderMap::new();
        assert_eq!(api_key(&headers), None);
        headers.insert("x-api-key", HeaderValue::from_static(" key-1 "));
        assert_eq!(api_key(&headers), Some("key-1"));
        headers.insert("x-api-key", HeaderValue::from_static(""));
        assert_eq!(api_key(&headers), None);
    }
}
