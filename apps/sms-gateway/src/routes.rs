//! 路由定义
//!
//! - 健康检查：/health
//! - 指标：/api/metrics
//! - 链路注册表：/api/links/{device_id}, /api/instances/{instance_id}/links
//! - 发送入队：/api/sms/send

use super::AppState;
use super::handlers::*;
use super::middleware::request_context;
use axum::{
    Router, middleware,
    routing::{get, post},
};
use tower_http::trace::TraceLayer;

/// 创建 /api 下的路由（均需 `x-api-key`）。
pub fn create_api_router() -> Router<AppState> {
    Router::new()
        .route("/metrics", get(get_metrics))
        .route("/links/:device_id", get(get_link))
        .route("/instances/:instance_id/links", get(list_instance_links))
        .route("/sms/send", post(send_sms))
}

/// 完整应用路由：健康检查 + /api + 请求追踪中间件。
pub fn create_app(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .nest("/api", create_api_router())
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(middleware::from_fn(request_context))
}
