//! 追踪、请求 ID 与进程内计数指标。

use std::sync::OnceLock;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing_subscriber::{EnvFilter, fmt};

/// 请求级追踪标识。
#[derive(Debug, Clone)]
pub struct RequestIds {
    pub request_id: String,
    pub trace_id: String,
}

/// 指标快照。
#[derive(Debug, Clone, Copy, Default, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsSnapshot {
    pub send_requests: u64,
    pub submissions: u64,
    pub decode_failures: u64,
    pub fallback_routes: u64,
    pub dispatch_success: u64,
    pub dispatch_failure: u64,
    pub dispatch_not_connected: u64,
    pub dispatch_latency_ms_total: u64,
    pub dispatch_latency_ms_count: u64,
    pub responses_published: u64,
    pub delivery_reports_published: u64,
    pub receipts_processed: u64,
    pub registry_swept: u64,
}

/// 进程内计数指标。
pub struct TelemetryMetrics {
    send_requests: AtomicU64,
    submissions: AtomicU64,
    decode_failures: AtomicU64,
    fallback_routes: AtomicU64,
    dispatch_success: AtomicU64,
    dispatch_failure: AtomicU64,
    dispatch_not_connected: AtomicU64,
    dispatch_latency_ms_total: AtomicU64,
    dispatch_latency_ms_count: AtomicU64,
    responses_published: AtomicU64,
    delivery_reports_published: AtomicU64,
    receipts_processed: AtomicU64,
    registry_swept: AtomicU64,
}

impl TelemetryMetrics {
    pub fn new() -> Self {
        Self {
            send_requests: AtomicU64::new(0),
            submissions: AtomicU64::new(0),
            decode_failures: AtomicU64::new(0),
            fallback_routes: AtomicU64::new(0),
            dispatch_success: AtomicU64::new(0),
            dispatch_failure: AtomicU64::new(0),
            dispatch_not_connected: AtomicU64::new(0),
            dispatch_latency_ms_total: AtomicU64::new(0),
            dispatch_latency_ms_count: AtomicU64::new(0),
            responses_published: AtomicU64::new(0),
            delivery_reports_published: AtomicU64::new(0),
            receipts_processed: AtomicU64::new(0),
            registry_swept: AtomicU64::new(0),
        }
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            send_requests: self.send_requests.load(Ordering::Relaxed),
            submissions: self.submissions.load(Ordering::Relaxed),
            decode_failures: self.decode_failures.load(Ordering::Relaxed),
            fallback_routes: self.fallback_routes.load(Ordering::Relaxed),
            dispatch_success: self.dispatch_success.load(Ordering::Relaxed),
            dispatch_failure: self.dispatch_failure.load(Ordering::Relaxed),
            dispatch_not_connected: self.dispatch_not_connected.load(Ordering::Relaxed),
            dispatch_latency_ms_total: self.dispatch_latency_ms_total.load(Ordering::Relaxed),
            dispatch_latency_ms_count: self.dispatch_latency_ms_count.load(Ordering::Relaxed),
            responses_published: self.responses_published.load(Ordering::Relaxed),
            delivery_reports_published: self.delivery_reports_published.load(Ordering::Relaxed),
            receipts_processed: self.receipts_processed.load(Ordering::Relaxed),
            registry_swept: self.registry_swept.load(Ordering::Relaxed),
        }
    }
}

impl Default for TelemetryMetrics {
    fn default() -> Self {
        Self::new()
    }
}

static METRICS: OnceLock<TelemetryMetrics> = OnceLock::new();

/// 获取全局指标实例。
pub fn metrics() -> &'static TelemetryMetrics {
    METRICS.get_or_init(TelemetryMetrics::new)
}

/// 初始化 tracing（默认 info）。
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = fmt().with_env_filter(filter).try_init();
}

/// 生成新的 request_id 与 trace_id。
pub fn new_request_ids() -> RequestIds {
    RequestIds {
        request_id: uuid::Uuid::new_v4().to_string(),
        trace_id: uuid::Uuid::new_v4().to_string(),
    }
}

/// 记录应用侧发送请求次数。
pub fn record_send_request() {
    metrics().send_requests.fetch_add(1, Ordering::Relaxed);
}

/// 记录 SMPP 提交次数。
pub fn record_submission() {
    metrics().submissions.fetch_add(1, Ordering::Relaxed);
}

/// 记录队列消息解码失败次数。
pub fn record_decode_failure() {
    metrics().decode_failures.fetch_add(1, Ordering::Relaxed);
}

/// 记录无路由规则、回落到全部在线设备的次数。
pub fn record_fallback_route() {
    metrics().fallback_routes.fetch_add(1, Ordering::Relaxed);
}

pub fn record_dispatch_success() {
    metrics().dispatch_success.fetch_add(1, Ordering::Relaxed);
}

pub fn record_dispatch_failure() {
    metrics().dispatch_failure.fetch_add(1, Ordering::Relaxed);
}

/// 记录设备无在线链路（NotConnected）次数。
pub fn record_dispatch_not_connected() {
    metrics()
        .dispatch_not_connected
        .fetch_add(1, Ordering::Relaxed);
}

/// 记录单次下发耗时（毫秒）。
pub fn record_dispatch_latency_ms(latency_ms: u64) {
    let metrics = metrics();
    metrics
        .dispatch_latency_ms_total
        .fetch_add(latency_ms, Ordering::Relaxed);
    metrics
        .dispatch_latency_ms_count
        .fetch_add(1, Ordering::Relaxed);
}

pub fn record_response_published() {
    metrics().responses_published.fetch_add(1, Ordering::Relaxed);
}

pub fn record_delivery_report_published() {
    metrics()
        .delivery_reports_published
        .fetch_add(1, Ordering::Relaxed);
}

pub fn record_receipt_processed() {
    metrics().receipts_processed.fetch_add(1, Ordering::Relaxed);
}

/// 记录清扫移除的注册表条目数。
pub fn record_registry_swept(count: u64) {
    metrics().registry_swept.fetch_add(count, Ordering::Relaxed);
}
