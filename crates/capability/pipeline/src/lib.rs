//! 短信路由流水线。
//!
//! - `SubmissionRouter`：电信侧提交 → 路由规则 → 候选设备扇出 → 每设备一条日志
//! - `SmsIngestor`：应用侧发送请求 → 设备解析 → 日志 → 下发 → `{system_id}_response` 回执
//! - `DeliveryReportPublisher`：投递结果回送电信侧
//! - `DeviceReceiptHandler`：设备回执 → 日志状态补丁 →（按需）状态报告
//!
//! 队列处理器在边界处吞掉单条消息的错误，不让消费任务退出。

use smsgw_link::DispatchError;
use smsgw_queue::QueueError;
use smsgw_storage::StorageError;
use smsgw_telemetry::{
    record_dispatch_failure, record_dispatch_latency_ms, record_dispatch_not_connected,
    record_dispatch_success,
};
use std::time::Instant;

pub mod decode;
pub mod delivery_report;
pub mod ingestor;
pub mod receipt;
pub mod router;

pub use decode::{decode_send_request, decode_submission, encode_send_request};
pub use delivery_report::{DeliveryReportPublisher, report_message, undeliverable_report};
pub use ingestor::{DEVICE_NOT_FOUND, RESPONSE_QUEUE_SUFFIX, SmsIngestor, response_queue};
pub use receipt::{DeviceReceiptHandler, ReceiptOutcome};
pub use router::{NO_ACTIVE_DEVICES, NO_DEVICE_ACCEPTED, NO_TARGET_GROUPS, RouteSummary, SubmissionRouter};

/// 流水线错误。
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("decode error: {0}")]
    Decode(String),
    #[error("storage error: {0}")]
    Storage(String),
    #[error("publish error: {0}")]
    Publish(String),
}

impl From<StorageError> for PipelineError {
    fn from(err: StorageError) -> Self {
        Self::Storage(err.to_string())
    }
}

impl From<PipelineError> for QueueError {
    fn from(err: PipelineError) -> Self {
        QueueError::Handler(err.to_string())
    }
}

/// 下发结果计数（成功 / 未连接 / 传输失败 + 耗时）。
pub(crate) fn record_dispatch_outcome(result: &Result<(), DispatchError>, started_at: Instant) {
    match result {
        Ok(()) => record_dispatch_success(),
        Err(DispatchError::NotConnected(_)) => record_dispatch_not_connected(),
        Err(DispatchError::Transport(_)) => record_dispatch_failure(),
    }
    record_dispatch_latency_ms(started_at.elapsed().as_millis() as u64);
}

pub(crate) fn new_message_id() -> String {
    uuid::Uuid::new_v4().to_string()
}
