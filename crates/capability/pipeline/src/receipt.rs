//! 设备回执处理：补丁日志状态，电信侧来源且请求了状态报告时回送 DLR。
//!
//! 同一提交扇出到多台设备时，每个 correlation id 只回送一次报告：
//! 首个 delivered 回执回送成功；全部尝试都失败后回送一次失败。

use crate::PipelineError;
use crate::delivery_report::{
    DeliveryReportPublisher, ERROR_CODE_UNDELIVERABLE, original_text,
};
use api_contract::DeviceReceiptMessage;
use async_trait::async_trait;
use domain::{DeliveryReport, DeliveryState, MessageStatus, now_epoch_ms};
use smsgw_link::ReceiptSink;
use smsgw_storage::{MessageLogRecord, MessageLogStore, MessageLogUpdate};
use smsgw_telemetry::record_receipt_processed;
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReceiptOutcome {
    Delivered { report_published: bool },
    Failed { report_published: bool },
    UnknownMessage,
    DeviceMismatch,
    UnrecognizedStatus,
    /// 日志已是终态（重复或迟到的回执）。
    Duplicate,
}

pub struct DeviceReceiptHandler {
    logs: Arc<dyn MessageLogStore>,
    reports: Option<Arc<DeliveryReportPublisher>>,
}

fn receipt_delivered(status: &str) -> Option<bool> {
    match status.trim().to_ascii_lowercase().as_str() {
        "delivered" | "success" | "ok" | "delivrd" => Some(true),
        "failed" | "failure" | "error" | "undelivered" | "undeliv" | "rejected" => Some(false),
        _ => None,
    }
}

impl DeviceReceiptHandler {
    pub fn new(
        logs: Arc<dyn MessageLogStore>,
        reports: Option<Arc<DeliveryReportPublisher>>,
    ) -> Self {
        Self { logs, reports }
    }

    pub async fn process(
        &self,
        device_id: &str,
        receipt: &DeviceReceiptMessage,
    ) -> Result<ReceiptOutcome, PipelineError> {
        let Some(delivered) = receipt_delivered(&receipt.status) else {
            return Ok(ReceiptOutcome::UnrecognizedStatus);
        };
        let Some(log) = self.logs.find_log(&receipt.message_id).await? else {
            info!(
                target: "smsgw.pipeline",
                device_id = %device_id,
                message_id = %receipt.message_id,
                "receipt_unknown_message"
            );
            return Ok(ReceiptOutcome::UnknownMessage);
        };
        if log.device_id.as_deref() != Some(device_id) {
            warn!(
                target: "smsgw.pipeline",
                device_id = %device_id,
                message_id = %receipt.message_id,
                log_device_id = ?log.device_id,
                "receipt_device_mismatch"
            );
            return Ok(ReceiptOutcome::DeviceMismatch);
        }

        if log.status.is_terminal() {
            return Ok(self.ignore_duplicate(device_id, &log));
        }

        let ts_ms = receipt.ts_ms.unwrap_or_else(now_epoch_ms);
        let update = if delivered {
            MessageLogUpdate::delivered(ts_ms)
        } else {
            MessageLogUpdate::failed(
                receipt
                    .error
                    .clone()
                    .unwrap_or_else(|| "device reported failure".to_string()),
            )
        };
        let Some(updated) = self.logs.update_log(&receipt.message_id, update).await? else {
            return Ok(self.ignore_duplicate(device_id, &log));
        };
        record_receipt_processed();
        info!(
            target: "smsgw.pipeline",
            device_id = %device_id,
            message_id = %receipt.message_id,
            status = %updated.status.as_str(),
            "receipt_processed"
        );

        let report_published = self.publish_report(&updated, delivered, ts_ms).await;
        Ok(if delivered {
            ReceiptOutcome::Delivered { report_published }
        } else {
            ReceiptOutcome::Failed { report_published }
        })
    }

    fn ignore_duplicate(&self, device_id: &str, log: &MessageLogRecord) -> ReceiptOutcome {
        info!(
            target: "smsgw.pipeline",
            device_id = %device_id,
            message_id = %log.message_id,
            status = %log.status.as_str(),
            "receipt_duplicate_ignored"
        );
        ReceiptOutcome::Duplicate
    }

    async fn publish_report(&self, log: &MessageLogRecord, delivered: bool, ts_ms: i64) -> bool {
        let Some(reports) = self.reports.as_ref() else {
            return false;
        };
        let Some(correlation_id) = log.correlation_id.clone() else {
            return false;
        };
        if !log.delivery_report_requested {
            return false;
        }
        let attempts = match self.logs.list_logs_by_correlation(&correlation_id).await {
            Ok(attempts) => attempts,
            Err(err) => {
                warn!(
                    target: "smsgw.pipeline",
                    correlation_id = %correlation_id,
                    error = %err,
                    "delivery_report_attempts_lookup_failed"
                );
                return false;
            }
        };
        if !report_due(&attempts, delivered) {
            info!(
                target: "smsgw.pipeline",
                correlation_id = %correlation_id,
                message_id = %log.message_id,
                attempts = attempts.len(),
                "delivery_report_suppressed"
            );
            return false;
        }
        let report = DeliveryReport {
            message_id: correlation_id,
            system_id: log.system_id.clone().unwrap_or_default(),
            source_addr: log.source_addr.clone(),
            destination_addr: log.destination_addr.clone(),
            state: if delivered {
                DeliveryState::Delivered
            } else {
                DeliveryState::Undeliverable
            },
            error_code: if delivered { 0 } else { ERROR_CODE_UNDELIVERABLE },
            submit_date_ms: log.created_at_ms,
            done_date_ms: ts_ms,
            final_date_ms: ts_ms,
            failure_reason: if delivered {
                None
            } else {
                log.error_message.clone()
            },
            original_text: Some(original_text(&log.message)),
        };
        reports.publish(&report).await.is_ok()
    }
}

/// 当前回执是否应触发该 correlation id 的报告（调用时日志已补丁）。
fn report_due(attempts: &[MessageLogRecord], delivered: bool) -> bool {
    if delivered {
        attempts
            .iter()
            .filter(|attempt| attempt.status == MessageStatus::Delivered)
            .count()
            <= 1
    } else {
        attempts
            .iter()
            .all(|attempt| attempt.status == MessageStatus::Failed)
    }
}

#[async_trait]
impl ReceiptSink for DeviceReceiptHandler {
    async fn on_receipt(&self, device_id: &str, receipt: DeviceReceiptMessage) {
        match self.process(device_id, &receipt).await {
            Ok(ReceiptOutcome::UnrecognizedStatus) => warn!(
                target: "smsgw.pipeline",
                device_id = %device_id,
                message_id = %receipt.message_id,
                status = %receipt.status,
                "receipt_status_unrecognized"
            ),
            Ok(_) => {}
            Err(err) => warn!(
                target: "smsgw.pipeline",
                device_id = %device_id,
                message_id = %receipt.message_id,
                error = %err,
                "receipt_process_failed"
            ),
        }
    }
}
