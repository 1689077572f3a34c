//! 状态报告发布：固定交换机 + 路由键，纯转发，不做额外重试。

use crate::PipelineError;
use api_contract::DeliveryReportMessage;
use domain::{DeliveryReport, DeliveryState, SubmissionRecord};
use smsgw_queue::QueueGateway;
use smsgw_telemetry::record_delivery_report_published;
use std::sync::Arc;
use tracing::{info, warn};

/// SMPP 回执 text 字段保留的原文长度。
pub const ORIGINAL_TEXT_CHARS: usize = 20;

/// SMPP 通用错误码：投递失败。
pub const ERROR_CODE_UNDELIVERABLE: u32 = 1;

pub fn original_text(message: &str) -> String {
    message.chars().take(ORIGINAL_TEXT_CHARS).collect()
}

/// 路由阶段即告失败（无候选或全部下发失败）的提交对应的失败报告。
pub fn undeliverable_report(
    submission: &SubmissionRecord,
    reason: &str,
    done_date_ms: i64,
) -> DeliveryReport {
    DeliveryReport {
        message_id: submission.correlation_id.clone(),
        system_id: submission.system_id.clone(),
        source_addr: submission.source_addr.clone(),
        destination_addr: submission.destination_addr.clone(),
        state: DeliveryState::Undeliverable,
        error_code: ERROR_CODE_UNDELIVERABLE,
        submit_date_ms: submission.received_at_ms,
        done_date_ms,
        final_date_ms: done_date_ms,
        failure_reason: Some(reason.to_string()),
        original_text: Some(original_text(&submission.message)),
    }
}

pub fn report_message(report: &DeliveryReport) -> DeliveryReportMessage {
    DeliveryReportMessage {
        message_id: report.message_id.clone(),
        system_id: report.system_id.clone(),
        source_addr: report.source_addr.clone(),
        destination_addr: report.destination_addr.clone(),
        message_state: report.state.code(),
        error_code: report.error_code,
        final_date: report.final_date_ms,
        submit_date: report.submit_date_ms,
        done_date: report.done_date_ms,
        delivered: report.delivered(),
        failed: report.failed(),
        failure_reason: report.failure_reason.clone(),
        original_text: report.original_text.clone(),
    }
}

pub struct DeliveryReportPublisher {
    queue: Arc<dyn QueueGateway>,
    exchange: String,
    routing_key: String,
}

impl DeliveryReportPublisher {
    pub fn new(
        queue: Arc<dyn QueueGateway>,
        exchange: impl Into<String>,
        routing_key: impl Into<String>,
    ) -> Self {
        Self {
            queue,
            exchange: exchange.into(),
            routing_key: routing_key.into(),
        }
    }

    pub fn routing_key(&self) -> &str {
        &self.routing_key
    }

    pub async fn publish(&self, report: &DeliveryReport) -> Result<(), PipelineError> {
        let payload = serde_json::to_vec(&report_message(report))
            .map_err(|err| PipelineError::Publish(err.to_string()))?;
        if let Err(err) = self
            .queue
            .publish_to(&self.exchange, &self.routing_key, &payload)
            .await
        {
            warn!(
                target: "smsgw.pipeline",
                message_id = %report.message_id,
                system_id = %report.system_id,
                exchange = %self.exchange,
                routing_key = %self.routing_key,
                error = %err,
                "delivery_report_publish_failed"
            );
            return Err(PipelineError::Publish(err.to_string()));
        }
        record_delivery_report_published();
        info!(
            target: "smsgw.pipeline",
            message_id = %report.message_id,
            system_id = %report.system_id,
            state = %report.state.as_str(),
            "delivery_report_published"
        );
        Ok(())
    }
}
