//! SMPP 提交路由。
//!
//! 规则解析 → 候选设备选择 → 逐设备扇出。每次投递尝试独立记日志、独立更新状态，
//! 单台设备失败不影响其他设备。没有任何设备接收且请求了状态报告时，路由阶段直接回送一次失败报告。

use crate::decode::decode_submission;
use crate::delivery_report::{DeliveryReportPublisher, undeliverable_report};
use crate::{PipelineError, new_message_id, record_dispatch_outcome};
use async_trait::async_trait;
use domain::{MessageStatus, SendCommand, SubmissionRecord, now_epoch_ms};
use smsgw_link::DeviceDispatcher;
use smsgw_queue::{MessageHandler, QueueError};
use smsgw_storage::{
    DeviceRecord, DeviceStore, MessageLogRecord, MessageLogStore, MessageLogUpdate,
    RoutingRuleStore,
};
use smsgw_telemetry::{record_decode_failure, record_fallback_route, record_submission};
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

pub const NO_TARGET_GROUPS: &str = "no target device groups found";
pub const NO_ACTIVE_DEVICES: &str = "no active devices in target groups";
pub const NO_DEVICE_ACCEPTED: &str = "no device accepted the message";

/// 单次路由结果。
#[derive(Debug, Clone, Default)]
pub struct RouteSummary {
    pub correlation_id: String,
    pub target_groups: Vec<String>,
    /// 无匹配规则，回落到全部在线设备。
    pub fallback: bool,
    pub message_ids: Vec<String>,
    pub attempted: usize,
    pub succeeded: usize,
    /// 候选为空时的终止原因。
    pub failure_reason: Option<String>,
    /// 路由阶段已回送失败报告。
    pub report_published: bool,
}

pub struct SubmissionRouter {
    rules: Arc<dyn RoutingRuleStore>,
    devices: Arc<dyn DeviceStore>,
    logs: Arc<dyn MessageLogStore>,
    dispatcher: Arc<dyn DeviceDispatcher>,
    reports: Option<Arc<DeliveryReportPublisher>>,
}

impl SubmissionRouter {
    pub fn new(
        rules: Arc<dyn RoutingRuleStore>,
        devices: Arc<dyn DeviceStore>,
        logs: Arc<dyn MessageLogStore>,
        dispatcher: Arc<dyn DeviceDispatcher>,
    ) -> Self {
        Self {
            rules,
            devices,
            logs,
            dispatcher,
            reports: None,
        }
    }

    pub fn with_reports(mut self, reports: Arc<DeliveryReportPublisher>) -> Self {
        self.reports = Some(reports);
        self
    }

    /// 按发送方 system_id 汇总激活规则的设备分组（去重、保序）。
    pub async fn resolve_target_groups(
        &self,
        system_id: &str,
    ) -> Result<Vec<String>, PipelineError> {
        let rules = self.rules.list_active_rules(system_id).await?;
        let mut groups: Vec<String> = Vec::new();
        for rule in rules.into_iter().filter(|rule| rule.active) {
            for group_id in rule.device_group_ids {
                if !groups.contains(&group_id) {
                    groups.push(group_id);
                }
            }
        }
        Ok(groups)
    }

    pub async fn route(&self, submission: &SubmissionRecord) -> Result<RouteSummary, PipelineError> {
        let target_groups = self.resolve_target_groups(&submission.system_id).await?;
        let fallback = target_groups.is_empty();
        if fallback {
            record_fallback_route();
            warn!(
                target: "smsgw.pipeline",
                system_id = %submission.system_id,
                correlation_id = %submission.correlation_id,
                "routing_fallback_all_devices"
            );
        }

        let candidates: Vec<DeviceRecord> = self
            .devices
            .list_routable_devices(&target_groups)
            .await?
            .into_iter()
            .filter(|device| device.is_routable())
            .filter(|device| fallback || device.in_groups(&target_groups))
            .collect();

        let mut summary = RouteSummary {
            correlation_id: submission.correlation_id.clone(),
            target_groups,
            fallback,
            ..RouteSummary::default()
        };

        if candidates.is_empty() {
            let reason = if summary.fallback {
                NO_TARGET_GROUPS
            } else {
                NO_ACTIVE_DEVICES
            };
            let message_id = new_message_id();
            let mut log = self.base_log(submission, &message_id);
            log.status = MessageStatus::Failed;
            log.error_message = Some(reason.to_string());
            self.logs.create_log(log).await?;
            info!(
                target: "smsgw.pipeline",
                system_id = %submission.system_id,
                correlation_id = %submission.correlation_id,
                message_id = %message_id,
                reason = %reason,
                "submission_unroutable"
            );
            summary.message_ids.push(message_id);
            summary.failure_reason = Some(reason.to_string());
            summary.report_published = self.report_undeliverable(submission, reason).await;
            return Ok(summary);
        }

        for device in &candidates {
            let message_id = new_message_id();
            summary.attempted += 1;
            summary.message_ids.push(message_id.clone());
            if self.deliver_to(submission, device, &message_id).await {
                summary.succeeded += 1;
            }
        }

        if summary.succeeded == 0 {
            summary.report_published = self
                .report_undeliverable(submission, NO_DEVICE_ACCEPTED)
                .await;
        }

        info!(
            target: "smsgw.pipeline",
            system_id = %submission.system_id,
            correlation_id = %submission.correlation_id,
            fallback = summary.fallback,
            attempted = summary.attempted,
            succeeded = summary.succeeded,
            "submission_routed"
        );
        Ok(summary)
    }

    /// 请求了状态报告的提交在路由阶段终止时回送失败报告；返回是否已发布。
    async fn report_undeliverable(&self, submission: &SubmissionRecord, reason: &str) -> bool {
        if !submission.registered_delivery {
            return false;
        }
        let Some(reports) = self.reports.as_ref() else {
            return false;
        };
        let report = undeliverable_report(submission, reason, now_epoch_ms());
        reports.publish(&report).await.is_ok()
    }

    fn base_log(&self, submission: &SubmissionRecord, message_id: &str) -> MessageLogRecord {
        let mut log = MessageLogRecord::outbound(
            message_id,
            submission.destination_addr.clone(),
            submission.message.clone(),
            submission.priority,
            now_epoch_ms(),
        );
        log.correlation_id = Some(submission.correlation_id.clone());
        log.system_id = Some(submission.system_id.clone());
        log.source_addr = submission.source_addr.clone();
        log.delivery_report_requested = submission.registered_delivery;
        log.metadata = submission.protocol_metadata.clone();
        log
    }

    /// 单台设备的一次投递尝试；返回是否下发成功。
    async fn deliver_to(
        &self,
        submission: &SubmissionRecord,
        device: &DeviceRecord,
        message_id: &str,
    ) -> bool {
        let log = self.base_log(submission, message_id).with_device(device);
        let sim_slot = log.sim_slot;
        if let Err(err) = self.logs.create_log(log).await {
            warn!(
                target: "smsgw.pipeline",
                device_id = %device.device_id,
                message_id = %message_id,
                error = %err,
                "message_log_create_failed"
            );
            return false;
        }

        let command = SendCommand {
            message_id: message_id.to_string(),
            phone_number: submission.destination_addr.clone(),
            message: submission.message.clone(),
            sim_slot,
            priority: submission.priority,
        };
        let started_at = Instant::now();
        let result = self.dispatcher.send(&device.device_id, &command).await;
        record_dispatch_outcome(&result, started_at);

        let (update, delivered) = match &result {
            Ok(()) => (MessageLogUpdate::sent(now_epoch_ms()), true),
            Err(err) => {
                info!(
                    target: "smsgw.pipeline",
                    device_id = %device.device_id,
                    message_id = %message_id,
                    error = %err,
                    "dispatch_failed"
                );
                (MessageLogUpdate::failed(err.to_string()), false)
            }
        };
        if let Err(err) = self.logs.update_log(message_id, update).await {
            warn!(
                target: "smsgw.pipeline",
                device_id = %device.device_id,
                message_id = %message_id,
                error = %err,
                "message_log_update_failed"
            );
        }
        delivered
    }
}

#[async_trait]
impl MessageHandler for SubmissionRouter {
    async fn handle(&self, payload: Vec<u8>) -> Result<(), QueueError> {
        let submission = match decode_submission(&payload, now_epoch_ms()) {
            Ok(submission) => submission,
            Err(err) => {
                record_decode_failure();
                warn!(
                    target: "smsgw.pipeline",
                    payload_size = payload.len(),
                    error = %err,
                    "submission_decode_failed"
                );
                return Ok(());
            }
        };
        record_submission();
        self.route(&submission).await?;
        Ok(())
    }
}
