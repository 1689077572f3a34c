//! 应用侧短信接入。
//!
//! 每条输入恰好发布一条回执到 `{system_id}_response`（解码失败除外，此时无关联字段）。

use crate::decode::decode_send_request;
use crate::{PipelineError, new_message_id, record_dispatch_outcome};
use api_contract::SendResponseMessage;
use async_trait::async_trait;
use domain::{MessageStatus, SendCommand, SendRequest, now_epoch_ms};
use smsgw_link::DeviceDispatcher;
use smsgw_queue::{MessageHandler, QueueError, QueueGateway};
use smsgw_storage::{DeviceStore, MessageLogRecord, MessageLogStore, MessageLogUpdate};
use smsgw_telemetry::{record_decode_failure, record_response_published, record_send_request};
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Instant;
use tracing::{info, warn};

pub const RESPONSE_QUEUE_SUFFIX: &str = "_response";
pub const DEVICE_NOT_FOUND: &str = "device not found";

pub fn response_queue(system_id: &str) -> String {
    format!("{}{}", system_id, RESPONSE_QUEUE_SUFFIX)
}

pub struct SmsIngestor {
    devices: Arc<dyn DeviceStore>,
    logs: Arc<dyn MessageLogStore>,
    dispatcher: Arc<dyn DeviceDispatcher>,
    queue: Arc<dyn QueueGateway>,
    declared: Mutex<HashSet<String>>,
}

impl SmsIngestor {
    pub fn new(
        devices: Arc<dyn DeviceStore>,
        logs: Arc<dyn MessageLogStore>,
        dispatcher: Arc<dyn DeviceDispatcher>,
        queue: Arc<dyn QueueGateway>,
    ) -> Self {
        Self {
            devices,
            logs,
            dispatcher,
            queue,
            declared: Mutex::new(HashSet::new()),
        }
    }

    /// 处理一条发送请求，返回应回送的响应（不发布）。
    pub async fn process(&self, request: &SendRequest) -> SendResponseMessage {
        let message_id = request.message_id.clone().unwrap_or_else(new_message_id);
        let respond = |status: MessageStatus, error: Option<String>| SendResponseMessage {
            system_id: request.system_id.clone(),
            message_id: message_id.clone(),
            status: status.as_str().to_string(),
            error,
        };

        let device = match self.devices.find_device(&request.device_id).await {
            Ok(Some(device)) => device,
            Ok(None) => {
                info!(
                    target: "smsgw.pipeline",
                    system_id = %request.system_id,
                    device_id = %request.device_id,
                    message_id = %message_id,
                    "send_request_device_not_found"
                );
                return respond(MessageStatus::Failed, Some(DEVICE_NOT_FOUND.to_string()));
            }
            Err(err) => {
                warn!(
                    target: "smsgw.pipeline",
                    device_id = %request.device_id,
                    error = %err,
                    "send_request_device_lookup_failed"
                );
                return respond(MessageStatus::Failed, Some(err.to_string()));
            }
        };

        let mut log = MessageLogRecord::outbound(
            message_id.clone(),
            request.phone_number.clone(),
            request.message.clone(),
            request.priority,
            now_epoch_ms(),
        );
        log.system_id = Some(request.system_id.clone());
        log.sim_slot = request.sim_slot;
        log.metadata = serde_json::json!({ "origin": "application" }).to_string();
        let log = log.with_device(&device);
        let sim_slot = log.sim_slot;
        if let Err(err) = self.logs.create_log(log).await {
            warn!(
                target: "smsgw.pipeline",
                device_id = %request.device_id,
                message_id = %message_id,
                error = %err,
                "message_log_create_failed"
            );
            return respond(MessageStatus::Failed, Some(err.to_string()));
        }

        let command = SendCommand {
            message_id: message_id.clone(),
            phone_number: request.phone_number.clone(),
            message: request.message.clone(),
            sim_slot,
            priority: request.priority,
        };
        let started_at = Instant::now();
        let result = self.dispatcher.send(&request.device_id, &command).await;
        record_dispatch_outcome(&result, started_at);

        let (update, response) = match result {
            Ok(()) => (
                MessageLogUpdate::queued(now_epoch_ms()),
                respond(MessageStatus::Queued, None),
            ),
            Err(err) => {
                info!(
                    target: "smsgw.pipeline",
                    device_id = %request.device_id,
                    message_id = %message_id,
                    error = %err,
                    "dispatch_failed"
                );
                (
                    MessageLogUpdate::failed(err.to_string()),
                    respond(MessageStatus::Failed, Some(err.to_string())),
                )
            }
        };
        if let Err(err) = self.logs.update_log(&message_id, update).await {
            warn!(
                target: "smsgw.pipeline",
                message_id = %message_id,
                error = %err,
                "message_log_update_failed"
            );
        }
        response
    }

    /// 发布回执到 `{system_id}_response`（首次使用时声明队列）。
    pub async fn publish_response(
        &self,
        response: &SendResponseMessage,
    ) -> Result<(), PipelineError> {
        let queue = response_queue(&response.system_id);
        let needs_declare = self
            .declared
            .lock()
            .map(|declared| !declared.contains(&queue))
            .unwrap_or(true);
        if needs_declare {
            self.queue
                .declare(&queue)
                .await
                .map_err(|err| PipelineError::Publish(err.to_string()))?;
            if let Ok(mut declared) = self.declared.lock() {
                declared.insert(queue.clone());
            }
        }
        let payload = serde_json::to_vec(response)
            .map_err(|err| PipelineError::Publish(err.to_string()))?;
        self.queue
            .publish(&queue, &payload)
            .await
            .map_err(|err| PipelineError::Publish(err.to_string()))?;
        record_response_published();
        info!(
            target: "smsgw.pipeline",
            system_id = %response.system_id,
            message_id = %response.message_id,
            status = %response.status,
            queue = %queue,
            "send_response_published"
        );
        Ok(())
    }
}

#[async_trait]
impl MessageHandler for SmsIngestor {
    async fn handle(&self, payload: Vec<u8>) -> Result<(), QueueError> {
        let request = match decode_send_request(&payload, now_epoch_ms()) {
            Ok(request) => request,
            Err(err) => {
                record_decode_failure();
                warn!(
                    target: "smsgw.pipeline",
                    payload_size = payload.len(),
                    error = %err,
                    "send_request_decode_failed"
                );
                return Ok(());
            }
        };
        record_send_request();
        let response = self.process(&request).await;
        if let Err(err) = self.publish_response(&response).await {
            warn!(
                target: "smsgw.pipeline",
                system_id = %response.system_id,
                message_id = %response.message_id,
                error = %err,
                "send_response_publish_failed"
            );
            return Err(err.into());
        }
        Ok(())
    }
}
