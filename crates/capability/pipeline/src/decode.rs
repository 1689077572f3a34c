//! 队列负载解码。

use crate::{PipelineError, new_message_id};
use api_contract::{PriorityField, SendRequestMessage, SubmissionMessage};
use domain::{Concatenation, Priority, SendRequest, SubmissionRecord};

fn priority_from_field(field: Option<&PriorityField>) -> Priority {
    match field {
        Some(PriorityField::Flag(flag)) => u8::try_from(*flag)
            .map(Priority::from_flag)
            .unwrap_or_default(),
        Some(PriorityField::Text(text)) => match text.trim().parse::<u8>() {
            Ok(flag) => Priority::from_flag(flag),
            Err(_) => Priority::parse(text),
        },
        Some(PriorityField::Other(_)) | None => Priority::Normal,
    }
}

fn require(field: &str, value: &str) -> Result<(), PipelineError> {
    if value.trim().is_empty() {
        return Err(PipelineError::Decode(format!("{} required", field)));
    }
    Ok(())
}

/// 解码电信侧提交；协议字段原样序列化为 metadata。
pub fn decode_submission(
    payload: &[u8],
    received_at_ms: i64,
) -> Result<SubmissionRecord, PipelineError> {
    let message: SubmissionMessage =
        serde_json::from_slice(payload).map_err(|err| PipelineError::Decode(err.to_string()))?;
    require("system_id", &message.system_id)?;
    require("destination_addr", &message.destination_addr)?;

    let correlation_id = message
        .message_id
        .clone()
        .filter(|id| !id.trim().is_empty())
        .unwrap_or_else(new_message_id);
    let protocol_metadata = serde_json::json!({
        "correlation_id": correlation_id,
        "data_coding": message.data_coding,
        "esm_class": message.esm_class,
        "priority_flag": message.priority_flag,
        "registered_delivery": message.registered_delivery,
        "service_type": message.service_type,
        "optional_params": message.optional_params,
        "concatenation": message.concatenation,
    })
    .to_string();

    Ok(SubmissionRecord {
        correlation_id,
        system_id: message.system_id,
        source_addr: message.source_addr,
        destination_addr: message.destination_addr,
        message: message.message,
        data_coding: message.data_coding,
        priority: priority_from_field(message.priority_flag.as_ref()),
        // registered_delivery 低两位非零即请求状态报告
        registered_delivery: message.registered_delivery & 0x03 != 0,
        concatenation: message.concatenation.map(|item| Concatenation {
            reference_number: item.reference_number,
            total_segments: item.total_segments,
            sequence_number: item.sequence_number,
        }),
        protocol_metadata,
        received_at_ms,
    })
}

/// 解码应用侧发送请求。
pub fn decode_send_request(
    payload: &[u8],
    received_at_ms: i64,
) -> Result<SendRequest, PipelineError> {
    let message: SendRequestMessage =
        serde_json::from_slice(payload).map_err(|err| PipelineError::Decode(err.to_string()))?;
    require("system_id", &message.system_id)?;
    require("device_id", &message.device_id)?;
    require("phone_number", &message.phone_number)?;

    Ok(SendRequest {
        priority: priority_from_field(message.priority.as_ref()),
        system_id: message.system_id,
        device_id: message.device_id,
        phone_number: message.phone_number,
        message: message.message,
        sim_slot: message.sim_slot,
        message_id: message.message_id.filter(|id| !id.trim().is_empty()),
        received_at_ms,
    })
}

/// 编码应用侧发送请求（HTTP 入队使用）。
pub fn encode_send_request(request: &SendRequest) -> Result<Vec<u8>, PipelineError> {
    let message = SendRequestMessage {
        system_id: request.system_id.clone(),
        device_id: request.device_id.clone(),
        phone_number: request.phone_number.clone(),
        message: request.message.clone(),
        sim_slot: request.sim_slot,
        priority: Some(PriorityField::Text(request.priority.as_str().to_string())),
        message_id: request.message_id.clone(),
    };
    serde_json::to_vec(&message).map_err(|err| PipelineError::Decode(err.to_string()))
}
