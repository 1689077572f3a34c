//! 稳定的队列消息契约与 HTTP DTO。
//!
//! 队列消息（应用队列、SMPP 队列、状态报告队列、设备链路 topic）使用 snake_case，
//! 与对端 JSON 保持一致；HTTP DTO 沿用 camelCase。

use serde::{Deserialize, Serialize};

/// 标准 API 响应封装。
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<ApiError>,
}

/// 失败响应的错误体。
#[derive(Debug, Serialize)]
pub struct ApiError {
    pub code: String,
    pub message: String,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn error(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(ApiError {
                code: code.into(),
                message: message.into(),
            }),
        }
    }
}

// ============================================================================
// 队列消息
// ============================================================================

/// 优先级字段：兼容文本（"high"）与数字（1）两种写法。
///
/// 越界数字或其他 JSON 值落入 `Other`，由解码方按 normal 处理，不视为错误。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum PriorityField {
    Flag(u64),
    Text(String),
    Other(serde_json::Value),
}

/// 应用队列：发送请求。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SendRequestMessage {
    pub system_id: String,
    pub device_id: String,
    pub phone_number: String,
    pub message: String,
    #[serde(default)]
    pub sim_slot: Option<u8>,
    #[serde(default)]
    pub priority: Option<PriorityField>,
    #[serde(default)]
    pub message_id: Option<String>,
}

/// 应用响应队列（`<system_id>_response`）。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SendResponseMessage {
    pub system_id: String,
    pub message_id: String,
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// 长短信拼接描述。
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct ConcatenationMessage {
    pub reference_number: u16,
    pub total_segments: u8,
    pub sequence_number: u8,
}

/// SMPP 队列：submit_sm 解码后的提交记录。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmissionMessage {
    #[serde(default, alias = "correlation_id", alias = "id")]
    pub message_id: Option<String>,
    pub system_id: String,
    #[serde(default, alias = "source", alias = "src")]
    pub source_addr: String,
    #[serde(alias = "destination", alias = "dest")]
    pub destination_addr: String,
    #[serde(alias = "short_message", alias = "body")]
    pub message: String,
    #[serde(default)]
    pub data_coding: u8,
    #[serde(default)]
    pub priority_flag: Option<PriorityField>,
    #[serde(default)]
    pub registered_delivery: u8,
    #[serde(default)]
    pub service_type: Option<String>,
    #[serde(default)]
    pub esm_class: u8,
    #[serde(default)]
    pub optional_params: Option<serde_json::Map<String, serde_json::Value>>,
    #[serde(default)]
    pub concatenation: Option<ConcatenationMessage>,
}

/// 状态报告队列：投递结果回送电信侧。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryReportMessage {
    pub message_id: String,
    pub system_id: String,
    pub source_addr: String,
    pub destination_addr: String,
    pub message_state: u8,
    pub error_code: u32,
    pub final_date: i64,
    pub submit_date: i64,
    pub done_date: i64,
    pub delivered: bool,
    pub failed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure_reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_text: Option<String>,
}

// ============================================================================
// 设备链路消息
// ============================================================================

/// 下发到设备的发送命令。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DeviceCommandMessage {
    #[serde(rename = "type")]
    pub kind: String,
    pub message_id: String,
    pub phone_number: String,
    pub message: String,
    #[serde(default)]
    pub sim_slot: Option<u8>,
    pub priority: String,
}

/// 设备上报的链路事件（connect / heartbeat / disconnect）。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DevicePresenceMessage {
    #[serde(alias = "type")]
    pub event: String,
    #[serde(default)]
    pub device_group_id: Option<String>,
    #[serde(default)]
    pub site_id: Option<String>,
    #[serde(default)]
    pub link_type: Option<String>,
    #[serde(default)]
    pub handicapped: bool,
    #[serde(default, alias = "ts", alias = "timestamp")]
    pub ts_ms: Option<i64>,
}

/// 设备上报的投递回执。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceReceiptMessage {
    pub message_id: String,
    #[serde(alias = "state", alias = "result")]
    pub status: String,
    #[serde(default, alias = "error_message", alias = "detail")]
    pub error: Option<String>,
    #[serde(default, alias = "ts", alias = "timestamp")]
    pub ts_ms: Option<i64>,
}

// ============================================================================
// HTTP DTO
// ============================================================================

/// 发送请求（HTTP 入队）。
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendSmsRequest {
    pub system_id: String,
    pub device_id: String,
    pub phone_number: String,
    pub message: String,
    pub sim_slot: Option<u8>,
    pub priority: Option<String>,
    pub message_id: Option<String>,
}

/// 入队成功返回。
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SendSmsAccepted {
    pub message_id: String,
    pub queue: String,
}

/// 链路注册表条目返回结构。
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionDto {
    pub device_id: String,
    pub device_group_id: Option<String>,
    pub site_id: Option<String>,
    pub link_type: String,
    pub handicapped: bool,
    pub connected_at_ms: i64,
    pub last_heartbeat_ms: i64,
    pub instance_id: String,
}

/// 实例持有的设备列表。
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InstanceLinksDto {
    pub instance_id: String,
    pub device_ids: Vec<String>,
}
