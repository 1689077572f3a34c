/// 短信优先级（封闭集合）。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Priority {
    #[default]
    Normal,
    High,
    Urgent,
}

impl Priority {
    /// SMPP priority_flag 映射：0/未知 → normal，1 → high，2/3 → urgent。
    pub fn from_flag(flag: u8) -> Self {
        match flag {
            1 => Self::High,
            2 | 3 => Self::Urgent,
            _ => Self::Normal,
        }
    }

    /// 文本映射，未知值回落为 normal。
    pub fn parse(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "high" => Self::High,
            "urgent" => Self::Urgent,
            _ => Self::Normal,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Normal => "normal",
            Self::High => "high",
            Self::Urgent => "urgent",
        }
    }
}

/// 消息日志状态。
///
/// 生命周期：`pending → queued|sent → delivered|failed`。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageStatus {
    Pending,
    Queued,
    Sent,
    Delivered,
    Failed,
}

impl MessageStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Queued => "queued",
            Self::Sent => "sent",
            Self::Delivered => "delivered",
            Self::Failed => "failed",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "pending" => Some(Self::Pending),
            "queued" => Some(Self::Queued),
            "sent" => Some(Self::Sent),
            "delivered" => Some(Self::Delivered),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Delivered | Self::Failed)
    }
}

/// 长短信拼接描述。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Concatenation {
    pub reference_number: u16,
    pub total_segments: u8,
    pub sequence_number: u8,
}

/// 电信侧提交记录（来自 SMPP 队列），仅在一次路由过程中存在。
#[derive(Debug, Clone)]
pub struct SubmissionRecord {
    /// 关联 ID（协议侧 message id）。
    pub correlation_id: String,
    pub system_id: String,
    pub source_addr: String,
    pub destination_addr: String,
    pub message: String,
    pub data_coding: u8,
    pub priority: Priority,
    pub registered_delivery: bool,
    pub concatenation: Option<Concatenation>,
    /// 协议字段的原样序列化（JSON 文本），路由层不解释。
    pub protocol_metadata: String,
    pub received_at_ms: i64,
}

/// 应用侧发送请求。
#[derive(Debug, Clone)]
pub struct SendRequest {
    pub system_id: String,
    pub device_id: String,
    pub phone_number: String,
    pub message: String,
    pub sim_slot: Option<u8>,
    pub priority: Priority,
    pub message_id: Option<String>,
    pub received_at_ms: i64,
}
