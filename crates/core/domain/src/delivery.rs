/// SMPP message_state 取值。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryState {
    Enroute,
    Delivered,
    Expired,
    Deleted,
    Undeliverable,
    Accepted,
    Unknown,
    Rejected,
}

impl DeliveryState {
    /// SMPP 3.4 message_state 数值。
    pub fn code(&self) -> u8 {
        match self {
            Self::Enroute => 1,
            Self::Delivered => 2,
            Self::Expired => 3,
            Self::Deleted => 4,
            Self::Undeliverable => 5,
            Self::Accepted => 6,
            Self::Unknown => 7,
            Self::Rejected => 8,
        }
    }

    /// 回执文本中的 stat 字段。
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Enroute => "ENROUTE",
            Self::Delivered => "DELIVRD",
            Self::Expired => "EXPIRED",
            Self::Deleted => "DELETED",
            Self::Undeliverable => "UNDELIV",
            Self::Accepted => "ACCEPTD",
            Self::Unknown => "UNKNOWN",
            Self::Rejected => "REJECTD",
        }
    }

    pub fn is_final(&self) -> bool {
        matches!(
            self,
            Self::Delivered | Self::Expired | Self::Deleted | Self::Undeliverable | Self::Rejected
        )
    }
}

/// 投递结果报告，回送电信侧用于关联与确认。
#[derive(Debug, Clone)]
pub struct DeliveryReport {
    pub message_id: String,
    pub system_id: String,
    pub source_addr: String,
    pub destination_addr: String,
    pub state: DeliveryState,
    pub error_code: u32,
    pub submit_date_ms: i64,
    pub done_date_ms: i64,
    pub final_date_ms: i64,
    pub failure_reason: Option<String>,
    pub original_text: Option<String>,
}

impl DeliveryReport {
    pub fn delivered(&self) -> bool {
        self.state == DeliveryState::Delivered
    }

    pub fn failed(&self) -> bool {
        self.state.is_final() && self.state != DeliveryState::Delivered
    }
}
