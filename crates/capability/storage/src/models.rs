//! 数据模型
//!
//! 核心只读写以下字段：
//! - 设备模型：DeviceRecord（由外部设备管理子系统维护，核心只读）
//! - 路由规则：RoutingRuleRecord（外部维护，核心只读激活规则）
//! - 消息日志：MessageLogRecord, MessageLogUpdate（每次投递尝试一行）

use domain::{MessageStatus, Priority};

/// 参与短信路由的设备类型。
pub const DEVICE_TYPE_LINK: &str = "link";

/// 消息方向：网关 → 设备。
pub const DIRECTION_OUTBOUND: &str = "outbound";

/// 设备记录（含分组/站点反范式字段与 SIM 信息）。
#[derive(Debug, Clone)]
pub struct DeviceRecord {
    pub device_id: String,
    pub name: String,
    pub device_group_id: Option<String>,
    pub device_group_name: Option<String>,
    pub site_id: Option<String>,
    pub site_name: Option<String>,
    pub online: bool,
    pub device_type: String,
    pub carrier_name: Option<String>,
    pub sim_phone_number: Option<String>,
    pub default_sim_slot: Option<u8>,
}

impl DeviceRecord {
    /// 是否具备设备链路能力（只有此类设备参与短信路由）。
    pub fn is_link_capable(&self) -> bool {
        self.device_type == DEVICE_TYPE_LINK
    }

    /// 在线且具备链路能力。
    pub fn is_routable(&self) -> bool {
        self.online && self.is_link_capable()
    }

    pub fn in_groups(&self, group_ids: &[String]) -> bool {
        match self.device_group_id.as_deref() {
            Some(group_id) => group_ids.iter().any(|item| item == group_id),
            None => false,
        }
    }
}

/// 路由规则：电信侧 system_id → 有序设备分组集合。
#[derive(Debug, Clone)]
pub struct RoutingRuleRecord {
    pub rule_id: String,
    pub system_id: String,
    pub device_group_ids: Vec<String>,
    pub active: bool,
}

/// 消息日志（每次投递尝试一行，核心从不删除）。
#[derive(Debug, Clone)]
pub struct MessageLogRecord {
    pub message_id: String,
    /// 来源提交的关联 ID（SMPP message id）；应用侧请求为空。
    pub correlation_id: Option<String>,
    pub system_id: Option<String>,
    pub device_id: Option<String>,
    pub device_name: Option<String>,
    pub device_group_id: Option<String>,
    pub device_group_name: Option<String>,
    pub site_id: Option<String>,
    pub site_name: Option<String>,
    pub carrier_name: Option<String>,
    pub sim_slot: Option<u8>,
    pub source_addr: String,
    pub destination_addr: String,
    pub message: String,
    pub message_length: i32,
    pub direction: String,
    pub priority: Priority,
    pub status: MessageStatus,
    pub delivery_report_requested: bool,
    pub queued_at_ms: Option<i64>,
    pub sent_at_ms: Option<i64>,
    pub delivered_at_ms: Option<i64>,
    pub error_message: Option<String>,
    /// 协议字段原样保存（JSON 文本），仅用于审计。
    pub metadata: String,
    pub created_at_ms: i64,
}

impl MessageLogRecord {
    /// 以 pending 状态创建出站日志，设备字段由调用方补齐。
    pub fn outbound(
        message_id: impl Into<String>,
        destination_addr: impl Into<String>,
        message: impl Into<String>,
        priority: Priority,
        created_at_ms: i64,
    ) -> Self {
        let message = message.into();
        Self {
            message_id: message_id.into(),
            correlation_id: None,
            system_id: None,
            device_id: None,
            device_name: None,
            device_group_id: None,
            device_group_name: None,
            site_id: None,
            site_name: None,
            carrier_name: None,
            sim_slot: None,
            source_addr: String::new(),
            destination_addr: destination_addr.into(),
            message_length: message.chars().count() as i32,
            message,
            direction: DIRECTION_OUTBOUND.to_string(),
            priority,
            status: MessageStatus::Pending,
            delivery_report_requested: false,
            queued_at_ms: None,
            sent_at_ms: None,
            delivered_at_ms: None,
            error_message: None,
            metadata: "{}".to_string(),
            created_at_ms,
        }
    }

    /// 反范式写入设备、分组、站点与运营商字段。
    pub fn with_device(mut self, device: &DeviceRecord) -> Self {
        self.device_id = Some(device.device_id.clone());
        self.device_name = Some(device.name.clone());
        self.device_group_id = device.device_group_id.clone();
        self.device_group_name = device.device_group_name.clone();
        self.site_id = device.site_id.clone();
        self.site_name = device.site_name.clone();
        self.carrier_name = device.carrier_name.clone();
        if self.sim_slot.is_none() {
            self.sim_slot = device.default_sim_slot;
        }
        self
    }
}

/// 消息日志状态更新（追加后补丁）。
#[derive(Debug, Clone)]
pub struct MessageLogUpdate {
    pub status: MessageStatus,
    pub error_message: Option<String>,
    pub queued_at_ms: Option<i64>,
    pub sent_at_ms: Option<i64>,
    pub delivered_at_ms: Option<i64>,
}

impl MessageLogUpdate {
    pub fn status(status: MessageStatus) -> Self {
        Self {
            status,
            error_message: None,
            queued_at_ms: None,
            sent_at_ms: None,
            delivered_at_ms: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            error_message: Some(error.into()),
            ..Self::status(MessageStatus::Failed)
        }
    }

    pub fn queued(ts_ms: i64) -> Self {
        Self {
            queued_at_ms: Some(ts_ms),
            ..Self::status(MessageStatus::Queued)
        }
    }

    pub fn sent(ts_ms: i64) -> Self {
        Self {
            sent_at_ms: Some(ts_ms),
            ..Self::status(MessageStatus::Sent)
        }
    }

    pub fn delivered(ts_ms: i64) -> Self {
        Self {
            delivered_at_ms: Some(ts_ms),
            ..Self::status(MessageStatus::Delivered)
        }
    }

    /// 将更新应用到记录；None 字段保持原值。
    ///
    /// 记录已处于终态（delivered / failed）时不做任何修改，返回 false。
    pub fn apply_to(&self, record: &mut MessageLogRecord) -> bool {
        if record.status.is_terminal() {
            return false;
        }
        record.status = self.status;
        if let Some(error) = self.error_message.as_ref() {
            record.error_message = Some(error.clone());
        }
        if let Some(ts) = self.queued_at_ms {
            record.queued_at_ms = Some(ts);
        }
        if let Some(ts) = self.sent_at_ms {
            record.sent_at_ms = Some(ts);
        }
        if let Some(ts) = self.delivered_at_ms {
            record.delivered_at_ms = Some(ts);
        }
        true
    }
}
