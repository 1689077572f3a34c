//! 设备链路模型。

use crate::message::Priority;

/// 链路类型。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LinkType {
    #[default]
    Device,
    Console,
}

impl LinkType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Device => "device",
            Self::Console => "console",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "device" => Some(Self::Device),
            "console" => Some(Self::Console),
            _ => None,
        }
    }
}

/// 链路注册表条目：某设备当前由哪个网关实例持有。
///
/// 同一 device_id 任意时刻至多一条，后写覆盖先写。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionRecord {
    pub device_id: String,
    pub device_group_id: Option<String>,
    pub site_id: Option<String>,
    pub link_type: LinkType,
    pub handicapped: bool,
    pub connected_at_ms: i64,
    pub last_heartbeat_ms: i64,
    pub instance_id: String,
}

impl ConnectionRecord {
    /// 新建链路记录，connected_at 与 last_heartbeat 相同。
    pub fn new(
        device_id: impl Into<String>,
        instance_id: impl Into<String>,
        link_type: LinkType,
        connected_at_ms: i64,
    ) -> Self {
        Self {
            device_id: device_id.into(),
            device_group_id: None,
            site_id: None,
            link_type,
            handicapped: false,
            connected_at_ms,
            last_heartbeat_ms: connected_at_ms,
            instance_id: instance_id.into(),
        }
    }

    pub fn with_group(mut self, device_group_id: Option<String>) -> Self {
        self.device_group_id = device_group_id;
        self
    }

    pub fn with_site(mut self, site_id: Option<String>) -> Self {
        self.site_id = site_id;
        self
    }

    /// 最后心跳早于阈值即视为过期。
    pub fn is_stale(&self, stale_before_ms: i64) -> bool {
        self.last_heartbeat_ms < stale_before_ms
    }

    pub fn is_owned_by(&self, instance_id: &str) -> bool {
        self.instance_id == instance_id
    }
}

/// 下发到设备的发送命令。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendCommand {
    pub message_id: String,
    pub phone_number: String,
    pub message: String,
    pub sim_slot: Option<u8>,
    pub priority: Priority,
}
