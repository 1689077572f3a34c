//! 设备链路能力。
//!
//! - `DeviceDispatcher`：下发网关契约（成功 / NotConnected / Transport）
//! - `RegistryGuardedDispatcher`：先查注册表确认本实例持有链路，再经 `LinkTransport` 下发
//! - `MqttLinkTransport`：MQTT 设备链路传输
//! - `PresenceTracker` + `spawn_link_listener`：设备上下线、心跳与回执监听
//! - `sweep_once` / `spawn_registry_sweeper`：注册表过期清扫
//! - `release_instance_links`：实例退出时释放自身持有的链路

use async_trait::async_trait;
use domain::SendCommand;

pub mod dispatcher;
pub mod listener;
pub mod mqtt;
pub mod sweeper;

pub use dispatcher::{DispatchConfig, RegistryGuardedDispatcher};
pub use listener::{PresenceOutcome, PresenceTracker, ReceiptSink, spawn_link_listener};
pub use mqtt::{MqttLinkConfig, MqttLinkTransport, qos_from_u8};
pub use sweeper::{SweepConfig, SweepReport, release_instance_links, spawn_registry_sweeper, sweep_once};

/// 下发结果错误。
///
/// `NotConnected` 与 `Transport` 必须可区分：前者是预期的“设备不可达”，后者是传输故障。
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("device not connected: {0}")]
    NotConnected(String),
    #[error("transport error: {0}")]
    Transport(String),
}

impl DispatchError {
    pub fn is_not_connected(&self) -> bool {
        matches!(self, Self::NotConnected(_))
    }
}

/// 链路层错误。
#[derive(Debug, thiserror::Error)]
pub enum LinkError {
    #[error("mqtt error: {0}")]
    Mqtt(String),
    #[error("payload error: {0}")]
    Payload(String),
    #[error("registry error: {0}")]
    Registry(String),
}

/// 下发网关。
#[async_trait]
pub trait DeviceDispatcher: Send + Sync {
    async fn send(&self, device_id: &str, command: &SendCommand) -> Result<(), DispatchError>;
}

/// 设备链路传输（已确认本实例持有链路后调用）。
#[async_trait]
pub trait LinkTransport: Send + Sync {
    async fn deliver(&self, device_id: &str, command: &SendCommand) -> Result<(), LinkError>;
}
