//! 设备链路监听：上下线 / 心跳写注册表，回执转交给回执处理器。

use crate::LinkError;
use crate::mqtt::{CHANNEL_PRESENCE, CHANNEL_RECEIPTS, MqttLinkConfig, parse_device_topic, qos_from_u8};
use api_contract::{DevicePresenceMessage, DeviceReceiptMessage};
use async_trait::async_trait;
use domain::{ConnectionRecord, LinkType, now_epoch_ms};
use rumqttc::{AsyncClient, Event, Packet};
use smsgw_storage::LinkRegistry;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// 设备回执消费方。
#[async_trait]
pub trait ReceiptSink: Send + Sync {
    async fn on_receipt(&self, device_id: &str, receipt: DeviceReceiptMessage);
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PresenceOutcome {
    Registered,
    Refreshed,
    /// 心跳到达时注册表已遗忘该链路，按新链路重新登记。
    Reregistered,
    Removed,
    Ignored,
}

/// 把设备上报的链路事件落到注册表，记录归属本实例。
pub struct PresenceTracker {
    instance_id: String,
    registry: Arc<dyn LinkRegistry>,
}

impl PresenceTracker {
    pub fn new(instance_id: impl Into<String>, registry: Arc<dyn LinkRegistry>) -> Self {
        Self {
            instance_id: instance_id.into(),
            registry,
        }
    }

    pub fn instance_id(&self) -> &str {
        &self.instance_id
    }

    pub async fn apply(
        &self,
        device_id: &str,
        presence: &DevicePresenceMessage,
    ) -> Result<PresenceOutcome, LinkError> {
        let ts_ms = presence.ts_ms.unwrap_or_else(now_epoch_ms);
        match presence.event.trim().to_ascii_lowercase().as_str() {
            "connect" | "connected" | "online" => {
                self.register(device_id, presence, ts_ms).await?;
                Ok(PresenceOutcome::Registered)
            }
            "heartbeat" | "ping" => match self.registry.heartbeat(device_id, ts_ms).await {
                Ok(_) => Ok(PresenceOutcome::Refreshed),
                Err(err) if err.is_not_found() => {
                    self.register(device_id, presence, ts_ms).await?;
                    Ok(PresenceOutcome::Reregistered)
                }
                Err(err) => Err(LinkError::Registry(err.to_string())),
            },
            "disconnect" | "disconnected" | "offline" => {
                self.registry
                    .remove(device_id, &self.instance_id)
                    .await
                    .map_err(|err| LinkError::Registry(err.to_string()))?;
                Ok(PresenceOutcome::Removed)
            }
            _ => Ok(PresenceOutcome::Ignored),
        }
    }

    async fn register(
        &self,
        device_id: &str,
        presence: &DevicePresenceMessage,
        ts_ms: i64,
    ) -> Result<(), LinkError> {
        let link_type = presence
            .link_type
            .as_deref()
            .and_then(LinkType::parse)
            .unwrap_or_default();
        let mut record = ConnectionRecord::new(device_id, self.instance_id.clone(), link_type, ts_ms)
            .with_group(presence.device_group_id.clone())
            .with_site(presence.site_id.clone());
        record.handicapped = presence.handicapped;
        self.registry
            .store(&record)
            .await
            .map_err(|err| LinkError::Registry(err.to_string()))
    }
}

/// 订阅 `{prefix}/+/presence` 与 `{prefix}/+/receipts`。
pub fn spawn_link_listener(
    config: MqttLinkConfig,
    tracker: Arc<PresenceTracker>,
    receipts: Arc<dyn ReceiptSink>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let (client, mut eventloop) = AsyncClient::new(config.options("listener"), 10);
        let qos = qos_from_u8(config.qos);
        for channel in [CHANNEL_PRESENCE, CHANNEL_RECEIPTS] {
            if let Err(err) = client.subscribe(config.wildcard_topic(channel), qos).await {
                warn!(target: "smsgw.link", "mqtt link subscribe error: {}", err);
                return;
            }
        }
        info!(
            target: "smsgw.link",
            instance_id = %tracker.instance_id(),
            topic_prefix = %config.topic_prefix,
            "link_listener_started"
        );

        loop {
            match eventloop.poll().await {
                Ok(Event::Incoming(Packet::Publish(publish))) => {
                    let Some((device_id, channel)) =
                        parse_device_topic(&config.topic_prefix, &publish.topic)
                    else {
                        warn!(target: "smsgw.link", "link topic skipped: {}", publish.topic);
                        continue;
                    };
                    match channel.as_str() {
                        CHANNEL_PRESENCE => {
                            let presence: DevicePresenceMessage =
                                match serde_json::from_slice(&publish.payload) {
                                    Ok(presence) => presence,
                                    Err(err) => {
                                        warn!(
                                            target: "smsgw.link",
                                            device_id = %device_id,
                                            error = %err,
                                            "presence_payload_invalid"
                                        );
                                        continue;
                                    }
                                };
                            match tracker.apply(&device_id, &presence).await {
                                Ok(outcome) => info!(
                                    target: "smsgw.link",
                                    device_id = %device_id,
                                    event = %presence.event,
                                    outcome = ?outcome,
                                    "presence_applied"
                                ),
                                Err(err) => warn!(
                                    target: "smsgw.link",
                                    device_id = %device_id,
                                    error = %err,
                                    "presence_apply_failed"
                                ),
                            }
                        }
                        CHANNEL_RECEIPTS => {
                            let receipt: DeviceReceiptMessage =
                                match serde_json::from_slice(&publish.payload) {
                                    Ok(receipt) => receipt,
                                    Err(err) => {
                                        warn!(
                                            target: "smsgw.link",
                                            device_id = %device_id,
                                            error = %err,
                                            "receipt_payload_invalid"
                                        );
                                        continue;
                                    }
                                };
                            receipts.on_receipt(&device_id, receipt).await;
                        }
                        _ => {}
                    }
                }
                Ok(_) => {}
                Err(err) => {
                    warn!(target: "smsgw.link", "mqtt link eventloop error: {}", err);
                    tokio::time::sleep(Duration::from_secs(1)).await;
                }
            }
        }
    })
}
