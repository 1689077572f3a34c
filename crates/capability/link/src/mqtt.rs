//! MQTT 设备链路传输。
//!
//! Topic 约定（`prefix` 默认 `smsgw/devices`）：
//! - 下发：`{prefix}/{device_id}/commands`
//! - 上下线与心跳：`{prefix}/{device_id}/presence`
//! - 发送回执：`{prefix}/{device_id}/receipts`

use crate::{LinkError, LinkTransport};
use api_contract::DeviceCommandMessage;
use async_trait::async_trait;
use domain::SendCommand;
use rumqttc::{AsyncClient, MqttOptions, QoS};
use std::time::Duration;
use tracing::{info, warn};

pub const COMMAND_KIND_SEND_SMS: &str = "send_sms";
pub const CHANNEL_COMMANDS: &str = "commands";
pub const CHANNEL_PRESENCE: &str = "presence";
pub const CHANNEL_RECEIPTS: &str = "receipts";

#[derive(Debug, Clone)]
pub struct MqttLinkConfig {
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    pub topic_prefix: String,
    pub qos: u8,
}

impl MqttLinkConfig {
    pub(crate) fn options(&self, role: &str) -> MqttOptions {
        let client_id = format!("smsgw-{}-{}", role, uuid::Uuid::new_v4());
        let mut options = MqttOptions::new(client_id, self.host.clone(), self.port);
        options.set_keep_alive(Duration::from_secs(30));
        if let (Some(username), Some(password)) = (self.username.as_ref(), self.password.as_ref())
        {
            options.set_credentials(username, password);
        }
        options
    }

    pub fn device_topic(&self, device_id: &str, channel: &str) -> String {
        format!(
            "{}/{}/{}",
            self.topic_prefix.trim_end_matches('/'),
            device_id,
            channel
        )
    }

    pub fn wildcard_topic(&self, channel: &str) -> String {
        self.device_topic("+", channel)
    }
}

/// MQTT 链路传输（发布下发命令）。
#[derive(Clone)]
pub struct MqttLinkTransport {
    client: AsyncClient,
    config: MqttLinkConfig,
    qos: QoS,
}

impl MqttLinkTransport {
    pub fn connect(
        config: MqttLinkConfig,
    ) -> Result<(Self, tokio::task::JoinHandle<()>), LinkError> {
        let (client, mut eventloop) = AsyncClient::new(config.options("dispatch"), 10);
        let handle = tokio::spawn(async move {
            loop {
                if let Err(err) = eventloop.poll().await {
                    warn!(target: "smsgw.link", "mqtt dispatch eventloop error: {}", err);
                    tokio::time::sleep(Duration::from_secs(1)).await;
                }
            }
        });
        let qos = qos_from_u8(config.qos);
        Ok((Self { client, config, qos }, handle))
    }
}

#[async_trait]
impl LinkTransport for MqttLinkTransport {
    async fn deliver(&self, device_id: &str, command: &SendCommand) -> Result<(), LinkError> {
        let topic = self.config.device_topic(device_id, CHANNEL_COMMANDS);
        let payload = command_payload(command)?;
        info!(
            target: "smsgw.link",
            device_id = %device_id,
            message_id = %command.message_id,
            topic = %topic,
            payload_size = payload.len(),
            "link_command_publish"
        );
        self.client
            .publish(topic, self.qos, false, payload)
            .await
            .map_err(|err| LinkError::Mqtt(err.to_string()))
    }
}

pub fn command_payload(command: &SendCommand) -> Result<Vec<u8>, LinkError> {
    let message = DeviceCommandMessage {
        kind: COMMAND_KIND_SEND_SMS.to_string(),
        message_id: command.message_id.clone(),
        phone_number: command.phone_number.clone(),
        message: command.message.clone(),
        sim_slot: command.sim_slot,
        priority: command.priority.as_str().to_string(),
    };
    serde_json::to_vec(&message).map_err(|err| LinkError::Payload(err.to_string()))
}

/// 解析 `{prefix}/{device_id}/{channel}`，返回 (device_id, channel)。
pub fn parse_device_topic(prefix: &str, topic: &str) -> Option<(String, String)> {
    let prefix = prefix.trim_matches('/');
    let topic = topic.trim_matches('/');
    let rest = if prefix.is_empty() {
        topic
    } else {
        topic.strip_prefix(prefix)?.strip_prefix('/')?
    };
    let (device_id, channel) = rest.split_once('/')?;
    if device_id.is_empty() || channel.is_empty() || channel.contains('/') {
        return None;
    }
    Some((device_id.to_string(), channel.to_string()))
}

pub fn qos_from_u8(value: u8) -> QoS {
    match value {
        0 => QoS::AtMostOnce,
        1 => QoS::AtLeastOnce,
        2 => QoS::ExactlyOnce,
        _ => QoS::AtLeastOnce,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use domain::Priority;

    #[test]
    fn device_topic_scope() {
        let parsed = parse_device_topic("smsgw/devices", "smsgw/devices/dev-1/presence")
            .expect("topic");
        assert_eq!(parsed, ("dev-1".to_string(), "presence".to_string()));
        assert!(parse_device_topic("smsgw/devices", "smsgw/devices/dev-1").is_none());
        assert!(parse_device_topic("smsgw/devices", "other/dev-1/presence").is_none());
        assert!(parse_device_topic("smsgw/devices", "smsgw/devices/dev-1/a/b").is_none());
    }

    #[test]
    fn command_payload_carries_type_and_priority() {
        let command = SendCommand {
            message_id: "m-1".to_string(),
            phone_number: "+15551234567".to_string(),
            message: "hi".to_string(),
            sim_slot: Some(2),
            priority: Priority::Urgent,
        };
        let payload = command_payload(&command).expect("payload");
        let value: serde_json::Value = serde_json::from_slice(&payload).expect("json");
        assert_eq!(value["type"], "send_sms");
        assert_eq!(value["priority"], "urgent");
        assert_eq!(value["sim_slot"], 2);
    }

    #[test]
    fn wildcard_topics() {
        let config = MqttLinkConfig {
            host: "localhost".to_string(),
            port: 1883,
            username: None,
            password: None,
            topic_prefix: "smsgw/devices/".to_string(),
            qos: 1,
        };
        assert_eq!(config.wildcard_topic(CHANNEL_PRESENCE), "smsgw/devices/+/presence");
        assert_eq!(
            config.device_topic("dev-9", CHANNEL_COMMANDS),
            "smsgw/devices/dev-9/commands"
        );
    }
}
