//! 注册表守卫的下发网关。

use crate::{DeviceDispatcher, DispatchError, LinkError, LinkTransport};
use async_trait::async_trait;
use domain::SendCommand;
use smsgw_storage::LinkRegistry;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

#[derive(Debug, Clone, Default)]
pub struct DispatchConfig {
    /// 传输失败后的重试次数；NotConnected 从不重试。
    pub max_retries: u64,
    pub backoff_ms: u64,
}

pub struct RegistryGuardedDispatcher {
    instance_id: String,
    registry: Arc<dyn LinkRegistry>,
    transport: Arc<dyn LinkTransport>,
    config: DispatchConfig,
}

impl RegistryGuardedDispatcher {
    pub fn new(
        instance_id: impl Into<String>,
        registry: Arc<dyn LinkRegistry>,
        transport: Arc<dyn LinkTransport>,
        config: DispatchConfig,
    ) -> Self {
        Self {
            instance_id: instance_id.into(),
            registry,
            transport,
            config,
        }
    }

    pub fn instance_id(&self) -> &str {
        &self.instance_id
    }
}

#[async_trait]
impl DeviceDispatcher for RegistryGuardedDispatcher {
    async fn send(&self, device_id: &str, command: &SendCommand) -> Result<(), DispatchError> {
        let record = match self.registry.lookup(device_id).await {
            Ok(Some(record)) => record,
            Ok(None) => {
                info!(
                    target: "smsgw.link",
                    device_id = %device_id,
                    message_id = %command.message_id,
                    "dispatch_not_connected"
                );
                return Err(DispatchError::NotConnected(format!(
                    "no live link for device {}",
                    device_id
                )));
            }
            Err(err) => {
                warn!(
                    target: "smsgw.link",
                    device_id = %device_id,
                    error = %err,
                    "dispatch_registry_lookup_failed"
                );
                return Err(DispatchError::Transport(format!(
                    "registry lookup failed: {}",
                    err
                )));
            }
        };
        if !record.is_owned_by(&self.instance_id) {
            info!(
                target: "smsgw.link",
                device_id = %device_id,
                message_id = %command.message_id,
                owner = %record.instance_id,
                instance_id = %self.instance_id,
                "dispatch_link_owned_elsewhere"
            );
            return Err(DispatchError::NotConnected(format!(
                "link for device {} held by instance {}",
                device_id, record.instance_id
            )));
        }

        deliver_with_retry(
            self.transport.clone(),
            device_id,
            command,
            self.config.max_retries,
            self.config.backoff_ms,
        )
        .await
        .map_err(|err| DispatchError::Transport(err.to_string()))?;
        info!(
            target: "smsgw.link",
            device_id = %device_id,
            message_id = %command.message_id,
            "dispatch_delivered"
        );
        Ok(())
    }
}

async fn deliver_with_retry(
    transport: Arc<dyn LinkTransport>,
    device_id: &str,
    command: &SendCommand,
    max_retries: u64,
    backoff_ms: u64,
) -> Result<(), LinkError> {
    let mut attempt = 0u64;
    loop {
        match transport.deliver(device_id, command).await {
            Ok(()) => return Ok(()),
            Err(err) => {
                attempt += 1;
                if attempt > max_retries {
                    return Err(err);
                }
                warn!(
                    target: "smsgw.link",
                    device_id = %device_id,
                    attempt = attempt,
                    error = %err,
                    "dispatch_transport_retry"
                );
                if backoff_ms > 0 {
                    tokio::time::sleep(Duration::from_millis(backoff_ms)).await;
                }
            }
        }
    }
}
