//! AMQP 队列网关（lapin）。

use crate::{MessageHandler, QueueError, QueueGateway};
use async_trait::async_trait;
use futures_util::StreamExt;
use lapin::options::{BasicConsumeOptions, BasicPublishOptions, QueueDeclareOptions};
use lapin::types::FieldTable;
use lapin::{BasicProperties, Channel, Connection, ConnectionProperties};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{error, info, warn};

/// AMQP delivery-mode：2 = persistent。
const DELIVERY_MODE_PERSISTENT: u8 = 2;

#[derive(Debug, Clone)]
pub struct AmqpQueueConfig {
    pub url: String,
    /// 连接尝试次数上限（至少 1 次）。
    pub connect_attempts: u32,
    pub retry_delay_ms: u64,
}

struct AmqpSession {
    // 持有连接以保持通道存活
    _connection: Connection,
    channel: Channel,
}

pub struct AmqpQueueGateway {
    config: AmqpQueueConfig,
    session: Mutex<Option<AmqpSession>>,
}

impl AmqpQueueGateway {
    pub fn new(config: AmqpQueueConfig) -> Self {
        Self {
            config,
            session: Mutex::new(None),
        }
    }

    /// 建立连接与通道；失败后按固定间隔重试，超过上限返回 Connection 错误。
    ///
    /// 已连接时直接返回，失败后再次调用是安全的。
    pub async fn connect(&self) -> Result<(), QueueError> {
        let mut session = self.session.lock().await;
        if let Some(current) = session.as_ref() {
            if current.channel.status().connected() {
                return Ok(());
            }
        }
        let max_attempts = self.config.connect_attempts.max(1);
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            match open_session(&self.config.url).await {
                Ok(opened) => {
                    info!(target: "smsgw.queue", attempt = attempt, "amqp_connected");
                    *session = Some(opened);
                    return Ok(());
                }
                Err(err) => {
                    warn!(
                        target: "smsgw.queue",
                        attempt = attempt,
                        max_attempts = max_attempts,
                        error = %err,
                        "amqp_connect_failed"
                    );
                    if attempt >= max_attempts {
                        return Err(QueueError::Connection(err.to_string()));
                    }
                    if self.config.retry_delay_ms > 0 {
                        tokio::time::sleep(Duration::from_millis(self.config.retry_delay_ms))
                            .await;
                    }
                }
            }
        }
    }

    pub async fn is_connected(&self) -> bool {
        self.session
            .lock()
            .await
            .as_ref()
            .map(|current| current.channel.status().connected())
            .unwrap_or(false)
    }

    async fn channel(&self) -> Result<Channel, QueueError> {
        let session = self.session.lock().await;
        match session.as_ref() {
            Some(current) if current.channel.status().connected() => Ok(current.channel.clone()),
            _ => Err(QueueError::ChannelClosed),
        }
    }
}

async fn open_session(url: &str) -> Result<AmqpSession, lapin::Error> {
    let connection = Connection::connect(url, ConnectionProperties::default()).await?;
    let channel = connection.create_channel().await?;
    Ok(AmqpSession {
        _connection: connection,
        channel,
    })
}

#[async_trait]
impl QueueGateway for AmqpQueueGateway {
    async fn declare(&self, queue: &str) -> Result<(), QueueError> {
        let channel = self.channel().await?;
        channel
            .queue_declare(
                queue,
                QueueDeclareOptions {
                    durable: true,
                    exclusive: false,
                    auto_delete: false,
                    ..QueueDeclareOptions::default()
                },
                FieldTable::default(),
            )
            .await
            .map_err(|err| QueueError::Declare(err.to_string()))?;
        info!(target: "smsgw.queue", queue = %queue, "queue_declared");
        Ok(())
    }

    async fn publish_to(
        &self,
        exchange: &str,
        routing_key: &str,
        payload: &[u8],
    ) -> Result<(), QueueError> {
        let channel = self.channel().await?;
        channel
            .basic_publish(
                exchange,
                routing_key,
                BasicPublishOptions::default(),
                payload,
                BasicProperties::default()
                    .with_delivery_mode(DELIVERY_MODE_PERSISTENT)
                    .with_content_type("application/json".into()),
            )
            .await
            .map_err(|err| QueueError::Publish(err.to_string()))?
            .await
            .map_err(|err| QueueError::Publish(err.to_string()))?;
        Ok(())
    }

    async fn consume(
        &self,
        queue: &str,
        handler: Arc<dyn MessageHandler>,
    ) -> Result<tokio::task::JoinHandle<()>, QueueError> {
        let channel = self.channel().await?;
        let consumer_tag = format!("{}-{}", queue, uuid::Uuid::new_v4());
        let mut consumer = channel
            .basic_consume(
                queue,
                &consumer_tag,
                BasicConsumeOptions {
                    no_ack: true,
                    ..BasicConsumeOptions::default()
                },
                FieldTable::default(),
            )
            .await
            .map_err(|err| QueueError::Consume(err.to_string()))?;
        info!(
            target: "smsgw.queue",
            queue = %queue,
            consumer_tag = %consumer_tag,
            "consumer_started"
        );
        let queue = queue.to_string();
        Ok(tokio::spawn(async move {
            while let Some(delivery) = consumer.next().await {
                match delivery {
                    Ok(delivery) => {
                        if let Err(err) = handler.handle(delivery.data).await {
                            warn!(
                                target: "smsgw.queue",
                                queue = %queue,
                                error = %err,
                                "message_handler_failed"
                            );
                        }
                    }
                    Err(err) => {
                        error!(
                            target: "smsgw.queue",
                            queue = %queue,
                            error = %err,
                            "consumer_delivery_error"
                        );
                        break;
                    }
                }
            }
            // 不做会话内重连，交由进程监管重启
            error!(target: "smsgw.queue", queue = %queue, "consumer_stream_ended");
        }))
    }
}
