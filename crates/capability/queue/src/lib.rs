//! 消息队列网关。
//!
//! - `QueueGateway`：声明、发布、消费的统一接口
//! - `AmqpQueueGateway`：基于 lapin 的 AMQP 实现（有界重试连接、持久化发布、自动确认消费）
//! - `InMemoryQueueGateway`：进程内实现，用于测试与本地演示
//!
//! 消费者回调失败只记录日志，不由网关重试；重试策略属于处理器自身。

use async_trait::async_trait;
use std::sync::Arc;

pub mod amqp;
pub mod memory;

pub use amqp::{AmqpQueueConfig, AmqpQueueGateway};
pub use memory::{InMemoryQueueGateway, PublishedMessage};

/// 队列错误。
#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    #[error("connection error: {0}")]
    Connection(String),
    #[error("channel not open")]
    ChannelClosed,
    #[error("declare error: {0}")]
    Declare(String),
    #[error("publish error: {0}")]
    Publish(String),
    #[error("consume error: {0}")]
    Consume(String),
    #[error("handler error: {0}")]
    Handler(String),
}

impl QueueError {
    /// 可由外层流水线重试（而非进程级致命）的错误。
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::ChannelClosed | Self::Publish(_) | Self::Connection(_)
        )
    }
}

/// 单条消息处理器。
#[async_trait]
pub trait MessageHandler: Send + Sync {
    async fn handle(&self, payload: Vec<u8>) -> Result<(), QueueError>;
}

/// 队列网关抽象。
#[async_trait]
pub trait QueueGateway: Send + Sync {
    /// 确保持久队列存在（非独占、不自动删除），可重复调用。
    async fn declare(&self, queue: &str) -> Result<(), QueueError>;

    /// 经默认交换机按队列名投递持久化消息。
    async fn publish(&self, queue: &str, payload: &[u8]) -> Result<(), QueueError> {
        self.publish_to("", queue, payload).await
    }

    async fn publish_to(
        &self,
        exchange: &str,
        routing_key: &str,
        payload: &[u8],
    ) -> Result<(), QueueError>;

    /// 注册消费者；每个消费者在独立任务中运行，返回其句柄。
    async fn consume(
        &self,
        queue: &str,
        handler: Arc<dyn MessageHandler>,
    ) -> Result<tokio::task::JoinHandle<()>, QueueError>;
}
