//! 进程内队列网关（测试与本地演示）。
//!
//! 发布记录按路由键保留完整历史；无消费者时消息暂存，注册消费者后补发。

use crate::{MessageHandler, QueueError, QueueGateway};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tracing::warn;

#[derive(Default)]
struct QueueState {
    published: Vec<Vec<u8>>,
    backlog: Vec<Vec<u8>>,
    consumer: Option<mpsc::UnboundedSender<Vec<u8>>>,
}

/// 已发布消息（含交换机）。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishedMessage {
    pub exchange: String,
    pub routing_key: String,
    pub payload: Vec<u8>,
}

#[derive(Default)]
pub struct InMemoryQueueGateway {
    declared: Mutex<HashSet<String>>,
    queues: Mutex<HashMap<String, QueueState>>,
    history: Mutex<Vec<PublishedMessage>>,
    closed: AtomicBool,
}

impl InMemoryQueueGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// 模拟通道关闭，之后的发布/声明/消费返回 ChannelClosed。
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }

    pub fn is_declared(&self, queue: &str) -> bool {
        self.declared
            .lock()
            .map(|set| set.contains(queue))
            .unwrap_or(false)
    }

    /// 按路由键取出全部已发布负载（按发布顺序）。
    pub fn published(&self, routing_key: &str) -> Vec<Vec<u8>> {
        self.queues
            .lock()
            .ok()
            .and_then(|map| map.get(routing_key).map(|state| state.published.clone()))
            .unwrap_or_default()
    }

    pub fn history(&self) -> Vec<PublishedMessage> {
        self.history
            .lock()
            .map(|items| items.clone())
            .unwrap_or_default()
    }

    fn ensure_open(&self) -> Result<(), QueueError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(QueueError::ChannelClosed);
        }
        Ok(())
    }
}

#[async_trait]
impl QueueGateway for InMemoryQueueGateway {
    async fn declare(&self, queue: &str) -> Result<(), QueueError> {
        self.ensure_open()?;
        let mut declared = self
            .declared
            .lock()
            .map_err(|_| QueueError::Declare("lock failed".to_string()))?;
        declared.insert(queue.to_string());
        Ok(())
    }

    async fn publish_to(
        &self,
        exchange: &str,
        routing_key: &str,
        payload: &[u8],
    ) -> Result<(), QueueError> {
        self.ensure_open()?;
        {
            let mut history = self
                .history
                .lock()
                .map_err(|_| QueueError::Publish("lock failed".to_string()))?;
            history.push(PublishedMessage {
                exchange: exchange.to_string(),
                routing_key: routing_key.to_string(),
                payload: payload.to_vec(),
            });
        }
        let mut queues = self
            .queues
            .lock()
            .map_err(|_| QueueError::Publish("lock failed".to_string()))?;
        let state = queues.entry(routing_key.to_string()).or_default();
        state.published.push(payload.to_vec());
        let delivered = match state.consumer.as_ref() {
            Some(sender) => sender.send(payload.to_vec()).is_ok(),
            None => false,
        };
        if !delivered {
            state.consumer = None;
            state.backlog.push(payload.to_vec());
        }
        Ok(())
    }

    async fn consume(
        &self,
        queue: &str,
        handler: Arc<dyn MessageHandler>,
    ) -> Result<tokio::task::JoinHandle<()>, QueueError> {
        self.ensure_open()?;
        let (sender, mut receiver) = mpsc::unbounded_channel::<Vec<u8>>();
        {
            let mut queues = self
                .queues
                .lock()
                .map_err(|_| QueueError::Consume("lock failed".to_string()))?;
            let state = queues.entry(queue.to_string()).or_default();
            for payload in state.backlog.drain(..) {
                let _ = sender.send(payload);
            }
            state.consumer = Some(sender);
        }
        let queue = queue.to_string();
        Ok(tokio::spawn(async move {
            while let Some(payload) = receiver.recv().await {
                if let Err(err) = handler.handle(payload).await {
                    warn!(
                        target: "smsgw.queue",
                        queue = %queue,
                        error = %err,
                        "message_handler_failed"
                    );
                }
            }
        }))
    }
}
