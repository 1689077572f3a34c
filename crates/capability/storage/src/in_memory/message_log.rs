//! 消息日志内存存储实现
//!
//! 保留插入顺序，便于测试断言“每台设备一行”。

use crate::error::StorageError;
use crate::models::{MessageLogRecord, MessageLogUpdate};
use crate::traits::MessageLogStore;
use crate::validation::ensure_log_record;
use std::sync::RwLock;

pub struct InMemoryMessageLogStore {
    logs: RwLock<Vec<MessageLogRecord>>,
}

impl InMemoryMessageLogStore {
    pub fn new() -> Self {
        Self {
            logs: RwLock::new(Vec::new()),
        }
    }

    /// 全部日志快照（按写入顺序）
    pub fn snapshot(&self) -> Vec<MessageLogRecord> {
        self.logs
            .read()
            .map(|logs| logs.clone())
            .unwrap_or_default()
    }
}

impl Default for InMemoryMessageLogStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl MessageLogStore for InMemoryMessageLogStore {
    async fn create_log(&self, record: MessageLogRecord) -> Result<MessageLogRecord, StorageError> {
        ensure_log_record(&record)?;
        let mut logs = self
            .logs
            .write()
            .map_err(|_| StorageError::new("lock failed"))?;
        if logs.iter().any(|item| item.message_id == record.message_id) {
            return Err(StorageError::new("message log exists"));
        }
        logs.push(record.clone());
        Ok(record)
    }

    async fn update_log(
        &self,
        message_id: &str,
        update: MessageLogUpdate,
    ) -> Result<Option<MessageLogRecord>, StorageError> {
        let mut logs = self
            .logs
            .write()
            .map_err(|_| StorageError::new("lock failed"))?;
        let Some(record) = logs.iter_mut().find(|item| item.message_id == message_id) else {
            return Ok(None);
        };
        if !update.apply_to(record) {
            return Ok(None);
        }
        Ok(Some(record.clone()))
    }

    async fn find_log(&self, message_id: &str) -> Result<Option<MessageLogRecord>, StorageError> {
        let item = self
            .logs
            .read()
            .ok()
            .and_then(|logs| logs.iter().find(|item| item.message_id == message_id).cloned());
        Ok(item)
    }

    async fn list_logs_by_correlation(
        &self,
        correlation_id: &str,
    ) -> Result<Vec<MessageLogRecord>, StorageError> {
        let logs = self
            .logs
            .read()
            .map_err(|_| StorageError::new("lock failed"))?;
        Ok(logs
            .iter()
            .filter(|item| item.correlation_id.as_deref() == Some(correlation_id))
            .cloned()
            .collect())
    }
}
