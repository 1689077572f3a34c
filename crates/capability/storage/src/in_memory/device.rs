//! 设备内存存储实现
//!
//! 仅用于本地演示和测试；设备数据由调用方预先装入。

use crate::error::StorageError;
use crate::models::DeviceRecord;
use crate::traits::DeviceStore;
use std::collections::HashMap;
use std::sync::RwLock;

/// 设备内存存储
///
/// 使用 RwLock + HashMap 提供线程安全的内存存储。
pub struct InMemoryDeviceStore {
    devices: RwLock<HashMap<String, DeviceRecord>>,
}

impl InMemoryDeviceStore {
    pub fn new() -> Self {
        Self {
            devices: RwLock::new(HashMap::new()),
        }
    }

    /// 写入或覆盖设备（测试装载用）
    pub fn upsert(&self, record: DeviceRecord) -> Result<(), StorageError> {
        let mut map = self
            .devices
            .write()
            .map_err(|_| StorageError::new("lock failed"))?;
        map.insert(record.device_id.clone(), record);
        Ok(())
    }

    pub fn with_devices(records: impl IntoIterator<Item = DeviceRecord>) -> Self {
        let map = records
            .into_iter()
            .map(|item| (item.device_id.clone(), item))
            .collect();
        Self {
            devices: RwLock::new(map),
        }
    }
}

impl Default for InMemoryDeviceStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl DeviceStore for InMemoryDeviceStore {
    async fn find_device(&self, device_id: &str) -> Result<Option<DeviceRecord>, StorageError> {
        let item = self
            .devices
            .read()
            .ok()
            .and_then(|map| map.get(device_id).cloned());
        Ok(item)
    }

    async fn list_routable_devices(
        &self,
        group_ids: &[String],
    ) -> Result<Vec<DeviceRecord>, StorageError> {
        let map = self
            .devices
            .read()
            .map_err(|_| StorageError::new("lock failed"))?;
        let mut items: Vec<DeviceRecord> = map
            .values()
            .filter(|item| item.is_routable())
            .filter(|item| group_ids.is_empty() || item.in_groups(group_ids))
            .cloned()
            .collect();
        items.sort_by(|a, b| a.device_id.cmp(&b.device_id));
        Ok(items)
    }
}
