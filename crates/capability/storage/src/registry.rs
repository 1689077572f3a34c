//! 设备链路注册表接口。
//!
//! 注册表是跨实例共享的“在线缓存”而非记账系统：丢失可恢复（链路会重新注册），
//! 因此每个操作都是对共享存储的单次原子 upsert/delete，不依赖任何进程内锁。

use crate::error::StorageError;
use domain::ConnectionRecord;

#[async_trait::async_trait]
pub trait LinkRegistry: Send + Sync {
    /// 覆盖写入设备的链路记录（带 TTL），并加入所属实例的索引集合。
    async fn store(&self, record: &ConnectionRecord) -> Result<(), StorageError>;

    /// 刷新心跳时间与 TTL；记录不存在时返回 NotFound。
    async fn heartbeat(
        &self,
        device_id: &str,
        ts_ms: i64,
    ) -> Result<ConnectionRecord, StorageError>;

    async fn lookup(&self, device_id: &str) -> Result<Option<ConnectionRecord>, StorageError>;

    /// 删除记录并从实例索引中移除（幂等）。
    ///
    /// 记录已被其他实例接管时只清理本实例索引，不删除新持有者的记录。
    async fn remove(&self, device_id: &str, instance_id: &str) -> Result<(), StorageError>;

    async fn list_by_instance(&self, instance_id: &str) -> Result<Vec<String>, StorageError>;

    /// 全量列出（仅清扫使用），跳过损坏或并发消失的条目。
    async fn list_all(&self) -> Result<Vec<ConnectionRecord>, StorageError>;

    /// 仅当记录最后心跳早于 `stale_before_ms` 时删除；返回是否删除。
    async fn remove_if_stale(
        &self,
        device_id: &str,
        stale_before_ms: i64,
    ) -> Result<bool, StorageError>;
}
