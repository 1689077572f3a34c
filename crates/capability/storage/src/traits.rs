//! 存储接口 Trait 定义
//!
//! 定义核心读写的异步接口：
//! - DeviceStore：设备查询（只读）
//! - RoutingRuleStore：路由规则查询（只读）
//! - MessageLogStore：消息日志写入与状态补丁
//!
//! 设计原则：
//! - 所有接口返回 StorageError
//! - 使用 async_trait 支持动态分发

use crate::error::StorageError;
use crate::models::{DeviceRecord, MessageLogRecord, MessageLogUpdate, RoutingRuleRecord};
use async_trait::async_trait;

/// 设备存储接口
#[async_trait]
pub trait DeviceStore: Send + Sync {
    /// 根据设备 ID 查找设备
    async fn find_device(&self, device_id: &str) -> Result<Option<DeviceRecord>, StorageError>;

    /// 列出在线且具备链路能力的设备
    ///
    /// `group_ids` 为空表示不按分组过滤。
    async fn list_routable_devices(
        &self,
        group_ids: &[String],
    ) -> Result<Vec<DeviceRecord>, StorageError>;
}

/// 路由规则存储接口
#[async_trait]
pub trait RoutingRuleStore: Send + Sync {
    /// 列出 source system_id 匹配的激活规则
    async fn list_active_rules(
        &self,
        system_id: &str,
    ) -> Result<Vec<RoutingRuleRecord>, StorageError>;
}

/// 消息日志存储接口
#[async_trait]
pub trait MessageLogStore: Send + Sync {
    /// 创建日志（message_id 唯一）
    async fn create_log(&self, record: MessageLogRecord) -> Result<MessageLogRecord, StorageError>;

    /// 更新日志状态
    ///
    /// 终态（delivered / failed）不可再改；日志不存在或已是终态时返回 `None`。
    async fn update_log(
        &self,
        message_id: &str,
        update: MessageLogUpdate,
    ) -> Result<Option<MessageLogRecord>, StorageError>;

    /// 查找日志
    async fn find_log(&self, message_id: &str) -> Result<Option<MessageLogRecord>, StorageError>;

    /// 列出同一提交产生的全部日志（按创建时间升序）
    async fn list_logs_by_correlation(
        &self,
        correlation_id: &str,
    ) -> Result<Vec<MessageLogRecord>, StorageError>;
}
