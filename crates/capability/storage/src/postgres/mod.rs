//! # PostgreSQL 存储实现模块
//!
//! 生产环境使用的只读设备/路由规则查询与消息日志写入。
//!
//! ## 包含的实现
//!
//! - **DeviceStore** (`device.rs`)：设备联表查询（分组名、站点名反范式带出）
//! - **RoutingRuleStore** (`routing_rule.rs`)：按 system_id 查询激活规则
//! - **MessageLogStore** (`message_log.rs`)：消息日志插入与状态补丁
//!
//! ## 数据库模式要求
//!
//! - `devices`：设备表（device_id, name, device_group_id, site_id, online, device_type,
//!   carrier_name, sim_phone_number, default_sim_slot）
//! - `device_groups`：分组表（device_group_id, name）
//! - `sites`：站点表（site_id, name）
//! - `routing_rules`：路由规则（rule_id, system_id, device_group_ids text[], active）
//! - `message_logs`：消息日志（message_id 主键，metadata jsonb）
//!
//! 建表脚本见仓库根目录 `migrations/`。
//!
//! ## 错误处理
//!
//! - `sqlx::Error` 自动转换为 `StorageError`（连接类错误归为 Connection）
//! - 返回 `Option<T>` 表示"可能不存在"

pub mod device;
pub mod message_log;
pub mod routing_rule;

pub use device::*;
pub use message_log::*;
pub use routing_rule::*;
