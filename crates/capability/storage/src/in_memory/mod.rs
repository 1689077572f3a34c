//! 内存存储实现模块
//!
//! 用于本地演示和测试。
//!
//! 包含以下实现：
//! - DeviceStore: InMemoryDeviceStore
//! - RoutingRuleStore: InMemoryRoutingRuleStore
//! - MessageLogStore: InMemoryMessageLogStore
//! - LinkRegistry: InMemoryLinkRegistry

pub mod device;
pub mod message_log;
pub mod registry;
pub mod routing_rule;

pub use device::*;
pub use message_log::*;
pub use registry::*;
pub use routing_rule::*;
