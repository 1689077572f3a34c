//! 资源/动作常量与授权能力。
//!
//! 授权策略本身由外部提供，核心只消费 `allowed(role, resource, action)`。

use std::collections::{HashMap, HashSet};

pub const RESOURCE_SMS: &str = "sms";
pub const RESOURCE_LINKS: &str = "links";
pub const RESOURCE_METRICS: &str = "metrics";

pub const ACTION_READ: &str = "read";
pub const ACTION_SEND: &str = "send";

/// 授权检查能力。
pub trait AccessPolicy: Send + Sync {
    fn allowed(&self, role: &str, resource: &str, action: &str) -> bool;
}

/// 静态角色表：role → {resource:action}，`*:*` 代表全部。
#[derive(Debug, Clone, Default)]
pub struct StaticAccessPolicy {
    grants: HashMap<String, HashSet<String>>,
}

impl StaticAccessPolicy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn grant(mut self, role: &str, resource: &str, action: &str) -> Self {
        self.grants
            .entry(role.to_string())
            .or_default()
            .insert(format!("{}:{}", resource, action));
        self
    }

    /// 默认角色：admin 全部，operator 发送+读，viewer 只读。
    pub fn with_default_roles() -> Self {
        Self::new()
            .grant("admin", "*", "*")
            .grant("operator", RESOURCE_SMS, ACTION_SEND)
            .grant("operator", RESOURCE_LINKS, ACTION_READ)
            .grant("operator", RESOURCE_METRICS, ACTION_READ)
            .grant("viewer", RESOURCE_LINKS, ACTION_READ)
            .grant("viewer", RESOURCE_METRICS, ACTION_READ)
    }
}

impl AccessPolicy for StaticAccessPolicy {
    fn allowed(&self, role: &str, resource: &str, action: &str) -> bool {
        let Some(grants) = self.grants.get(role) else {
            return false;
        };
        grants.contains("*:*")
            || grants.contains(&format!("{}:{}", resource, action))
            || grants.contains(&format!("{}:*", resource))
    }
}
