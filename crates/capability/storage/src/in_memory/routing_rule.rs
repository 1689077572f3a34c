//! 路由规则内存存储实现

use crate::error::StorageError;
use crate::models::RoutingRuleRecord;
use crate::traits::RoutingRuleStore;
use std::sync::RwLock;

pub struct InMemoryRoutingRuleStore {
    rules: RwLock<Vec<RoutingRuleRecord>>,
}

impl InMemoryRoutingRuleStore {
    pub fn new() -> Self {
        Self {
            rules: RwLock::new(Vec::new()),
        }
    }

    pub fn with_rules(rules: impl IntoIterator<Item = RoutingRuleRecord>) -> Self {
        Self {
            rules: RwLock::new(rules.into_iter().collect()),
        }
    }

    pub fn push(&self, rule: RoutingRuleRecord) -> Result<(), StorageError> {
        let mut rules = self
            .rules
            .write()
            .map_err(|_| StorageError::new("lock failed"))?;
        rules.push(rule);
        Ok(())
    }
}

impl Default for InMemoryRoutingRuleStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl RoutingRuleStore for InMemoryRoutingRuleStore {
    async fn list_active_rules(
        &self,
        system_id: &str,
    ) -> Result<Vec<RoutingRuleRecord>, StorageError> {
        let rules = self
            .rules
            .read()
            .map_err(|_| StorageError::new("lock failed"))?;
        Ok(rules
            .iter()
            .filter(|rule| rule.active && rule.system_id == system_id)
            .cloned()
            .collect())
    }
}
