//! Postgres 路由规则存储实现

use crate::error::StorageError;
use crate::models::RoutingRuleRecord;
use crate::traits::RoutingRuleStore;
use sqlx::{PgPool, Row};

pub struct PgRoutingRuleStore {
    pub pool: PgPool,
}

impl PgRoutingRuleStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl RoutingRuleStore for PgRoutingRuleStore {
    async fn list_active_rules(
        &self,
        system_id: &str,
    ) -> Result<Vec<RoutingRuleRecord>, StorageError> {
        let rows = sqlx::query(
            "select rule_id, system_id, device_group_ids, active \
             from routing_rules \
             where system_id = $1 and active = true \
             order by rule_id",
        )
        .bind(system_id)
        .fetch_all(&self.pool)
        .await?;
        let mut items = Vec::with_capacity(rows.len());
        for row in rows {
            let device_group_ids: Option<Vec<String>> = row.try_get("device_group_ids")?;
            items.push(RoutingRuleRecord {
                rule_id: row.try_get("rule_id")?,
                system_id: row.try_get("system_id")?,
                device_group_ids: device_group_ids.unwrap_or_default(),
                active: row.try_get("active")?,
            });
        }
        Ok(items)
    }
}
