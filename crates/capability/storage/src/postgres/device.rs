//! Postgres 设备存储实现
//!
//! 设备、分组、站点由外部子系统维护，这里只做只读联表查询。

use crate::error::StorageError;
use crate::models::{DEVICE_TYPE_LINK, DeviceRecord};
use crate::traits::DeviceStore;
use crate::validation::ensure_identifier;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};

const DEVICE_COLUMNS: &str = "d.device_id, d.name, d.device_group_id, g.name as device_group_name, \
     d.site_id, s.name as site_name, d.online, d.device_type, d.carrier_name, \
     d.sim_phone_number, d.default_sim_slot \
     from devices d \
     left join device_groups g on g.device_group_id = d.device_group_id \
     left join sites s on s.site_id = d.site_id";

pub struct PgDeviceStore {
    pub pool: PgPool,
}

impl PgDeviceStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(database_url: &str) -> Result<Self, StorageError> {
        let pool = crate::connection::connect_pool(database_url).await?;
        Ok(Self { pool })
    }
}

fn device_from_row(row: &PgRow) -> Result<DeviceRecord, StorageError> {
    let default_sim_slot: Option<i16> = row.try_get("default_sim_slot")?;
    Ok(DeviceRecord {
        device_id: row.try_get("device_id")?,
        name: row.try_get("name")?,
        device_group_id: row.try_get("device_group_id")?,
        device_group_name: row.try_get("device_group_name")?,
        site_id: row.try_get("site_id")?,
        site_name: row.try_get("site_name")?,
        online: row.try_get("online")?,
        device_type: row.try_get("device_type")?,
        carrier_name: row.try_get("carrier_name")?,
        sim_phone_number: row.try_get("sim_phone_number")?,
        default_sim_slot: default_sim_slot.and_then(|slot| u8::try_from(slot).ok()),
    })
}

#[async_trait::async_trait]
impl DeviceStore for PgDeviceStore {
    async fn find_device(&self, device_id: &str) -> Result<Option<DeviceRecord>, StorageError> {
        ensure_identifier("device_id", device_id)?;
        let sql = format!("select {} where d.device_id = $1", DEVICE_COLUMNS);
        let row = sqlx::query(&sql)
            .bind(device_id)
            .fetch_optional(&self.pool)
            .await?;
        let Some(row) = row else {
            return Ok(None);
        };
        device_from_row(&row).map(Some)
    }

    async fn list_routable_devices(
        &self,
        group_ids: &[String],
    ) -> Result<Vec<DeviceRecord>, StorageError> {
        let rows = if group_ids.is_empty() {
            let sql = format!(
                "select {} where d.online = true and d.device_type = $1 order by d.device_id",
                DEVICE_COLUMNS
            );
            sqlx::query(&sql)
                .bind(DEVICE_TYPE_LINK)
                .fetch_all(&self.pool)
                .await?
        } else {
            let sql = format!(
                "select {} where d.online = true and d.device_type = $1 \
                 and d.device_group_id = any($2) order by d.device_id",
                DEVICE_COLUMNS
            );
            sqlx::query(&sql)
                .bind(DEVICE_TYPE_LINK)
                .bind(group_ids)
                .fetch_all(&self.pool)
                .await?
        };
        let mut devices = Vec::with_capacity(rows.len());
        for row in rows {
            devices.push(device_from_row(&row)?);
        }
        Ok(devices)
    }
}
