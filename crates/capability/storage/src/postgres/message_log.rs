//! Postgres 消息日志存储实现
//!
//! 每次投递尝试一行；状态补丁只覆盖非空字段。

use crate::error::StorageError;
use crate::models::{MessageLogRecord, MessageLogUpdate};
use crate::traits::MessageLogStore;
use crate::validation::ensure_log_record;
use domain::{MessageStatus, Priority};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};

const LOG_COLUMNS: &str = "message_id, correlation_id, system_id, device_id, device_name, \
     device_group_id, device_group_name, site_id, site_name, carrier_name, sim_slot, \
     source_addr, destination_addr, message, message_length, direction, priority, status, \
     delivery_report_requested, \
     (extract(epoch from queued_at) * 1000)::bigint as queued_at_ms, \
     (extract(epoch from sent_at) * 1000)::bigint as sent_at_ms, \
     (extract(epoch from delivered_at) * 1000)::bigint as delivered_at_ms, \
     error_message, metadata::text as metadata, \
     (extract(epoch from created_at) * 1000)::bigint as created_at_ms";

pub struct PgMessageLogStore {
    pub pool: PgPool,
}

impl PgMessageLogStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn ms_to_seconds(value: Option<i64>) -> Option<f64> {
    value.map(|ms| ms as f64 / 1000.0)
}

fn log_from_row(row: &PgRow) -> Result<MessageLogRecord, StorageError> {
    let sim_slot: Option<i16> = row.try_get("sim_slot")?;
    let priority: String = row.try_get("priority")?;
    let status: String = row.try_get("status")?;
    let status = MessageStatus::parse(&status)
        .ok_or_else(|| StorageError::new(format!("unknown message status: {}", status)))?;
    Ok(MessageLogRecord {
        message_id: row.try_get("message_id")?,
        correlation_id: row.try_get("correlation_id")?,
        system_id: row.try_get("system_id")?,
        device_id: row.try_get("device_id")?,
        device_name: row.try_get("device_name")?,
        device_group_id: row.try_get("device_group_id")?,
        device_group_name: row.try_get("device_group_name")?,
        site_id: row.try_get("site_id")?,
        site_name: row.try_get("site_name")?,
        carrier_name: row.try_get("carrier_name")?,
        sim_slot: sim_slot.and_then(|slot| u8::try_from(slot).ok()),
        source_addr: row.try_get("source_addr")?,
        destination_addr: row.try_get("destination_addr")?,
        message: row.try_get("message")?,
        message_length: row.try_get("message_length")?,
        direction: row.try_get("direction")?,
        priority: Priority::parse(&priority),
        status,
        delivery_report_requested: row.try_get("delivery_report_requested")?,
        queued_at_ms: row.try_get("queued_at_ms")?,
        sent_at_ms: row.try_get("sent_at_ms")?,
        delivered_at_ms: row.try_get("delivered_at_ms")?,
        error_message: row.try_get("error_message")?,
        metadata: row.try_get("metadata")?,
        created_at_ms: row.try_get("created_at_ms")?,
    })
}

#[async_trait::async_trait]
impl MessageLogStore for PgMessageLogStore {
    async fn create_log(&self, record: MessageLogRecord) -> Result<MessageLogRecord, StorageError> {
        ensure_log_record(&record)?;
        sqlx::query(
            "insert into message_logs \
             (message_id, correlation_id, system_id, device_id, device_name, device_group_id, \
              device_group_name, site_id, site_name, carrier_name, sim_slot, source_addr, \
              destination_addr, message, message_length, direction, priority, status, \
              delivery_report_requested, queued_at, sent_at, delivered_at, error_message, \
              metadata, created_at) \
             values ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, \
              $17, $18, $19, to_timestamp($20), to_timestamp($21), to_timestamp($22), $23, \
              $24::jsonb, to_timestamp($25 / 1000.0))",
        )
        .bind(&record.message_id)
        .bind(&record.correlation_id)
        .bind(&record.system_id)
        .bind(&record.device_id)
        .bind(&record.device_name)
        .bind(&record.device_group_id)
        .bind(&record.device_group_name)
        .bind(&record.site_id)
        .bind(&record.site_name)
        .bind(&record.carrier_name)
        .bind(record.sim_slot.map(i16::from))
        .bind(&record.source_addr)
        .bind(&record.destination_addr)
        .bind(&record.message)
        .bind(record.message_length)
        .bind(&record.direction)
        .bind(record.priority.as_str())
        .bind(record.status.as_str())
        .bind(record.delivery_report_requested)
        .bind(ms_to_seconds(record.queued_at_ms))
        .bind(ms_to_seconds(record.sent_at_ms))
        .bind(ms_to_seconds(record.delivered_at_ms))
        .bind(&record.error_message)
        .bind(&record.metadata)
        .bind(record.created_at_ms as f64)
        .execute(&self.pool)
        .await?;
        Ok(record)
    }

    async fn update_log(
        &self,
        message_id: &str,
        update: MessageLogUpdate,
    ) -> Result<Option<MessageLogRecord>, StorageError> {
        let sql = format!(
            "update message_logs set status = $1, \
             error_message = coalesce($2, error_message), \
             queued_at = coalesce(to_timestamp($3), queued_at), \
             sent_at = coalesce(to_timestamp($4), sent_at), \
             delivered_at = coalesce(to_timestamp($5), delivered_at) \
             where message_id = $6 and status not in ('delivered', 'failed') \
             returning {}",
            LOG_COLUMNS
        );
        let row = sqlx::query(&sql)
            .bind(update.status.as_str())
            .bind(&update.error_message)
            .bind(ms_to_seconds(update.queued_at_ms))
            .bind(ms_to_seconds(update.sent_at_ms))
            .bind(ms_to_seconds(update.delivered_at_ms))
            .bind(message_id)
            .fetch_optional(&self.pool)
            .await?;
        let Some(row) = row else {
            return Ok(None);
        };
        log_from_row(&row).map(Some)
    }

    async fn find_log(&self, message_id: &str) -> Result<Option<MessageLogRecord>, StorageError> {
        let sql = format!(
            "select {} from message_logs where message_id = $1",
            LOG_COLUMNS
        );
        let row = sqlx::query(&sql)
            .bind(message_id)
            .fetch_optional(&self.pool)
            .await?;
        let Some(row) = row else {
            return Ok(None);
        };
        log_from_row(&row).map(Some)
    }

    async fn list_logs_by_correlation(
        &self,
        correlation_id: &str,
    ) -> Result<Vec<MessageLogRecord>, StorageError> {
        let sql = format!(
            "select {} from message_logs where correlation_id = $1 order by created_at asc",
            LOG_COLUMNS
        );
        let rows = sqlx::query(&sql)
            .bind(correlation_id)
            .fetch_all(&self.pool)
            .await?;
        let mut items = Vec::with_capacity(rows.len());
        for row in rows {
            items.push(log_from_row(&row)?);
        }
        Ok(items)
    }
}
