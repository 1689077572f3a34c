//! 验证辅助函数
//!
//! - ensure_identifier：标识符非空
//! - ensure_log_record：消息日志写入前的最小一致性检查

use crate::error::StorageError;
use crate::models::MessageLogRecord;

/// 验证标识符非空
pub fn ensure_identifier(field: &str, value: &str) -> Result<(), StorageError> {
    if value.trim().is_empty() {
        return Err(StorageError::new(format!("{} required", field)));
    }
    Ok(())
}

/// 验证消息日志记录
///
/// message_id 必填；设备字段允许为空（“无可用设备”的失败记录没有设备上下文）。
pub fn ensure_log_record(record: &MessageLogRecord) -> Result<(), StorageError> {
    ensure_identifier("message_id", &record.message_id)?;
    if let Some(device_id) = record.device_id.as_deref() {
        ensure_identifier("device_id", device_id)?;
    }
    Ok(())
}
