//! 数据库连接管理
//!
//! 提供 PostgreSQL 连接池初始化功能（设备、路由规则、消息日志共用）。

use crate::error::StorageError;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;

/// 建立 Postgres 连接池
///
/// 最大连接数限制为 8；连接失败归类为 `StorageErrorKind::Connection`。
pub async fn connect_pool(database_url: &str) -> Result<PgPool, StorageError> {
    let pool = PgPoolOptions::new()
        .max_connections(8)
        .connect(database_url)
        .await?;
    Ok(pool)
}
