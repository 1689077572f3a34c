//! 注册表过期清扫与实例退出清理。

use smsgw_storage::{LinkRegistry, StorageError};
use smsgw_telemetry::record_registry_swept;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

#[derive(Debug, Clone)]
pub struct SweepConfig {
    pub interval: Duration,
    /// 最后心跳距今超过该窗口即视为过期。
    pub stale_after: Duration,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub scanned: usize,
    pub removed: usize,
}

/// 执行一次清扫。
///
/// 快照之后被刷新的记录由 `remove_if_stale` 的原子复核保留；单条删除失败只记日志。
pub async fn sweep_once(
    registry: &dyn LinkRegistry,
    now_ms: i64,
    stale_after_ms: i64,
) -> Result<SweepReport, StorageError> {
    let stale_before_ms = now_ms - stale_after_ms;
    let records = registry.list_all().await?;
    let mut report = SweepReport {
        scanned: records.len(),
        removed: 0,
    };
    for record in records.iter().filter(|record| record.is_stale(stale_before_ms)) {
        match registry
            .remove_if_stale(&record.device_id, stale_before_ms)
            .await
        {
            Ok(true) => {
                report.removed += 1;
                info!(
                    target: "smsgw.registry",
                    device_id = %record.device_id,
                    instance_id = %record.instance_id,
                    last_heartbeat_ms = record.last_heartbeat_ms,
                    "registry_record_expired"
                );
            }
            Ok(false) => {}
            Err(err) => warn!(
                target: "smsgw.registry",
                device_id = %record.device_id,
                error = %err,
                "registry_expire_failed"
            ),
        }
    }
    record_registry_swept(report.removed as u64);
    Ok(report)
}

/// 固定间隔的后台清扫任务，伴随进程生命周期运行。
pub fn spawn_registry_sweeper(
    registry: Arc<dyn LinkRegistry>,
    config: SweepConfig,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let stale_after_ms = config.stale_after.as_millis() as i64;
        let mut ticker = tokio::time::interval(config.interval.max(Duration::from_secs(1)));
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        // 首个 tick 立即触发，跳过以免启动即清扫
        ticker.tick().await;
        loop {
            ticker.tick().await;
            match sweep_once(registry.as_ref(), domain::now_epoch_ms(), stale_after_ms).await {
                Ok(report) => info!(
                    target: "smsgw.registry",
                    scanned = report.scanned,
                    removed = report.removed,
                    "registry_sweep_completed"
                ),
                Err(err) => warn!(
                    target: "smsgw.registry",
                    error = %err,
                    "registry_sweep_failed"
                ),
            }
        }
    })
}

/// 删除本实例索引下的全部链路记录，返回处理条数。
pub async fn release_instance_links(
    registry: &dyn LinkRegistry,
    instance_id: &str,
) -> Result<usize, StorageError> {
    let device_ids = registry.list_by_instance(instance_id).await?;
    let mut released = 0usize;
    for device_id in &device_ids {
        match registry.remove(device_id, instance_id).await {
            Ok(()) => released += 1,
            Err(err) => warn!(
                target: "smsgw.registry",
                device_id = %device_id,
                instance_id = %instance_id,
                error = %err,
                "registry_release_failed"
            ),
        }
    }
    info!(
        target: "smsgw.registry",
        instance_id = %instance_id,
        released = released,
        "registry_instance_released"
    );
    Ok(released)
}
