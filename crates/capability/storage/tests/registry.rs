use domain::{ConnectionRecord, LinkType};
use smsgw_storage::{InMemoryLinkRegistry, LinkRegistry};
use std::time::Duration;

fn record(device_id: &str, instance_id: &str, ts_ms: i64) -> ConnectionRecord {
    ConnectionRecord::new(device_id, instance_id, LinkType::Device, ts_ms)
        .with_group(Some("group-1".to_string()))
}

#[tokio::test]
async fn store_then_lookup_and_heartbeat() {
    let registry = InMemoryLinkRegistry::new(60);
    registry
        .store(&record("dev-1", "gw-a", 1_000))
        .await
        .expect("store");

    let found = registry
        .lookup("dev-1")
        .await
        .expect("lookup")
        .expect("record");
    assert_eq!(found.instance_id, "gw-a");
    assert_eq!(found.last_heartbeat_ms, 1_000);

    let updated = registry.heartbeat("dev-1", 5_000).await.expect("heartbeat");
    assert_eq!(updated.last_heartbeat_ms, 5_000);
    assert_eq!(updated.connected_at_ms, 1_000);

    let found = registry
        .lookup("dev-1")
        .await
        .expect("lookup")
        .expect("record");
    assert_eq!(found.last_heartbeat_ms, 5_000);
}

#[tokio::test]
async fn heartbeat_unknown_device_is_not_found() {
    let registry = InMemoryLinkRegistry::new(60);
    let err = registry
        .heartbeat("missing", 1_000)
        .await
        .expect_err("not found");
    assert!(err.is_not_found());
}

#[tokio::test]
async fn remove_clears_record_and_instance_index() {
    let registry = InMemoryLinkRegistry::new(60);
    registry
        .store(&record("dev-1", "gw-a", 1_000))
        .await
        .expect("store");
    registry
        .store(&record("dev-2", "gw-a", 1_000))
        .await
        .expect("store");

    assert_eq!(
        registry.list_by_instance("gw-a").await.expect("list"),
        vec!["dev-1".to_string(), "dev-2".to_string()]
    );

    registry.remove("dev-1", "gw-a").await.expect("remove");
    assert!(registry.lookup("dev-1").await.expect("lookup").is_none());
    assert_eq!(
        registry.list_by_instance("gw-a").await.expect("list"),
        vec!["dev-2".to_string()]
    );

    registry.remove("dev-1", "gw-a").await.expect("idempotent remove");
}

#[tokio::test]
async fn last_writer_wins_across_instances() {
    let registry = InMemoryLinkRegistry::new(60);
    registry
        .store(&record("dev-1", "gw-a", 1_000))
        .await
        .expect("store a");
    registry
        .store(&record("dev-1", "gw-b", 2_000))
        .await
        .expect("store b");

    let owner = registry
        .lookup("dev-1")
        .await
        .expect("lookup")
        .expect("record");
    assert_eq!(owner.instance_id, "gw-b");
    assert!(registry.list_by_instance("gw-a").await.expect("list").is_empty());
    assert_eq!(
        registry.list_by_instance("gw-b").await.expect("list"),
        vec!["dev-1".to_string()]
    );

    // 旧实例的迟到 remove 不得删除新持有者的记录
    registry.remove("dev-1", "gw-a").await.expect("remove");
    let owner = registry
        .lookup("dev-1")
        .await
        .expect("lookup")
        .expect("record");
    assert_eq!(owner.instance_id, "gw-b");
}

#[tokio::test]
async fn remove_if_stale_only_removes_old_heartbeats() {
    let registry = InMemoryLinkRegistry::new(60);
    registry
        .store(&record("dev-old", "gw-a", 1_000))
        .await
        .expect("store");
    registry
        .store(&record("dev-new", "gw-a", 9_000))
        .await
        .expect("store");

    assert!(
        registry
            .remove_if_stale("dev-old", 5_000)
            .await
            .expect("remove old")
    );
    assert!(
        !registry
            .remove_if_stale("dev-new", 5_000)
            .await
            .expect("keep new")
    );
    assert!(
        !registry
            .remove_if_stale("dev-old", 5_000)
            .await
            .expect("already gone")
    );

    let all = registry.list_all().await.expect("list all");
    assert_eq!(all.len(), 1);
    assert_eq!(all[0].device_id, "dev-new");
    assert_eq!(
        registry.list_by_instance("gw-a").await.expect("list"),
        vec!["dev-new".to_string()]
    );
}

#[tokio::test]
async fn heartbeat_rescues_record_from_stale_removal() {
    let registry = InMemoryLinkRegistry::new(60);
    registry
        .store(&record("dev-1", "gw-a", 1_000))
        .await
        .expect("store");
    registry.heartbeat("dev-1", 8_000).await.expect("heartbeat");

    assert!(
        !registry
            .remove_if_stale("dev-1", 5_000)
            .await
            .expect("not stale")
    );
    assert!(registry.lookup("dev-1").await.expect("lookup").is_some());
}

#[tokio::test]
async fn expired_records_disappear() {
    let registry = InMemoryLinkRegistry::with_ttl(Duration::from_millis(20));
    registry
        .store(&record("dev-1", "gw-a", 1_000))
        .await
        .expect("store");
    tokio::time::sleep(Duration::from_millis(40)).await;

    assert!(registry.lookup("dev-1").await.expect("lookup").is_none());
    assert!(registry.list_all().await.expect("list all").is_empty());
    assert!(
        registry
            .list_by_instance("gw-a")
            .await
            .expect("list by instance")
            .is_empty()
    );
    assert!(registry.heartbeat("dev-1", 2_000).await.is_err());
}
