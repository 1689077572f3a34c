use api_contract::DevicePresenceMessage;
use async_trait::async_trait;
use domain::{ConnectionRecord, LinkType, Priority, SendCommand};
use smsgw_link::{
    DeviceDispatcher, DispatchConfig, LinkError, LinkTransport, PresenceOutcome, PresenceTracker,
    RegistryGuardedDispatcher, SweepReport, release_instance_links, sweep_once,
};
use smsgw_storage::{InMemoryLinkRegistry, LinkRegistry};
use std::sync::Arc;

struct NoopTransport;

#[async_trait]
impl LinkTransport for NoopTransport {
    async fn deliver(&self, _device_id: &str, _command: &SendCommand) -> Result<(), LinkError> {
        Ok(())
    }
}

fn presence(event: &str, ts_ms: i64) -> DevicePresenceMessage {
    DevicePresenceMessage {
        event: event.to_string(),
        device_group_id: Some("field-team".to_string()),
        site_id: Some("site-1".to_string()),
        link_type: Some("console".to_string()),
        handicapped: true,
        ts_ms: Some(ts_ms),
    }
}

#[tokio::test]
async fn presence_lifecycle_updates_registry() {
    let registry = Arc::new(InMemoryLinkRegistry::new(60));
    let tracker = PresenceTracker::new("gw-a", registry.clone());

    let outcome = tracker
        .apply("dev-1", &presence("connect", 1_000))
        .await
        .expect("connect");
    assert_eq!(outcome, PresenceOutcome::Registered);
    let record = registry
        .lookup("dev-1")
        .await
        .expect("lookup")
        .expect("record");
    assert_eq!(record.instance_id, "gw-a");
    assert_eq!(record.link_type, LinkType::Console);
    assert!(record.handicapped);
    assert_eq!(record.device_group_id.as_deref(), Some("field-team"));

    let outcome = tracker
        .apply("dev-1", &presence("heartbeat", 4_000))
        .await
        .expect("heartbeat");
    assert_eq!(outcome, PresenceOutcome::Refreshed);
    let record = registry
        .lookup("dev-1")
        .await
        .expect("lookup")
        .expect("record");
    assert!(record.last_heartbeat_ms > record.connected_at_ms);

    let outcome = tracker
        .apply("dev-1", &presence("disconnect", 5_000))
        .await
        .expect("disconnect");
    assert_eq!(outcome, PresenceOutcome::Removed);
    assert!(registry.lookup("dev-1").await.expect("lookup").is_none());
    assert!(registry.list_by_instance("gw-a").await.expect("list").is_empty());
}

#[tokio::test]
async fn heartbeat_for_forgotten_link_reregisters() {
    let registry = Arc::new(InMemoryLinkRegistry::new(60));
    let tracker = PresenceTracker::new("gw-a", registry.clone());

    let outcome = tracker
        .apply("dev-1", &presence("heartbeat", 2_000))
        .await
        .expect("heartbeat");
    assert_eq!(outcome, PresenceOutcome::Reregistered);
    assert!(registry.lookup("dev-1").await.expect("lookup").is_some());

    let outcome = tracker
        .apply("dev-1", &presence("firmware", 3_000))
        .await
        .expect("unknown event");
    assert_eq!(outcome, PresenceOutcome::Ignored);
}

#[tokio::test]
async fn sweep_removes_stale_records_once() {
    let registry = InMemoryLinkRegistry::new(3600);
    registry
        .store(&ConnectionRecord::new("dev-stale", "gw-a", LinkType::Device, 1_000))
        .await
        .expect("store");
    registry
        .store(&ConnectionRecord::new("dev-live", "gw-a", LinkType::Device, 590_000))
        .await
        .expect("store");

    let first = sweep_once(&registry, 600_000, 300_000).await.expect("sweep");
    assert_eq!(
        first,
        SweepReport {
            scanned: 2,
            removed: 1
        }
    );
    let second = sweep_once(&registry, 600_000, 300_000).await.expect("sweep");
    assert_eq!(second.removed, 0);
    assert_eq!(second.scanned, 1);
    assert_eq!(
        registry.list_by_instance("gw-a").await.expect("list"),
        vec!["dev-live".to_string()]
    );
}

#[tokio::test]
async fn swept_device_becomes_not_connected() {
    let registry = Arc::new(InMemoryLinkRegistry::new(3600));
    registry
        .store(&ConnectionRecord::new("dev-1", "gw-a", LinkType::Device, 1_000))
        .await
        .expect("store");
    let dispatcher = RegistryGuardedDispatcher::new(
        "gw-a",
        registry.clone(),
        Arc::new(NoopTransport),
        DispatchConfig::default(),
    );
    let command = SendCommand {
        message_id: "m-1".to_string(),
        phone_number: "+15551234567".to_string(),
        message: "hi".to_string(),
        sim_slot: None,
        priority: Priority::High,
    };
    dispatcher.send("dev-1", &command).await.expect("live link");

    sweep_once(registry.as_ref(), 1_000 + 301_000, 300_000)
        .await
        .expect("sweep");

    assert!(registry.lookup("dev-1").await.expect("lookup").is_none());
    let err = dispatcher
        .send("dev-1", &command)
        .await
        .expect_err("swept");
    assert!(err.is_not_connected());
}

#[tokio::test]
async fn release_instance_links_only_touches_own_records() {
    let registry = InMemoryLinkRegistry::new(3600);
    registry
        .store(&ConnectionRecord::new("dev-1", "gw-a", LinkType::Device, 1))
        .await
        .expect("store");
    registry
        .store(&ConnectionRecord::new("dev-2", "gw-a", LinkType::Device, 1))
        .await
        .expect("store");
    registry
        .store(&ConnectionRecord::new("dev-3", "gw-b", LinkType::Device, 1))
        .await
        .expect("store");

    let released = release_instance_links(&registry, "gw-a")
        .await
        .expect("release");
    assert_eq!(released, 2);
    assert!(registry.list_by_instance("gw-a").await.expect("list").is_empty());
    assert!(registry.lookup("dev-3").await.expect("lookup").is_some());
}
