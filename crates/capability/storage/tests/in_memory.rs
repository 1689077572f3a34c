use domain::{MessageStatus, Priority};
use smsgw_storage::{
    DEVICE_TYPE_LINK, DeviceRecord, DeviceStore, InMemoryDeviceStore, InMemoryMessageLogStore,
    InMemoryRoutingRuleStore, MessageLogRecord, MessageLogStore, MessageLogUpdate,
    RoutingRuleRecord, RoutingRuleStore,
};

fn device(device_id: &str, group_id: Option<&str>, online: bool, device_type: &str) -> DeviceRecord {
    DeviceRecord {
        device_id: device_id.to_string(),
        name: format!("{} name", device_id),
        device_group_id: group_id.map(str::to_string),
        device_group_name: group_id.map(|id| format!("{} name", id)),
        site_id: Some("site-1".to_string()),
        site_name: Some("Main".to_string()),
        online,
        device_type: device_type.to_string(),
        carrier_name: Some("carrier".to_string()),
        sim_phone_number: None,
        default_sim_slot: Some(1),
    }
}

#[tokio::test]
async fn routable_devices_filter_by_group_online_and_type() {
    let store = InMemoryDeviceStore::with_devices([
        device("dev-1", Some("g1"), true, DEVICE_TYPE_LINK),
        device("dev-2", Some("g2"), true, DEVICE_TYPE_LINK),
        device("dev-3", Some("g1"), false, DEVICE_TYPE_LINK),
        device("dev-4", Some("g1"), true, "modem"),
        device("dev-5", None, true, DEVICE_TYPE_LINK),
    ]);

    let in_group = store
        .list_routable_devices(&["g1".to_string()])
        .await
        .expect("list");
    let ids: Vec<_> = in_group.iter().map(|d| d.device_id.as_str()).collect();
    assert_eq!(ids, vec!["dev-1"]);

    let all = store.list_routable_devices(&[]).await.expect("list");
    let ids: Vec<_> = all.iter().map(|d| d.device_id.as_str()).collect();
    assert_eq!(ids, vec!["dev-1", "dev-2", "dev-5"]);

    assert!(store.find_device("dev-4").await.expect("find").is_some());
    assert!(store.find_device("missing").await.expect("find").is_none());
}

#[tokio::test]
async fn active_rules_match_system_id() {
    let store = InMemoryRoutingRuleStore::with_rules([
        RoutingRuleRecord {
            rule_id: "r1".to_string(),
            system_id: "telco".to_string(),
            device_group_ids: vec!["g1".to_string()],
            active: true,
        },
        RoutingRuleRecord {
            rule_id: "r2".to_string(),
            system_id: "telco".to_string(),
            device_group_ids: vec!["g2".to_string()],
            active: false,
        },
        RoutingRuleRecord {
            rule_id: "r3".to_string(),
            system_id: "other".to_string(),
            device_group_ids: vec!["g3".to_string()],
            active: true,
        },
    ]);

    let rules = store.list_active_rules("telco").await.expect("rules");
    assert_eq!(rules.len(), 1);
    assert_eq!(rules[0].rule_id, "r1");
}

#[tokio::test]
async fn message_log_create_and_patch() {
    let store = InMemoryMessageLogStore::new();
    let mut record = MessageLogRecord::outbound("m-1", "+15550001", "hello", Priority::High, 100)
        .with_device(&device("dev-1", Some("g1"), true, DEVICE_TYPE_LINK));
    record.correlation_id = Some("smpp-1".to_string());
    store.create_log(record.clone()).await.expect("create");

    assert!(store.create_log(record).await.is_err());

    let updated = store
        .update_log("m-1", MessageLogUpdate::sent(200))
        .await
        .expect("update")
        .expect("record");
    assert_eq!(updated.status, MessageStatus::Sent);
    assert_eq!(updated.sent_at_ms, Some(200));
    assert_eq!(updated.device_group_id.as_deref(), Some("g1"));
    assert_eq!(updated.sim_slot, Some(1));
    assert_eq!(updated.message_length, 5);

    let delivered = store
        .update_log("m-1", MessageLogUpdate::delivered(300))
        .await
        .expect("update")
        .expect("record");
    assert_eq!(delivered.status, MessageStatus::Delivered);
    assert_eq!(delivered.sent_at_ms, Some(200));
    assert_eq!(delivered.delivered_at_ms, Some(300));

    assert!(
        store
            .update_log("missing", MessageLogUpdate::failed("x"))
            .await
            .expect("update")
            .is_none()
    );

    let by_correlation = store
        .list_logs_by_correlation("smpp-1")
        .await
        .expect("list");
    assert_eq!(by_correlation.len(), 1);
}

#[tokio::test]
async fn terminal_message_log_status_is_final() {
    let store = InMemoryMessageLogStore::new();
    store
        .create_log(MessageLogRecord::outbound("m-1", "+1", "hi", Priority::Normal, 1))
        .await
        .expect("create");
    store
        .create_log(MessageLogRecord::outbound("m-2", "+1", "hi", Priority::Normal, 1))
        .await
        .expect("create");

    store
        .update_log("m-1", MessageLogUpdate::delivered(5))
        .await
        .expect("update")
        .expect("record");
    assert!(
        store
            .update_log("m-1", MessageLogUpdate::failed("late"))
            .await
            .expect("update")
            .is_none()
    );
    assert!(
        store
            .update_log("m-1", MessageLogUpdate::sent(9))
            .await
            .expect("update")
            .is_none()
    );
    let delivered = store.find_log("m-1").await.expect("find").expect("log");
    assert_eq!(delivered.status, MessageStatus::Delivered);
    assert_eq!(delivered.delivered_at_ms, Some(5));
    assert!(delivered.sent_at_ms.is_none());
    assert!(delivered.error_message.is_none());

    store
        .update_log("m-2", MessageLogUpdate::failed("radio off"))
        .await
        .expect("update")
        .expect("record");
    assert!(
        store
            .update_log("m-2", MessageLogUpdate::delivered(7))
            .await
            .expect("update")
            .is_none()
    );
    let failed = store.find_log("m-2").await.expect("find").expect("log");
    assert_eq!(failed.status, MessageStatus::Failed);
    assert!(failed.delivered_at_ms.is_none());
}

#[tokio::test]
async fn message_log_requires_message_id() {
    let store = InMemoryMessageLogStore::new();
    let record = MessageLogRecord::outbound("", "+1", "hi", Priority::Normal, 1);
    assert!(store.create_log(record).await.is_err());
}
